//! BNO086 9-DOF IMU, accessed over SHTP (Sensor Hub Transport Protocol).
//!
//! Ground-truthed against `device/bno086.c`: a reset pulse on `N_RESET`
//! gated by three fixed delays, then an SHTP session entirely framed as
//! 4-byte headers (length lo/hi, channel, sequence) each followed by
//! `length - 4` bytes of report payload. The original bit-bangs I2C
//! directly with `pigpio`'s `bbI2CZip`; on a Linux host the same SHTP
//! framing rides over a real `embedded_hal::i2c::I2c` peripheral plus a
//! GPIO reset line.

use std::thread;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

use crate::drivers::i2c_bus::SharedI2c;
use crate::error::{DeviceId, ErrCode, WtError};

const RESET_LOW_SETTLE: Duration = Duration::from_micros(10_000);
const RESET_HIGH_SETTLE: Duration = Duration::from_micros(100_000);
/// Below ~150ms the first feature report fails to start on this part.
const RESET_RECOVERY: Duration = Duration::from_micros(500_000);

const SHTP_HEADER_LEN: usize = 4;
const SHTP_MAX_PAYLOAD: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShtpHeader {
    pub length: u16,
    pub channel: u8,
    pub sequence: u8,
}

/// Rotation-vector report, the fused orientation estimate consumed by the
/// mission controller's dive-attitude logging.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationVector {
    pub i: f32,
    pub j: f32,
    pub k: f32,
    pub real: f32,
    pub accuracy_rad: f32,
}

pub struct Imu<I: I2c, P: OutputPin> {
    bus: SharedI2c<I>,
    addr: u8,
    reset_pin: P,
}

impl<I: I2c, P: OutputPin> Imu<I, P> {
    pub fn new(bus: SharedI2c<I>, addr: u8, reset_pin: P) -> Self {
        Self {
            bus,
            addr,
            reset_pin,
        }
    }

    /// Drive the sensor hub through its reset sequence. Must be called
    /// once before any SHTP transaction.
    pub fn open(&mut self) -> Result<(), WtError> {
        let io_err = || WtError::new(DeviceId::Imu, ErrCode::BusOpenFailed);
        self.reset_pin.set_high().map_err(|_| io_err())?;
        thread::sleep(RESET_LOW_SETTLE);
        self.reset_pin.set_low().map_err(|_| io_err())?;
        thread::sleep(RESET_HIGH_SETTLE);
        self.reset_pin.set_high().map_err(|_| io_err())?;
        thread::sleep(RESET_RECOVERY);
        Ok(())
    }

    pub fn read_header(&self) -> Result<ShtpHeader, WtError> {
        let mut buf = [0u8; SHTP_HEADER_LEN];
        self.bus.read(DeviceId::Imu, self.addr, &mut buf)?;
        let length = u16::from_le_bytes([buf[0], buf[1]]) & 0x7FFF;
        Ok(ShtpHeader {
            length,
            channel: buf[2],
            sequence: buf[3],
        })
    }

    /// Read a full SHTP packet (header + payload) into `out`, returning
    /// the number of payload bytes written.
    pub fn read_report(&self, out: &mut [u8]) -> Result<usize, WtError> {
        let header = self.read_header()?;
        let payload_len = header.length.saturating_sub(SHTP_HEADER_LEN as u16) as usize;
        if payload_len > SHTP_MAX_PAYLOAD || payload_len > out.len() {
            return Err(WtError::new(DeviceId::Imu, ErrCode::OutOfRange));
        }
        let mut framed = vec![0u8; SHTP_HEADER_LEN + payload_len];
        self.bus.read(DeviceId::Imu, self.addr, &mut framed)?;
        out[..payload_len].copy_from_slice(&framed[SHTP_HEADER_LEN..]);
        Ok(payload_len)
    }

    /// Read and decode the next rotation-vector report, for the
    /// acquisition worker's sampling loop.
    pub fn read_rotation_vector(&self) -> Result<RotationVector, WtError> {
        let mut buf = [0u8; SHTP_MAX_PAYLOAD];
        let len = self.read_report(&mut buf)?;
        parse_rotation_vector(&buf[..len]).ok_or(WtError::new(DeviceId::Imu, ErrCode::MalformedPacket))
    }
}

/// Parse a rotation-vector report body (report id 0x05, Q-point scaling
/// per the SH-2 reference manual: Q14 for the quaternion components, Q12
/// for accuracy).
pub fn parse_rotation_vector(body: &[u8]) -> Option<RotationVector> {
    if body.len() < 10 || body[0] != 0x05 {
        return None;
    }
    let q14 = |lo: u8, hi: u8| i16::from_le_bytes([lo, hi]) as f32 / (1u32 << 14) as f32;
    let q12 = |lo: u8, hi: u8| i16::from_le_bytes([lo, hi]) as f32 / (1u32 << 12) as f32;
    Some(RotationVector {
        i: q14(body[2], body[3]),
        j: q14(body[4], body[5]),
        k: q14(body[6], body[7]),
        real: q14(body[8], body[9]),
        accuracy_rad: if body.len() >= 12 {
            q12(body[10], body[11])
        } else {
            0.0
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_vector_rejects_wrong_report_id() {
        let body = [0xFFu8; 12];
        assert!(parse_rotation_vector(&body).is_none());
    }

    #[test]
    fn rotation_vector_decodes_identity_quaternion() {
        let mut body = [0u8; 12];
        body[0] = 0x05;
        let q14_one = (1i16 << 14).to_le_bytes();
        body[8] = q14_one[0];
        body[9] = q14_one[1];
        let rv = parse_rotation_vector(&body).unwrap();
        assert!((rv.real - 1.0).abs() < 1e-3);
        assert!(rv.i.abs() < 1e-6);
    }
}
