//! Keller 4LD pressure/depth transmitter.
//!
//! Ground-truthed against `device/keller4ld.c`: a single write of the
//! measurement-request command, an 8 ms conversion delay, then a 5-byte
//! read (status, pressure hi/lo, temperature hi/lo). The status byte's
//! top bits distinguish a valid reading from "busy" from a malformed
//! packet; the original masks with `0b11000100` and compares to
//! `0b01000000`, and separately checks bit 5 for "busy".

use std::thread;
use std::time::Duration;

use embedded_hal::i2c::I2c;

use crate::drivers::i2c_bus::SharedI2c;
use crate::error::{DeviceId, ErrCode, WtError};

const REQUEST_MEASUREMENT: u8 = 0xAC;
const REQUEST_WAIT: Duration = Duration::from_micros(8_000);
const STATUS_MASK: u8 = 0b1100_0100;
const STATUS_VALID: u8 = 0b0100_0000;
const STATUS_BUSY_BIT: u8 = 0b0010_0000;

// Keller-series I2C pressure transmitters report pressure and temperature
// as 16-bit counts referenced to the sensor's calibrated full-scale span;
// 200 bar / 65535 counts with the 1-bar offset below is the standard
// Keller conversion for a 0..200 bar abs device.
const PRESSURE_MIN_BAR: f64 = 0.0;
const PRESSURE_MAX_BAR: f64 = 200.0;

fn raw_to_pressure_bar(raw: i16) -> f64 {
    let raw = raw as f64 - 16384.0;
    PRESSURE_MIN_BAR + raw * (PRESSURE_MAX_BAR - PRESSURE_MIN_BAR) / 32768.0
}

fn raw_to_temperature_c(raw: i16) -> f64 {
    ((raw as f64 / 16.0).trunc() - 24.0) * 0.05 - 50.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PressureReading {
    pub pressure_bar: f64,
    pub temperature_c: f64,
}

pub struct PressureSensor<I: I2c> {
    bus: SharedI2c<I>,
    addr: u8,
}

impl<I: I2c> PressureSensor<I> {
    pub fn new(bus: SharedI2c<I>, addr: u8) -> Self {
        Self { bus, addr }
    }

    pub fn read(&self) -> Result<PressureReading, WtError> {
        self.bus
            .write(DeviceId::Pressure, self.addr, &[REQUEST_MEASUREMENT])?;
        thread::sleep(REQUEST_WAIT);

        let mut raw = [0u8; 5];
        self.bus.read(DeviceId::Pressure, self.addr, &mut raw)?;

        let status = raw[0];
        if status & STATUS_MASK != STATUS_VALID {
            return Err(WtError::new(DeviceId::Pressure, ErrCode::InvalidResponse));
        }
        if status & STATUS_BUSY_BIT != 0 {
            return Err(WtError::new(DeviceId::Pressure, ErrCode::Busy));
        }

        let pressure_raw = i16::from_be_bytes([raw[1], raw[2]]);
        let temperature_raw = i16::from_be_bytes([raw[3], raw[4]]);

        Ok(PressureReading {
            pressure_bar: raw_to_pressure_bar(pressure_raw),
            temperature_c: raw_to_temperature_c(temperature_raw),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_conversion_at_midscale_gives_reference_pressure() {
        // raw == 16384 is the sensor's documented zero-offset count.
        assert!((raw_to_pressure_bar(16384) - PRESSURE_MIN_BAR).abs() < 1e-9);
    }

    #[test]
    fn raw_conversion_is_monotonic_in_raw_count() {
        assert!(raw_to_pressure_bar(20000) > raw_to_pressure_bar(16384));
    }
}
