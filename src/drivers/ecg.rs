//! ECG front-end: differential Σ∆ ADC in continuous-conversion mode.
//!
//! Per spec.md §4.3's driver notes: the converter signals a completed
//! conversion on a falling edge of DATA-READY; the acquisition worker
//! blocks on that edge with a timeout rather than polling the bus, then
//! reads three raw bytes (one status byte, a 16-bit signed sample).
//! Lead-off detection rides two I/O-expander input bits rather than the
//! ADC itself, so it is read out through [`crate::drivers::iox::IoExpander`]
//! by the acquisition worker, not duplicated here.

use std::time::Duration;

use embedded_hal::digital::InputPin;
use embedded_hal::i2c::I2c;

use crate::drivers::i2c_bus::SharedI2c;
use crate::error::{DeviceId, ErrCode, WtError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EcgSample {
    pub status: u8,
    pub raw: i16,
    /// Set by the acquisition worker from the I/O expander's two lead-off
    /// input bits, not by this driver (see the module doc comment above).
    pub lead_off: bool,
}

pub struct EcgAdc<I: I2c, D: InputPin> {
    bus: SharedI2c<I>,
    addr: u8,
    data_ready: D,
}

impl<I: I2c, D: InputPin> EcgAdc<I, D> {
    pub fn new(bus: SharedI2c<I>, addr: u8, data_ready: D) -> Self {
        Self {
            bus,
            addr,
            data_ready,
        }
    }

    /// Block (by polling the DATA-READY input) until a conversion is
    /// ready or `timeout` elapses, then read the three raw bytes.
    ///
    /// A real falling-edge interrupt would avoid the poll loop, but
    /// `embedded_hal::digital::InputPin` only exposes level state; the
    /// polling interval is kept short relative to the ADC's output data
    /// rate so the edge is not missed between samples.
    pub fn read_blocking(&mut self, timeout: Duration) -> Result<EcgSample, WtError> {
        const POLL_INTERVAL: Duration = Duration::from_micros(200);
        let mut waited = Duration::ZERO;
        loop {
            let ready = self
                .data_ready
                .is_low()
                .map_err(|_| WtError::new(DeviceId::EcgAdc, ErrCode::BusTransactionFailed))?;
            if ready {
                break;
            }
            if waited >= timeout {
                return Err(WtError::new(DeviceId::EcgAdc, ErrCode::Timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
            waited += POLL_INTERVAL;
        }

        let mut raw = [0u8; 3];
        self.bus.read(DeviceId::EcgAdc, self.addr, &mut raw)?;
        Ok(EcgSample {
            status: raw[0],
            raw: i16::from_be_bytes([raw[1], raw[2]]),
            lead_off: false,
        })
    }
}
