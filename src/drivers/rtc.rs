//! Real-time clock: a free-running 32-bit second counter.
//!
//! Ground-truthed against `device/rtc.c`: the count is stored as four
//! individually-addressed byte registers (0..3), little-endian, read or
//! written one byte transaction at a time — the original loops four
//! single-byte accesses rather than a single 4-byte block read, which
//! this driver preserves since it is what the silicon exposes.

use embedded_hal::i2c::I2c;

use crate::drivers::i2c_bus::SharedI2c;
use crate::error::{DeviceId, WtError};

pub struct RealTimeClock<I: I2c> {
    bus: SharedI2c<I>,
    addr: u8,
}

impl<I: I2c> RealTimeClock<I> {
    pub fn new(bus: SharedI2c<I>, addr: u8) -> Self {
        Self { bus, addr }
    }

    pub fn get_count(&self) -> Result<u32, WtError> {
        let mut count: u32 = 0;
        for i in 0..4u8 {
            let mut byte = [0u8; 1];
            self.bus
                .write_read(DeviceId::Rtc, self.addr, &[i], &mut byte)?;
            count |= (byte[0] as u32) << (8 * i);
        }
        Ok(count)
    }

    pub fn set_count(&self, count: u32) -> Result<(), WtError> {
        for i in 0..4u8 {
            let byte = ((count >> (8 * i)) & 0xFF) as u8;
            self.bus.write(DeviceId::Rtc, self.addr, &[i, byte])?;
        }
        Ok(())
    }
}
