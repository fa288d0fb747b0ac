//! Shared I2C bus handle.
//!
//! Every sensor driver in this module talks to the same physical I2C bus
//! at a different 7-bit address. The teacher's `hw_init` hands out one
//! initialised peripheral and lets drivers borrow it
//! (`ZanzyTHEbar-pet-filter/firmware/src/drivers/hw_init.rs`); on a
//! multi-threaded host the equivalent is an `Arc<Mutex<I2c>>` shared by
//! every acquisition worker, since `embedded_hal::i2c::I2c` is `&mut
//! self` and workers run on independent OS threads.

use std::sync::{Arc, Mutex};

use embedded_hal::i2c::I2c;

use crate::error::{DeviceId, ErrCode, WtError};

/// A bus shared by every I2C-attached driver in this crate.
pub struct SharedI2c<I: I2c> {
    bus: Arc<Mutex<I>>,
}

impl<I: I2c> Clone for SharedI2c<I> {
    fn clone(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<I: I2c> SharedI2c<I> {
    pub fn new(bus: I) -> Self {
        Self {
            bus: Arc::new(Mutex::new(bus)),
        }
    }

    pub fn write(&self, device: DeviceId, addr: u8, bytes: &[u8]) -> Result<(), WtError> {
        let mut bus = self.bus.lock().unwrap_or_else(|e| e.into_inner());
        bus.write(addr, bytes)
            .map_err(|_| WtError::new(device, ErrCode::BusTransactionFailed))
    }

    pub fn write_read(
        &self,
        device: DeviceId,
        addr: u8,
        out: &[u8],
        input: &mut [u8],
    ) -> Result<(), WtError> {
        let mut bus = self.bus.lock().unwrap_or_else(|e| e.into_inner());
        bus.write_read(addr, out, input)
            .map_err(|_| WtError::new(device, ErrCode::BusTransactionFailed))
    }

    pub fn read(&self, device: DeviceId, addr: u8, input: &mut [u8]) -> Result<(), WtError> {
        let mut bus = self.bus.lock().unwrap_or_else(|e| e.into_inner());
        bus.read(addr, input)
            .map_err(|_| WtError::new(device, ErrCode::BusTransactionFailed))
    }
}
