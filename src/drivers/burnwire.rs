//! Burnwire release actuator: a single GPIO-driven heating element.
//!
//! Ground-truthed against `burnwire.c`: init drives the line to its
//! known-off state and logs success/failure, `on`/`off` are otherwise
//! thin pass-throughs to the HAL. Idempotent by construction — driving
//! an already-off line off again is not an error.

use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::error::{DeviceId, ErrCode, WtError};

pub struct Burnwire<P: OutputPin> {
    pin: P,
    /// Whether `set_high` energizes the wire (board-revision dependent
    /// polarity, per SPEC_FULL.md's Open Question on I/O-expander wiring).
    active_high: bool,
}

impl<P: OutputPin> Burnwire<P> {
    pub fn new(pin: P, active_high: bool) -> Self {
        Self { pin, active_high }
    }

    /// Drive the line to its off state and confirm it. Must be called
    /// once at startup before any mission-controller state handler can
    /// request a burn.
    pub fn init(&mut self) -> Result<(), WtError> {
        match self.off() {
            Ok(()) => {
                info!("burnwire initialized");
                Ok(())
            }
            Err(e) => {
                error!("failed to initialize burnwire: {e}");
                Err(e)
            }
        }
    }

    pub fn on(&mut self) -> Result<(), WtError> {
        let result = if self.active_high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|_| {
            let e = WtError::new(DeviceId::Burnwire, ErrCode::BusTransactionFailed);
            error!("failed to turn on burnwire: {e}");
            e
        })
    }

    pub fn off(&mut self) -> Result<(), WtError> {
        let result = if self.active_high {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
        result.map_err(|_| WtError::new(DeviceId::Burnwire, ErrCode::BusTransactionFailed))
    }
}

/// Object-safe actuator surface so the mission controller can hold a
/// burnwire handle without naming its concrete pin type.
pub trait BurnwireActuator: Send {
    fn on(&mut self) -> Result<(), WtError>;
    fn off(&mut self) -> Result<(), WtError>;
}

impl<P: OutputPin + Send> BurnwireActuator for Burnwire<P> {
    fn on(&mut self) -> Result<(), WtError> {
        Burnwire::on(self)
    }

    fn off(&mut self) -> Result<(), WtError> {
        Burnwire::off(self)
    }
}
