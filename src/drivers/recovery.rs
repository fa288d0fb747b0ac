//! Recovery-radio port.
//!
//! The VHF/APRS recovery radio's packet framing is an external
//! collaborator (spec.md §1 names it out of scope); this module pins
//! down only the surface the mission controller needs to drive it: arm
//! it with the configured callsign/frequency at mission start, and tell
//! it to key up once the tag has surfaced and burned free. Mirrors the
//! teacher's `ActuatorPort` pattern (`app/ports.rs`) of exposing a small
//! trait the domain core calls through, rather than a concrete radio
//! type.

use crate::config::RecoveryConfig;
use crate::error::WtError;

/// What the mission controller can ask the recovery radio to do.
pub trait RecoveryPort {
    /// Program callsign/frequency/SSID ahead of the first transmission.
    fn arm(&mut self, config: &RecoveryConfig) -> Result<(), WtError>;

    /// Begin periodic position beaconing. Called on entry to the
    /// post-release "await recovery" state.
    fn start_beacon(&mut self) -> Result<(), WtError>;

    /// Silence the radio, e.g. on an operator `quit` command.
    fn stop_beacon(&mut self) -> Result<(), WtError>;
}

/// A `RecoveryPort` that does nothing, for configurations where
/// `recovery.enabled` is false or no radio is fitted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecoveryRadio;

impl RecoveryPort for NullRecoveryRadio {
    fn arm(&mut self, _config: &RecoveryConfig) -> Result<(), WtError> {
        Ok(())
    }

    fn start_beacon(&mut self) -> Result<(), WtError> {
        Ok(())
    }

    fn stop_beacon(&mut self) -> Result<(), WtError> {
        Ok(())
    }
}
