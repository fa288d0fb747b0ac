//! Unified error type for every fallible device operation.
//!
//! Every driver call returns a [`WtError`]: a device identifier plus a
//! signed 16-bit code, zero meaning success. This mirrors the packed
//! `WTResult` value used throughout the original C implementation
//! (`device id in the high bits, error code in the low bits`) while giving
//! callers a `Copy` value type they can match on, log, and propagate with
//! `?` without an allocation.

use std::fmt;

/// Identifies which subsystem produced a [`WtError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceId {
    None,
    Fpga,
    Audio,
    Bms,
    EcgAdc,
    Imu,
    Iox,
    Light,
    Pressure,
    Recovery,
    Rtc,
    Burnwire,
    Config,
    Command,
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Fpga => "fpga",
            Self::Audio => "audio",
            Self::Bms => "bms",
            Self::EcgAdc => "ecg",
            Self::Imu => "imu",
            Self::Iox => "iox",
            Self::Light => "light",
            Self::Pressure => "pressure",
            Self::Recovery => "recovery",
            Self::Rtc => "rtc",
            Self::Burnwire => "burnwire",
            Self::Config => "config",
            Self::Command => "command",
        };
        f.write_str(s)
    }
}

/// Well-known error codes. Positive values ask the caller to consult
/// `errno`/the underlying I/O error; negative values are device-specific
/// conditions defined here, mirroring the original's `WT_ERR_*` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrCode {
    Ok,
    BusOpenFailed,
    BusTransactionFailed,
    Timeout,
    InvalidResponse,
    Busy,
    MalformedPacket,
    OutOfRange,
    ResourceExhausted,
    BadConfigValue,
    Other(i16),
}

impl ErrCode {
    const fn raw(self) -> i16 {
        match self {
            Self::Ok => 0,
            Self::BusOpenFailed => -1,
            Self::BusTransactionFailed => -2,
            Self::Timeout => -3,
            Self::InvalidResponse => -4,
            Self::Busy => -5,
            Self::MalformedPacket => -6,
            Self::OutOfRange => -7,
            Self::ResourceExhausted => -8,
            Self::BadConfigValue => -9,
            Self::Other(code) => code,
        }
    }

    const fn from_raw(raw: i16) -> Self {
        match raw {
            0 => Self::Ok,
            -1 => Self::BusOpenFailed,
            -2 => Self::BusTransactionFailed,
            -3 => Self::Timeout,
            -4 => Self::InvalidResponse,
            -5 => Self::Busy,
            -6 => Self::MalformedPacket,
            -7 => Self::OutOfRange,
            -8 => Self::ResourceExhausted,
            -9 => Self::BadConfigValue,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::BusOpenFailed => write!(f, "bus open failed"),
            Self::BusTransactionFailed => write!(f, "bus transaction failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidResponse => write!(f, "invalid response"),
            Self::Busy => write!(f, "busy"),
            Self::MalformedPacket => write!(f, "malformed packet"),
            Self::OutOfRange => write!(f, "out of range"),
            Self::ResourceExhausted => write!(f, "resource exhausted"),
            Self::BadConfigValue => write!(f, "bad config value"),
            Self::Other(code) => write!(f, "error {code}"),
        }
    }
}

/// A packed `(device, code)` result, matching spec.md's `WtError`.
///
/// `code == 0` is success. The payload of a sample carrying a non-OK
/// `WtError` is undefined and must be zeroed by the caller before
/// publishing, per the sample-store contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WtError {
    pub device: DeviceId,
    code: i16,
}

impl WtError {
    pub const OK: WtError = WtError {
        device: DeviceId::None,
        code: 0,
    };

    pub const fn new(device: DeviceId, code: ErrCode) -> Self {
        Self {
            device,
            code: code.raw(),
        }
    }

    pub const fn is_ok(self) -> bool {
        self.code == 0
    }

    pub const fn code(self) -> ErrCode {
        ErrCode::from_raw(self.code)
    }
}

impl Default for WtError {
    fn default() -> Self {
        Self::OK
    }
}

impl fmt::Display for WtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            write!(f, "ok")
        } else {
            write!(f, "{}: {}", self.device, self.code())
        }
    }
}

impl std::error::Error for WtError {}

/// Crate-wide `Result` alias for driver-level operations.
pub type WtResult<T> = Result<T, WtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_is_zero_and_default() {
        assert!(WtError::OK.is_ok());
        assert!(WtError::default().is_ok());
        assert_eq!(WtError::OK.code(), ErrCode::Ok);
    }

    #[test]
    fn round_trips_known_codes() {
        let e = WtError::new(DeviceId::Pressure, ErrCode::Busy);
        assert!(!e.is_ok());
        assert_eq!(e.device, DeviceId::Pressure);
        assert_eq!(e.code(), ErrCode::Busy);
    }

    #[test]
    fn unknown_codes_round_trip_via_other() {
        let e = WtError::new(DeviceId::Imu, ErrCode::Other(-42));
        assert_eq!(e.code(), ErrCode::Other(-42));
    }

    #[test]
    fn display_includes_device_and_code() {
        let e = WtError::new(DeviceId::Bms, ErrCode::Timeout);
        let s = e.to_string();
        assert!(s.contains("bms"));
        assert!(s.contains("timeout"));
    }
}
