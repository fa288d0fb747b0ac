//! Mission configuration: a line-oriented `key=value` text file parsed
//! once at startup into an immutable, process-wide structure.
//!
//! Every field has a `CONFIG_DEFAULT_*` constant, mirroring
//! `packages/ceti-tag-data-capture/.../utils/config.h`. The struct itself
//! follows the teacher's `SystemConfig`/`Default` convention
//! (`ZanzyTHEbar-pet-filter/firmware/src/config.rs`), generalised from the
//! venturi-scrubber's pump/UVC thresholds to the tag's audio/release/
//! recovery parameters of spec.md §3/§4.6.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{DeviceId, ErrCode, WtError};
use crate::time_service::TimeOfDay;

pub const CONFIG_DEFAULT_AUDIO_SAMPLE_RATE_HZ: u32 = 96_000;
pub const CONFIG_DEFAULT_AUDIO_BIT_DEPTH: u8 = 16;
pub const CONFIG_DEFAULT_SURFACE_PRESSURE_BAR: f64 = 1.0;
pub const CONFIG_DEFAULT_DIVE_PRESSURE_BAR: f64 = 3.0;
pub const CONFIG_DEFAULT_RELEASE_VOLTAGE_V: f64 = 3.50;
pub const CONFIG_DEFAULT_CRITICAL_VOLTAGE_V: f64 = 3.20;
pub const CONFIG_DEFAULT_TIMEOUT_S: u64 = 3600 * 24 * 3; // 3 days
pub const CONFIG_DEFAULT_BURN_INTERVAL_S: u64 = 300;
pub const CONFIG_DEFAULT_RECOVERY_ENABLED: bool = true;
pub const CONFIG_DEFAULT_RECOVERY_FREQUENCY_MHZ: f64 = 144.390;
pub const CONFIG_DEFAULT_RECOVERY_CALLSIGN: &str = "N0CALL";
pub const CONFIG_DEFAULT_RECOVERY_SSID: u8 = 1;

/// Audio ADC operating mode, negotiated with the FPGA CAM interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFilterType {
    Wideband,
    Sinc5,
}

/// Recovery-radio parameters. The radio's APRS framing itself is an
/// external collaborator (spec.md §1); only the configuration surface
/// this process hands it is modelled here.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryConfig {
    pub enabled: bool,
    pub freq_mhz: f64,
    pub callsign: String,
    pub ssid: u8,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: CONFIG_DEFAULT_RECOVERY_ENABLED,
            freq_mhz: CONFIG_DEFAULT_RECOVERY_FREQUENCY_MHZ,
            callsign: CONFIG_DEFAULT_RECOVERY_CALLSIGN.to_string(),
            ssid: CONFIG_DEFAULT_RECOVERY_SSID,
        }
    }
}

/// Immutable, process-wide mission configuration (spec.md §3 `TagConfig`).
///
/// Built once by [`load`] and handed to every worker at spawn time as an
/// `Arc<TagConfig>` — the "borrow-once handle" pattern of spec.md §9.
#[derive(Debug, Clone, PartialEq)]
pub struct TagConfig {
    pub audio_sample_rate_hz: u32,
    pub audio_bit_depth: u8,
    pub audio_filter: AudioFilterType,
    pub surface_pressure_bar: f64,
    pub dive_pressure_bar: f64,
    pub release_voltage_v: f64,
    pub critical_voltage_v: f64,
    pub timeout_s: u64,
    pub tod_release: TimeOfDay,
    pub burn_interval_s: u64,
    pub recovery: RecoveryConfig,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            audio_sample_rate_hz: CONFIG_DEFAULT_AUDIO_SAMPLE_RATE_HZ,
            audio_bit_depth: CONFIG_DEFAULT_AUDIO_BIT_DEPTH,
            audio_filter: AudioFilterType::Wideband,
            surface_pressure_bar: CONFIG_DEFAULT_SURFACE_PRESSURE_BAR,
            dive_pressure_bar: CONFIG_DEFAULT_DIVE_PRESSURE_BAR,
            release_voltage_v: CONFIG_DEFAULT_RELEASE_VOLTAGE_V,
            critical_voltage_v: CONFIG_DEFAULT_CRITICAL_VOLTAGE_V,
            timeout_s: CONFIG_DEFAULT_TIMEOUT_S,
            tod_release: TimeOfDay::INVALID,
            burn_interval_s: CONFIG_DEFAULT_BURN_INTERVAL_S,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl TagConfig {
    pub fn burn_interval(&self) -> Duration {
        Duration::from_secs(self.burn_interval_s)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }

    /// Programmer-error-class validation, run once at startup (spec.md §7:
    /// "fail-fast at startup; never at steady state").
    fn validate(&self) -> WtResult {
        if self.dive_pressure_bar <= self.surface_pressure_bar {
            return Err(ConfigError::Validation(
                "dive_pressure_bar must exceed surface_pressure_bar (hysteresis band)",
            ));
        }
        if self.critical_voltage_v > self.release_voltage_v {
            return Err(ConfigError::Validation(
                "critical_voltage_v must not exceed release_voltage_v",
            ));
        }
        if self.audio_bit_depth != 16 && self.audio_bit_depth != 24 {
            return Err(ConfigError::Validation("audio_bit_depth must be 16 or 24"));
        }
        Ok(())
    }
}

type WtResult = Result<(), ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io(String),
    UnknownKey(String),
    BadValue { key: String, value: String },
    Validation(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "config I/O error: {msg}"),
            Self::UnknownKey(k) => write!(f, "unknown config key: {k}"),
            Self::BadValue { key, value } => write!(f, "bad value for {key}: {value}"),
            Self::Validation(msg) => write!(f, "config validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for WtError {
    fn from(_: ConfigError) -> Self {
        WtError::new(DeviceId::Config, ErrCode::BadConfigValue)
    }
}

/// Parse a line-oriented `key=value` config file (spec.md §4.6). Blank
/// lines and lines starting with `#` are ignored. Unknown keys are a
/// programmer/operator error and fail the whole load, per spec.md §7's
/// "fail-fast at startup" rule for bad config.
pub fn parse(text: &str) -> Result<TagConfig, ConfigError> {
    let mut cfg = TagConfig::default();
    let mut tod_hour: Option<u32> = None;
    let mut tod_minute: Option<u32> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::BadValue {
                key: line.to_string(),
                value: String::new(),
            });
        };
        let key = key.trim();
        let value = value.trim();

        let bad = |k: &str, v: &str| ConfigError::BadValue {
            key: k.to_string(),
            value: v.to_string(),
        };

        match key {
            "audio_sample_rate_hz" => {
                cfg.audio_sample_rate_hz = value.parse().map_err(|_| bad(key, value))?;
            }
            "audio_bit_depth" => {
                cfg.audio_bit_depth = value.parse().map_err(|_| bad(key, value))?;
            }
            "audio_filter" => {
                cfg.audio_filter = match value {
                    "wideband" => AudioFilterType::Wideband,
                    "sinc5" => AudioFilterType::Sinc5,
                    _ => return Err(bad(key, value)),
                };
            }
            "surface_pressure_bar" => {
                cfg.surface_pressure_bar = value.parse().map_err(|_| bad(key, value))?;
            }
            "dive_pressure_bar" => {
                cfg.dive_pressure_bar = value.parse().map_err(|_| bad(key, value))?;
            }
            "release_voltage_v" => {
                cfg.release_voltage_v = value.parse().map_err(|_| bad(key, value))?;
            }
            "critical_voltage_v" => {
                cfg.critical_voltage_v = value.parse().map_err(|_| bad(key, value))?;
            }
            "timeout_s" => {
                cfg.timeout_s = value.parse().map_err(|_| bad(key, value))?;
            }
            "burn_interval_s" => {
                cfg.burn_interval_s = value.parse().map_err(|_| bad(key, value))?;
            }
            "tod_release_hour" => {
                tod_hour = Some(value.parse().map_err(|_| bad(key, value))?);
            }
            "tod_release_minute" => {
                tod_minute = Some(value.parse().map_err(|_| bad(key, value))?);
            }
            "recovery_enabled" => {
                cfg.recovery.enabled = value.parse().map_err(|_| bad(key, value))?;
            }
            "recovery_freq_mhz" => {
                cfg.recovery.freq_mhz = value.parse().map_err(|_| bad(key, value))?;
            }
            "recovery_callsign" => {
                cfg.recovery.callsign = value.to_string();
            }
            "recovery_ssid" => {
                cfg.recovery.ssid = value.parse().map_err(|_| bad(key, value))?;
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
    }

    if let (Some(hour), Some(minute)) = (tod_hour, tod_minute) {
        cfg.tod_release = TimeOfDay::new(hour, minute).ok_or_else(|| ConfigError::BadValue {
            key: "tod_release_hour/minute".to_string(),
            value: format!("{hour}:{minute}"),
        })?;
    }

    cfg.validate()?;
    Ok(cfg)
}

/// Read and parse the config file named by the CLI's single positional
/// argument (spec.md §6). Exit code 1 ("configuration error") on failure
/// is decided by the caller in `main`.
pub fn load(path: &Path) -> Result<TagConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    parse(&text)
}
