//! Shared mutable context threaded through every mission-state handler.

use std::sync::Arc;

use crate::config::TagConfig;
use crate::drivers::burnwire::BurnwireActuator;
use crate::error::WtError;
use crate::time_service::{next_time_of_day_occurrence_s, TimeSource};

/// Consecutive errored battery samples tolerated before treating the
/// sensor itself as "low battery" (spec.md §4.1's battery decision rules).
/// Not present in the supplied original test fixture's visible constant
/// table; fixed here as a documented design constant (see DESIGN.md).
pub const MISSION_BMS_CONSECUTIVE_ERROR_THRESHOLD: u32 = 5;

/// The latest pressure reading the mission controller has observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PressureInput {
    pub ok: bool,
    pub pressure_bar: f64,
}

/// The latest battery reading, already filtered through the
/// consecutive-error policy described in spec.md §4.1.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatteryInput {
    pub ok: bool,
    pub cell1_v: f64,
    pub cell2_v: f64,
}

/// The mutable state a mission-state handler reads and writes each tick.
pub struct MissionContext {
    pub config: Arc<TagConfig>,
    pub time: Arc<dyn TimeSource>,
    pub burnwire: Box<dyn BurnwireActuator>,

    pub pressure: PressureInput,
    pub battery: BatteryInput,
    bms_consecutive_errors: u32,

    pub timeout_deadline_us: i64,
    pub burn_start_us: i64,

    /// Last burnwire actuation error, retried every tick while in BRN_ON
    /// per spec.md §4.1's failure model.
    pub last_burnwire_error: Option<WtError>,
}

impl MissionContext {
    pub fn new(config: Arc<TagConfig>, time: Arc<dyn TimeSource>, burnwire: Box<dyn BurnwireActuator>) -> Self {
        Self {
            config,
            time,
            burnwire,
            pressure: PressureInput::default(),
            battery: BatteryInput::default(),
            bms_consecutive_errors: 0,
            timeout_deadline_us: i64::MAX,
            burn_start_us: 0,
            last_burnwire_error: None,
        }
    }

    /// Feed in a fresh battery reading, maintaining the consecutive-error
    /// streak. An errored sample never itself counts toward a voltage
    /// comparison; `MISSION_BMS_CONSECUTIVE_ERROR_THRESHOLD` consecutive
    /// errors are themselves treated as low battery by the caller.
    pub fn observe_battery(&mut self, reading: Result<(f64, f64), WtError>) {
        match reading {
            Ok((cell1_v, cell2_v)) => {
                self.bms_consecutive_errors = 0;
                self.battery = BatteryInput {
                    ok: true,
                    cell1_v,
                    cell2_v,
                };
            }
            Err(_) => {
                self.bms_consecutive_errors += 1;
                self.battery.ok = false;
            }
        }
    }

    pub fn observe_pressure(&mut self, reading: Result<f64, WtError>) {
        match reading {
            Ok(pressure_bar) => {
                self.pressure = PressureInput {
                    ok: true,
                    pressure_bar,
                };
            }
            Err(_) => {
                self.pressure.ok = false;
            }
        }
    }

    /// True once the error streak alone should be treated as low battery.
    pub fn battery_error_streak_exceeded(&self) -> bool {
        self.bms_consecutive_errors >= MISSION_BMS_CONSECUTIVE_ERROR_THRESHOLD
    }

    pub fn is_low_battery(&self) -> bool {
        if self.battery_error_streak_exceeded() {
            return true;
        }
        if !self.battery.ok {
            return false;
        }
        self.battery.cell1_v <= self.config.release_voltage_v
            || self.battery.cell2_v <= self.config.release_voltage_v
    }

    pub fn is_critical_battery(&self) -> bool {
        if self.battery_error_streak_exceeded() {
            return true;
        }
        if !self.battery.ok {
            return false;
        }
        self.battery.cell1_v <= self.config.critical_voltage_v
            || self.battery.cell2_v <= self.config.critical_voltage_v
    }

    /// Latch the deadline for entering `BRN_ON` on a timeout or
    /// time-of-day release, called once on entry to `START`.
    pub fn latch_timeout_deadline(&mut self) {
        self.timeout_deadline_us = if self.config.tod_release.valid {
            next_time_of_day_occurrence_s(self.time.now_local(), self.config.tod_release) * 1_000_000
        } else {
            self.time.now_us() + (self.config.timeout_s as i64) * 1_000_000
        };
    }

    pub fn timeout_elapsed(&self) -> bool {
        self.time.now_us() >= self.timeout_deadline_us
    }

    pub fn latch_burn_start(&mut self) {
        self.burn_start_us = self.time.now_us();
    }

    pub fn burn_interval_elapsed(&self) -> bool {
        self.time.now_us() - self.burn_start_us >= (self.config.burn_interval_s as i64) * 1_000_000
    }
}
