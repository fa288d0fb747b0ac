//! Battery/fuel-gauge acquisition worker.
//!
//! Besides publishing into the usual sample ring for logging, each
//! outcome is mirrored into the mission controller's [`MissionContext`]
//! via [`crate::fsm::context::MissionContext::observe_battery`] so the
//! low/critical-battery decision always sees the freshest reading.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::i2c::I2c;

use crate::drivers::battery::{BatteryMonitor, BatteryReading};
use crate::fsm::context::MissionContext;
use crate::sample::SensorRing;
use crate::time_service::TimeSource;

use super::worker::spawn_worker;

pub fn spawn_battery_worker<I>(
    monitor: BatteryMonitor<I>,
    ring: Arc<SensorRing<BatteryReading>>,
    mission: Arc<Mutex<MissionContext>>,
    period: Duration,
    stop: Arc<AtomicBool>,
    time: Arc<dyn TimeSource>,
) -> JoinHandle<()>
where
    I: I2c + Send + 'static,
{
    spawn_worker("battery", ring, period, stop, time, move || {
        let reading = monitor.read();
        let mut ctx = mission.lock().unwrap_or_else(|e| e.into_inner());
        match &reading {
            Ok(r) => ctx.observe_battery(Ok((r.cell1_v, r.cell2_v))),
            Err(e) => ctx.observe_battery(Err(*e)),
        }
        reading
    })
}
