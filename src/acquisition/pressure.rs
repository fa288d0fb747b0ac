//! Pressure/temperature acquisition worker.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::i2c::I2c;

use crate::drivers::pressure::{PressureReading, PressureSensor};
use crate::sample::SensorRing;
use crate::time_service::TimeSource;

use super::worker::spawn_worker;

pub fn spawn_pressure_worker<I>(
    sensor: PressureSensor<I>,
    ring: Arc<SensorRing<PressureReading>>,
    period: Duration,
    stop: Arc<AtomicBool>,
    time: Arc<dyn TimeSource>,
) -> JoinHandle<()>
where
    I: I2c + Send + 'static,
{
    spawn_worker("pressure", ring, period, stop, time, move || sensor.read())
}
