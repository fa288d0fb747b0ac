//! Ambient-light acquisition worker.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::i2c::I2c;

use crate::drivers::light::{LightReading, LightSensor};
use crate::sample::SensorRing;
use crate::time_service::TimeSource;

use super::worker::spawn_worker;

pub fn spawn_light_worker<I>(
    sensor: LightSensor<I>,
    ring: Arc<SensorRing<LightReading>>,
    period: Duration,
    stop: Arc<AtomicBool>,
    time: Arc<dyn TimeSource>,
) -> JoinHandle<()>
where
    I: I2c + Send + 'static,
{
    spawn_worker("light", ring, period, stop, time, move || sensor.read())
}
