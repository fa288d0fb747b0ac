//! Orientation (rotation-vector) acquisition worker.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

use crate::drivers::imu::{Imu, RotationVector};
use crate::sample::SensorRing;
use crate::time_service::TimeSource;

use super::worker::spawn_worker;

pub fn spawn_imu_worker<I, P>(
    imu: Imu<I, P>,
    ring: Arc<SensorRing<RotationVector>>,
    period: Duration,
    stop: Arc<AtomicBool>,
    time: Arc<dyn TimeSource>,
) -> JoinHandle<()>
where
    I: I2c + Send + 'static,
    P: OutputPin + Send + 'static,
{
    spawn_worker("imu", ring, period, stop, time, move || imu.read_rotation_vector())
}
