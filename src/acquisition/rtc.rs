//! Real-time-clock acquisition worker: a low-rate drift check against the
//! monotonic clock, logged rather than consulted by the mission
//! controller (spec.md's time-of-day release reads the host's wall
//! clock directly via [`crate::time_service::TimeSource`]).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::i2c::I2c;

use crate::drivers::rtc::RealTimeClock;
use crate::sample::SensorRing;
use crate::time_service::TimeSource;

use super::worker::spawn_worker;

pub fn spawn_rtc_worker<I>(
    rtc: RealTimeClock<I>,
    ring: Arc<SensorRing<u32>>,
    period: Duration,
    stop: Arc<AtomicBool>,
    time: Arc<dyn TimeSource>,
) -> JoinHandle<()>
where
    I: I2c + Send + 'static,
{
    spawn_worker("rtc", ring, period, stop, time, move || rtc.get_count())
}
