//! The common acquisition-worker loop shared by every sensor thread.
//!
//! Ground-truthed against the per-sensor acquisition loops of
//! `packages/ceti-tag-data-capture/src/cetiTagApp/acq/*.c`: wait for the
//! supervisor's stop flag, consult `AdaptiveDecay` before touching the
//! bus, timestamp before the read (not after — the read itself may block
//! or retry), publish unconditionally (errored samples included), feed
//! the outcome back into the decay state, sleep until the next period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::decay::AdaptiveDecay;
use crate::error::WtError;
use crate::sample::{SensorRing, SensorSample};
use crate::time_service::TimeSource;

/// Consecutive-error grace period before a worker starts backing off,
/// shared by every sensor (spec.md §4.3). Not sensor-specific, so a
/// single constant rather than one per driver.
pub const ACQUISITION_GRACE_COUNT: u32 = 3;

/// Spawn a thread that repeatedly calls `read_fn`, publishing each
/// outcome to `ring` until `stop` is set.
pub fn spawn_worker<T, F>(
    name: &'static str,
    ring: Arc<SensorRing<T>>,
    period: Duration,
    stop: Arc<AtomicBool>,
    time: Arc<dyn TimeSource>,
    mut read_fn: F,
) -> JoinHandle<()>
where
    T: Copy + Default + Send + 'static,
    F: FnMut() -> Result<T, WtError> + Send + 'static,
{
    thread::Builder::new()
        .name(format!("acq-{name}"))
        .spawn(move || {
            let mut decay = AdaptiveDecay::new(ACQUISITION_GRACE_COUNT);
            while !stop.load(Ordering::Relaxed) {
                if decay.should_sample() {
                    let timestamp_us = time.now_us();
                    let outcome = read_fn();
                    let feedback = outcome.err().unwrap_or(WtError::OK);
                    let sample = match outcome {
                        Ok(payload) => SensorSample::ok(timestamp_us, payload),
                        Err(e) => SensorSample::errored(timestamp_us, e),
                    };
                    ring.publish(sample);
                    decay.update(feedback);
                }
                thread::sleep(period);
            }
        })
        .expect("spawning an acquisition worker thread must not fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_service::SystemTimeSource;

    #[test]
    fn worker_publishes_ok_samples_until_stopped() {
        let ring: Arc<SensorRing<u32>> = Arc::new(SensorRing::new());
        let stop = Arc::new(AtomicBool::new(false));
        let counter = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let handle = spawn_worker(
            "test",
            Arc::clone(&ring),
            Duration::from_millis(1),
            Arc::clone(&stop),
            Arc::new(SystemTimeSource),
            move || {
                let v = counter_clone.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            },
        );

        thread::sleep(Duration::from_millis(30));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        let sample = ring.try_take().expect("at least one sample published");
        assert!(sample.error.is_ok());
    }

    #[test]
    fn worker_publishes_errored_samples_with_zeroed_payload() {
        let ring: Arc<SensorRing<u32>> = Arc::new(SensorRing::new());
        let stop = Arc::new(AtomicBool::new(false));

        let handle = spawn_worker(
            "failing",
            Arc::clone(&ring),
            Duration::from_millis(1),
            Arc::clone(&stop),
            Arc::new(SystemTimeSource),
            move || {
                Err(WtError::new(
                    crate::error::DeviceId::Imu,
                    crate::error::ErrCode::Timeout,
                ))
            },
        );

        thread::sleep(Duration::from_millis(15));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        let sample = ring.try_take().expect("at least one sample published");
        assert!(!sample.error.is_ok());
        assert_eq!(sample.payload, 0);
    }
}
