//! Per-sensor sample store: a publisher-single / subscriber-many ring of
//! exactly one slot, plus a readiness signal.
//!
//! Mirrors spec.md §4.2: write is O(1) and unconditional, the publisher
//! never blocks on readers, and a reader can either poll (`try_take`, used
//! by logging workers) or block until the next fresh sample (`wait_take`,
//! used by the mission controller). The ring holds history of exactly one
//! sample; consumers needing more must keep their own buffer.
//!
//! The original implementation used a POSIX binary semaphore posted after
//! each store. A `Condvar` paired with a `Mutex`-guarded slot gives the
//! same contract in safe Rust (see SPEC_FULL.md §4.2) while the bit-for-bit
//! POSIX semaphore names some external subscribers expect are preserved
//! separately in `ipc::names`.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::WtError;

/// One timestamped reading from a sensor.
///
/// `timestamp_us` is captured *before* the underlying device read, per
/// spec.md §4.2. When `error` is non-OK, `payload` is the type's zero
/// value — the read outcome, not sensor data.
#[derive(Debug, Clone, Copy)]
pub struct SensorSample<T: Copy> {
    pub timestamp_us: i64,
    pub error: WtError,
    pub payload: T,
}

impl<T: Copy + Default> SensorSample<T> {
    /// Build an errored sample with a zeroed payload, as required by the
    /// "errored sample is still published" invariant of spec.md §3.
    pub fn errored(timestamp_us: i64, error: WtError) -> Self {
        debug_assert!(!error.is_ok());
        Self {
            timestamp_us,
            error,
            payload: T::default(),
        }
    }

    pub fn ok(timestamp_us: i64, payload: T) -> Self {
        Self {
            timestamp_us,
            error: WtError::OK,
            payload,
        }
    }
}

struct RingInner<T: Copy> {
    slot: Option<SensorSample<T>>,
    last_timestamp_us: i64,
}

/// A single-slot ring shared by one publisher and any number of readers.
pub struct SensorRing<T: Copy> {
    inner: Mutex<RingInner<T>>,
    ready: Condvar,
}

impl<T: Copy> SensorRing<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RingInner {
                slot: None,
                last_timestamp_us: i64::MIN,
            }),
            ready: Condvar::new(),
        }
    }

    /// Publish a sample, overwriting whatever was there. Panics in debug
    /// builds if timestamps regress, per the per-sensor monotonicity
    /// invariant of spec.md §3 — acquisition workers are the only writer
    /// for their ring, so a regression is a programmer error, not a
    /// runtime condition to recover from.
    pub fn publish(&self, sample: SensorSample<T>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert!(
            sample.timestamp_us >= inner.last_timestamp_us,
            "sample timestamp went backwards: {} < {}",
            sample.timestamp_us,
            inner.last_timestamp_us
        );
        inner.last_timestamp_us = sample.timestamp_us;
        inner.slot = Some(sample);
        drop(inner);
        self.ready.notify_all();
    }

    /// Non-blocking read of the latest sample, if any has ever been
    /// published. Used by logging workers, which poll rather than block.
    pub fn try_take(&self) -> Option<SensorSample<T>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.slot
    }

    /// Block until a sample newer than `after_us` is published, or the
    /// timeout elapses. Used by the mission controller, which needs a
    /// fresh reading each tick rather than a stale one from a prior tick.
    pub fn wait_take(&self, after_us: i64, timeout: Duration) -> Option<SensorSample<T>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (inner, _timed_out) = self
            .ready
            .wait_timeout_while(inner, timeout, |inner| match inner.slot {
                Some(s) => s.timestamp_us <= after_us,
                None => true,
            })
            .unwrap_or_else(|e| e.into_inner());
        inner.slot
    }
}

impl<T: Copy> Default for SensorRing<T> {
    fn default() -> Self {
        Self::new()
    }
}
