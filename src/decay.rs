//! Adaptive sampling back-off for acquisition workers.
//!
//! Ground-truthed against
//! `packages/ceti-tag-data-capture/src/cetiTagApp/acq/decay.{c,h}`: a
//! broken sensor is quieted by doubling the number of sample intervals it
//! skips between attempts, without blocking healthy siblings. A single OK
//! read resets it to sampling every interval.

use crate::error::WtError;

/// Per-worker back-off state. See spec.md §4.3.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveDecay {
    /// Consecutive errors tolerated before back-off begins.
    grace_count: u32,
    consecutive_error_count: u32,
    skip_count: u32,
    skip_multiplier: u32,
}

impl AdaptiveDecay {
    pub fn new(grace_count: u32) -> Self {
        Self {
            grace_count,
            consecutive_error_count: 0,
            skip_count: 0,
            skip_multiplier: 1,
        }
    }

    /// Whether the worker should sample this interval. Increments the
    /// internal skip counter and resets it on a positive answer.
    pub fn should_sample(&mut self) -> bool {
        self.skip_count += 1;
        if self.skip_count < self.skip_multiplier {
            false
        } else {
            self.skip_count = 0;
            true
        }
    }

    /// Feed back the outcome of the read this worker just attempted.
    pub fn update(&mut self, result: WtError) {
        if result.is_ok() {
            self.skip_multiplier = 1;
            self.consecutive_error_count = 0;
        } else {
            self.consecutive_error_count += 1;
            if self.consecutive_error_count >= self.grace_count {
                self.skip_multiplier = self.skip_multiplier.saturating_mul(2);
            }
        }
    }

    pub fn skip_multiplier(&self) -> u32 {
        self.skip_multiplier
    }

    pub fn consecutive_error_count(&self) -> u32 {
        self.consecutive_error_count
    }
}
