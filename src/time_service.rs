//! Unified time source: monotonic microsecond clock, wall clock, and an
//! injectable "fake now" for the mission-controller tests of spec.md §8.
//!
//! Grounded on `get_global_time_us`/`get_global_time_s` in
//! `tests/src/cetiTagApp/state_machine.test.c`: the monotonic clock feeds
//! sample timestamps, the wall clock feeds time-of-day release
//! calculations, and the two are kept separate because only the former is
//! guaranteed non-decreasing across an RTC correction.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, NaiveTime, TimeZone};

/// Abstracts wall-clock and monotonic time so the mission controller can be
/// driven by a fake clock in tests (spec.md §8's virtual-second scenarios).
pub trait TimeSource: Send + Sync {
    /// Monotonic microseconds, suitable for timestamping samples.
    fn now_us(&self) -> i64;
    /// Wall-clock Unix seconds.
    fn now_wall_s(&self) -> i64;
    /// Local wall-clock time, for time-of-day release calculations.
    fn now_local(&self) -> DateTime<Local>;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_us(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0)
    }

    fn now_wall_s(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that can be advanced by the test harness, used by the mission
/// FSM's property and scenario tests instead of `SystemTimeSource`.
#[derive(Debug)]
pub struct FakeTimeSource {
    us: AtomicI64,
}

impl FakeTimeSource {
    pub fn new(start_us: i64) -> Self {
        Self {
            us: AtomicI64::new(start_us),
        }
    }

    pub fn advance_us(&self, delta_us: i64) {
        self.us.fetch_add(delta_us, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, delta_s: i64) {
        self.advance_us(delta_s * 1_000_000);
    }

    pub fn set_us(&self, us: i64) {
        self.us.store(us, Ordering::SeqCst);
    }
}

impl TimeSource for FakeTimeSource {
    fn now_us(&self) -> i64 {
        self.us.load(Ordering::SeqCst)
    }

    fn now_wall_s(&self) -> i64 {
        self.now_us() / 1_000_000
    }

    fn now_local(&self) -> DateTime<Local> {
        Local
            .timestamp_opt(self.now_wall_s(), 0)
            .single()
            .expect("fake timestamp must be unambiguous")
    }
}

/// A wall-clock time-of-day, with a validity flag (spec.md §3's `tm`
/// struct with `valid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub valid: bool,
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub const INVALID: TimeOfDay = TimeOfDay {
        valid: false,
        hour: 0,
        minute: 0,
    };

    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self {
                valid: true,
                hour,
                minute,
            })
        } else {
            None
        }
    }
}

/// Compute the next wall-clock occurrence of `tod` strictly after `now`,
/// correctly crossing month/year boundaries.
///
/// Grounded on `get_next_time_of_day_occurance_s` in
/// `tests/src/cetiTagApp/state_machine.test.c`: build today's date at the
/// target hour:minute; if that has already passed, advance one calendar
/// day (not simply `+86400s`, which would misbehave across a DST jump —
/// `chrono`'s `Local` date arithmetic handles the calendar correctly).
pub fn next_time_of_day_occurrence_s(now: DateTime<Local>, tod: TimeOfDay) -> i64 {
    debug_assert!(tod.valid);
    let naive_time = NaiveTime::from_hms_opt(tod.hour, tod.minute, 0).expect("validated by TimeOfDay::new");
    let mut candidate_date = now.date_naive();
    let mut candidate = candidate_date
        .and_time(naive_time)
        .and_local_timezone(Local)
        .single()
        .unwrap_or(now);

    if candidate <= now {
        candidate_date = candidate_date
            .succ_opt()
            .expect("calendar date does not overflow within mission lifetime");
        candidate = candidate_date
            .and_time(naive_time)
            .and_local_timezone(Local)
            .single()
            .unwrap_or(candidate);
    }

    candidate.timestamp()
}
