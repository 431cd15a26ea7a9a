// SPDX-License-Identifier: GPL-3.0-or-later

//! Time sources: a monotonic microsecond clock for execution-time
//! measurement, and a real-time clock for absolute `wait` deadlines.
//!
//! Mirrors the C HAL's split between `clock_gettime(CLOCK_MONOTONIC, ...)`
//! (execution timestamps, immune to NTP/clock-step adjustments) and
//! `clock_gettime(CLOCK_REALTIME, ...)` (wall-clock deadlines a caller can
//! reason about in microseconds-from-now terms).

use once_cell::sync::Lazy;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static MONOTONIC_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Microseconds elapsed since an arbitrary but fixed point in the past.
/// Only differences between two calls are meaningful.
pub fn now_monotonic_us() -> u64 {
    MONOTONIC_EPOCH.elapsed().as_micros() as u64
}

/// Microseconds since the Unix epoch, per the real-time clock.
pub fn now_realtime_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_micros() as u64
}

/// An absolute point in time, computed from the real-time clock plus a
/// relative timeout, against which a blocking wait can check how much time
/// remains.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    absolute_us: u64,
}

impl Deadline {
    /// Build a deadline `timeout_us` microseconds from now.
    pub fn after_us(timeout_us: u32) -> Self {
        Self {
            absolute_us: now_realtime_us() + timeout_us as u64,
        }
    }

    /// Time remaining until this deadline, or `None` if it has passed.
    pub fn remaining(&self) -> Option<std::time::Duration> {
        let now = now_realtime_us();
        if now >= self.absolute_us {
            None
        } else {
            Some(std::time::Duration::from_micros(self.absolute_us - now))
        }
    }

    /// Whether this deadline has passed.
    pub fn has_expired(&self) -> bool {
        self.remaining().is_none()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn monotonic_clock_advances() {
        let a = now_monotonic_us();
        sleep(Duration::from_millis(2));
        let b = now_monotonic_us();
        assert!(b > a);
    }

    #[test]
    fn deadline_expires() {
        let d = Deadline::after_us(1_000);
        assert!(!d.has_expired());
        sleep(Duration::from_millis(5));
        assert!(d.has_expired());
        assert!(d.remaining().is_none());
    }

    #[test]
    fn deadline_remaining_shrinks() {
        let d = Deadline::after_us(50_000);
        let r1 = d.remaining().unwrap();
        sleep(Duration::from_millis(5));
        let r2 = d.remaining().unwrap();
        assert!(r2 < r1);
    }
}
