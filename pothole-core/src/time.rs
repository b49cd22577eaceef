//! Time source abstraction.

/// Monotonic time source used for bit timing, edge timeouts and episode
/// durations.
pub trait Clock {
    /// Nanoseconds since an arbitrary fixed origin. Never goes backwards.
    fn now_ns(&self) -> u64;

    /// Wall-clock seconds since the Unix epoch, used for event timestamps.
    ///
    /// Targets without a calendar clock report monotonic seconds instead.
    fn unix_time(&self) -> f64 {
        self.now_ns() as f64 / 1e9
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    #[inline]
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }

    #[inline]
    fn unix_time(&self) -> f64 {
        (**self).unix_time()
    }
}

/// Whole nanoseconds in a duration, saturating.
#[inline]
#[must_use]
pub fn duration_ns(d: core::time::Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Busy-wait until `clock` reaches `deadline_ns`.
#[inline]
pub fn spin_until<C: Clock + ?Sized>(clock: &C, deadline_ns: u64) {
    while clock.now_ns() < deadline_ns {
        core::hint::spin_loop();
    }
}


#[cfg(test)]
mod tests {
    use super::sim::SimClock;
    use super::*;
    use core::time::Duration;

    #[test]
    fn test_spin_until_reaches_deadline() {
        let clock = SimClock::new(1_000);
        spin_until(&clock, 10_500);
        assert!(clock.peek() >= 10_500);
        assert!(clock.peek() < 12_000);
    }

    #[test]
    fn test_default_unix_time_is_monotonic_seconds() {
        let clock = SimClock::new(0);
        clock.set(2_500_000_000);
        assert_eq!(clock.unix_time(), 2.5);
    }

    #[test]
    fn test_duration_ns_saturates() {
        assert_eq!(duration_ns(Duration::from_millis(50)), 50_000_000);
        assert_eq!(duration_ns(Duration::MAX), u64::MAX);
    }
}
