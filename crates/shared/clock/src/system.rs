use chrono::{DurationRound, TimeDelta, Utc};
use fgtracker_core::Timestamp;
use fgtracker_ports::Clock;

/// Wall-clock UTC time, truncated to whole seconds
///
/// Flights and waypoints are stored as unix seconds, so reception times
/// compared against stored rows carry no sub-second part either.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let now = Utc::now();
        now.duration_trunc(TimeDelta::seconds(1)).unwrap_or(now)
    }

    fn name(&self) -> &str {
        "system"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_now_has_no_subsecond_part() {
        assert_eq!(SystemClock::new().now().nanosecond(), 0);
    }

    #[test]
    fn test_now_tracks_wall_clock() {
        let clock = SystemClock::new();
        let before = clock.now();
        thread::sleep(Duration::from_millis(1100));
        let after = clock.now();

        assert!(after - before >= TimeDelta::seconds(1));
        assert!((Utc::now() - after) < TimeDelta::seconds(2));
    }
}
