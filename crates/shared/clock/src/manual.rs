use chrono::{Duration, Utc};
use fgtracker_core::Timestamp;
use fgtracker_ports::Clock;
use std::sync::{Arc, Mutex};

/// Clock that only advances when explicitly moved
///
/// Cloning shares the underlying time, so a test can keep one handle and
/// hand another to the component under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current_time: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Create a new manual clock
    ///
    /// # Arguments
    /// * `initial_time` - Optional starting time. If None, uses current wall time.
    pub fn new(initial_time: Option<Timestamp>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(initial_time.unwrap_or_else(Utc::now))),
        }
    }

    /// Advance the time by a specified duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.lock();
        *current += duration;
    }

    /// Explicitly set the time
    ///
    /// Warning: This can move time backwards. Use with caution.
    pub fn set_time(&self, time: Timestamp) {
        *self.lock() = time;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Timestamp> {
        // A poisoned lock still holds a valid timestamp
        self.current_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.lock()
    }

    fn name(&self) -> &str {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_is_frozen() {
        let clock = ManualClock::new(None);
        let time1 = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let time2 = clock.now();

        // Time should not advance automatically
        assert_eq!(time1, time2);

        // Advance manually
        clock.advance(Duration::seconds(5));
        let time3 = clock.now();
        assert_eq!(time3 - time1, Duration::seconds(5));
    }

    #[test]
    fn test_clones_share_time() {
        let clock = ManualClock::new(None);
        let handle = clock.clone();
        handle.advance(Duration::seconds(60));
        assert_eq!(clock.now(), handle.now());
    }
}
