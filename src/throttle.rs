use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-key rate cap. Values arriving inside the interval are dropped, not queued.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_accepted: Mutex<HashMap<String, Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_disabled(&self) -> bool {
        self.interval.is_zero()
    }

    pub fn should_propagate(&self, key: &str) -> bool {
        self.should_propagate_at(key, Instant::now())
    }

    /// Check if enough time has passed since the last accepted value for `key`;
    /// records `now` when it has.
    pub fn should_propagate_at(&self, key: &str, now: Instant) -> bool {
        if self.is_disabled() {
            return true;
        }

        let mut times = self
            .last_accepted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(last) = times.get(key) {
            if now.saturating_duration_since(*last) < self.interval {
                return false;
            }
        }

        times.insert(key.to_string(), now);
        true
    }
}
