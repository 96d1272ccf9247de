//! Keyed bucket store abstraction.

use std::time::Duration;

use super::decision::Decision;

/// Default admissions per window when nothing else is configured.
pub const DEFAULT_TOKENS_PER_WINDOW: u64 = 1;
/// Default window length, the unit `qps` is expressed in.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Quota shared by every bucket in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Admissions per key per window
    pub tokens_per_window: u64,
    /// Length of one fixed window
    pub window: Duration,
}

impl StoreSettings {
    pub fn new(tokens_per_window: u64, window: Duration) -> Self {
        Self {
            tokens_per_window,
            window,
        }
    }

    /// One-second windows, the unit `qps` is expressed in.
    pub fn per_second(tokens_per_window: u64) -> Self {
        Self::new(tokens_per_window, DEFAULT_WINDOW)
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::new(DEFAULT_TOKENS_PER_WINDOW, DEFAULT_WINDOW)
    }
}

/// A concurrent mapping from key to bucket with a bounded-memory policy.
///
/// Implementations create buckets lazily on first sight of a key and must
/// keep at most one bucket per key. `take` never fails.
pub trait BucketStore: Send + Sync {
    /// Consume one admission for `key`, creating its bucket on a miss.
    fn take(&self, key: &str) -> Decision;

    /// Whether a bucket is currently tracked for `key`.
    ///
    /// Does not count as a use for recency purposes.
    fn contains(&self, key: &str) -> bool;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove idle entries, returning how many were dropped.
    ///
    /// Stores bounded by capacity have nothing to sweep.
    fn sweep(&self) -> usize {
        0
    }

    /// How often `sweep` should run, if the store needs sweeping at all.
    fn sweep_interval(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_per_second() {
        let settings = StoreSettings::per_second(7);
        assert_eq!(settings.tokens_per_window, 7);
        assert_eq!(settings.window, Duration::from_secs(1));
    }

    #[test]
    fn test_default_settings() {
        let settings = StoreSettings::default();
        assert_eq!(settings.tokens_per_window, DEFAULT_TOKENS_PER_WINDOW);
        assert_eq!(settings.window, DEFAULT_WINDOW);
    }
}
