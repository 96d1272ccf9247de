//! Idle-expiry store swept by a background task.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::bucket::Bucket;
use super::clock::Clock;
use super::decision::Decision;
use super::store::{BucketStore, StoreSettings};

/// Default cadence of the background sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Default idle time after which a key is dropped.
pub const DEFAULT_MIN_IDLE: Duration = Duration::from_secs(60);

/// Timing for idle-entry expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSettings {
    /// How often a sweep pass runs
    pub interval: Duration,
    /// Keys idle for longer than this are removed
    pub min_idle: Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            min_idle: DEFAULT_MIN_IDLE,
        }
    }
}

/// Unbounded bucket store whose idle keys are purged periodically.
///
/// Hits only need the shared lock. Misses escalate to the exclusive lock
/// and re-check before inserting, since another thread may have created
/// the bucket in between.
///
/// A sweep never drops a bucket that is still inside its current window,
/// nor one that a `take` has looked up but not finished with.
pub struct TtlStore {
    settings: StoreSettings,
    sweep: SweepSettings,
    clock: Arc<dyn Clock>,
    buckets: RwLock<HashMap<String, Arc<Bucket>>>,
}

impl TtlStore {
    /// Create a store driven by `clock`.
    pub fn with_clock(settings: StoreSettings, sweep: SweepSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            sweep,
            clock,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    fn bucket_for(&self, key: &str) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.read().get(key) {
            return Arc::clone(bucket);
        }

        let mut buckets = self.buckets.write();
        if let Some(bucket) = buckets.get(key) {
            return Arc::clone(bucket);
        }

        debug!(
            key = %key,
            limit = self.settings.tokens_per_window,
            "Creating new rate limit bucket"
        );
        let bucket = Arc::new(Bucket::new(
            self.settings.tokens_per_window,
            self.settings.window,
            self.clock.now_nanos(),
        ));
        buckets.insert(key.to_owned(), Arc::clone(&bucket));
        bucket
    }
}

impl BucketStore for TtlStore {
    fn take(&self, key: &str) -> Decision {
        let bucket = self.bucket_for(key);
        bucket.take(self.settings.tokens_per_window, self.clock.as_ref())
    }

    fn contains(&self, key: &str) -> bool {
        self.buckets.read().contains_key(key)
    }

    fn len(&self) -> usize {
        self.buckets.read().len()
    }

    fn sweep(&self) -> usize {
        let min_idle = self.sweep.min_idle.max(self.settings.window);
        let min_idle = u64::try_from(min_idle.as_nanos()).unwrap_or(u64::MAX);
        let now = self.clock.now_nanos();

        let mut buckets = self.buckets.write();
        let before = buckets.len();
        buckets.retain(|key, bucket| {
            // No new handles can be cloned while the write lock is held, so
            // any other owner is a take still in flight.
            if Arc::strong_count(bucket) > 1 {
                return true;
            }
            let idle = now.saturating_sub(bucket.last_activity());
            let keep = idle <= min_idle;
            if !keep {
                debug!(key = %key, idle_ns = idle, "Expiring idle rate limit bucket");
            }
            keep
        });
        before - buckets.len()
    }

    fn sweep_interval(&self) -> Option<Duration> {
        Some(self.sweep.interval)
    }
}
