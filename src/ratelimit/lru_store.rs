//! Capacity-bounded store with least-recently-used eviction.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

use super::bucket::Bucket;
use super::clock::Clock;
use super::decision::Decision;
use super::store::{BucketStore, StoreSettings};

/// Default number of keys retained.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Bucket store that retains at most `capacity` keys.
///
/// Every `take` promotes its key, so the lookup itself mutates the recency
/// order; lookup, insert and eviction therefore share one short exclusive
/// section. The bucket lock is only taken after the map lock is released,
/// and an evicted bucket stays alive for any caller still holding it.
pub struct LruStore {
    settings: StoreSettings,
    clock: Arc<dyn Clock>,
    buckets: Mutex<LruCache<String, Arc<Bucket>>>,
}

impl LruStore {
    /// Create a store driven by `clock`.
    pub fn with_clock(settings: StoreSettings, capacity: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            buckets: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Maximum number of keys retained.
    pub fn capacity(&self) -> usize {
        self.buckets.lock().cap().get()
    }

    fn bucket_for(&self, key: &str) -> Arc<Bucket> {
        let mut buckets = self.buckets.lock();

        if let Some(bucket) = buckets.get(key) {
            return Arc::clone(bucket);
        }

        let bucket = Arc::new(Bucket::new(
            self.settings.tokens_per_window,
            self.settings.window,
            self.clock.now_nanos(),
        ));
        debug!(
            key = %key,
            limit = self.settings.tokens_per_window,
            "Creating new rate limit bucket"
        );

        if let Some((evicted, _)) = buckets.push(key.to_owned(), Arc::clone(&bucket)) {
            debug!(key = %evicted, "Evicted least recently used bucket");
        }

        bucket
    }
}

impl BucketStore for LruStore {
    fn take(&self, key: &str) -> Decision {
        let bucket = self.bucket_for(key);
        bucket.take(self.settings.tokens_per_window, self.clock.as_ref())
    }

    fn contains(&self, key: &str) -> bool {
        self.buckets.lock().contains(key)
    }

    fn len(&self) -> usize {
        self.buckets.lock().len()
    }
}
