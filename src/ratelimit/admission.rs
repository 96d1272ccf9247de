//! Admission facade combining the whitelist and a bucket store.

use std::sync::Arc;
use tracing::{debug, trace};

use super::decision::Decision;
use super::store::BucketStore;
use super::sweeper::{spawn_sweeper, SweeperHandle};
use super::whitelist::Whitelist;

/// Key used for requests that carry no classification header.
pub const MISSING_KEY: &str = "";

/// Decides whether each request may proceed.
///
/// Whitelisted keys are allowed without touching the store, so they never
/// create or drain a bucket. Everything else goes through `BucketStore::take`.
pub struct Admission {
    whitelist: Whitelist,
    store: Arc<dyn BucketStore>,
}

impl Admission {
    pub fn new(whitelist: Whitelist, store: Arc<dyn BucketStore>) -> Self {
        Self { whitelist, store }
    }

    /// Admit a request identified by `key`.
    pub fn admit(&self, key: &str) -> Decision {
        if let Some(rule) = self.whitelist.matching_rule(key) {
            trace!(key = %key, rule = %rule, "Whitelisted, bypassing rate limit");
            return Decision::Exempt;
        }

        let decision = self.store.take(key);
        match &decision {
            Decision::Limited(quota) => {
                debug!(key = %key, limit = quota.limit, reset_at = quota.reset_at, "Rate limit exceeded");
            }
            Decision::Allowed(quota) => {
                trace!(key = %key, remaining = quota.remaining, "Request admitted");
            }
            Decision::Exempt => {}
        }
        decision
    }

    /// Admit a request whose key may be absent.
    ///
    /// A missing key is not exempt by itself: it is limited under
    /// [`MISSING_KEY`], which the whitelist may still match.
    pub fn admit_optional(&self, key: Option<&str>) -> Decision {
        self.admit(key.unwrap_or(MISSING_KEY))
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn store(&self) -> &Arc<dyn BucketStore> {
        &self.store
    }

    /// Number of keys currently holding a bucket.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Start the background sweeper if the store expires idle keys.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(&self) -> Option<SweeperHandle> {
        let every = self.store.sweep_interval()?;
        Some(spawn_sweeper(Arc::clone(&self.store), every))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;
    use crate::ratelimit::lru_store::LruStore;
    use crate::ratelimit::store::StoreSettings;
    use crate::ratelimit::ttl_store::{SweepSettings, TtlStore};
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn admission(tokens: u64, rules: &[&str]) -> (Admission, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = LruStore::with_clock(
            StoreSettings::per_second(tokens),
            NonZeroUsize::new(100).unwrap(),
            clock.clone(),
        );
        let whitelist = Whitelist::compile(rules).unwrap();
        (Admission::new(whitelist, Arc::new(store)), clock)
    }

    fn outcome(decision: Decision) -> (bool, u64) {
        (decision.is_allowed(), decision.quota().map(|q| q.remaining).unwrap_or(0))
    }

    #[test]
    fn test_two_per_second_scenario() {
        let (admission, clock) = admission(2, &[]);

        assert_eq!(outcome(admission.admit("a")), (true, 1));
        assert_eq!(outcome(admission.admit("a")), (true, 0));
        assert_eq!(outcome(admission.admit("a")), (false, 0));

        clock.set(1_100_000_000);
        assert_eq!(outcome(admission.admit("a")), (true, 1));
    }

    #[test]
    fn test_quota_metadata() {
        let (admission, _clock) = admission(10, &[]);

        let quota = *admission.admit("a").quota().unwrap();
        assert_eq!(quota.limit, 10);
        assert_eq!(quota.remaining, 9);
        assert_eq!(quota.reset_at, 1_000_000_000);
    }

    #[test]
    fn test_whitelisted_key_never_touches_store() {
        let (admission, _clock) = admission(1, &["trusted.example.com", "regexp:\\.internal$"]);

        for _ in 0..1_000 {
            assert_eq!(admission.admit("trusted.example.com"), Decision::Exempt);
            assert_eq!(admission.admit("db.internal"), Decision::Exempt);
        }

        assert_eq!(admission.tracked_keys(), 0);
        assert!(!admission.store().contains("trusted.example.com"));
    }

    #[test]
    fn test_missing_key_is_limited_under_empty_key() {
        let (admission, _clock) = admission(1, &["example.com"]);

        assert!(admission.admit_optional(None).is_allowed());
        assert!(admission.admit_optional(None).is_limited());
        assert!(admission.store().contains(MISSING_KEY));
    }

    #[test]
    fn test_missing_key_can_be_whitelisted() {
        let (admission, _clock) = admission(1, &["regexp:^$"]);

        assert!(admission.admit_optional(None).is_exempt());
        assert_eq!(admission.tracked_keys(), 0);
    }

    #[test]
    fn test_no_sweeper_for_lru_store() {
        let (admission, _clock) = admission(1, &[]);
        assert!(admission.store().sweep_interval().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawns_sweeper_for_ttl_store() {
        let clock = Arc::new(ManualClock::new(0));
        let store = TtlStore::with_clock(
            StoreSettings::per_second(1),
            SweepSettings {
                interval: Duration::from_secs(1),
                min_idle: Duration::from_secs(1),
            },
            clock.clone(),
        );
        let admission = Admission::new(Whitelist::new(), Arc::new(store));

        admission.admit("a");
        let handle = admission.spawn_sweeper().expect("ttl store sweeps");

        clock.set(5_000_000_000);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(admission.tracked_keys(), 0);

        handle.shutdown().await;
    }
}
