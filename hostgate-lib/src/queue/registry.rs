use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;

use crate::queue::{
    AdmissionObserver, Limiter, Policy, PolicyParams, PolicyResolver, QueueStats, QueueStatsMap,
    RoutingKey,
};

/// Owns one [`Limiter`] per routing key.
///
/// Limiters are created lazily on first use, with the policy resolved at
/// that moment, and then live for as long as the registry does. Two callers
/// racing on the first use of a key always end up with the same limiter.
pub struct QueueRegistry {
    /// Map of routing key to limiter, created on-demand
    limiters: DashMap<RoutingKey, Arc<Limiter>>,

    /// Policies used when a limiter is created
    resolver: PolicyResolver,

    /// Receives every admission of every limiter
    observer: Option<AdmissionObserver>,
}

impl QueueRegistry {
    /// Create an empty registry
    ///
    /// # Examples
    ///
    /// ```
    /// use hostgate_lib::queue::{PolicyParams, PolicyResolver, QueueRegistry, RoutingKey};
    ///
    /// let registry = QueueRegistry::new(PolicyResolver::new());
    /// let key = RoutingKey::from("example.com");
    /// let first = registry.get_queue(&key, &PolicyParams::default());
    /// let second = registry.get_queue(&key, &PolicyParams::concurrency(10));
    /// assert!(std::sync::Arc::ptr_eq(&first, &second));
    /// ```
    #[must_use]
    pub fn new(resolver: PolicyResolver) -> Self {
        Self {
            limiters: DashMap::new(),
            resolver,
            observer: None,
        }
    }

    /// Pass every admission event to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: AdmissionObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get the limiter for `key`, creating it on first use.
    ///
    /// `explicit` only matters when the limiter is created. Once a limiter
    /// exists its policy is fixed; differing parameters are ignored.
    pub fn get_queue(&self, key: &RoutingKey, explicit: &PolicyParams) -> Arc<Limiter> {
        if let Some(limiter) = self.limiters.get(key) {
            let limiter = limiter.clone();
            if let Some(requested) = explicit.policy()
                && requested != limiter.policy()
            {
                log::debug!(
                    "[{key}] already running with {}, ignoring requested {requested}",
                    limiter.policy()
                );
            }
            return limiter;
        }

        self.limiters
            .entry(key.clone())
            .or_insert_with(|| {
                let policy = self.resolver.resolve(key, explicit);
                log::debug!("[{key}] new queue with {policy}");
                Arc::new(Limiter::new(key.clone(), policy, self.observer.clone()))
            })
            .clone()
    }

    /// Register a policy for `key`, used when its limiter is created.
    ///
    /// Returns `false` and changes nothing if a limiter for `key` already
    /// exists.
    pub fn register_policy(&self, key: RoutingKey, policy: Policy) -> bool {
        match self.limiters.entry(key.clone()) {
            Entry::Occupied(_) => {
                log::warn!("[{key}] queue already exists, not registering {policy}");
                false
            }
            // Holding the vacant entry keeps concurrent `get_queue` calls for
            // this key waiting until the policy is in place
            Entry::Vacant(_vacant) => {
                self.resolver.register(key, policy);
                true
            }
        }
    }

    /// Drop the limiter for `key` if nothing outside the registry holds it.
    ///
    /// A limiter with queued or running work is kept, so a key never has
    /// two limiters admitting work at once. The next request after a
    /// removal creates a fresh limiter with the policy resolved at that
    /// time. Returns `true` if a limiter was removed.
    pub fn remove(&self, key: &RoutingKey) -> bool {
        self.limiters
            .remove_if(key, |_, limiter| Arc::strong_count(limiter) == 1)
            .is_some()
    }

    /// Drop every limiter nothing outside the registry holds.
    /// Registered policies are kept.
    pub fn reset(&self) {
        self.limiters.retain(|_, limiter| Arc::strong_count(limiter) > 1);
    }

    /// The policy of the live limiter for `key`, if there is one
    #[must_use]
    pub fn policy_of(&self, key: &RoutingKey) -> Option<Policy> {
        self.limiters.get(key).map(|limiter| limiter.policy())
    }

    /// Statistics of one key, if its limiter exists
    #[must_use]
    pub fn queue_stats(&self, key: &RoutingKey) -> Option<QueueStats> {
        self.limiters.get(key).map(|limiter| limiter.stats())
    }

    /// Statistics of every live limiter
    #[must_use]
    pub fn stats(&self) -> QueueStatsMap {
        self.limiters
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().stats()))
            .collect::<std::collections::HashMap<_, _>>()
            .into()
    }

    /// Number of live limiters
    #[must_use]
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// `true` if no limiter was created yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// The resolver consulted when limiters are created
    #[must_use]
    pub const fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new(PolicyResolver::new())
    }
}

impl fmt::Debug for QueueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueRegistry")
            .field("limiters", &self.limiters)
            .field("resolver", &self.resolver)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::time::Duration;

    #[test]
    fn test_registry_creation() {
        let registry = QueueRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.stats().is_empty());
    }

    #[test]
    fn test_same_key_same_limiter() {
        let registry = QueueRegistry::default();
        let key = RoutingKey::from("example.com");

        let first = registry.get_queue(&key, &PolicyParams::default());
        let second = registry.get_queue(&key, &PolicyParams::default());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_different_keys_different_limiters() {
        let registry = QueueRegistry::default();
        let a = registry.get_queue(&RoutingKey::from("a.com"), &PolicyParams::default());
        let b = registry.get_queue(&RoutingKey::from("b.com"), &PolicyParams::default());

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_policy_fixed_at_creation() {
        let registry = QueueRegistry::default();
        let key = RoutingKey::from("example.com");

        let limiter = registry.get_queue(&key, &PolicyParams::concurrency(2));
        assert_eq!(limiter.policy(), Policy::concurrency(2).unwrap());

        let limiter = registry.get_queue(&key, &PolicyParams::rps(5));
        assert_eq!(limiter.policy(), Policy::concurrency(2).unwrap());
        assert_eq!(registry.policy_of(&key), Policy::concurrency(2));
    }

    #[test]
    fn test_registered_policy_used_on_creation() {
        let registry = QueueRegistry::default();
        let key = RoutingKey::from("shared-apis");
        let policy = Policy::rate(100, Duration::from_secs(60)).unwrap();

        assert!(registry.register_policy(key.clone(), policy));
        assert_eq!(registry.get_queue(&key, &PolicyParams::default()).policy(), policy);
    }

    #[test]
    fn test_register_after_creation_is_refused() {
        let registry = QueueRegistry::default();
        let key = RoutingKey::from("example.com");
        registry.get_queue(&key, &PolicyParams::default());

        assert!(!registry.register_policy(key.clone(), Policy::concurrency(9).unwrap()));
        assert_eq!(registry.policy_of(&key), Some(Policy::default()));
    }

    #[test]
    fn test_reset_recreates_with_current_policy() {
        let registry = QueueRegistry::default();
        let key = RoutingKey::from("example.com");
        let old = registry.get_queue(&key, &PolicyParams::default());
        assert!(!registry.remove(&key));
        drop(old);

        assert!(registry.remove(&key));
        assert!(!registry.remove(&key));
        assert!(registry.register_policy(key.clone(), Policy::concurrency(1).unwrap()));

        let new = registry.get_queue(&key, &PolicyParams::default());
        assert_eq!(new.policy(), Policy::concurrency(1).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_limiter_is_not_removed() {
        let registry = QueueRegistry::default();
        let key = RoutingKey::from("example.com");
        assert!(registry.register_policy(key.clone(), Policy::concurrency(1).unwrap()));

        let first = registry.get_queue(&key, &PolicyParams::default());
        let job = tokio::spawn(async move {
            first.run(tokio::time::sleep(Duration::from_millis(100))).await;
        });
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(!registry.remove(&key));
        registry.reset();
        assert_eq!(registry.len(), 1);

        let second = registry.get_queue(&key, &PolicyParams::default());
        assert_eq!(second.running(), 1);
        let start = tokio::time::Instant::now();
        second.run(async {}).await;
        assert!(start.elapsed() >= Duration::from_millis(99));

        job.await.unwrap();
        drop(second);
        assert!(registry.remove(&key));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reset_drops_all_limiters() {
        let registry = QueueRegistry::default();
        registry.get_queue(&RoutingKey::from("a.com"), &PolicyParams::default());
        registry.get_queue(&RoutingKey::from("b.com"), &PolicyParams::default());

        registry.reset();
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_yields_one_limiter() {
        let registry = Arc::new(QueueRegistry::default());
        let key = RoutingKey::from("example.com");

        let handles = (0..32).map(|_| {
            let registry = registry.clone();
            let key = key.clone();
            tokio::spawn(async move { registry.get_queue(&key, &PolicyParams::default()) })
        });
        let limiters: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert!(limiters.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_per_key() {
        let registry = QueueRegistry::default();
        let key = RoutingKey::from("example.com");
        let limiter = registry.get_queue(&key, &PolicyParams::default());
        limiter.run(async {}).await;
        limiter.run(async {}).await;

        let stats = registry.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats.get("example.com").map(|s| s.admitted), Some(2));
        assert_eq!(registry.queue_stats(&key).map(|s| s.running), Some(0));
    }
}
