use dashmap::DashMap;
use serde::Deserialize;
use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use crate::queue::RoutingKey;

/// Number of concurrent requests allowed when nothing else is configured
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Admission-control policy of one limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// At most `n` requests in flight at any time
    Concurrency(NonZeroUsize),
    /// At most `requests` admissions per `interval`
    Rate {
        /// Admissions allowed per interval
        requests: NonZeroU32,
        /// Length of the interval
        interval: Duration,
    },
}

impl Policy {
    /// A concurrency cap of `n`, or `None` if `n` is zero
    #[must_use]
    pub fn concurrency(n: usize) -> Option<Self> {
        NonZeroUsize::new(n).map(Policy::Concurrency)
    }

    /// `n` admissions per `interval`, or `None` if `n` or `interval` is zero
    #[must_use]
    pub fn rate(n: u32, interval: Duration) -> Option<Self> {
        if interval.is_zero() {
            return None;
        }
        NonZeroU32::new(n).map(|requests| Policy::Rate { requests, interval })
    }
}

impl Default for Policy {
    fn default() -> Self {
        const DEFAULT: NonZeroUsize = NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap();
        Policy::Concurrency(DEFAULT)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Concurrency(n) => write!(f, "{n} concurrent"),
            Policy::Rate { requests, interval } => {
                write!(f, "{requests} rp {} ms", interval.as_millis())
            }
        }
    }
}

/// Explicit policy parameters, as given per request or in configuration.
///
/// The fields are mutually exclusive. When more than one is set, the first
/// non-zero one in the order `concurrency`, `rpm`, `rps` wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyParams {
    /// Maximum number of concurrent requests
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Maximum number of requests per minute
    #[serde(default)]
    pub rpm: Option<u32>,
    /// Maximum number of requests per second
    #[serde(default)]
    pub rps: Option<u32>,
}

impl PolicyParams {
    /// Parameters asking for a concurrency cap
    #[must_use]
    pub const fn concurrency(n: usize) -> Self {
        Self {
            concurrency: Some(n),
            rpm: None,
            rps: None,
        }
    }

    /// Parameters asking for a per-minute rate
    #[must_use]
    pub const fn rpm(n: u32) -> Self {
        Self {
            concurrency: None,
            rpm: Some(n),
            rps: None,
        }
    }

    /// Parameters asking for a per-second rate
    #[must_use]
    pub const fn rps(n: u32) -> Self {
        Self {
            concurrency: None,
            rpm: None,
            rps: Some(n),
        }
    }

    /// `true` if no field is set to a non-zero value
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policy().is_none()
    }

    /// The policy these parameters describe, if any
    #[must_use]
    pub fn policy(&self) -> Option<Policy> {
        self.concurrency
            .and_then(Policy::concurrency)
            .or_else(|| {
                self.rpm
                    .and_then(|n| Policy::rate(n, Duration::from_secs(60)))
            })
            .or_else(|| self.rps.and_then(|n| Policy::rate(n, Duration::from_secs(1))))
    }
}

/// Decides which [`Policy`] applies to a routing key.
///
/// Holds the registered policies. Lookup goes explicit parameters first,
/// then the key's fallback chain (see [`RoutingKey::fallbacks`]), then the
/// built-in default. Resolution never fails.
#[derive(Debug, Default)]
pub struct PolicyResolver {
    policies: DashMap<RoutingKey, Policy>,
}

impl PolicyResolver {
    /// Create an empty resolver. Every key resolves to [`Policy::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the policy for a key, replacing an earlier registration
    pub fn register(&self, key: RoutingKey, policy: Policy) {
        self.policies.insert(key, policy);
    }

    /// The policy registered for exactly this key
    #[must_use]
    pub fn registered(&self, key: &RoutingKey) -> Option<Policy> {
        self.policies.get(key).map(|policy| *policy)
    }

    /// Number of registered policies
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// `true` if no policy is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Resolve the policy for `key`
    #[must_use]
    pub fn resolve(&self, key: &RoutingKey, explicit: &PolicyParams) -> Policy {
        if let Some(policy) = explicit.policy() {
            return policy;
        }

        key.fallbacks()
            .iter()
            .find_map(|candidate| self.registered(candidate))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn conc(n: usize) -> Policy {
        Policy::concurrency(n).unwrap()
    }

    fn rate(n: u32, secs: u64) -> Policy {
        Policy::rate(n, Duration::from_secs(secs)).unwrap()
    }

    #[rstest]
    #[case(PolicyParams::default(), None)]
    #[case(PolicyParams::concurrency(2), Some(conc(2)))]
    #[case(PolicyParams::rpm(30), Some(rate(30, 60)))]
    #[case(PolicyParams::rps(5), Some(rate(5, 1)))]
    #[case(PolicyParams { concurrency: Some(2), rpm: None, rps: Some(5) }, Some(conc(2)))]
    #[case(PolicyParams { concurrency: None, rpm: Some(10), rps: Some(5) }, Some(rate(10, 60)))]
    #[case(PolicyParams { concurrency: Some(0), rpm: None, rps: Some(5) }, Some(rate(5, 1)))]
    #[case(PolicyParams { concurrency: Some(0), rpm: Some(0), rps: Some(0) }, None)]
    fn test_explicit_precedence(#[case] params: PolicyParams, #[case] expected: Option<Policy>) {
        assert_eq!(params.policy(), expected);
    }

    #[test]
    fn test_unknown_key_gets_default() {
        let resolver = PolicyResolver::new();
        let policy = resolver.resolve(&RoutingKey::from("example.com"), &PolicyParams::default());
        assert_eq!(policy, conc(DEFAULT_CONCURRENCY));
    }

    #[test]
    fn test_registered_wildcard_replaces_default() {
        let resolver = PolicyResolver::new();
        resolver.register(RoutingKey::wildcard(), conc(8));

        let policy = resolver.resolve(&RoutingKey::from("example.com"), &PolicyParams::default());
        assert_eq!(policy, conc(8));
    }

    #[test]
    fn test_most_specific_registration_wins() {
        let resolver = PolicyResolver::new();
        resolver.register(RoutingKey::wildcard(), conc(8));
        resolver.register(RoutingKey::from("github.com"), rate(60, 60));
        resolver.register(RoutingKey::from("api.github.com"), rate(5, 1));

        let resolve = |key: &str| resolver.resolve(&RoutingKey::from(key), &PolicyParams::default());

        assert_eq!(resolve("api.github.com"), rate(5, 1));
        assert_eq!(resolve("api.github.com:8443"), rate(5, 1));
        assert_eq!(resolve("raw.github.com"), rate(60, 60));
        assert_eq!(resolve("example.org"), conc(8));
    }

    #[test]
    fn test_explicit_beats_registered() {
        let resolver = PolicyResolver::new();
        resolver.register(RoutingKey::from("example.com"), conc(1));

        let policy = resolver.resolve(&RoutingKey::from("example.com"), &PolicyParams::rps(2));
        assert_eq!(policy, rate(2, 1));
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(conc(3).to_string(), "3 concurrent");
        assert_eq!(rate(5, 1).to_string(), "5 rp 1000 ms");
        assert_eq!(rate(30, 60).to_string(), "30 rp 60000 ms");
    }

    #[test]
    fn test_zero_values_are_rejected() {
        assert_eq!(Policy::concurrency(0), None);
        assert_eq!(Policy::rate(0, Duration::from_secs(1)), None);
        assert_eq!(Policy::rate(1, Duration::ZERO), None);
    }
}
