use serde::Deserialize;
use std::collections::HashMap;

use crate::queue::{PolicyParams, PolicyResolver, RoutingKey};

/// Per-key policy overrides
pub type KeyConfigs = HashMap<RoutingKey, PolicyParams>;

/// Queue configuration: the wildcard default plus per-key overrides.
///
/// ```toml
/// [default]
/// concurrency = 5
///
/// [hosts."api.github.com"]
/// rps = 10
///
/// [hosts."shared-apis"]
/// rpm = 100
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Policy for keys without a more specific entry
    #[serde(default)]
    pub default: PolicyParams,

    /// Policies for individual routing keys (hosts, parent domains or
    /// caller-chosen keys)
    #[serde(default)]
    pub hosts: KeyConfigs,
}

impl QueueConfig {
    /// Build a resolver with every configured policy registered.
    ///
    /// Entries without a usable policy (all fields empty or zero) are
    /// skipped, so their keys fall through to the next candidate.
    #[must_use]
    pub fn resolver(&self) -> PolicyResolver {
        let resolver = PolicyResolver::new();

        if let Some(policy) = self.default.policy() {
            resolver.register(RoutingKey::wildcard(), policy);
        }

        for (key, params) in &self.hosts {
            match params.policy() {
                Some(policy) => resolver.register(key.clone(), policy),
                None => log::warn!("Ignoring queue configuration for `{key}`: no policy set"),
            }
        }

        resolver
    }

    /// Merge another configuration into this one; `other` wins on conflicts
    pub fn merge(&mut self, other: QueueConfig) {
        if !other.default.is_empty() {
            self.default = other.default;
        }
        self.hosts.extend(other.hosts);
    }
}
