use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::queue::{PolicyParams, RoutingKey};
use crate::Result;

/// Default time-to-live of cached responses, 12 hours
pub const DEFAULT_CACHE_EXPIRE: Duration = Duration::from_secs(43_200);

/// Per-request queueing parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueParams {
    /// Route the request through the limiter of this key instead of the
    /// key derived from the URL
    pub queue_by: Option<String>,

    /// Skip admission control entirely
    pub skip_queue: bool,

    /// Policy to use if the limiter for the key does not exist yet
    pub policy: PolicyParams,
}

impl QueueParams {
    /// Route through the given key
    #[must_use]
    pub fn queue_by<S: Into<String>>(mut self, key: S) -> Self {
        self.queue_by = Some(key.into());
        self
    }

    /// Bypass admission control
    #[must_use]
    pub const fn skip_queue(mut self, skip: bool) -> Self {
        self.skip_queue = skip;
        self
    }

    /// Set explicit policy parameters
    #[must_use]
    pub const fn policy(mut self, policy: PolicyParams) -> Self {
        self.policy = policy;
        self
    }

    /// The routing key for a request to `url`
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::InvalidUrlHost`] if no override is set and the
    /// URL has no host
    pub fn routing_key(&self, url: &Url) -> Result<RoutingKey> {
        match &self.queue_by {
            Some(key) => Ok(RoutingKey::from(key.as_str())),
            None => RoutingKey::try_from(url),
        }
    }
}

/// Per-request cache parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheParams {
    /// Maximum age of a cached response before it is refetched
    #[serde(default = "default_expire", with = "humantime_serde")]
    pub expire: Duration,

    /// Fingerprint requests by this value instead of by their options.
    ///
    /// Lets requests that differ only cosmetically (e.g. a random trace id
    /// header) share one cache entry.
    #[serde(default)]
    pub cache_by: Option<serde_json::Value>,
}

const fn default_expire() -> Duration {
    DEFAULT_CACHE_EXPIRE
}

impl Default for CacheParams {
    fn default() -> Self {
        Self {
            expire: DEFAULT_CACHE_EXPIRE,
            cache_by: None,
        }
    }
}

impl CacheParams {
    /// Set the time-to-live
    #[must_use]
    pub const fn expire(mut self, expire: Duration) -> Self {
        self.expire = expire;
        self
    }

    /// Fingerprint by the given value
    #[must_use]
    pub fn cache_by(mut self, value: serde_json::Value) -> Self {
        self.cache_by = Some(value);
        self
    }
}
