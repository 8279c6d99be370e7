use std::collections::HashMap;

use serde::{Serialize, Serializer};

use crate::queue::Policy;

/// A [`HashMap`] mapping routing keys to their [`QueueStats`]
#[derive(Debug, Default, Serialize)]
pub struct QueueStatsMap(HashMap<String, QueueStats>);

impl QueueStatsMap {
    /// Sort by number of admitted requests (descending), then by key
    #[must_use]
    pub fn sorted(&self) -> Vec<(String, QueueStats)> {
        let mut sorted: Vec<_> = self.0.clone().into_iter().collect();
        sorted.sort_by(|(a_key, a), (b_key, b)| {
            b.admitted.cmp(&a.admitted).then_with(|| a_key.cmp(b_key))
        });
        sorted
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if there are no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Statistics of one key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&QueueStats> {
        self.0.get(key)
    }
}

impl From<HashMap<String, QueueStats>> for QueueStatsMap {
    fn from(value: HashMap<String, QueueStats>) -> Self {
        Self(value)
    }
}

/// Point-in-time view of one limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// The policy the limiter enforces
    #[serde(serialize_with = "serialize_policy")]
    pub policy: Policy,
    /// Requests waiting for admission
    pub queued: usize,
    /// Requests admitted and not yet finished
    pub running: usize,
    /// Requests admitted since the limiter was created
    pub admitted: u64,
}

fn serialize_policy<S: Serializer>(policy: &Policy, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(policy)
}
