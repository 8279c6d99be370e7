//! Runs units of work under the limiter of their routing key.

use std::future::Future;
use std::sync::Arc;

use crate::queue::{PolicyParams, QueueRegistry, RoutingKey};

/// Submits work to the [`QueueRegistry`].
///
/// Cheap to clone; all clones share one registry.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    registry: Arc<QueueRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher on top of `registry`
    #[must_use]
    pub const fn new(registry: Arc<QueueRegistry>) -> Self {
        Self { registry }
    }

    /// Run `work` once the limiter for `key` admits it.
    ///
    /// `explicit` is only consulted if this creates the limiter. The output
    /// of `work`, including any error it returns, is passed through as is.
    pub async fn submit<F: Future>(
        &self,
        key: &RoutingKey,
        explicit: &PolicyParams,
        work: F,
    ) -> F::Output {
        let limiter = self.registry.get_queue(key, explicit);
        limiter.run(work).await
    }

    /// Run `work` right away, without admission control
    pub async fn submit_bypass<F: Future>(&self, work: F) -> F::Output {
        work.await
    }

    /// The registry this dispatcher submits to
    #[must_use]
    pub fn registry(&self) -> &QueueRegistry {
        &self.registry
    }
}
