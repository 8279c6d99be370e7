//! Per-key admission control for outbound requests.
//!
//! Every request is routed to a [`Limiter`] chosen by its [`RoutingKey`]
//! (the URL host by default). A limiter either caps the number of requests
//! in flight or spreads admissions over time. Requests are admitted in the
//! order they were submitted; nothing is ever rejected.
//!
//! # Architecture
//!
//! - [`RoutingKey`]: names an admission domain
//! - [`Policy`]: a concurrency cap or a rate
//! - [`PolicyResolver`]: decides the policy of a key
//! - [`QueueConfig`]: deserializable defaults and per-key policies
//! - [`Limiter`]: enforces one policy
//! - [`QueueRegistry`]: owns one limiter per key

mod config;
mod key;
mod limiter;
mod policy;
mod registry;
mod stats;

pub use config::{KeyConfigs, QueueConfig};
pub use key::{RoutingKey, WILDCARD};
pub use limiter::{AdmissionEvent, AdmissionObserver, Limiter};
pub use policy::{DEFAULT_CONCURRENCY, Policy, PolicyParams, PolicyResolver};
pub use registry::QueueRegistry;
pub use stats::{QueueStats, QueueStatsMap};
