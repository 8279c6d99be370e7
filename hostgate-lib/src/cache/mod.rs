//! Time-to-live cache of response snapshots.
//!
//! Requests are identified by a [`Fingerprint`]. A lookup younger than the
//! requested expiry is served from memory; anything else is fetched and
//! stored. Only successful responses are stored, and only the fields of
//! [`CachedResponse`](crate::CachedResponse).

mod clock;
mod fingerprint;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fingerprint::Fingerprint;
pub use store::{CacheEntry, CacheError, CacheStats, Lookup, ResponseCache};
