#![allow(unreachable_pub)]

mod error;
mod options;
mod params;
mod response;
pub(crate) mod serde_helpers;

pub use error::{ErrorKind, FailureKind, RequestFailure};
pub use options::{Body, RequestOptions};
pub use params::{CacheParams, DEFAULT_CACHE_EXPIRE, QueueParams};
pub use response::{CachedResponse, ErrorResponse, Response, Timings};

/// The hostgate `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
