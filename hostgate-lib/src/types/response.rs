use std::net::SocketAddr;
use std::time::Duration;

use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::cache::Fingerprint;
use crate::types::serde_helpers::{serialize_headers, serialize_method, serialize_status};

/// Timing breakdown of a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timings {
    /// Time until the response head (status line and headers) arrived
    #[serde(with = "humantime_serde")]
    pub response: Duration,
    /// Time until the whole body was read
    #[serde(with = "humantime_serde")]
    pub total: Duration,
}

/// A response as reported by a [`crate::transport::Transport`].
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL (after redirects)
    pub url: Url,
    /// Method of the request that produced this response
    pub method: Method,
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body as text
    pub body: String,
    /// Address of the remote peer, if known
    pub remote_addr: Option<SocketAddr>,
    /// Timing breakdown
    pub timings: Timings,
}

impl Response {
    /// The canonical reason phrase of the status code
    #[must_use]
    pub fn status_message(&self) -> String {
        status_message(self.status)
    }

    /// Decode the body as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// A trimmed snapshot of a [`Response`], as stored in and served from the
/// response cache.
///
/// Only the fields callers need are kept; transport state such as the
/// remote address is dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedResponse {
    /// The fingerprint this snapshot was served under.
    ///
    /// `Some` only when the response came from the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<Fingerprint>,
    /// Response body as text
    pub body: String,
    /// Response headers
    #[serde(serialize_with = "serialize_headers")]
    pub headers: HeaderMap,
    /// Method of the request that produced the response
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    /// Status code
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,
    /// Reason phrase of the status code
    pub status_message: String,
    /// Timings of the original request
    pub timings: Timings,
}

impl CachedResponse {
    /// `true` if this snapshot was served from the cache
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        self.cache_key.is_some()
    }

    /// Decode the body as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }

    pub(crate) fn tagged(mut self, fingerprint: Fingerprint) -> Self {
        self.cache_key = Some(fingerprint);
        self
    }
}

impl From<&Response> for CachedResponse {
    fn from(response: &Response) -> Self {
        Self {
            cache_key: None,
            body: response.body.clone(),
            headers: response.headers.clone(),
            method: response.method.clone(),
            status: response.status,
            status_message: response.status_message(),
            timings: response.timings,
        }
    }
}

/// What remains of an error response once transport internals are stripped
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// Status code
    pub status: StatusCode,
    /// Reason phrase of the status code
    pub status_message: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body as text
    pub body: String,
}

impl From<Response> for ErrorResponse {
    fn from(response: Response) -> Self {
        Self {
            status_message: response.status_message(),
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

fn status_message(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown").to_string()
}
