//! The HTTP primitive everything else is layered on.
//!
//! [`Transport`] performs exactly one request and reports what happened.
//! It does not queue, cache, retry or render anything.

mod network;

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::types::{RequestOptions, Response};

pub use network::ReqwestTransport;

/// Performs a single HTTP request
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Send the request described by `options` to `url`.
    ///
    /// `options` are used as given; defaults such as the user agent are
    /// applied by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Status`] for responses with a 4xx or 5xx
    /// status code, and the other variants when no response was received.
    async fn perform(&self, url: &Url, options: &RequestOptions) -> Result<Response, TransportError>;
}

/// Why a [`Transport`] did not return a successful response
#[derive(Error, Debug)]
pub enum TransportError {
    /// A response was received, but its status code signals an error
    #[error("Server responded with {}", .0.status)]
    Status(Box<Response>),

    /// No response arrived within the timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// No response was received (DNS, connection, TLS, body decoding)
    #[error("{0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// The error response, if one was received
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Status(response) => Some(response),
            _ => None,
        }
    }
}
