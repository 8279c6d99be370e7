use serde::{Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

use crate::diagnostic::Diagnostic;
use crate::types::ErrorResponse;

/// Possible errors when sending requests through `hostgate_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The request was sent but failed.
    ///
    /// The failure is stripped of transport internals and carries a
    /// [`Diagnostic`] for root-causing without re-running the request.
    #[error("Request failed: {}", .0.diagnostic.summary)]
    Request(Box<RequestFailure>),

    /// The URL has no host and no explicit routing key was given
    #[error("URL is missing a host; set `queue_by` to route it explicitly")]
    InvalidUrlHost,

    /// The given string can not be parsed into a valid URL
    #[error("Cannot parse `{0}` as URL: {1}")]
    ParseUrl(String, #[source] url::ParseError),

    /// The user agent is not a valid header value
    #[error("Header could not be parsed: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The HTTP client for the default transport could not be created
    #[error("Error creating request client: {0}")]
    BuildRequestClient(#[source] reqwest::Error),
}

impl ErrorKind {
    /// Return the diagnostic bundle of a failed request, if any
    #[must_use]
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Request(failure) => Some(&failure.diagnostic),
            _ => None,
        }
    }

    /// Return the status code of a failed request, if a response was received
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            Self::Request(failure) => match &failure.kind {
                FailureKind::Status(response) => Some(response.status),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A failed request as seen by the caller.
#[derive(Debug)]
pub struct RequestFailure {
    /// What went wrong
    pub kind: FailureKind,
    /// Compact, loggable description of the request and its outcome
    pub diagnostic: Diagnostic,
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.diagnostic.summary)
    }
}

/// The cause of a [`RequestFailure`]
#[derive(Error, Debug)]
pub enum FailureKind {
    /// A response with an error status (4xx or 5xx) was received
    #[error("Response code {} ({})", .0.status.as_u16(), .0.status_message)]
    Status(ErrorResponse),

    /// No response arrived in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// No response was received at all (DNS, connect, TLS, ...)
    #[error("Network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl FailureKind {
    /// `true` if the failure happened before any response was received
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        !matches!(self, Self::Status(_))
    }
}
