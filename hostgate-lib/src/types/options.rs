use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use http::Method;
use serde::Serialize;

use crate::types::serde_helpers::{serialize_headers, serialize_method};

/// The payload of a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Body {
    /// Raw text, sent as-is
    Text(String),
    /// A JSON document, sent with `content-type: application/json`
    Json(serde_json::Value),
    /// Form fields, sent URL-encoded
    Form(Vec<(String, String)>),
}

impl Body {
    /// Render the body the way it goes over the wire
    #[must_use]
    pub fn to_wire_string(&self) -> String {
        match self {
            Body::Text(text) => text.clone(),
            Body::Json(value) => value.to_string(),
            Body::Form(fields) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish(),
        }
    }
}

/// Options of a single request.
///
/// Options are treated as immutable input: defaults are applied to a copy
/// (see [`RequestOptions::prepared`]), never to the caller's value.
///
/// The serialized form is used as part of the cache fingerprint, so
/// serialization is deterministic (headers are emitted in sorted order).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestOptions {
    /// HTTP method, `GET` by default
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,

    /// Request headers
    #[serde(serialize_with = "serialize_headers")]
    #[serde(skip_serializing_if = "HeaderMap::is_empty")]
    pub headers: HeaderMap,

    /// Optional payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,

    /// Total time allowed for the request
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Create options for a plain `GET` request
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header, replacing any previous value for the same name
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace all headers
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Send a raw text body
    #[must_use]
    pub fn text<S: Into<String>>(mut self, text: S) -> Self {
        self.body = Some(Body::Text(text.into()));
        self
    }

    /// Send a JSON body
    #[must_use]
    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    /// Send an URL-encoded form body
    #[must_use]
    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(Body::Form(fields));
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Return a copy with defaults applied.
    ///
    /// A `user-agent` header is added unless one is present and the timeout
    /// is set unless the caller chose one.
    #[must_use]
    pub fn prepared(&self, user_agent: &HeaderValue, timeout: Duration) -> Self {
        let mut prepared = self.clone();
        if !prepared.headers.contains_key(USER_AGENT) {
            prepared.headers.insert(USER_AGENT, user_agent.clone());
        }
        if prepared.timeout.is_none() {
            prepared.timeout = Some(timeout);
        }
        prepared
    }
}
