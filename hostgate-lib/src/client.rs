//! Handler of request queueing and caching.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` sends requests through the per-key queues and the response
//! cache. `ClientBuilder` exposes a finer level of granularity for building
//! a `Client`.
//!
//! For convenience, a free function [`get`] is provided for ad-hoc requests.
#![allow(
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::default_trait_access,
    clippy::used_underscore_binding
)]
use std::sync::Arc;
use std::time::Duration;

use http::header::HeaderValue;
use typed_builder::TypedBuilder;
use url::Url;

use crate::cache::{Clock, ResponseCache, SystemClock};
use crate::diagnostic::{Diagnostic, Outcome, RenderOptions, render};
use crate::dispatcher::Dispatcher;
use crate::queue::{AdmissionObserver, QueueConfig, QueueRegistry};
use crate::transport::{ReqwestTransport, Transport, TransportError};
use crate::types::{
    CacheParams, CachedResponse, ErrorResponse, FailureKind, QueueParams, RequestFailure,
    RequestOptions, Response,
};
use crate::{ErrorKind, Result};

/// Default timeout per request, 10 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default user agent, `hostgate/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("hostgate/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// User-agent sent with requests that don't set their own.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,
    /// Timeout for requests that don't set their own.
    #[builder(default = DEFAULT_TIMEOUT)]
    timeout: Duration,
    /// Default and per-key queue policies.
    queue_config: QueueConfig,
    /// Sends the requests. Defaults to a [`ReqwestTransport`].
    transport: Option<Arc<dyn Transport>>,
    /// Time source for cache entry ages. Defaults to the system clock.
    clock: Option<Arc<dyn Clock>>,
    /// Receives every admission of every queue.
    observer: Option<AdmissionObserver>,
}

impl Default for ClientBuilder {
    #[must_use]
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user-agent is invalid.
    /// - The default transport cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<Client> {
        let Self {
            user_agent,
            timeout,
            queue_config,
            transport,
            clock,
            observer,
        } = self;

        let user_agent = HeaderValue::from_str(&user_agent)?;

        let transport = match transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        let mut registry = QueueRegistry::new(queue_config.resolver());
        if let Some(observer) = observer {
            registry = registry.with_observer(observer);
        }

        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(Client {
            transport,
            dispatcher: Dispatcher::new(Arc::new(registry)),
            cache: Arc::new(ResponseCache::new(clock)),
            user_agent,
            timeout,
        })
    }
}

/// Sends requests through per-key queues and an optional response cache.
///
/// Cloning is cheap; clones share queues and cache.
///
/// See [`ClientBuilder`] which contains sane defaults for all configuration options.
#[derive(Debug, Clone)]
pub struct Client {
    /// Performs the actual HTTP requests.
    transport: Arc<dyn Transport>,
    /// Admission control, one queue per routing key.
    dispatcher: Dispatcher,
    /// Snapshots of earlier responses.
    cache: Arc<ResponseCache>,
    /// Added to requests without a user-agent header.
    user_agent: HeaderValue,
    /// Used for requests without a timeout.
    timeout: Duration,
}

impl Client {
    /// Send a request through the queue of its routing key.
    ///
    /// The caller's `options` are not modified; the default user-agent and
    /// timeout are applied to a copy.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The URL has no host and no `queue_by` key is given.
    /// - The request fails. The error carries a [`Diagnostic`] instead of
    ///   the transport's internals.
    pub async fn request(
        &self,
        url: &Url,
        options: &RequestOptions,
        queue: &QueueParams,
    ) -> Result<Response> {
        let work = self.send(url, options);
        if queue.skip_queue {
            return self.dispatcher.submit_bypass(work).await;
        }

        let key = queue.routing_key(url)?;
        self.dispatcher.submit(&key, &queue.policy, work).await
    }

    /// Like [`Client::request`], but served from the response cache while
    /// a matching entry is younger than `cache.expire`.
    ///
    /// Lookup and fetch run together as one unit in the queue: every call
    /// takes one admission, whether it is answered from the cache or not.
    /// Answers from the cache carry their fingerprint in
    /// [`CachedResponse::cache_key`]. Failed requests are never cached.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`]. Problems reading the cache are logged
    /// and treated as a miss.
    pub async fn request_cached(
        &self,
        url: &Url,
        options: &RequestOptions,
        queue: &QueueParams,
        cache: &CacheParams,
    ) -> Result<CachedResponse> {
        let work = self
            .cache
            .get_or_fetch(url, options, cache, || self.send(url, options));
        if queue.skip_queue {
            return self.dispatcher.submit_bypass(work).await;
        }

        let key = queue.routing_key(url)?;
        self.dispatcher.submit(&key, &queue.policy, work).await
    }

    /// Send a `GET` request with default options
    ///
    /// # Errors
    ///
    /// Returns an `Err` if `url` cannot be parsed, or for the reasons listed
    /// on [`Client::request`].
    pub async fn get<T: AsRef<str>>(&self, url: T) -> Result<Response> {
        let url = parse_url(url.as_ref())?;
        self.request(&url, &RequestOptions::new(), &QueueParams::default())
            .await
    }

    async fn send(&self, url: &Url, options: &RequestOptions) -> Result<Response> {
        let prepared = options.prepared(&self.user_agent, self.timeout);

        match self.transport.perform(url, &prepared).await {
            Ok(response) => {
                log::debug!(
                    "{}",
                    render(
                        url,
                        &prepared,
                        Outcome::Response(&response),
                        RenderOptions {
                            skip_response: true
                        }
                    )
                );
                Ok(response)
            }
            Err(err) => {
                log::debug!(
                    "{}",
                    render(url, &prepared, Outcome::Failure(&err), RenderOptions::default())
                );
                let diagnostic = Diagnostic::new(url, &prepared, &err);
                let kind = match err {
                    TransportError::Status(response) => {
                        FailureKind::Status(ErrorResponse::from(*response))
                    }
                    TransportError::Timeout(timeout) => FailureKind::Timeout(timeout),
                    TransportError::Network(source) => FailureKind::Network(source),
                };
                Err(ErrorKind::Request(Box::new(RequestFailure { kind, diagnostic })))
            }
        }
    }

    /// The queues of this client
    #[must_use]
    pub fn registry(&self) -> &QueueRegistry {
        self.dispatcher.registry()
    }

    /// The response cache of this client
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

/// Parse a URL, keeping the input in the error
///
/// # Errors
///
/// Returns [`ErrorKind::ParseUrl`] if `input` is not a valid URL.
pub fn parse_url(input: &str) -> Result<Url> {
    Url::parse(input).map_err(|e| ErrorKind::ParseUrl(input.to_string(), e))
}

/// A convenience function to send a single `GET` request.
///
/// This creates a new client for every call. Queues and cache live only as
/// long as that client, so use a [`Client`] for anything beyond one-off
/// requests.
///
/// # Errors
///
/// Returns an `Err` if the client cannot be created or the request fails.
pub async fn get<T: AsRef<str>>(url: T) -> Result<Response> {
    let client = ClientBuilder::builder().build().client()?;
    client.get(url).await
}
