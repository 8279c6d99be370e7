use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::transport::{Transport, TransportError};
use crate::types::{RequestOptions, Response, Timings};

/// In-memory [`Transport`] answering every request with the same status.
///
/// Counts requests, remembers the options of the last one and tracks the
/// highest number of requests in flight at once. Clones share all state.
#[derive(Debug, Clone)]
pub(crate) struct MockTransport {
    status: StatusCode,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    last_options: Arc<Mutex<Option<RequestOptions>>>,
}

impl MockTransport {
    pub(crate) fn new(status: StatusCode) -> Self {
        Self {
            status,
            delay: Duration::ZERO,
            calls: Arc::default(),
            in_flight: Arc::default(),
            peak: Arc::default(),
            last_options: Arc::default(),
        }
    }

    /// Hold every request for `delay` (use with a paused runtime)
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn last_options(&self) -> Option<RequestOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn perform(&self, url: &Url, options: &RequestOptions) -> Result<Response, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_options.lock().unwrap() = Some(options.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let response = Response {
            url: url.clone(),
            method: options.method.clone(),
            status: self.status,
            headers: HeaderMap::new(),
            body: format!(r#"{{"call":{n}}}"#),
            remote_addr: Some("127.0.0.1:80".parse().unwrap()),
            timings: Timings {
                response: self.delay,
                total: self.delay,
            },
        };

        if self.status.is_client_error() || self.status.is_server_error() {
            return Err(TransportError::Status(Box::new(response)));
        }
        Ok(response)
    }
}
