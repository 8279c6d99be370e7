use async_trait::async_trait;
use http::header::{CONTENT_TYPE, HeaderValue};
use std::time::{Duration, Instant};
use url::Url;

use crate::transport::{Transport, TransportError};
use crate::types::{Body, RequestOptions, Response, Timings};
use crate::{ErrorKind, Result};

/// Timeout for establishing a connection, independent of the request timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Keep idle connections alive so repeated requests to one host reuse them
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// [`Transport`] backed by a [`reqwest::Client`]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a fresh connection pool
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the TLS backend cannot be initialized.
    /// See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn new() -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .gzip(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .build()
            .map_err(ErrorKind::BuildRequestClient)?;

        Ok(Self { client })
    }

    /// Wrap an existing client, keeping its configuration
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_request(&self, url: &Url, options: &RequestOptions) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(options.method.clone(), url.clone())
            .headers(options.headers.clone());

        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        match &options.body {
            None => request,
            Some(Body::Json(value)) => request.json(value),
            Some(body @ Body::Form(_)) => request
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                )
                .body(body.to_wire_string()),
            Some(Body::Text(text)) => request.body(text.clone()),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, url: &Url, options: &RequestOptions) -> std::result::Result<Response, TransportError> {
        let classify = |err: reqwest::Error| {
            if err.is_timeout() {
                TransportError::Timeout(options.timeout.unwrap_or_default())
            } else {
                TransportError::Network(Box::new(err))
            }
        };

        let start = Instant::now();
        let response = self
            .build_request(url, options)
            .send()
            .await
            .map_err(classify)?;
        let response_time = start.elapsed();

        let status = response.status();
        let headers = response.headers().clone();
        let remote_addr = response.remote_addr();
        let final_url = response.url().clone();
        let body = response.text().await.map_err(classify)?;

        let response = Response {
            url: final_url,
            method: options.method.clone(),
            status,
            headers,
            body,
            remote_addr,
            timings: Timings {
                response: response_time,
                total: start.elapsed(),
            },
        };

        if status.is_client_error() || status.is_server_error() {
            return Err(TransportError::Status(Box::new(response)));
        }
        Ok(response)
    }
}
