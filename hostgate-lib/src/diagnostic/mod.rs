//! Human-readable rendering of requests and their outcomes.
//!
//! [`render`] turns a request and its response or failure into a
//! curl-equivalent command with a short status header, for pasting into a
//! terminal. [`Diagnostic`] is the compact form carried by failed requests.
//! Credential headers are always redacted.

use http::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderName, PROXY_AUTHORIZATION};
use indicatif::DecimalBytes;
use serde::Serialize;
use std::fmt;
use url::Url;

use crate::transport::TransportError;
use crate::types::{RequestOptions, Response};

/// Response bodies are only printed if their JSON form is shorter than this
pub const MAX_PRINTED_BODY: usize = 2000;

/// Replacement for the values of credential headers
pub const REDACTED: &str = "[redacted]";

/// Headers reqwest adds on its own; printing them adds nothing
const SKIP_HEADERS: &[(&str, &str)] = &[("accept-encoding", "gzip, deflate, br")];

fn is_sensitive(name: &HeaderName) -> bool {
    name == AUTHORIZATION
        || name == PROXY_AUTHORIZATION
        || name == COOKIE
        || name.as_str() == "x-api-key"
}

/// What came back for a request
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// A successful response
    Response(&'a Response),
    /// A failed attempt, with or without an error response
    Failure(&'a TransportError),
}

impl<'a> Outcome<'a> {
    fn response(self) -> Option<&'a Response> {
        match self {
            Outcome::Response(response) => Some(response),
            Outcome::Failure(err) => err.response(),
        }
    }
}

/// Rendering switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Leave out the response body
    pub skip_response: bool,
}

/// Render a request and its outcome as a curl command.
///
/// The first line holds the status code, the response time, the size from
/// `content-length` and the remote address, as far as they are known. The
/// second line is the curl command. The last line holds the response body
/// (or the error message) as a JSON string, unless it is too long or
/// `skip_response` is set.
///
/// ```
/// use hostgate_lib::RequestOptions;
/// use hostgate_lib::diagnostic::{Outcome, RenderOptions, render};
/// use hostgate_lib::transport::TransportError;
/// use std::time::Duration;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/slow").unwrap();
/// let err = TransportError::Timeout(Duration::from_secs(1));
/// let text = render(&url, &RequestOptions::new(), Outcome::Failure(&err), RenderOptions::default());
/// assert_eq!(text, "curl -v -X GET https://example.com/slow\n\"Timed out after 1s\"");
/// ```
#[must_use]
pub fn render(
    url: &Url,
    options: &RequestOptions,
    outcome: Outcome<'_>,
    settings: RenderOptions,
) -> String {
    let mut lines = Vec::with_capacity(3);

    if let Some(response) = outcome.response() {
        lines.push(response_info(response));
    }
    lines.push(curl_command(url, options));

    if !settings.skip_response {
        let message = match outcome {
            Outcome::Response(response) => serde_json::to_string(&response.body),
            Outcome::Failure(TransportError::Status(response)) => {
                serde_json::to_string(&response.body)
            }
            Outcome::Failure(err) => serde_json::to_string(&err.to_string()),
        };
        if let Ok(message) = message {
            if message.len() < MAX_PRINTED_BODY {
                lines.push(message);
            }
        }
    }

    lines.join("\n")
}

fn response_info(response: &Response) -> String {
    let mut parts = vec![
        response.status.as_u16().to_string(),
        format!("[response: {} ms]", response.timings.total.as_millis()),
    ];

    let content_length = response
        .headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if let Some(length) = content_length {
        parts.push(format!("[content: {}]", DecimalBytes(length)));
    }

    if let Some(addr) = response.remote_addr {
        parts.push(format!("[host: {}]", addr.ip()));
    }

    parts.join(" ")
}

fn curl_command(url: &Url, options: &RequestOptions) -> String {
    let mut parts = vec![
        "curl -v".to_string(),
        format!("-X {}", options.method),
        url.to_string(),
    ];

    parts.extend(
        printable_headers(&options.headers)
            .into_iter()
            .map(|(name, value)| format!("-H \"{name}: {value}\"")),
    );

    if let Some(body) = &options.body {
        parts.push(format!("-d '{}'", body.to_wire_string()));
    }

    parts.join(" ")
}

/// Headers sorted by name, with credentials redacted and noise removed
fn printable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut printable: Vec<_> = headers
        .iter()
        .filter_map(|(name, value)| {
            let value = if is_sensitive(name) {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            let skip = SKIP_HEADERS
                .iter()
                .any(|(skip_name, skip_value)| name.as_str() == *skip_name && value == *skip_value);
            (!skip).then(|| (name.to_string(), value))
        })
        .collect();
    printable.sort_by(|a, b| a.0.cmp(&b.0));
    printable
}

/// The body of a failed response, decoded as JSON when possible
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiagnosticBody {
    /// The body is valid JSON
    Json(serde_json::Value),
    /// Anything else, shortened to [`MAX_PRINTED_BODY`] characters
    Text(String),
}

impl DiagnosticBody {
    fn parse(body: &str) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        match serde_json::from_str(body) {
            Ok(value) if body.len() < MAX_PRINTED_BODY => Some(DiagnosticBody::Json(value)),
            _ => Some(DiagnosticBody::Text(truncate(body, MAX_PRINTED_BODY))),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Compact description of a failed request.
///
/// Replaces the transport's own error state: no timings, no connection
/// details, no prepared options. Everything in here is safe to log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// `<status> <METHOD> <url> (<remote address>)`, leaving out unknown parts
    pub summary: String,
    /// The response body, if there was one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<DiagnosticBody>,
    /// The request as a curl command, credentials redacted
    pub curl: String,
}

impl Diagnostic {
    /// Describe a failed request
    #[must_use]
    pub fn new(url: &Url, options: &RequestOptions, err: &TransportError) -> Self {
        let response = err.response();

        let mut summary = Vec::with_capacity(4);
        if let Some(response) = response {
            summary.push(response.status.as_u16().to_string());
        }
        summary.push(options.method.to_string());
        summary.push(url.to_string());
        if let Some(addr) = response.and_then(|response| response.remote_addr) {
            summary.push(format!("({})", addr.ip()));
        }

        Self {
            summary: summary.join(" "),
            body: response.and_then(|response| DiagnosticBody::parse(&response.body)),
            curl: curl_command(url, options),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        if let Some(body) = &self.body {
            match body {
                DiagnosticBody::Json(value) => writeln!(f, "{value}")?,
                DiagnosticBody::Text(text) => writeln!(f, "{text}")?,
            }
        }
        write!(f, "{}", self.curl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timings;
    use http::header::{CONTENT_LENGTH, HeaderValue, USER_AGENT};
    use http::{Method, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn url() -> Url {
        Url::parse("https://api.example.com/items").unwrap()
    }

    fn response(status: StatusCode, body: &str) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1234"));
        Response {
            url: url(),
            method: Method::GET,
            status,
            headers,
            body: body.to_string(),
            remote_addr: Some("93.184.216.34:443".parse().unwrap()),
            timings: Timings {
                response: Duration::from_millis(40),
                total: Duration::from_millis(42),
            },
        }
    }

    #[test]
    fn test_render_response() {
        let options = RequestOptions::new()
            .header(USER_AGENT, HeaderValue::from_static("hostgate/0.3.0"))
            .header(
                http::header::ACCEPT_ENCODING,
                HeaderValue::from_static("gzip, deflate, br"),
            );
        let response = response(StatusCode::OK, r#"{"ok":true}"#);

        let text = render(
            &url(),
            &options,
            Outcome::Response(&response),
            RenderOptions::default(),
        );
        assert_eq!(
            text,
            "200 [response: 42 ms] [content: 1.23 kB] [host: 93.184.216.34]\n\
             curl -v -X GET https://api.example.com/items -H \"user-agent: hostgate/0.3.0\"\n\
             \"{\\\"ok\\\":true}\""
        );
    }

    #[test]
    fn test_render_redacts_credentials() {
        let options = RequestOptions::new()
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer secret"))
            .header(COOKIE, HeaderValue::from_static("session=secret"))
            .header(
                HeaderName::from_static("x-api-key"),
                HeaderValue::from_static("secret"),
            );
        let response = response(StatusCode::OK, "");

        let text = render(
            &url(),
            &options,
            Outcome::Response(&response),
            RenderOptions::default(),
        );
        assert!(!text.contains("secret"));
        assert!(text.contains("-H \"authorization: [redacted]\""));
        assert!(text.contains("-H \"cookie: [redacted]\""));
        assert!(text.contains("-H \"x-api-key: [redacted]\""));
    }

    #[test]
    fn test_render_bodies() {
        let json = RequestOptions::new()
            .method(Method::POST)
            .json(json!({"name": "widget"}));
        let form = RequestOptions::new()
            .method(Method::POST)
            .form(vec![("q".into(), "a b".into())]);
        let err = TransportError::Timeout(Duration::from_secs(1));
        let skip = RenderOptions {
            skip_response: true,
        };

        assert_eq!(
            render(&url(), &json, Outcome::Failure(&err), skip),
            r#"curl -v -X POST https://api.example.com/items -d '{"name":"widget"}'"#
        );
        assert_eq!(
            render(&url(), &form, Outcome::Failure(&err), skip),
            "curl -v -X POST https://api.example.com/items -d 'q=a+b'"
        );
    }

    #[test]
    fn test_render_skips_long_bodies() {
        let response = response(StatusCode::OK, &"x".repeat(MAX_PRINTED_BODY));
        let text = render(
            &url(),
            &RequestOptions::new(),
            Outcome::Response(&response),
            RenderOptions::default(),
        );
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_diagnostic_for_status_failure() {
        let err = TransportError::Status(Box::new(response(
            StatusCode::NOT_FOUND,
            r#"{"error":"no such item"}"#,
        )));
        let diagnostic = Diagnostic::new(&url(), &RequestOptions::new(), &err);

        assert_eq!(
            diagnostic.summary,
            "404 GET https://api.example.com/items (93.184.216.34)"
        );
        assert_eq!(
            diagnostic.body,
            Some(DiagnosticBody::Json(json!({"error": "no such item"})))
        );
        assert_eq!(diagnostic.curl, "curl -v -X GET https://api.example.com/items");
        assert!(diagnostic.curl.starts_with("curl -v -X GET"));
    }

    #[test]
    fn test_diagnostic_for_network_failure() {
        let err = TransportError::Network("connection refused".into());
        let diagnostic = Diagnostic::new(&url(), &RequestOptions::new(), &err);

        assert_eq!(diagnostic.summary, "GET https://api.example.com/items");
        assert_eq!(diagnostic.body, None);
        assert_eq!(diagnostic.curl, "curl -v -X GET https://api.example.com/items");
    }

    #[test]
    fn test_diagnostic_text_body_is_bounded() {
        let long = "é".repeat(MAX_PRINTED_BODY + 10);
        let err = TransportError::Status(Box::new(response(StatusCode::BAD_GATEWAY, &long)));
        let diagnostic = Diagnostic::new(&url(), &RequestOptions::new(), &err);

        let Some(DiagnosticBody::Text(text)) = diagnostic.body else {
            panic!("expected a text body");
        };
        assert_eq!(text.chars().count(), MAX_PRINTED_BODY + 3);
        assert!(text.ends_with("..."));
    }
}
