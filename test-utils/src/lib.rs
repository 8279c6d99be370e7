//! `test-utils` is used for testing in both `hostgate-lib` and `hostgate-bin`.
//! This crate does not depend on `hostgate-lib` or `hostgate-bin`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock web server, which responds with a predefined status to
/// every request, whatever its method or path
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::any()).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Create a mock web server like [`mock_server!`], which additionally
/// verifies on drop that it received exactly `$calls` requests
#[macro_export]
macro_rules! counting_mock_server {
    ($status:expr, $calls:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(template)
            .expect($calls)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}

/// Build the URL of `$path` on a mock server
///
/// # Panic
///
/// This panics on error, so it should only be used for testing
#[macro_export]
macro_rules! mock_url {
    ($server:expr, $path:expr) => {
        url::Url::parse(&format!("{}{}", $server.uri(), $path)).expect("Expected valid mock URL")
    };
}
