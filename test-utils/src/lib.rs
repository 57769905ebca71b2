//! `test-utils` is used for testing in both `pacer-lib` and `pacer-bin`.
//! This crate does not depend on `pacer-lib` or `pacer-bin`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock web server, which responds with a predefined status when
/// handling a matching request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Create a mock web server which responds with a predefined status and
/// verifies on drop that it received exactly `$hits` requests
#[macro_export]
macro_rules! mock_server_expecting {
    ($status:expr, $hits:expr) => {{
        let mock_server = wiremock::MockServer::start().await;
        let template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(template)
            .expect($hits)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}
