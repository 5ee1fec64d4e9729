//! `test-utils` is used for testing in both `batchfetch-lib` and `batchfetch-bin`.
//! This crate does not depend on `batchfetch-lib` or `batchfetch-bin`, else we would get dependency cycles.
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

/// Create a mock server which returns a 200 OK and a custom response body.
#[macro_export]
macro_rules! mock_response {
    ($body:expr) => {{
        let mock_server = wiremock::MockServer::start().await;
        let template = wiremock::ResponseTemplate::new(200).set_body_string($body);
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(template)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}

/// Create a mock server which expects exactly `$count` GET requests and
/// answers each of them with `$status`.
///
/// The expectation is verified when the server is dropped.
#[macro_export]
macro_rules! expecting_mock_server {
    ($status:expr, $count:expr) => {{
        let mock_server = wiremock::MockServer::start().await;
        let template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(template)
            .expect($count)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}

/// An `http://` URL on the loopback interface where nothing is listening.
///
/// A port is bound and released again, so connecting to it is refused.
#[macro_export]
macro_rules! unreachable_url {
    () => {{
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Cannot bind to loopback");
        let addr = listener.local_addr().expect("Bound socket has no address");
        drop(listener);
        format!("http://{addr}/")
    }};
}

/// Get the root path of the project.
#[macro_export]
macro_rules! root_path {
    () => {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .to_path_buf()
    };
}
