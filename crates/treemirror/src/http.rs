//! The HTTP seam every remote request goes through.
//!
//! The gateway only sees [`HttpTransport`]; production code plugs in
//! [`reqwest_transport::ReqwestTransport`], unit tests an in-memory mock.

use async_trait::async_trait;
use thiserror::Error;

/// Methods the mirror needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
        }
    }
}

/// HTTP headers represented as key/value pairs.
///
/// Header names are treated case-insensitively by helper functions.
pub type HttpHeaders = Vec<(String, String)>;

/// A minimal HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }
}

/// Transport-level failures, before any HTTP status is available.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("tls handshake failed: {0}")]
    Tls(String),

    #[error("proxy tunnel rejected: {0}")]
    ProxyTunnel(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

/// Transport boundary for all HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub mod reqwest_transport {
    use super::*;

    use std::error::Error as StdError;

    /// A real HTTP transport backed by reqwest.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl From<HttpMethod> for reqwest::Method {
        fn from(method: HttpMethod) -> Self {
            match method {
                HttpMethod::Get => reqwest::Method::GET,
            }
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let HttpRequest {
                method,
                url,
                headers,
            } = request;

            let response = headers
                .into_iter()
                .fold(self.client.request(method.into(), &url), |req, (k, v)| {
                    req.header(k, v)
                })
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            let status = response.status().as_u16();
            // Non-UTF-8 header values are kept as empty strings.
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_owned(),
                        value.to_str().unwrap_or_default().to_owned(),
                    )
                })
                .collect();
            let body = response.bytes().await.map_err(classify_reqwest_error)?;

            Ok(HttpResponse {
                status,
                headers,
                body: body.to_vec(),
            })
        }
    }

    /// Map a reqwest failure onto the transport taxonomy.
    ///
    /// reqwest does not expose TLS or proxy failures as distinct kinds, so the
    /// full source chain is inspected.
    pub(crate) fn classify_reqwest_error(err: reqwest::Error) -> HttpError {
        let chain = error_chain(&err);
        if err.is_timeout() {
            return HttpError::Timeout(chain);
        }
        classify_message(chain)
    }

    fn error_chain(err: &(dyn StdError + 'static)) -> String {
        let mut parts = vec![err.to_string()];
        let mut source = err.source();
        while let Some(inner) = source {
            parts.push(inner.to_string());
            source = inner.source();
        }
        parts.join(": ")
    }

    pub(crate) fn classify_message(chain: String) -> HttpError {
        let lower = chain.to_lowercase();
        if lower.contains("certificate") || lower.contains("unknownissuer") {
            HttpError::Tls(chain)
        } else if lower.contains("407") || lower.contains("proxy authentication") {
            HttpError::ProxyTunnel(chain)
        } else {
            HttpError::Transport(chain)
        }
    }
}

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Route-table transport for unit tests.
///
/// Results queued for the same (method, url) are replayed in FIFO order, and
/// every request is logged. An unrouted request fails with
/// [`HttpError::NoMockResponse`].
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<(HttpMethod, String), VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn canned(status: u16, body: Vec<u8>) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn push_response(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        response: HttpResponse,
    ) {
        self.push_result(method, url, Ok(response));
    }

    pub fn push_error(&self, method: HttpMethod, url: impl Into<String>, error: HttpError) {
        self.push_result(method, url, Err(error));
    }

    /// Queue a `200` GET response.
    pub fn push_ok(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.push_response(HttpMethod::Get, url, Self::canned(200, body.into()));
    }

    /// Queue an empty GET response with `status`.
    pub fn push_status(&self, url: impl Into<String>, status: u16) {
        self.push_response(HttpMethod::Get, url, Self::canned(status, Vec::new()));
    }

    fn push_result(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        result: Result<HttpResponse, HttpError>,
    ) {
        self.lock()
            .routes
            .entry((method, url.into()))
            .or_default()
            .push_back(result);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|req| req.url == url).count()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self.lock();
        let key = (request.method, request.url.clone());
        inner.requests.push(request);

        match inner.routes.get_mut(&key).and_then(|q| q.pop_front()) {
            Some(result) => result,
            None => Err(HttpError::NoMockResponse {
                method: key.0.as_str().to_string(),
                url: key.1,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_get_is_case_insensitive_and_returns_first_match() {
        let headers: HttpHeaders = vec![
            ("X-RateLimit-Remaining".to_string(), "0".to_string()),
            ("x-ratelimit-remaining".to_string(), "12".to_string()),
        ];
        assert_eq!(header_get(&headers, "x-ratelimit-remaining"), Some("0"));
        assert_eq!(header_get(&headers, "X-RATELIMIT-REMAINING"), Some("0"));
        assert_eq!(header_get(&headers, "missing"), None);
    }

    #[test]
    fn request_builder_appends_headers() {
        let req = HttpRequest::get("https://example.com/").header("Accept", "text/html");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(header_get(&req.headers, "accept"), Some("text/html"));
    }

    #[test]
    fn classify_message_detects_tls_and_proxy_failures() {
        use reqwest_transport::classify_message;

        assert!(matches!(
            classify_message("invalid peer certificate: UnknownIssuer".to_string()),
            HttpError::Tls(_)
        ));
        assert!(matches!(
            classify_message("unsuccessful tunnel: 407 Proxy Authentication Required".to_string()),
            HttpError::ProxyTunnel(_)
        ));
        assert!(matches!(
            classify_message("connection refused".to_string()),
            HttpError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn mock_transport_returns_registered_results_in_fifo_order() {
        let transport = MockTransport::new();
        let url = "https://example.com/tree";

        transport.push_status(url, 404);
        transport.push_ok(url, "hello");

        let first = transport.send(HttpRequest::get(url)).await.expect("first");
        let second = transport.send(HttpRequest::get(url)).await.expect("second");

        assert_eq!(first.status, 404);
        assert_eq!(second.body, b"hello".to_vec());
        assert_eq!(transport.request_count(url), 2);
    }

    #[tokio::test]
    async fn mock_transport_replays_registered_errors() {
        let transport = MockTransport::new();
        let url = "https://example.com/slow";
        transport.push_error(HttpMethod::Get, url, HttpError::Timeout("deadline".into()));

        let err = transport
            .send(HttpRequest::get(url))
            .await
            .expect_err("registered error");
        assert_eq!(err, HttpError::Timeout("deadline".into()));
    }

    #[tokio::test]
    async fn mock_transport_errors_when_no_response_is_registered() {
        let transport = MockTransport::new();

        let err = transport
            .send(HttpRequest::get("https://example.com/missing"))
            .await
            .expect_err("missing mock should error");
        match err {
            HttpError::NoMockResponse { method, url } => {
                assert_eq!(method, "GET");
                assert_eq!(url, "https://example.com/missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reqwest_transport_reports_invalid_url_as_transport_error() {
        let transport = reqwest_transport::ReqwestTransport::new(reqwest::Client::new());

        let err = transport
            .send(HttpRequest::get("not a url"))
            .await
            .expect_err("expected error");
        assert!(matches!(err, HttpError::Transport(_)));
    }
}
