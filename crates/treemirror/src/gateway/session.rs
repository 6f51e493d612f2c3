//! Outbound session settings and transport construction.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::http::HttpTransport;
use crate::http::reqwest_transport::ReqwestTransport;

use super::errors::GatewayError;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("treemirror/", env!("CARGO_PKG_VERSION"));

/// Where the session setup state machine currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No reachability check has run yet.
    Init,
    /// The reachability check succeeded; fetches may proceed.
    Ready,
    /// The proxy asked for credentials and none have been accepted yet.
    AwaitingCredentials,
    /// Certificate verification was disabled after a TLS failure.
    DegradedNoVerify,
}

/// Proxy configuration for the outbound session.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxySettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// The proxy URL with a scheme, defaulting to `http://` for bare hosts.
    pub fn normalized_url(&self) -> String {
        if self.url.contains("://") {
            self.url.clone()
        } else {
            format!("http://{}", self.url)
        }
    }
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Credentials collected from the user for an authenticating proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
    pub host: String,
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("username", &self.username)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl From<ProxyCredentials> for ProxySettings {
    fn from(creds: ProxyCredentials) -> Self {
        Self {
            url: creds.host,
            username: Some(creds.username),
            password: Some(creds.password),
        }
    }
}

/// Everything needed to (re)build the outbound session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub proxy: Option<ProxySettings>,
    pub accept_invalid_certs: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            accept_invalid_certs: false,
        }
    }
}

/// Builds a transport for a given set of session settings.
///
/// The gateway calls this once at construction and again whenever proxy
/// credentials arrive or certificate verification has to be disabled.
pub trait TransportBuilder: Send + Sync {
    fn build(&self, settings: &SessionSettings) -> Result<Arc<dyn HttpTransport>, GatewayError>;
}

impl<F> TransportBuilder for F
where
    F: Fn(&SessionSettings) -> Result<Arc<dyn HttpTransport>, GatewayError> + Send + Sync,
{
    fn build(&self, settings: &SessionSettings) -> Result<Arc<dyn HttpTransport>, GatewayError> {
        self(settings)
    }
}

/// Production builder backed by a `reqwest::Client`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransportBuilder;

impl TransportBuilder for ReqwestTransportBuilder {
    fn build(&self, settings: &SessionSettings) -> Result<Arc<dyn HttpTransport>, GatewayError> {
        let mut builder = reqwest::Client::builder().timeout(settings.timeout);

        if let Some(proxy) = &settings.proxy {
            let mut upstream = reqwest::Proxy::all(proxy.normalized_url())
                .map_err(|e| GatewayError::client(format!("invalid proxy: {e}")))?;
            if let (Some(user), Some(pass)) = (&proxy.username, &proxy.password) {
                upstream = upstream.basic_auth(user, pass);
            }
            builder = builder.proxy(upstream);
        }

        if settings.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| GatewayError::client(e.to_string()))?;

        Ok(Arc::new(ReqwestTransport::new(client)))
    }
}
