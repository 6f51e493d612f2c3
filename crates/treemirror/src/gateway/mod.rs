//! Network gateway: the single path for outbound requests.
//!
//! The gateway owns the outbound session (proxy, timeout, certificate policy),
//! classifies responses into [`GatewayError`] variants, and optionally paces or
//! serializes requests. Before any concurrent work starts, the caller runs
//! [`Gateway::establish`] (or [`Gateway::establish_with`]) to move the session
//! through its setup states:
//!
//! ```text
//! Init --reachable------------------------------------------> Ready
//! Init --407--> AwaitingCredentials --configure_proxy, check--> Ready
//! Init --TLS--> DegradedNoVerify --rebuild, check-------------> Ready
//! ```
//!
//! Rate limiting is never retried here; `RateLimited` goes straight back to
//! the caller.

mod errors;
mod rate_limit;
mod session;

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::http::{HttpRequest, HttpTransport};

pub use errors::{GatewayError, short_error_message};
pub use rate_limit::RequestPacer;
pub use session::{
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT, ProxyCredentials, ProxySettings,
    ReqwestTransportBuilder, SessionSettings, SessionState, TransportBuilder,
};

use errors::classify_response;

/// What kind of body a fetch expects. Selects the `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// A JSON API document.
    Structured,
    /// A rendered HTML page.
    Rendered,
    /// Exact file bytes.
    Raw,
}

impl FetchMode {
    fn accept(self) -> &'static str {
        match self {
            FetchMode::Structured => "application/vnd.github+json, application/json",
            FetchMode::Rendered => "text/html,application/xhtml+xml",
            FetchMode::Raw => "*/*",
        }
    }
}

/// A successfully fetched body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Document(String),
    Bytes(Vec<u8>),
}

impl Fetched {
    pub fn into_text(self) -> String {
        match self {
            Fetched::Document(text) => text,
            Fetched::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Fetched::Document(text) => text.into_bytes(),
            Fetched::Bytes(bytes) => bytes,
        }
    }
}

/// Construction options for a [`Gateway`].
#[derive(Debug, Clone, Default)]
pub struct GatewayOptions {
    pub settings: SessionSettings,
    /// Proactive pacing; `None` disables it.
    pub requests_per_second: Option<u32>,
    /// Serialize every navigation through one session lock.
    pub exclusive_session: bool,
}

struct SessionInner {
    settings: SessionSettings,
    transport: Arc<dyn HttpTransport>,
    state: SessionState,
    check_url: Option<String>,
}

pub struct Gateway {
    builder: Arc<dyn TransportBuilder>,
    inner: RwLock<SessionInner>,
    pacer: Option<RequestPacer>,
    navigation: Option<Mutex<()>>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("state", &self.state())
            .field("pacer", &self.pacer)
            .field("exclusive", &self.is_exclusive())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway backed by reqwest.
    pub fn new(options: GatewayOptions) -> Result<Self, GatewayError> {
        Self::with_builder(options, Arc::new(ReqwestTransportBuilder))
    }

    /// Create a gateway with a custom transport builder.
    pub fn with_builder(
        options: GatewayOptions,
        builder: Arc<dyn TransportBuilder>,
    ) -> Result<Self, GatewayError> {
        let transport = builder.build(&options.settings)?;
        Ok(Self::assemble(options, builder, transport))
    }

    /// Create a gateway around a fixed transport.
    ///
    /// Session rebuilds reuse the same transport, so proxy and certificate
    /// changes only affect the recorded settings.
    pub fn with_transport(options: GatewayOptions, transport: Arc<dyn HttpTransport>) -> Self {
        let shared = Arc::clone(&transport);
        let builder = move |_: &SessionSettings| -> Result<Arc<dyn HttpTransport>, GatewayError> {
            Ok(Arc::clone(&shared))
        };
        Self::assemble(options, Arc::new(builder), transport)
    }

    fn assemble(
        options: GatewayOptions,
        builder: Arc<dyn TransportBuilder>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            builder,
            inner: RwLock::new(SessionInner {
                settings: options.settings,
                transport,
                state: SessionState::Init,
                check_url: None,
            }),
            pacer: options.requests_per_second.map(RequestPacer::per_second),
            navigation: options.exclusive_session.then(|| Mutex::new(())),
        }
    }

    /// Current setup state.
    pub fn state(&self) -> SessionState {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).state
    }

    /// Whether every request is serialized through one session.
    pub fn is_exclusive(&self) -> bool {
        self.navigation.is_some()
    }

    /// Whether certificate verification has been disabled.
    pub fn verification_disabled(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .settings
            .accept_invalid_certs
    }

    /// Snapshot of the current session settings.
    pub fn settings(&self) -> SessionSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .settings
            .clone()
    }

    fn set_state(&self, state: SessionState) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).state = state;
    }

    fn rebuild(&self, update: impl FnOnce(&mut SessionSettings)) -> Result<(), GatewayError> {
        let mut settings = self.settings();
        update(&mut settings);
        let transport = self.builder.build(&settings)?;

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.settings = settings;
        inner.transport = transport;
        Ok(())
    }

    /// Check that a network path to `check_url` exists.
    ///
    /// Any HTTP answer other than 407 counts as a working path.
    async fn check_reachable(&self, check_url: &str) -> Result<(), GatewayError> {
        let (transport, user_agent) = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            (Arc::clone(&inner.transport), inner.settings.user_agent.clone())
        };

        let request = HttpRequest::get(check_url).header("User-Agent", user_agent);
        let response = transport.send(request).await?;
        if response.status == 407 {
            return Err(GatewayError::ProxyAuthRequired);
        }
        Ok(())
    }

    /// Run the session setup state machine against `check_url`.
    ///
    /// Returns `ProxyAuthRequired` when credentials are needed; the caller is
    /// expected to call [`Gateway::configure_proxy`]. A TLS failure disables
    /// certificate verification and checks once more. Anything else that
    /// prevents a working path is `Unreachable`.
    pub async fn establish(&self, check_url: &str) -> Result<(), GatewayError> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .check_url = Some(check_url.to_string());

        match self.check_reachable(check_url).await {
            Ok(()) => {
                self.set_state(SessionState::Ready);
                debug!(url = %check_url, "session ready");
                Ok(())
            }
            Err(GatewayError::ProxyAuthRequired) => {
                self.set_state(SessionState::AwaitingCredentials);
                info!(url = %check_url, "proxy requires authentication");
                Err(GatewayError::ProxyAuthRequired)
            }
            Err(GatewayError::Tls { message }) => {
                warn!(
                    error = %message,
                    "TLS verification failed; disabling certificate verification"
                );
                self.set_state(SessionState::DegradedNoVerify);
                self.rebuild(|settings| settings.accept_invalid_certs = true)?;
                self.finish_reachability_check(check_url).await
            }
            Err(e) => Err(GatewayError::unreachable(short_error_message(&e))),
        }
    }

    async fn finish_reachability_check(&self, check_url: &str) -> Result<(), GatewayError> {
        match self.check_reachable(check_url).await {
            Ok(()) => {
                self.set_state(SessionState::Ready);
                Ok(())
            }
            Err(GatewayError::ProxyAuthRequired) => {
                self.set_state(SessionState::AwaitingCredentials);
                Err(GatewayError::ProxyAuthRequired)
            }
            Err(e) => Err(GatewayError::unreachable(short_error_message(&e))),
        }
    }

    /// Install proxy credentials, rebuild the session and check again.
    pub async fn configure_proxy(&self, credentials: ProxyCredentials) -> Result<(), GatewayError> {
        info!(proxy = %credentials.host, user = %credentials.username, "configuring proxy");
        self.rebuild(|settings| settings.proxy = Some(credentials.into()))?;

        let check_url = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .check_url
            .clone();
        match check_url {
            Some(url) => self.establish(&url).await,
            None => {
                self.set_state(SessionState::Init);
                Ok(())
            }
        }
    }

    /// Drive setup to completion, asking `credentials` whenever the proxy
    /// demands authentication.
    ///
    /// `credentials` receives the 1-based attempt number and returns `None`
    /// to give up. After `max_attempts` rejected attempts the result is
    /// `Unreachable`.
    pub async fn establish_with<F>(
        &self,
        check_url: &str,
        mut credentials: F,
        max_attempts: u32,
    ) -> Result<(), GatewayError>
    where
        F: FnMut(u32) -> Option<ProxyCredentials>,
    {
        let mut result = self.establish(check_url).await;
        let mut attempts = 0;

        loop {
            match result {
                Err(GatewayError::ProxyAuthRequired) if attempts < max_attempts => {
                    attempts += 1;
                    let Some(creds) = credentials(attempts) else {
                        return Err(GatewayError::unreachable(
                            "proxy credentials were not provided",
                        ));
                    };
                    result = self.configure_proxy(creds).await;
                }
                Err(GatewayError::ProxyAuthRequired) => {
                    return Err(GatewayError::unreachable(format!(
                        "proxy authentication failed after {attempts} attempts"
                    )));
                }
                other => return other,
            }
        }
    }

    /// Fetch `url`, classifying the outcome.
    pub async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Fetched, GatewayError> {
        let _navigation = match &self.navigation {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        if let Some(pacer) = &self.pacer {
            pacer.pace().await;
        }

        let (transport, user_agent) = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            (Arc::clone(&inner.transport), inner.settings.user_agent.clone())
        };

        debug!(url = %url, mode = ?mode, "fetching");

        let request = HttpRequest::get(url)
            .header("User-Agent", user_agent)
            .header("Accept", mode.accept());
        let response = transport.send(request).await?;
        classify_response(url, &response)?;

        Ok(match mode {
            FetchMode::Raw => Fetched::Bytes(response.body),
            FetchMode::Structured | FetchMode::Rendered => {
                Fetched::Document(String::from_utf8_lossy(&response.body).into_owned())
            }
        })
    }
}
