use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::http::{HttpError, HttpResponse};

/// Errors surfaced by the network gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The remote answered 404.
    #[error("Not found: {url}")]
    NotFound { url: String },

    /// Rate limit exceeded. Never retried inside the gateway.
    #[error("Rate limit exceeded for {url}")]
    RateLimited {
        url: String,
        reset_at: Option<DateTime<Utc>>,
    },

    /// An intercepting proxy wants credentials.
    #[error("Proxy authentication required")]
    ProxyAuthRequired,

    /// Certificate verification failed.
    #[error("TLS verification failed: {message}")]
    Tls { message: String },

    /// Timeouts, connection failures and unexpected statuses.
    #[error("Network error: {message}")]
    Transient { message: String },

    /// No viable network path after every recovery attempt.
    #[error("Remote unreachable: {message}")]
    Unreachable { message: String },

    /// The outbound session could not be built.
    #[error("Failed to build HTTP client: {message}")]
    Client { message: String },
}

impl GatewayError {
    #[inline]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    #[inline]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    #[inline]
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl From<HttpError> for GatewayError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Tls(message) => Self::Tls { message },
            HttpError::ProxyTunnel(_) => Self::ProxyAuthRequired,
            HttpError::Timeout(message) => Self::transient(format!("timed out: {message}")),
            other => Self::transient(other.to_string()),
        }
    }
}

/// Map a response status onto the gateway taxonomy.
pub(crate) fn classify_response(url: &str, response: &HttpResponse) -> Result<(), GatewayError> {
    match response.status {
        200..=299 => Ok(()),
        404 => Err(GatewayError::NotFound {
            url: url.to_string(),
        }),
        407 => Err(GatewayError::ProxyAuthRequired),
        429 => Err(rate_limited(url, response)),
        403 if response.header("X-RateLimit-Remaining") == Some("0") => {
            Err(rate_limited(url, response))
        }
        status => Err(GatewayError::transient(format!("HTTP {status} from {url}"))),
    }
}

fn rate_limited(url: &str, response: &HttpResponse) -> GatewayError {
    let reset_at = response
        .header("X-RateLimit-Reset")
        .and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    GatewayError::RateLimited {
        url: url.to_string(),
        reset_at,
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps multi-line transport
/// chains readable in progress output and error lists.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Vec::new(),
        }
    }

    #[test]
    fn classify_response_maps_statuses() {
        let url = "https://example.test/x";

        assert!(classify_response(url, &response(200, &[])).is_ok());
        assert!(classify_response(url, &response(404, &[])).unwrap_err().is_not_found());
        assert_eq!(
            classify_response(url, &response(407, &[])).unwrap_err(),
            GatewayError::ProxyAuthRequired
        );
        assert!(classify_response(url, &response(429, &[])).unwrap_err().is_rate_limited());
        assert!(matches!(
            classify_response(url, &response(500, &[])).unwrap_err(),
            GatewayError::Transient { .. }
        ));
    }

    #[test]
    fn forbidden_is_rate_limited_only_when_quota_is_exhausted() {
        let url = "https://example.test/x";

        let exhausted = classify_response(
            url,
            &response(
                403,
                &[("x-ratelimit-remaining", "0"), ("X-RateLimit-Reset", "1700000000")],
            ),
        )
        .unwrap_err();
        match exhausted {
            GatewayError::RateLimited { reset_at, .. } => {
                assert_eq!(reset_at.map(|t| t.timestamp()), Some(1_700_000_000));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let forbidden = classify_response(url, &response(403, &[])).unwrap_err();
        assert!(!forbidden.is_rate_limited());
    }

    #[test]
    fn http_errors_convert_to_gateway_errors() {
        assert_eq!(
            GatewayError::from(HttpError::ProxyTunnel("407".into())),
            GatewayError::ProxyAuthRequired
        );
        assert!(matches!(
            GatewayError::from(HttpError::Tls("bad cert".into())),
            GatewayError::Tls { .. }
        ));
        assert!(matches!(
            GatewayError::from(HttpError::Timeout("20s".into())),
            GatewayError::Transient { .. }
        ));
    }

    #[test]
    fn short_error_message_keeps_first_line() {
        let err = GatewayError::transient("first line\nsecond line");
        assert_eq!(short_error_message(&err), "Network error: first line");
    }
}
