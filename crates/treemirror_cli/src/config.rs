//! Configuration file support for treemirror.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (`TREEMIRROR_<SECTION>__<KEY>`, e.g. `TREEMIRROR_NETWORK__PROXY`)
//! 3. Config file (./treemirror.toml, then ~/.config/treemirror/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [network]
//! timeout_secs = 20
//! proxy = "proxy.corp.example:8080"
//! insecure = false
//! requests_per_second = 10
//! exclusive_session = false
//!
//! [endpoints]
//! web_base = "https://github.com"
//! api_base = "https://api.github.com"
//! raw_base = "https://raw.githubusercontent.com"
//!
//! [sync]
//! concurrency = 5
//! strategy = "auto"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigBuilder as Builder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use treemirror::discovery::DiscoveryStrategy;
use treemirror::gateway::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use treemirror::reference::{DEFAULT_API_BASE, DEFAULT_RAW_BASE, DEFAULT_WEB_BASE};
use treemirror::sync::DEFAULT_CONCURRENCY;
use treemirror::{Endpoints, ReferenceError};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub endpoints: EndpointsConfig,
    /// Default mirror options.
    pub sync: SyncConfig,
}

/// Outbound session settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    /// Proxy URL; a bare `host:port` is treated as `http://host:port`.
    pub proxy: Option<String>,
    /// Skip TLS certificate verification from the first request.
    pub insecure: bool,
    /// Proactive pacing. Unset means no pacing.
    pub requests_per_second: Option<u32>,
    /// Serialize every request through one session.
    pub exclusive_session: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            user_agent: None,
            proxy: None,
            insecure: false,
            requests_per_second: None,
            exclusive_session: false,
        }
    }
}

/// Base URL overrides for the three remote surfaces.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub api_base: Option<String>,
    pub raw_base: Option<String>,
    pub web_base: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum concurrent file workers.
    pub concurrency: usize,
    pub strategy: DiscoveryStrategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            strategy: DiscoveryStrategy::Auto,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/treemirror/config.toml)
    /// 3. Local config file (./treemirror.toml)
    /// 4. Environment variables with the TREEMIRROR_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("treemirror.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./treemirror.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., TREEMIRROR_NETWORK__TIMEOUT_SECS -> network.timeout_secs
        builder = builder.add_source(
            Environment::with_prefix("TREEMIRROR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    fn from_builder(builder: Builder<config::builder::DefaultState>) -> Self {
        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs.max(1))
    }

    pub fn user_agent(&self) -> String {
        self.network
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Remote endpoints with configured overrides applied.
    pub fn endpoints(&self) -> Result<Endpoints, ReferenceError> {
        let endpoints = &self.endpoints;
        Endpoints::new(
            endpoints.api_base.as_deref().unwrap_or(DEFAULT_API_BASE),
            endpoints.raw_base.as_deref().unwrap_or(DEFAULT_RAW_BASE),
            endpoints.web_base.as_deref().unwrap_or(DEFAULT_WEB_BASE),
        )
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "treemirror").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_content: &str) -> Config {
        let settings = ConfigBuilder::builder()
            .add_source(config::File::from_str(toml_content, FileFormat::Toml))
            .build()
            .unwrap();
        settings.try_deserialize().unwrap()
    }

    #[test]
    fn test_config_builder_with_defaults() {
        let settings = ConfigBuilder::builder().build().unwrap();
        let config: Config = settings.try_deserialize().unwrap_or_default();
        assert_eq!(config.network.timeout_secs, 20);
        assert_eq!(config.sync.concurrency, 5);
        assert_eq!(config.sync.strategy, DiscoveryStrategy::Auto);
        assert!(!config.network.exclusive_session);
        assert!(config.network.requests_per_second.is_none());
    }

    #[test]
    fn test_full_config_parsing() {
        let config = parse(
            r#"
            [network]
            timeout_secs = 45
            user_agent = "mirror-bot/1.0"
            proxy = "proxy.corp:8080"
            insecure = true
            requests_per_second = 4
            exclusive_session = true

            [endpoints]
            web_base = "https://git.example.com"

            [sync]
            concurrency = 2
            strategy = "scrape"
        "#,
        );

        assert_eq!(config.timeout(), Duration::from_secs(45));
        assert_eq!(config.user_agent(), "mirror-bot/1.0");
        assert_eq!(config.network.proxy.as_deref(), Some("proxy.corp:8080"));
        assert!(config.network.insecure);
        assert_eq!(config.network.requests_per_second, Some(4));
        assert!(config.network.exclusive_session);
        assert_eq!(config.sync.concurrency, 2);
        assert_eq!(config.sync.strategy, DiscoveryStrategy::Scrape);

        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.web_base.host_str(), Some("git.example.com"));
        assert_eq!(endpoints.api_base, Endpoints::default().api_base);
    }

    #[test]
    fn test_config_builder_partial_override() {
        let config = parse(
            r#"
            [sync]
            concurrency = 9
        "#,
        );
        assert_eq!(config.sync.concurrency, 9);
        assert_eq!(config.sync.strategy, DiscoveryStrategy::Auto);
        assert_eq!(config.network.timeout_secs, 20);
    }

    #[test]
    fn test_invalid_strategy_falls_back_to_defaults() {
        let builder = ConfigBuilder::builder().add_source(config::File::from_str(
            "[sync]\nstrategy = \"telepathy\"",
            FileFormat::Toml,
        ));
        let config = Config::from_builder(builder);
        assert_eq!(config.sync.strategy, DiscoveryStrategy::Auto);
    }

    #[test]
    fn test_invalid_endpoint_is_reported() {
        let config = parse(
            r#"
            [endpoints]
            raw_base = "not a url"
        "#,
        );
        assert!(config.endpoints().is_err());
    }

    #[test]
    fn test_default_user_agent_and_zero_timeout() {
        let mut config = Config::default();
        config.network.timeout_secs = 0;
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert!(config.user_agent().starts_with("treemirror/"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("treemirror"));
    }
}
