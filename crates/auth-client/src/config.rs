//! Configuration for the auth client.

use crate::{ClientError, ClientResult};
use auth_machine::MachineOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default readiness bound, in seconds.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 15;

/// Default bound on a single refresh, in seconds.
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

/// Default lead time before expiry at which tokens are refreshed, in seconds.
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 300;
pub const DEFAULT_REFRESH_RETRY_SECS: u64 = 10;

/// Auth client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the hasura-auth service.
    pub backend_url: String,
    /// Base URL of the application, used to resolve relative redirects.
    pub client_url: Option<String>,
    /// Refresh the access token before it expires.
    pub auto_refresh_token: bool,
    /// Restore the persisted session on start.
    pub auto_sign_in: bool,
    /// Start the session machine when the client is constructed.
    pub start: bool,
    /// Fixed refresh period; overrides the expiry-based schedule.
    pub refresh_interval_secs: Option<u64>,
    pub refresh_margin_secs: u64,
    /// Delay before retrying a failed automatic refresh.
    pub refresh_retry_secs: u64,
    pub ready_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            client_url: None,
            auto_refresh_token: true,
            auto_sign_in: true,
            start: true,
            refresh_interval_secs: None,
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            refresh_retry_secs: DEFAULT_REFRESH_RETRY_SECS,
            ready_timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Config for `backend_url` with defaults, then overridden from environment.
    pub fn new(backend_url: impl Into<String>) -> Self {
        let mut config = Self {
            backend_url: backend_url.into(),
            ..Self::default()
        };
        config.load_from_env();
        config
    }

    /// Defaults overridden from environment only.
    pub fn from_env() -> ClientResult<Self> {
        let mut config = Self::default();
        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file; environment variables still win.
    pub fn load_from_file(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ClientConfig = serde_json::from_str(&content)?;
        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> ClientResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(url) = std::env::var("HASURA_AUTH_URL") {
            self.backend_url = url;
        }
        if let Ok(url) = std::env::var("HASURA_AUTH_CLIENT_URL") {
            self.client_url = Some(url);
        }
        if let Ok(level) = std::env::var("HASURA_AUTH_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> ClientResult<()> {
        if self.backend_url.is_empty() {
            return Err(ClientError::Config("backend_url is required".to_string()));
        }
        self.backend_url()?;
        if let Some(client_url) = &self.client_url {
            Url::parse(client_url)?;
        }
        if self.ready_timeout_secs == 0 {
            return Err(ClientError::Config(
                "ready_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.refresh_interval_secs == Some(0) {
            return Err(ClientError::Config(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.refresh_retry_secs == 0 {
            return Err(ClientError::Config(
                "refresh_retry_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Backend URL as a parsed URL.
    pub fn backend_url(&self) -> ClientResult<Url> {
        Url::parse(&self.backend_url).map_err(ClientError::from)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// Options for the session machine.
    pub fn machine_options(&self) -> MachineOptions {
        MachineOptions {
            auto_refresh_token: self.auto_refresh_token,
            auto_sign_in: self.auto_sign_in,
            refresh_interval: self.refresh_interval_secs.map(Duration::from_secs),
            refresh_margin: Duration::from_secs(self.refresh_margin_secs),
            refresh_retry: Duration::from_secs(self.refresh_retry_secs),
        }
    }
}
