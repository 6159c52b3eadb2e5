//! Client configuration.
//!
//! Loaded from a TOML file or built in code. Every field has a default, so
//! an empty file (or no file) yields a working configuration for a local
//! server.
//!
//! ```toml
//! [server]
//! base_url = "https://chat.example.com"
//! request_timeout_secs = 10
//!
//! [sync]
//! reconnect_delay_secs = 3
//! match_tolerance_secs = 120
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Root client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct ClientConfig {
    /// Server endpoints.
    #[serde(default)]
    pub server: ServerConfig,
    /// Sync behavior.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Server endpoints and request limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the chat server (default: `http://localhost:8080`).
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Push channel URL. Derived from `base_url` when absent.
    #[serde(default)]
    pub ws_url: Option<Url>,
    /// Ceiling for every request/response call (default: 10).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Sync behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Fixed wait between a channel closure and the next attempt (default: 3).
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Window for matching an echo to a pending send (default: 120, 0 = unbounded).
    #[serde(default = "default_match_tolerance_secs")]
    pub match_tolerance_secs: u64,
    /// Capacity of the internal update queues (default: 256).
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

// Default value functions
fn default_base_url() -> Url {
    // Static literal; parse cannot fail.
    Url::parse("http://localhost:8080").unwrap_or_else(|_| unreachable!())
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_match_tolerance_secs() -> u64 {
    120
}

fn default_event_buffer() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay_secs(),
            match_tolerance_secs: default_match_tolerance_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            server: ServerConfig {
                base_url,
                ..ServerConfig::default()
            },
            sync: SyncConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Override the push channel URL.
    pub fn with_ws_url(mut self, url: Url) -> Self {
        self.server.ws_url = Some(url);
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.server.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.sync.reconnect_delay_secs = delay.as_secs();
        self
    }

    /// Set the echo match window. `None` matches regardless of timestamps.
    pub fn with_match_tolerance(mut self, tolerance: Option<Duration>) -> Self {
        self.sync.match_tolerance_secs = tolerance.map(|t| t.as_secs()).unwrap_or(0);
        self
    }

    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Reconnect delay.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.sync.reconnect_delay_secs)
    }

    /// Echo match window; `None` when unbounded.
    pub fn match_tolerance(&self) -> Option<Duration> {
        match self.sync.match_tolerance_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Capacity of the internal update queues (at least 1).
    pub fn event_buffer(&self) -> usize {
        self.sync.event_buffer.max(1)
    }

    /// Push channel endpoint without the token parameter.
    ///
    /// Uses `ws_url` if set, otherwise `base_url` with the scheme mapped
    /// (`http`→`ws`, `https`→`wss`) and the path `/ws`. Unlike the HTTP
    /// endpoints, any base path is dropped: `http://host/app/` gives
    /// `ws://host/ws`. Set `ws_url` for servers mounted under a prefix.
    pub fn ws_endpoint(&self) -> Result<Url, ConfigError> {
        if let Some(url) = &self.server.ws_url {
            return Ok(url.clone());
        }

        let mut url = self.server.base_url.clone();
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ConfigError::InvalidUrl(format!(
                    "unsupported scheme {other:?} in {}",
                    self.server.base_url
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ConfigError::InvalidUrl(self.server.base_url.to_string()))?;
        url.set_path("/ws");
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A URL cannot be used for the purpose it was given.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}
