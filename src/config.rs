//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `server.toml`.
//!     loads configuration from file or falls back to defaults, then applies
//!     environment overrides for deployment secrets.
//!
//! structure:
//!     - ServerConfig: listen address and the optional static dashboard dir.
//!     - StoreConfig: backing store selection, credentials, per-call timeout.
//!     - AuthConfig: write-endpoint bearer secret.
//!     - IngestConfig: which channels a payload must carry.
//!     - LoggingConfig: default tracing filter.
//!
//! environment overrides:
//!     HOST, PORT, DATABASE_URL, DATABASE_AUTH_TOKEN, SENSOR_WRITE_TOKEN
//!
//! ==============================================================================

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::Channel;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// directory holding the built dashboard (index.html, dist/)
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub auth_token: Option<String>,
    pub max_connections: u32,
    pub call_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// turning this off leaves POST /api/sensor-update open
    pub require_write_auth: bool,
    pub write_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IngestConfig {
    /// channels required on top of temp and humidity
    pub required_channels: Vec<Channel>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            database_url: None,
            auth_token: None,
            max_connections: 5,
            call_timeout_ms: 5000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_write_auth: true,
            write_token: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl HubConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
    }

    /// Load with default fallback
    ///
    /// runs before tracing is initialised, so it reports on stderr
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("server.toml"),
            PathBuf::from("..").join("config").join("server.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        eprintln!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        eprintln!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        eprintln!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// apply deployment overrides; `lookup` is `std::env::var` in production
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(host) = read("HOST") {
            self.server.host = host;
        }
        if let Some(port) = read("PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => eprintln!("[CONFIG] Warning: ignoring unparsable PORT {port:?}"),
            }
        }
        if let Some(url) = read("DATABASE_URL") {
            self.store.database_url = Some(url);
        }
        if let Some(token) = read("DATABASE_AUTH_TOKEN") {
            self.store.auth_token = Some(token);
        }
        if let Some(token) = read("SENSOR_WRITE_TOKEN") {
            self.auth.write_token = Some(token);
        }
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", addr, e))
    }

    /// Log configuration summary (secrets redacted)
    pub fn log_summary(&self) {
        let set = |v: &Option<String>| if v.is_some() { "set" } else { "unset" };
        tracing::info!(
            listen = %format!("{}:{}", self.server.host, self.server.port),
            backend = ?self.store.backend,
            database_url = set(&self.store.database_url),
            call_timeout_ms = self.store.call_timeout_ms,
            require_write_auth = self.auth.require_write_auth,
            write_token = set(&self.auth.write_token),
            required_channels = ?self.ingest.required_channels,
            static_dir = ?self.server.static_dir,
            "configuration"
        );
    }
}
