//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `ADMIT_CONFIG` env var
//! 3. **Environment variables**: `ADMIT__SECTION__FIELD` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`ServerConfig`]: HTTP server settings (bind address, deadline, concurrency)
//! - [`StoreConfig`]: Key-value backend selection and connection
//! - [`AuditConfig`]: Banned keyword source
//! - [`QuotaConfig`]: Rate limit rule document
//! - [`PolicyConfig`]: Status codes for policy denials
//! - [`LoggingConfig`]: Log level and format
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! bind_port = 19892
//!
//! [store]
//! backend = "redis"
//! url = "redis://127.0.0.1:6379/0"
//!
//! [policy]
//! entitlement_denied_status = 403
//! ```

use crate::store::redis::DEFAULT_KEY_PREFIX;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

pub const BACKEND_REDIS: &str = "redis";
pub const BACKEND_MEMORY: &str = "memory";

/// Upper bound for `server.request_timeout_seconds`.
pub const MAX_REQUEST_TIMEOUT_SECONDS: u64 = 300;

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind the server to. Defaults to `0.0.0.0`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port number to listen on. Defaults to `19892`.
    pub bind_port: u16,

    /// Deadline for one admission decision, covering every store call. Defaults to `5`.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Maximum number of audit requests processed at once. Defaults to `1024`.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    5
}

fn default_max_concurrent_requests() -> usize {
    1024
}

/// Key-value store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `"redis"` or `"memory"`.
    pub backend: String,

    /// Connection URL for the redis backend.
    pub url: String,

    /// Namespace prepended to every key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Newline-delimited banned keyword file.
    pub keywords_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// JSON rule document.
    pub rules_path: String,
}

/// HTTP status codes used for policy denials that have more than one accepted mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// 401 or 429. Defaults to `401`.
    pub invalid_session_status: u16,

    /// 429 or 403. Defaults to `429`.
    pub entitlement_denied_status: u16,
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive. Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: 19892,
            request_timeout_seconds: default_request_timeout_seconds(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BACKEND_REDIS.to_string(),
            url: "redis://127.0.0.1:6379/0".to_string(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { keywords_path: "data/keywords.txt".to_string() }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { rules_path: "data/limit.json".to_string() }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { invalid_session_status: 401, entitlement_denied_status: 429 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Use `__` as a separator for nested fields (e.g., `ADMIT__SERVER__BIND_PORT=8080`).
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("server.bind_address", "0.0.0.0")?
            .set_default("server.bind_port", 19892)?
            .set_default("server.request_timeout_seconds", 5)?
            .set_default("server.max_concurrent_requests", 1024)?
            .set_default("store.backend", BACKEND_REDIS)?
            .set_default("store.url", "redis://127.0.0.1:6379/0")?
            .set_default("store.key_prefix", DEFAULT_KEY_PREFIX)?
            .set_default("audit.keywords_path", "data/keywords.txt")?
            .set_default("quota.rules_path", "data/limit.json")?
            .set_default("policy.invalid_session_status", 401)?
            .set_default("policy.entitlement_denied_status", 429)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("ADMIT").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml`, or the path in `ADMIT_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("ADMIT_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed into a [`SocketAddr`].
    ///
    /// [`SocketAddr`]: std::net::SocketAddr
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    /// Per-request admission deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    #[must_use]
    pub fn uses_memory_store(&self) -> bool {
        self.store.backend == BACKEND_MEMORY
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if self.server.request_timeout_seconds == 0 {
            return Err("Request timeout must be greater than 0".to_string());
        }

        if self.server.request_timeout_seconds > MAX_REQUEST_TIMEOUT_SECONDS {
            return Err(format!(
                "Request timeout must be at most {MAX_REQUEST_TIMEOUT_SECONDS} seconds"
            ));
        }

        if self.server.max_concurrent_requests == 0 {
            return Err("Max concurrent requests must be greater than 0".to_string());
        }

        match self.store.backend.as_str() {
            BACKEND_MEMORY => {}
            BACKEND_REDIS => {
                if !self.store.url.starts_with("redis://") && !self.store.url.starts_with("rediss://")
                {
                    return Err(format!("Invalid redis URL: {}", self.store.url));
                }
            }
            other => {
                return Err(format!("Store backend must be 'redis' or 'memory', got '{other}'"))
            }
        }

        if self.quota.rules_path.trim().is_empty() {
            return Err("Rate limit rules path must not be empty".to_string());
        }

        if ![401, 429].contains(&self.policy.invalid_session_status) {
            return Err("Invalid session status must be 401 or 429".to_string());
        }

        if ![429, 403].contains(&self.policy.entitlement_denied_status) {
            return Err("Entitlement denied status must be 429 or 403".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
