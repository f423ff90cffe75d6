//! Configuration management for camrelay
//!
//! Settings for the inbound relay server, the outbound HTTP client and
//! logging. Files are TOML; every key can be overridden from the environment
//! with the `CAMRELAY__` prefix (e.g. `CAMRELAY__SERVER__BIND=0.0.0.0:8080`).

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

/// Inbound relay surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, `host:port`
    pub bind: String,
    /// Route accepting `{endpoint, prompt, offer}`
    pub offer_route: String,
}

/// Outbound HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Whole-request deadline in milliseconds; unset means no deadline
    pub request_timeout_ms: Option<u64>,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger filter used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            offer_route: "/api/offer".to_string(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: None,
            user_agent: format!("camrelay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "camrelay=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Environment prefix for overrides
    pub const ENV_PREFIX: &'static str = "CAMRELAY";

    /// Load configuration from a TOML file layered under environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if path.exists() {
            log::info!("Loading configuration from {:?}", path);
        } else {
            log::info!("Config file not found at {:?}, using defaults", path);
        }

        let defaults = config::Config::try_from(&AppConfig::default()).map_err(|e| {
            CameraError::Backend(format!("Failed to prepare default config: {}", e))
        })?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CameraError::Backend(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| CameraError::Backend(format!("Failed to parse config: {}", e)))?;

        config.validate().map_err(CameraError::Backend)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CameraError::Backend(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::Backend(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::Backend(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("camrelay.toml")
    }

    /// Load from default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        self.bind_addr()?;

        if !self.server.offer_route.starts_with('/') {
            return Err("Offer route must start with '/'".to_string());
        }
        if self.relay.request_timeout_ms == Some(0) {
            return Err("Request timeout must be greater than zero when set".to_string());
        }
        if self.relay.user_agent.trim().is_empty() {
            return Err("User agent must not be empty".to_string());
        }
        if self.logging.filter.trim().is_empty() {
            return Err("Logging filter must not be empty".to_string());
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, String> {
        self.server
            .bind
            .parse()
            .map_err(|e| format!("Invalid bind address {:?}: {}", self.server.bind, e))
    }
}
