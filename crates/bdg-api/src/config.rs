//! # Service Configuration
//!
//! Environment-driven configuration, parsed once at startup into
//! [`ApiConfig`]. Library crates never read the environment; they receive
//! the typed sub-configs built here ([`KeyStoreConfig`], [`StatusListConfig`]).
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BADGE_BIND_ADDR` | `0.0.0.0:8080` |
//! | `BADGE_PUBLIC_BASE_URL` | `http://localhost:8080` |
//! | `BADGE_CONTROLLER_PREFIX` | `did:web:localhost:issuers:` |
//! | `BADGE_KEY_ENCRYPTION_KEY` | ephemeral key, with a warning |
//! | `BADGE_AUTH_TOKEN` | auth disabled, with a warning |
//! | `BADGE_STATUS_LIST_CAPACITY` | `16384` |
//! | `BADGE_LOG_FORMAT` | `pretty` |
//! | `BADGE_METRICS_ENABLED` | `true` |
//! | `DATABASE_URL` | in-memory mode |

use std::net::SocketAddr;

use bdg_keys::{KeyStoreConfig, DEFAULT_CONTROLLER_PREFIX};
use bdg_status::{StatusListConfig, DEFAULT_CAPACITY};
use thiserror::Error;
use zeroize::Zeroizing;

/// A secret read from the environment. Zeroized on drop, redacted in `Debug`.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Invalid configuration value.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value:?}")]
    BindAddr { var: &'static str, value: String },

    #[error("{var} must be a positive integer, got {value:?}")]
    Integer { var: &'static str, value: String },

    #[error("{var} must be one of {expected}, got {value:?}")]
    Choice {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{var} must be 64 hex characters")]
    EncryptionKey { var: &'static str },

    #[error("{var} must not be empty when set")]
    Empty { var: &'static str },
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Base of every status list URL.
    pub public_base_url: String,
    pub controller_prefix: String,
    /// Hex AES-256 key sealing private keys at rest.
    pub key_encryption_key: Option<Secret>,
    /// Bearer secret for issuer-authenticated routes. `None` disables auth.
    pub auth_token: Option<Secret>,
    pub status_list_capacity: usize,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
    pub database_url: Option<Secret>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            public_base_url: "http://localhost:8080".to_string(),
            controller_prefix: DEFAULT_CONTROLLER_PREFIX.to_string(),
            key_encryption_key: None,
            auth_token: None,
            status_list_capacity: DEFAULT_CAPACITY,
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            database_url: None,
        }
    }
}

impl ApiConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`. Unset and empty variables take
    /// their defaults, except where an empty value is ambiguous.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string());
        let mut config = Self::default();

        if let Some(value) = get("BADGE_BIND_ADDR").filter(|v| !v.is_empty()) {
            config.bind_addr = value.parse().map_err(|_| ConfigError::BindAddr {
                var: "BADGE_BIND_ADDR",
                value,
            })?;
        }
        if let Some(value) = get("BADGE_PUBLIC_BASE_URL").filter(|v| !v.is_empty()) {
            config.public_base_url = value.trim_end_matches('/').to_string();
        }
        if let Some(value) = get("BADGE_CONTROLLER_PREFIX").filter(|v| !v.is_empty()) {
            config.controller_prefix = value;
        }
        if let Some(value) = get("BADGE_KEY_ENCRYPTION_KEY") {
            if value.len() != 64 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::EncryptionKey {
                    var: "BADGE_KEY_ENCRYPTION_KEY",
                });
            }
            config.key_encryption_key = Some(Secret::new(value));
        }
        if let Some(value) = get("BADGE_AUTH_TOKEN") {
            if value.is_empty() {
                return Err(ConfigError::Empty {
                    var: "BADGE_AUTH_TOKEN",
                });
            }
            config.auth_token = Some(Secret::new(value));
        }
        if let Some(value) = get("BADGE_STATUS_LIST_CAPACITY").filter(|v| !v.is_empty()) {
            config.status_list_capacity = match value.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Integer {
                        var: "BADGE_STATUS_LIST_CAPACITY",
                        value,
                    })
                }
            };
        }
        if let Some(value) = get("BADGE_LOG_FORMAT").filter(|v| !v.is_empty()) {
            config.log_format = match value.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::Choice {
                        var: "BADGE_LOG_FORMAT",
                        expected: "json, pretty",
                        value,
                    })
                }
            };
        }
        if let Some(value) = get("BADGE_METRICS_ENABLED").filter(|v| !v.is_empty()) {
            config.metrics_enabled = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Choice {
                        var: "BADGE_METRICS_ENABLED",
                        expected: "true, false",
                        value,
                    })
                }
            };
        }
        if let Some(value) = get("DATABASE_URL").filter(|v| !v.is_empty()) {
            config.database_url = Some(Secret::new(value));
        }

        Ok(config)
    }

    pub fn key_store_config(&self) -> KeyStoreConfig {
        KeyStoreConfig {
            controller_prefix: self.controller_prefix.clone(),
        }
    }

    pub fn status_list_config(&self) -> StatusListConfig {
        StatusListConfig {
            base_url: self.public_base_url.clone(),
            capacity: self.status_list_capacity,
            ..StatusListConfig::default()
        }
    }
}
