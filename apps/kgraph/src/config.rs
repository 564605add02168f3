//! # Configuration Module
//!
//! TOML configuration for the kgraph binary.
//!
//! ## Resolution order
//!
//! 1. Built-in defaults
//! 2. The TOML file named by `--config` or `KGRAPH_CONFIG` (a missing file is
//!    not an error; a malformed one is)
//! 3. Environment overrides: `KGRAPH_LOG_FORMAT`, `KGRAPH_LOG`
//!
//! ## Example
//!
//! ```toml
//! [embedding]
//! dimensions = 256
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! body_limit_bytes = 2097152
//!
//! [log]
//! format = "json"
//! filter = "kgraph=debug"
//! ```

use kgraph_core::KgError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "KGRAPH_CONFIG";

/// Default tracing filter.
pub const DEFAULT_LOG_FILTER: &str = "kgraph=info,kgraph_core=info,tower_http=debug";

// =============================================================================
// SECTIONS
// =============================================================================

/// `[embedding]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Vector length of the built-in hashing embedder.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: kgraph_core::HashingEmbedder::DEFAULT_DIMENSIONS,
        }
    }
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// `[log]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub format: LogFormat,
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, KgError> {
        let config: Self = toml::from_str(text).map_err(|e| KgError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or `KGRAPH_CONFIG`, or defaults.
    ///
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, KgError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    KgError::Config(format!("cannot read '{}': {}", path.display(), e))
                })?;
                Self::from_toml(&text)?
            }
            _ => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `KGRAPH_LOG_FORMAT` and `KGRAPH_LOG` through a lookup function.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(format) = lookup("KGRAPH_LOG_FORMAT") {
            self.log.format = if format.eq_ignore_ascii_case("json") {
                LogFormat::Json
            } else {
                LogFormat::Text
            };
        }
        if let Some(filter) = lookup("KGRAPH_LOG").filter(|f| !f.trim().is_empty()) {
            self.log.filter = filter;
        }
    }

    fn validate(&self) -> Result<(), KgError> {
        if self.embedding.dimensions == 0 {
            return Err(KgError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(KgError::Config(
                "server.body_limit_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
