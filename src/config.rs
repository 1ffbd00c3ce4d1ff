//! Backend connection settings.
//!
//! The client talks to exactly one backend, identified by its base host. The value is
//! read once at process start, usually from the environment:
//!
//! ```no_run
//! use recipebook::config::ClientConfig;
//!
//! // Reads `.env` (if present), then `RECIPEBOOK_BACKEND_HOST`.
//! let config = ClientConfig::from_env()?;
//! # Ok::<(), recipebook::config::ConfigError>(())
//! ```

use thiserror::Error;
use url::Url;

/// Environment variable holding the backend base host.
pub const BACKEND_HOST_VAR: &str = "RECIPEBOOK_BACKEND_HOST";

/// Error raised while loading [`ClientConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid backend host {host:?}: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("backend host {0:?} must be an http or https URL")]
    UnsupportedScheme(String),
}

/// Connection settings for the recipe book backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base host every endpoint path is resolved against.
    pub backend_host: Url,
}

impl ClientConfig {
    /// Creates a configuration for the given base host.
    #[must_use]
    pub const fn new(backend_host: Url) -> Self {
        Self { backend_host }
    }

    /// Parses a base host such as `http://localhost:8080`.
    pub fn parse(host: &str) -> Result<Self, ConfigError> {
        let trimmed = host.trim();
        let backend_host = Url::parse(trimmed).map_err(|source| ConfigError::InvalidHost {
            host: trimmed.to_string(),
            source,
        })?;

        if !matches!(backend_host.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(trimmed.to_string()));
        }

        Ok(Self::new(backend_host))
    }

    /// Loads `.env` if one exists, then reads [`BACKEND_HOST_VAR`].
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let host =
            std::env::var(BACKEND_HOST_VAR).map_err(|_| ConfigError::Missing(BACKEND_HOST_VAR))?;
        Self::parse(&host)
    }
}
