//! Engine configuration.
//!
//! Configuration is environment-style: a single optional backend address plus
//! the process-wide default quota and window. Per-key limits are configured
//! programmatically through the engine and are not part of this struct.

use std::time::Duration;

use crate::error::{ConfigError, Result};

const ENV_REDIS_URL: &str = "RATEWARDEN_REDIS_URL";
const ENV_REDIS_ADDR: &str = "REDIS_ADDR";
const ENV_DEFAULT_LIMIT: &str = "RATEWARDEN_DEFAULT_LIMIT";
const ENV_WINDOW_SECS: &str = "RATEWARDEN_WINDOW_SECS";

/// Configuration for an [`AdmissionEngine`](crate::engine::AdmissionEngine).
///
/// The window is fixed process-wide and shared by all keys and both
/// algorithms; it is not configurable per key.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Quota applied to keys without a registry override.
    pub default_limit: u64,
    /// Rolling window length shared by all keys.
    pub window: Duration,
    /// Shared-backend URL (e.g. `redis://localhost:6379`). `None` keeps the
    /// engine on the process-local store.
    pub redis_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            window: Duration::from_secs(60),
            redis_url: None,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with the given default limit and window.
    pub fn new(default_limit: u64, window: Duration) -> Self {
        Self {
            default_limit,
            window,
            ..Default::default()
        }
    }

    /// Set the default limit.
    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    /// Set the window length.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the shared-backend URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Build a configuration from the process environment.
    ///
    /// Reads `RATEWARDEN_REDIS_URL` (or legacy `REDIS_ADDR` as a bare
    /// `host:port`), `RATEWARDEN_DEFAULT_LIMIT`, and `RATEWARDEN_WINDOW_SECS`.
    /// Unset variables keep their defaults; unparseable values are errors.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(ENV_REDIS_URL) {
            if !url.is_empty() {
                config.redis_url = Some(url);
            }
        } else if let Ok(addr) = std::env::var(ENV_REDIS_ADDR) {
            if !addr.is_empty() {
                config.redis_url = Some(format!("redis://{addr}"));
            }
        }

        if let Ok(raw) = std::env::var(ENV_DEFAULT_LIMIT) {
            config.default_limit = raw.parse().map_err(|_| ConfigError::InvalidEnvValue {
                name: ENV_DEFAULT_LIMIT,
                value: raw,
            })?;
        }

        if let Ok(raw) = std::env::var(ENV_WINDOW_SECS) {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidEnvValue {
                name: ENV_WINDOW_SECS,
                value: raw,
            })?;
            config.window = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err(ConfigError::InvalidWindow("window must be non-zero".into()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_limit, 5);
        assert_eq!(config.window, Duration::from_secs(60));
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new(10, Duration::from_secs(1))
            .with_redis_url("redis://localhost:6380");
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.window, Duration::from_secs(1));
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6380"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = EngineConfig::default().with_window(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_default_limit_accepted() {
        // A zero default denies everything but is not a config error
        let config = EngineConfig::default().with_default_limit(0);
        assert!(config.validate().is_ok());
    }
}
