//! Runtime configuration for embedding callers.
//!
//! Values come from defaults, a deserialized document, or `MODELCASCADE_*`
//! environment variables, and are checked by [`CoreConfig::validate`].

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LAKE_PAGE_SIZE: u32 = 50;
pub const MAX_LAKE_PAGE_SIZE: u32 = 200;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Page-size bounds applied to Object Lake queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_LAKE_PAGE_SIZE,
            max_page_size: MAX_LAKE_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// Clamps a requested page size: `0` or missing selects the default,
    /// oversized requests are capped at the max.
    pub fn normalize(&self, requested: Option<u32>) -> u32 {
        match requested {
            None | Some(0) => self.default_page_size,
            Some(size) => size.min(self.max_page_size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Database file; `None` means in-memory.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory; `None` leaves logging uninitialized.
    pub log_dir: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub lake_default_page_size: u32,
    pub lake_max_page_size: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            lake_default_page_size: DEFAULT_LAKE_PAGE_SIZE,
            lake_max_page_size: MAX_LAKE_PAGE_SIZE,
        }
    }
}

impl CoreConfig {
    /// Builds a config from `MODELCASCADE_*` environment variables over the
    /// defaults.
    ///
    /// # Errors
    /// - Returns `InvalidValue` when a numeric variable does not parse or the
    ///   result fails [`CoreConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`CoreConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name).and_then(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        };

        let mut config = Self::default();
        if let Some(path) = var("MODELCASCADE_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(level) = var("MODELCASCADE_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(dir) = var("MODELCASCADE_LOG_DIR") {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = var("MODELCASCADE_BUSY_TIMEOUT_MS") {
            config.busy_timeout_ms = parse_number("MODELCASCADE_BUSY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("MODELCASCADE_LAKE_DEFAULT_PAGE_SIZE") {
            config.lake_default_page_size =
                parse_number("MODELCASCADE_LAKE_DEFAULT_PAGE_SIZE", &value)?;
        }
        if let Some(value) = var("MODELCASCADE_LAKE_MAX_PAGE_SIZE") {
            config.lake_max_page_size = parse_number("MODELCASCADE_LAKE_MAX_PAGE_SIZE", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "busy_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.lake_default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "lake_default_page_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.lake_max_page_size < self.lake_default_page_size {
            return Err(ConfigError::InvalidValue {
                name: "lake_max_page_size",
                reason: format!(
                    "{} is below lake_default_page_size {}",
                    self.lake_max_page_size, self.lake_default_page_size
                ),
            });
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    name: "log_dir",
                    reason: format!("must be absolute, got `{}`", dir.display()),
                });
            }
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.lake_default_page_size,
            max_page_size: self.lake_max_page_size,
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|err| ConfigError::InvalidValue {
        name,
        reason: format!("`{value}` is not a number: {err}"),
    })
}
