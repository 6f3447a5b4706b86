// crates/refdict-config/src/lib.rs
// ============================================================================
// Module: Refdict Config Library
// Description: Canonical TOML configuration model with strict load guards.
// Purpose: Validate deployment settings before any engine is wired.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with fail-closed guards: path
//! and component length bounds, a file size cap, UTF-8 only, and unknown
//! keys rejected. Every numeric setting is range-validated so the engines
//! never see a nonsensical window or pool size. A missing file is not an
//! error path: `load(None)` yields the documented defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted configuration file size, in bytes.
pub const MAX_CONFIG_BYTES: usize = 1024 * 1024;
/// Maximum accepted total path length.
const MAX_PATH_LENGTH: usize = 4096;
/// Maximum accepted length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The path exceeds the accepted total length.
    #[error("config path exceeds max length ({actual} > {max})")]
    PathTooLong {
        /// Maximum accepted length.
        max: usize,
        /// Actual path length.
        actual: usize,
    },
    /// One path component exceeds the accepted length.
    #[error("config path component too long: '{component}'")]
    PathComponentTooLong {
        /// The offending component, truncated for display.
        component: String,
    },
    /// The file exceeds the accepted size.
    #[error("config file exceeds size limit ({actual} > {max})")]
    FileTooLarge {
        /// Maximum accepted size in bytes.
        max: usize,
        /// Actual size in bytes.
        actual: usize,
    },
    /// The file is not valid UTF-8.
    #[error("config file is not valid utf-8")]
    NotUtf8,
    /// Reading the file failed.
    #[error("config io error: {0}")]
    Io(String),
    /// Parsing the TOML document failed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A setting is outside its accepted range.
    #[error("config value out of range: {field} = {value} (accepted {min}..={max})")]
    OutOfRange {
        /// Dotted setting name.
        field: &'static str,
        /// Rejected value.
        value: u64,
        /// Minimum accepted value.
        min: u64,
        /// Maximum accepted value.
        max: u64,
    },
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Notification aggregation settings.
///
/// # Invariants
/// - `window_secs` is within `[1, 86_400]` after validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NotificationsConfig {
    /// Aggregation window length in seconds.
    pub window_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            window_secs: 3_600,
        }
    }
}

/// Task execution settings.
///
/// # Invariants
/// - `workers` is within `[1, 64]` and `queue_capacity` within
///   `[1, 10_000]` after validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TasksConfig {
    /// Worker pool size.
    pub workers: u64,
    /// Bounded queue capacity.
    pub queue_capacity: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
        }
    }
}

/// Engine-wide limits.
///
/// # Invariants
/// - `max_name_len` is within `[1, 4_096]` and `max_batch_size` within
///   `[1, 100_000]` after validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LimitsConfig {
    /// Maximum accepted document name length.
    pub max_name_len: u64,
    /// Maximum accepted rule mutation batch size.
    pub max_batch_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_name_len: 255,
            max_batch_size: 1_000,
        }
    }
}

// ============================================================================
// SECTION: Config Root
// ============================================================================

/// Root configuration document.
///
/// # Invariants
/// - Unknown keys are rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RefdictConfig {
    /// Notification aggregation settings.
    pub notifications: NotificationsConfig,
    /// Task execution settings.
    pub tasks: TasksConfig,
    /// Engine-wide limits.
    pub limits: LimitsConfig,
}

impl RefdictConfig {
    /// Loads and validates a configuration file.
    ///
    /// `None` yields the validated defaults without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for guard violations, parse failures, or
    /// out-of-range settings.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        };
        check_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_BYTES {
            return Err(ConfigError::FileTooLarge {
                max: MAX_CONFIG_BYTES,
                actual: bytes.len(),
            });
        }
        let text = String::from_utf8(bytes).map_err(|_| ConfigError::NotUtf8)?;
        let config: Self =
            toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every setting against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] naming the offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("notifications.window_secs", self.notifications.window_secs, 1, 86_400)?;
        check_range("tasks.workers", self.tasks.workers, 1, 64)?;
        check_range("tasks.queue_capacity", self.tasks.queue_capacity, 1, 10_000)?;
        check_range("limits.max_name_len", self.limits.max_name_len, 1, 4_096)?;
        check_range("limits.max_batch_size", self.limits.max_batch_size, 1, 100_000)?;
        Ok(())
    }

    /// Returns the aggregation window in milliseconds.
    #[must_use]
    pub fn window_millis(&self) -> i64 {
        i64::try_from(self.notifications.window_secs).unwrap_or(i64::MAX).saturating_mul(1_000)
    }
}

// ============================================================================
// SECTION: Guards
// ============================================================================

/// Validates path length bounds before any filesystem access.
fn check_path(path: &Path) -> Result<(), ConfigError> {
    let rendered = path.to_string_lossy();
    if rendered.len() > MAX_PATH_LENGTH {
        return Err(ConfigError::PathTooLong {
            max: MAX_PATH_LENGTH,
            actual: rendered.len(),
        });
    }
    for component in path.components() {
        let component = component.as_os_str().to_string_lossy();
        if component.len() > MAX_PATH_COMPONENT_LENGTH {
            let truncated: String = component.chars().take(32).collect();
            return Err(ConfigError::PathComponentTooLong {
                component: truncated,
            });
        }
    }
    Ok(())
}

/// Validates one numeric setting against its range.
fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
