//! Environment configuration via `strata.toml`
//!
//! Every setting has a default, so an empty file (or no file at all) gives
//! a working environment with on-demand garbage collection only.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strata_core::{StrataError, StrataResult};

/// Config file name used by [`EnvironmentConfig::write_default_if_missing`] callers.
pub const CONFIG_FILE_NAME: &str = "strata.toml";

/// Smallest accepted background GC interval
pub const MIN_GC_INTERVAL_MS: u64 = 10;

/// Environment configuration loaded from `strata.toml`.
///
/// # Example
///
/// ```toml
/// # Run a garbage collection pass every 30 seconds
/// gc_interval_ms = 30000
/// gc_on_release = true
/// release_buffer_size = 10
/// snapshot_cache_capacity = 256
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Period of the background GC pass; `None` disables the scheduler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gc_interval_ms: Option<u64>,
    /// Collect right after a retain is released.
    #[serde(default)]
    pub gc_on_release: bool,
    /// Released roots kept retained until this many newer releases happen.
    #[serde(default)]
    pub release_buffer_size: usize,
    /// Selectors remembered by the lookup cache; `0` disables it.
    #[serde(default = "default_snapshot_cache_capacity")]
    pub snapshot_cache_capacity: usize,
}

fn default_snapshot_cache_capacity() -> usize {
    256
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            gc_interval_ms: None,
            gc_on_release: false,
            release_buffer_size: 0,
            snapshot_cache_capacity: default_snapshot_cache_capacity(),
        }
    }
}

impl EnvironmentConfig {
    /// Background GC period, if enabled
    pub fn gc_interval(&self) -> Option<Duration> {
        self.gc_interval_ms.map(Duration::from_millis)
    }

    /// Check values that deserialize fine but make no sense.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if `gc_interval_ms` is below [`MIN_GC_INTERVAL_MS`].
    pub fn validate(&self) -> StrataResult<()> {
        if let Some(interval) = self.gc_interval_ms {
            if interval < MIN_GC_INTERVAL_MS {
                return Err(StrataError::invalid_input(format!(
                    "Invalid gc_interval_ms {} in strata.toml. Expected at least {}.",
                    interval, MIN_GC_INTERVAL_MS
                )));
            }
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Strata graph cache configuration
#
# Background garbage collection period in milliseconds.
# Leave unset to collect only on demand (or on release, see below).
# gc_interval_ms = 30000

# Run a collection pass whenever a retained selector is released (default: false)
gc_on_release = false

# Number of released selectors kept alive before their records become
# collectable (default: 0)
release_buffer_size = 0

# Number of selectors whose last snapshot is kept for structural sharing
# across lookups. 0 disables the cache. (default: 256)
snapshot_cache_capacity = 256
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or fails validation.
    pub fn from_toml_str(content: &str) -> StrataResult<Self> {
        let config: EnvironmentConfig = toml::from_str(content)
            .map_err(|e| StrataError::invalid_input(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> StrataResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrataError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: EnvironmentConfig = toml::from_str(&content).map_err(|e| {
            StrataError::invalid_input(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> StrataResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StrataError::internal(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StrataResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StrataError::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StrataError::internal(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
