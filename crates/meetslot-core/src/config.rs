//! Engine configuration.
//!
//! All heuristic constants live here rather than inline: business
//! hours, duration limits, fetch concurrency, cache TTL, and the
//! validation scoring rubric. Persisted as TOML under the platform
//! config directory.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::interval::BusinessHours;

/// Scoring rubric for the validation loop. The penalties and the
/// acceptance threshold are heuristics, kept configurable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Total attempts before giving up.
    pub max_attempts: usize,
    /// Minimum score that terminates the loop immediately.
    pub accept_threshold: f64,
    /// Extra penalty per failed critical (time/format) check.
    pub critical_penalty: f64,
    /// Extra penalty per other failed check.
    pub minor_penalty: f64,
    /// Allowed deviation from the requested duration, in minutes.
    pub duration_tolerance_minutes: i64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            accept_threshold: 95.0,
            critical_penalty: 10.0,
            minor_penalty: 5.0,
            duration_tolerance_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub business_hours: BusinessHours,
    /// Hour of day used by the deterministic fallback slot.
    pub fallback_hour: u32,
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub default_duration_minutes: i64,
    /// Weekday an unresolved "flexible" constraint is pinned to during
    /// correction. Stored as a name, e.g. "thursday".
    pub correction_day: String,
    pub cache_ttl_secs: u64,
    pub max_concurrent_fetches: usize,
    pub fetch_timeout_secs: u64,
    pub validation: ValidationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            business_hours: BusinessHours::default(),
            fallback_hour: 10,
            min_duration_minutes: 15,
            max_duration_minutes: 480,
            default_duration_minutes: 30,
            correction_day: "thursday".to_string(),
            cache_ttl_secs: 300,
            max_concurrent_fetches: 5,
            fetch_timeout_secs: 30,
            validation: ValidationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Weekday for the "flexible constraint" correction. Falls back to
    /// Thursday when the configured name does not parse.
    pub fn correction_weekday(&self) -> Weekday {
        Weekday::from_str(&self.correction_day).unwrap_or(Weekday::Thu)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meetslot").join("config.toml"))
    }

    /// Load the persisted config, or defaults if none exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.check()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(path, text).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.business_hours.start_hour >= self.business_hours.end_hour {
            return Err(ConfigError::InvalidValue {
                key: "business_hours".to_string(),
                message: "start_hour must be before end_hour".to_string(),
            });
        }
        if self.min_duration_minutes <= 0 || self.min_duration_minutes > self.max_duration_minutes {
            return Err(ConfigError::InvalidValue {
                key: "min_duration_minutes".to_string(),
                message: "duration range is empty or non-positive".to_string(),
            });
        }
        if self.validation.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "validation.max_attempts".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }
}
