use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Dosecycle";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// ~/Dosecycle/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite database location.
pub fn database_path() -> PathBuf {
    app_data_dir().join("dosecycle.db")
}

/// Optional engine configuration file.
pub fn engine_config_path() -> PathBuf {
    app_data_dir().join("engine.json")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,dosecycle_lib=debug"
}

// ═══════════════════════════════════════════════════════════
// Engine configuration
// ═══════════════════════════════════════════════════════════

/// Tunable bounds and thresholds for the dosage engine.
///
/// Every field has a default, so a partial JSON file only overrides
/// what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest accepted dose value in a pattern.
    pub min_dose: Decimal,
    /// Largest accepted dose value in a pattern or a dose log.
    pub max_dose: Decimal,
    pub min_pattern_length: usize,
    pub max_pattern_length: usize,
    /// |actual - expected| above this counts as a variance.
    pub variance_tolerance: Decimal,
    /// Patterns longer than this get an advisory warning.
    pub long_pattern_warning: usize,
    /// Start dates further back than this get an advisory warning.
    pub backdate_warning_days: i64,
    /// Start dates further back than this are rejected.
    pub max_backdate_days: i64,
    /// Dose logs may not be stamped further ahead than this.
    pub max_future_log_days: i64,
    pub max_schedule_days: u32,
    pub max_notes_len: usize,
    pub max_page_size: u32,
    pub busy_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_dose: Decimal::new(1, 1),
            max_dose: Decimal::new(1000, 0),
            min_pattern_length: 1,
            max_pattern_length: 365,
            variance_tolerance: Decimal::new(1, 2),
            long_pattern_warning: 20,
            backdate_warning_days: 7,
            max_backdate_days: 365,
            max_future_log_days: 1,
            max_schedule_days: 365,
            max_notes_len: 500,
            max_page_size: 100,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Upper bound for every day-count setting, about a century.
pub const MAX_CONFIG_DAYS: i64 = 36_500;

impl EngineConfig {
    /// Reject bounds that contradict each other or that date arithmetic
    /// cannot honor. Returns every problem found.
    pub fn check(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.min_dose < Decimal::ZERO {
            problems.push(format!("min_dose {} is negative", self.min_dose));
        }
        if self.min_dose > self.max_dose {
            problems.push(format!("min_dose {} exceeds max_dose {}", self.min_dose, self.max_dose));
        }
        if self.min_pattern_length == 0 {
            problems.push("min_pattern_length must be at least 1".to_string());
        }
        if self.min_pattern_length > self.max_pattern_length {
            problems.push(format!(
                "min_pattern_length {} exceeds max_pattern_length {}",
                self.min_pattern_length, self.max_pattern_length
            ));
        }
        if self.variance_tolerance < Decimal::ZERO {
            problems.push(format!("variance_tolerance {} is negative", self.variance_tolerance));
        }

        for (name, value) in [
            ("backdate_warning_days", self.backdate_warning_days),
            ("max_backdate_days", self.max_backdate_days),
            ("max_future_log_days", self.max_future_log_days),
        ] {
            if !(0..=MAX_CONFIG_DAYS).contains(&value) {
                problems.push(format!("{name} {value} must be between 0 and {MAX_CONFIG_DAYS}"));
            }
        }
        if self.max_schedule_days == 0 || i64::from(self.max_schedule_days) > MAX_CONFIG_DAYS {
            problems.push(format!(
                "max_schedule_days {} must be between 1 and {MAX_CONFIG_DAYS}",
                self.max_schedule_days
            ));
        }
        if self.max_page_size == 0 {
            problems.push("max_page_size must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid config {path}: {}", .problems.join("; "))]
    Invalid { path: PathBuf, problems: Vec<String> },
}

/// Load engine configuration from a JSON file. A missing file yields defaults.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No engine config file, using defaults");
        return Ok(EngineConfig::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: EngineConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.check().map_err(|problems| ConfigError::Invalid {
        path: path.to_path_buf(),
        problems,
    })?;
    tracing::info!(path = %path.display(), "Loaded engine config");
    Ok(config)
}
