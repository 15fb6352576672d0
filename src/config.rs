//! Service configuration.
//!
//! Layered, lowest precedence first:
//! 1. built-in defaults
//! 2. a TOML file (`riverflow.toml` by default; missing file is fine)
//! 3. environment variables, with `.env` loaded first
//! 4. command line flags (applied by the binary)
//!
//! ```toml
//! source_url = "https://www.wapda.gov.pk/river-flow"
//! threshold_days = 60
//! csv_path = "riverflow.csv"
//! unit_multiplier = 1000
//! text_policy = "reject"        # or "pass_through"
//! boundary_policy = "exclusive" # or "inclusive"
//! fetch_timeout_secs = 10
//! log_level = "info"
//! log_file = "riverflow.log"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ingest::wapda::WAPDA_RIVER_FLOW_URL;
use crate::logging::LogLevel;
use crate::model::{Result, RiverflowError};
use crate::reconcile::{
    BoundaryPolicy, ReconcileSettings, TextPolicy, DEFAULT_THRESHOLD_DAYS,
    DEFAULT_UNIT_MULTIPLIER,
};

pub const DEFAULT_CONFIG_FILE: &str = "riverflow.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiverflowConfig {
    pub source_url: String,
    pub threshold_days: usize,
    pub csv_path: PathBuf,
    pub unit_multiplier: i64,
    pub text_policy: TextPolicy,
    pub boundary_policy: BoundaryPolicy,
    pub fetch_timeout_secs: u64,
    pub log_level: String,
    pub log_file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for RiverflowConfig {
    fn default() -> Self {
        RiverflowConfig {
            source_url: WAPDA_RIVER_FLOW_URL.to_string(),
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            csv_path: PathBuf::from("riverflow.csv"),
            unit_multiplier: DEFAULT_UNIT_MULTIPLIER,
            text_policy: TextPolicy::Reject,
            boundary_policy: BoundaryPolicy::Exclusive,
            fetch_timeout_secs: 10,
            log_level: "info".to_string(),
            log_file: None,
            console_timestamps: false,
        }
    }
}

impl RiverflowConfig {
    /// Parses a TOML document. Absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RiverflowError::Config(e.to_string()))
    }

    /// Reads `path` if it exists, defaults otherwise.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// `load`, a map in tests).
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("RIVERFLOW_URL") {
            self.source_url = url;
        }
        if let Some(csv) = lookup("RIVERFLOW_CSV") {
            self.csv_path = PathBuf::from(csv);
        }
        if let Some(days) = lookup("RIVERFLOW_THRESHOLD_DAYS") {
            self.threshold_days = days.trim().parse().map_err(|_| {
                RiverflowError::Config(format!("RIVERFLOW_THRESHOLD_DAYS is not a number: '{}'", days))
            })?;
        }
        if let Some(log_file) = lookup("RIVERFLOW_LOG_FILE") {
            self.log_file = Some(log_file);
        }
        Ok(self)
    }

    /// Rejects settings the merge cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.threshold_days == 0 {
            return Err(RiverflowError::Config("threshold_days must be at least 1".into()));
        }
        if self.unit_multiplier == 0 {
            return Err(RiverflowError::Config("unit_multiplier must not be 0".into()));
        }
        if self.source_url.trim().is_empty() {
            return Err(RiverflowError::Config("source_url is empty".into()));
        }
        self.min_log_level()?;
        Ok(())
    }

    pub fn min_log_level(&self) -> Result<LogLevel> {
        self.log_level.parse().map_err(RiverflowError::Config)
    }

    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            threshold_days: self.threshold_days,
            unit_multiplier: self.unit_multiplier,
            text_policy: self.text_policy,
            boundary_policy: self.boundary_policy,
        }
    }
}

/// Loads `.env`, the TOML file, and environment overrides, then validates.
pub fn load(config_path: &Path) -> Result<RiverflowConfig> {
    dotenv::dotenv().ok();
    let config = RiverflowConfig::from_file(config_path)?.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
