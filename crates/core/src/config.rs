//! Configuration structures for the idealfit system.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration for a fitting run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Test-point tolerance policy.
    pub tolerance: ToleranceConfig,
    /// Result persistence configuration.
    pub store: StoreConfig,
}

impl Config {
    /// Parse a (possibly partial) JSON document. Missing fields take defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        self.tolerance.validate()?;
        if self.store.database_path.trim().is_empty() {
            return Err(Error::config("store.database_path must not be empty"));
        }
        Ok(())
    }
}

/// How an observation picks among several eligible fitted candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPolicy {
    /// Smallest deviation wins; exact ties keep fit-table order.
    #[default]
    SmallestDeviation,
    /// First eligible entry in fit-table order wins.
    FirstEligible,
}

/// Tolerance applied when classifying observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Factor applied to a fit's maximum deviation to obtain its threshold.
    pub multiplier: f64,
    /// Selection among eligible candidates.
    pub policy: AssignmentPolicy,
}

impl ToleranceConfig {
    /// Eligibility threshold for a fit with the given maximum deviation.
    #[inline]
    pub fn threshold(&self, max_deviation: f64) -> f64 {
        max_deviation * self.multiplier
    }

    /// The multiplier must be a finite non-negative number.
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(Error::config(format!(
                "tolerance.multiplier must be finite and >= 0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            multiplier: std::f64::consts::SQRT_2,
            policy: AssignmentPolicy::SmallestDeviation,
        }
    }
}

/// Result persistence configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub database_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "idealfit.db".to_string(),
        }
    }
}
