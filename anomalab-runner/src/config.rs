//! Scanner configuration file (TOML).
//!
//! Every field has a default, so an empty file (or no file) yields a working
//! configuration. Validation fails fast, before any network activity.

use anomalab_core::fetch::PoolSizeError;
use anomalab_core::limiter::{BudgetError, CallBudget};
use anomalab_core::signals::{SignalConfig, SignalConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("parse config: {0}")]
    Parse(String),

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error(transparent)]
    Pool(#[from] PoolSizeError),

    #[error(transparent)]
    Signal(#[from] SignalConfigError),

    #[error("price_lookback_days must be positive")]
    ZeroLookback,
}

/// Complete scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Root directory for bronze and silver data.
    pub data_root: PathBuf,

    // ── Rate limiting ──
    pub max_calls_per_window: usize,
    pub window_seconds: f64,

    // ── Fetch fan-out ──
    /// Worker pool width. Typically wider than the quota would suggest; the
    /// limiter, not the pool, is the true throttle.
    pub worker_pool_size: usize,

    // ── Ingest windows ──
    /// Calendar days of price history fetched per symbol. Must cover the
    /// longest signal window (252 sessions) plus weekends and holidays.
    pub price_lookback_days: u32,
    pub news_lookback_days: u32,

    // ── Signals ──
    pub signals: SignalConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            max_calls_per_window: 750,
            window_seconds: 60.0,
            worker_pool_size: 8,
            price_lookback_days: 550,
            news_lookback_days: 7,
            signals: SignalConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.call_budget()?;
        if self.worker_pool_size == 0 {
            return Err(PoolSizeError.into());
        }
        if self.price_lookback_days == 0 {
            return Err(ConfigError::ZeroLookback);
        }
        self.signals.validate()?;
        Ok(())
    }

    /// The rate-limit budget this configuration describes.
    pub fn call_budget(&self) -> Result<CallBudget, ConfigError> {
        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(BudgetError::NonPositiveWindow.into());
        }
        Ok(CallBudget::new(
            self.max_calls_per_window,
            Duration::from_secs_f64(self.window_seconds),
        )?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ScanConfig::default();
        assert!(config.validate().is_ok());
        let budget = config.call_budget().unwrap();
        assert_eq!(budget.max_calls(), 750);
        assert_eq!(budget.window(), Duration::from_secs(60));
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = ScanConfig::from_toml("").unwrap();
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn toml_roundtrip() {
        let config = ScanConfig {
            max_calls_per_window: 300,
            worker_pool_size: 16,
            ..ScanConfig::default()
        };
        let toml_str = config.to_toml().unwrap();
        let parsed = ScanConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config = ScanConfig::from_toml(
            r#"
            max_calls_per_window = 10
            [signals]
            z_window = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.max_calls_per_window, 10);
        assert_eq!(config.signals.z_window, 30);
        // Untouched fields keep their defaults.
        assert_eq!(config.worker_pool_size, 8);
        assert_eq!(config.signals.rvol_window, 60);
    }

    #[test]
    fn zero_calls_rejected() {
        let err = ScanConfig::from_toml("max_calls_per_window = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Budget(BudgetError::ZeroCalls)));
    }

    #[test]
    fn non_positive_window_rejected() {
        let err = ScanConfig::from_toml("window_seconds = 0.0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Budget(BudgetError::NonPositiveWindow)
        ));
        let err = ScanConfig::from_toml("window_seconds = -5.0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Budget(BudgetError::NonPositiveWindow)
        ));
    }

    #[test]
    fn zero_workers_rejected() {
        let err = ScanConfig::from_toml("worker_pool_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Pool(_)));
    }

    #[test]
    fn bad_ma_order_rejected() {
        let err = ScanConfig::from_toml(
            r#"
            [signals]
            ma_short = 200
            ma_long = 50
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Signal(SignalConfigError::MaOrder)));
    }
}
