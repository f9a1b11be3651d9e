//! TOML configuration.
//!
//! Resolution order: an explicit `--config FILE`, else
//! `{config_dir}/rebaselab/config.toml` when it exists, else defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use rebaselab_core::data::{lookback_window, CircuitBreaker, RetryPolicy};
use rebaselab_core::AlignPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::DEFAULT_EXPORT_FILE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Benchmark index appended after the user's symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchmarkConfig {
    pub symbol: String,
    pub label: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            symbol: "^GSPC".into(),
            label: "S&P500".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub breaker_threshold: u32,
    pub breaker_cooldown_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            timeout_secs: 30,
            breaker_threshold: 3,
            breaker_cooldown_secs: 30 * 60,
        }
    }
}

impl ProviderConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(
            self.breaker_threshold,
            Duration::from_secs(self.breaker_cooldown_secs),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RebaseConfig {
    pub cache_dir: PathBuf,
    pub lookback_years: u32,
    pub export_file: String,
    pub align: AlignPolicy,
    pub parallel: bool,
    pub benchmark: BenchmarkConfig,
    pub provider: ProviderConfig,
}

impl Default for RebaseConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data"),
            lookback_years: 10,
            export_file: DEFAULT_EXPORT_FILE.into(),
            align: AlignPolicy::Intersection,
            parallel: false,
            benchmark: BenchmarkConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl RebaseConfig {
    /// `{config_dir}/rebaselab/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("rebaselab").join("config.toml"))
    }

    /// Load from `explicit`, else the default path when present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(format!("serialize: {e}")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_years == 0 {
            return Err(ConfigError::Invalid("lookback_years must be at least 1".into()));
        }
        if self.benchmark.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("benchmark.symbol must not be empty".into()));
        }
        if self.benchmark.label.trim().is_empty() {
            return Err(ConfigError::Invalid("benchmark.label must not be empty".into()));
        }
        if self.export_file.trim().is_empty() {
            return Err(ConfigError::Invalid("export_file must not be empty".into()));
        }
        Ok(())
    }

    /// The lookback window `[today - 365 * years, today)`.
    pub fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        lookback_window(today, self.lookback_years)
    }

    /// Where exports go by default: the export file inside the cache dir.
    pub fn export_path(&self) -> PathBuf {
        self.cache_dir.join(&self.export_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = RebaseConfig::default();
        assert_eq!(c.cache_dir, PathBuf::from("data"));
        assert_eq!(c.lookback_years, 10);
        assert_eq!(c.export_file, "percent_change_10yr.csv");
        assert_eq!(c.align, AlignPolicy::Intersection);
        assert_eq!(c.benchmark.symbol, "^GSPC");
        assert_eq!(c.benchmark.label, "S&P500");
        assert_eq!(c.provider.max_retries, 3);
        assert_eq!(c.provider.breaker_cooldown_secs, 1800);
    }

    #[test]
    fn empty_toml_is_defaults() {
        assert_eq!(RebaseConfig::from_toml("").unwrap(), RebaseConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let c = RebaseConfig::from_toml(
            r#"
            lookback_years = 5
            align = "forward_fill"

            [benchmark]
            symbol = "^NDX"
            label = "Nasdaq 100"

            [provider]
            max_retries = 1
            "#,
        )
        .unwrap();
        assert_eq!(c.lookback_years, 5);
        assert_eq!(c.align, AlignPolicy::ForwardFill);
        assert_eq!(c.benchmark.label, "Nasdaq 100");
        assert_eq!(c.provider.max_retries, 1);
        assert_eq!(c.provider.base_delay_ms, 500);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            RebaseConfig::from_toml("colour = \"red\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_lookback_rejected() {
        assert!(matches!(
            RebaseConfig::from_toml("lookback_years = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn blank_benchmark_rejected() {
        assert!(RebaseConfig::from_toml("[benchmark]\nsymbol = \"  \"").is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let c = RebaseConfig::default();
        let parsed = RebaseConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn missing_explicit_file_is_read_error() {
        let err = RebaseConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn window_spans_lookback() {
        let c = RebaseConfig::default();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (start, end) = c.window(today);
        assert_eq!(end, today);
        assert_eq!((end - start).num_days(), 3650);
    }

    #[test]
    fn provider_settings_convert() {
        let p = ProviderConfig::default();
        assert_eq!(p.retry_policy().base_delay, Duration::from_millis(500));
        assert!(p.circuit_breaker().is_allowed());
    }
}
