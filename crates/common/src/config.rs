use anyhow::{Context, Result};
use serde::Deserialize;
use std::str::FromStr;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "SCORER_CONFIG";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub io: Io,
    pub data_source: DataSource,
    pub ingestion: Ingestion,
    pub scoring: Scoring,
    pub observability: Option<Observability>,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Io {
    pub wallets_path: String,
    /// Simple `wallet_id,score` CSV; detailed and summary files are derived from it.
    pub output_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    Simulated,
    Subgraph,
}

#[derive(Debug, Deserialize)]
pub struct DataSource {
    pub kind: DataSourceKind,
    pub subgraph_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Ingestion {
    pub rate_limit_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Scoring {
    /// Pin the evaluation time (unix seconds) for reproducible runs.
    pub as_of_epoch: Option<i64>,
    #[serde(default = "default_volatile_assets")]
    pub volatile_assets: Vec<String>,
    #[serde(default)]
    pub weights: WeightOverrides,
    #[serde(default)]
    pub thresholds: ThresholdOverrides,
}

fn default_volatile_assets() -> Vec<String> {
    ["ETH", "WETH", "WBTC", "COMP", "UNI"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

/// Per-entry overrides of the scorer's default risk weights. Absent keys keep the default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightOverrides {
    pub liquidation_penalty: Option<f64>,
    pub repayment_bonus_max: Option<f64>,
    pub repayment_penalty_max: Option<f64>,
    pub utilization_penalty_max: Option<f64>,
    pub activity_bonus_max: Option<f64>,
    pub diversification_bonus_max: Option<f64>,
    pub volatility_penalty: Option<f64>,
    pub account_age_bonus: Option<f64>,
    pub recent_activity_bonus: Option<f64>,
    pub dormancy_penalty: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdOverrides {
    pub repayment_neutral_ratio: Option<f64>,
    pub excellent_repayment_ratio: Option<f64>,
    pub high_utilization: Option<f64>,
    pub dormant_activity_frequency: Option<f64>,
    pub frequent_activity_frequency: Option<f64>,
    pub diversification_saturation: Option<u32>,
    pub mature_account_days: Option<f64>,
    pub recent_activity_days: Option<f64>,
    pub dormant_days: Option<f64>,
    pub recent_liquidation_days: Option<f64>,
    pub heavy_volatile_exposure: Option<f64>,
    pub liquidation_penalty_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Observability {
    pub prometheus_port: Option<u16>,
}

impl Config {
    /// Loads from `$SCORER_CONFIG`, falling back to `config/default.toml`.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config file {path}"))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn prometheus_port(&self) -> Option<u16> {
        self.observability.as_ref().and_then(|o| o.prometheus_port)
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[general]
log_level = "info"

[io]
wallets_path = "data/wallets.csv"
output_path = "output/wallet_scores.csv"

[data_source]
kind = "subgraph"
subgraph_url = "https://example.invalid/compound-v2"
request_timeout_secs = 30

[ingestion]
rate_limit_delay_ms = 100
max_retries = 3
backoff_base_ms = 500
max_backoff_ms = 8000

[scoring]
"#;

    #[test]
    fn test_load_default_config() {
        let config = Config::from_toml_str(include_str!("../../../config/default.toml"))
            .unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.data_source.kind, DataSourceKind::Simulated);
        assert_eq!(config.ingestion.max_retries, 3);
        assert!(config.ingestion.rate_limit_delay_ms > 0);
        assert!(config
            .scoring
            .volatile_assets
            .iter()
            .any(|a| a == "WBTC"));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.data_source.kind, DataSourceKind::Subgraph);
        assert!(config.scoring.as_of_epoch.is_none());
        assert!(config.scoring.weights.liquidation_penalty.is_none());
        assert_eq!(config.scoring.volatile_assets, default_volatile_assets());
        assert!(config.prometheus_port().is_none());
    }

    #[test]
    fn test_individual_weight_override() {
        let toml = format!("{MINIMAL}\n[scoring.weights]\nliquidation_penalty = 250.0\n");
        let config = Config::from_toml_str(&toml).unwrap();
        assert_eq!(config.scoring.weights.liquidation_penalty, Some(250.0));
        assert!(config.scoring.weights.volatility_penalty.is_none());
    }

    #[test]
    fn test_unknown_weight_key_is_rejected() {
        let toml = format!("{MINIMAL}\n[scoring.weights]\nhealth_factor_penalty = 150.0\n");
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_load_from_missing_file_has_context() {
        let err = Config::load_from("does/not/exist.toml").unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.toml"));
    }
}
