// =============================================================================
// Runtime Configuration: dashboard defaults and service settings
// =============================================================================
//
// `DashboardConfig` is the set of user-facing options (ticker, window,
// feature toggles, comparison list). `ServiceConfig` wraps it with the
// settings of the HTTP service itself and is persisted as JSON.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::IndicatorSettings;
use crate::market_data::yahoo::DEFAULT_BASE_URL;
use crate::types::{default_features, normalize_ticker, FeatureSet, QueryWindow};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_ticker() -> String {
    "AAPL".to_string()
}

/// 2020-01-01 up to now.
fn default_window() -> QueryWindow {
    QueryWindow::Range {
        start: DashboardConfig::default_start(),
        end: None,
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_sessions() -> usize {
    256
}

fn default_request_timeout_secs() -> u64 {
    10
}

// =============================================================================
// DashboardConfig
// =============================================================================

/// User-configurable options of one dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Primary ticker symbol, e.g. "AAPL".
    #[serde(default = "default_ticker")]
    pub ticker: String,

    /// Date range or coarse timeframe to fetch.
    #[serde(default = "default_window")]
    pub window: QueryWindow,

    /// Enabled dashboard sections.
    #[serde(default = "default_features")]
    pub features: FeatureSet,

    /// Comma-separated comparison tickers as typed by the user.
    #[serde(default)]
    pub comparison: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            window: default_window(),
            features: default_features(),
            comparison: String::new(),
        }
    }
}

impl DashboardConfig {
    /// First day of the default date range.
    pub fn default_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
    }

    /// Parsed comparison list: trimmed, upper-cased, de-duplicated, without
    /// blanks and without the primary ticker. Input order is kept.
    pub fn comparison_tickers(&self) -> Vec<String> {
        let primary = normalize_ticker(&self.ticker);
        let mut out: Vec<String> = Vec::new();
        for t in self.comparison.split(',').map(normalize_ticker) {
            if !t.is_empty() && t != primary && !out.contains(&t) {
                out.push(t);
            }
        }
        out
    }
}

/// Partial dashboard options, e.g. the body of a session-create request.
/// Named fields replace the corresponding base value; the rest are kept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardOverrides {
    pub ticker: Option<String>,
    pub window: Option<QueryWindow>,
    pub features: Option<FeatureSet>,
    pub comparison: Option<String>,
}

impl DashboardOverrides {
    pub fn apply_to(self, mut base: DashboardConfig) -> DashboardConfig {
        if let Some(ticker) = self.ticker {
            base.ticker = ticker;
        }
        if let Some(window) = self.window {
            base.window = window;
        }
        if let Some(features) = self.features {
            base.features = features;
        }
        if let Some(comparison) = self.comparison {
            base.comparison = comparison;
        }
        base
    }
}

// =============================================================================
// ServiceConfig
// =============================================================================

/// Top-level settings of the dashboard service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Market-data API host.
    #[serde(default = "default_base_url")]
    pub yahoo_base_url: String,

    /// Per-request timeout for market-data calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Live sessions kept in memory; the oldest is evicted beyond this.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default)]
    pub indicators: IndicatorSettings,

    /// Options a new dashboard starts with.
    #[serde(default)]
    pub defaults: DashboardConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            yahoo_base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_sessions: default_max_sessions(),
            indicators: IndicatorSettings::default(),
            defaults: DashboardConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read service config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse service config from {}", path.display()))?;

        info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            default_ticker = %config.defaults.ticker,
            "service config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise service config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "service config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Feature, Timeframe};

    #[test]
    fn default_dashboard_layout() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.ticker, "AAPL");
        assert_eq!(
            cfg.window,
            QueryWindow::Range {
                start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                end: None
            }
        );
        assert_eq!(cfg.features.len(), 3);
        assert!(!cfg.features.contains(&Feature::Rsi));
        assert!(cfg.comparison_tickers().is_empty());
    }

    #[test]
    fn comparison_list_is_normalised() {
        let cfg = DashboardConfig {
            ticker: "aapl".into(),
            comparison: " msft, tsla,,AAPL ,MSFT, goog ".into(),
            ..DashboardConfig::default()
        };
        assert_eq!(cfg.comparison_tickers(), vec!["MSFT", "TSLA", "GOOG"]);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
        assert_eq!(cfg.max_sessions, 256);
        assert_eq!(cfg.request_timeout_secs, 10);
        assert_eq!(cfg.defaults, DashboardConfig::default());
        assert_eq!(cfg.indicators.rsi_window, 14);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "defaults": {
                "ticker": "TSLA",
                "window": { "kind": "period", "timeframe": "3mo" },
                "features": ["RSI", "Volatility"]
            }
        }"#;
        let cfg: ServiceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.defaults.ticker, "TSLA");
        assert_eq!(
            cfg.defaults.window,
            QueryWindow::Period {
                timeframe: Timeframe::ThreeMonths
            }
        );
        assert_eq!(cfg.defaults.features.len(), 2);
        assert_eq!(cfg.defaults.comparison, "");
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("dashboard-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dashboard_config.json");

        let mut cfg = ServiceConfig::default();
        cfg.defaults.comparison = "MSFT,GOOG".into();
        cfg.max_sessions = 8;
        cfg.save(&path).unwrap();

        let loaded = ServiceConfig::load(&path).unwrap();
        assert_eq!(loaded.defaults, cfg.defaults);
        assert_eq!(loaded.max_sessions, 8);
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn overrides_keep_unnamed_base_fields() {
        let base = DashboardConfig {
            ticker: "TSLA".into(),
            comparison: "MSFT".into(),
            ..DashboardConfig::default()
        };

        let empty: DashboardOverrides = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.apply_to(base.clone()), base);

        let some: DashboardOverrides =
            serde_json::from_str(r#"{"features":["RSI"],"comparison":""}"#).unwrap();
        let cfg = some.apply_to(base);
        assert_eq!(cfg.ticker, "TSLA");
        assert_eq!(cfg.comparison, "");
        assert_eq!(cfg.features, [Feature::Rsi].into());
    }

    #[test]
    fn overrides_reject_unknown_fields_and_empty_ranges() {
        assert!(serde_json::from_str::<DashboardOverrides>(r#"{"tickr":"AAPL"}"#).is_err());
        assert!(serde_json::from_str::<DashboardOverrides>(
            r#"{"window":{"kind":"range","start":"2021-01-01","end":"2020-01-01"}}"#
        )
        .is_err());
    }

    #[test]
    fn load_missing_file_is_error() {
        assert!(ServiceConfig::load("/nonexistent/dashboard_config.json").is_err());
    }
}
