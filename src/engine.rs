// =============================================================================
// Indicator Engine: appends derived columns to a price table
// =============================================================================
//
// Stateless: every call recomputes the enabled columns from the immutable
// input series. Column order is fixed (SMAs, RSI, Daily Returns, Volatility)
// so exports and charts are stable whatever order the toggles arrive in.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::{
    calculate_daily_returns, calculate_rsi, calculate_sma, calculate_volatility, sma_column,
    DerivedSeries, DAILY_RETURNS_COLUMN, RSI_COLUMN, VOLATILITY_COLUMN,
};
use crate::market_data::PriceSeries;
use crate::types::{Feature, FeatureSet};

fn default_sma_windows() -> Vec<usize> {
    vec![20, 50, 200]
}

fn default_rsi_window() -> usize {
    14
}

fn default_volatility_window() -> usize {
    20
}

/// Window lengths used by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSettings {
    /// Moving-average windows, one `SMA_<n>` column each.
    #[serde(default = "default_sma_windows")]
    pub sma_windows: Vec<usize>,

    #[serde(default = "default_rsi_window")]
    pub rsi_window: usize,

    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            sma_windows: default_sma_windows(),
            rsi_window: default_rsi_window(),
            volatility_window: default_volatility_window(),
        }
    }
}

/// A price series together with the indicator columns derived from it.
#[derive(Debug, Clone)]
pub struct AugmentedTable<'a> {
    series: &'a PriceSeries,
    columns: Vec<DerivedSeries>,
}

impl<'a> AugmentedTable<'a> {
    pub fn series(&self) -> &'a PriceSeries {
        self.series
    }

    pub fn columns(&self) -> &[DerivedSeries] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&DerivedSeries> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    settings: IndicatorSettings,
}

impl IndicatorEngine {
    pub fn new(settings: IndicatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &IndicatorSettings {
        &self.settings
    }

    /// Derive the columns for every enabled feature.
    ///
    /// Historical Trends and Trading Volume draw raw columns and add nothing.
    pub fn augment<'a>(&self, series: &'a PriceSeries, features: &FeatureSet) -> AugmentedTable<'a> {
        let closes = series.closes();
        let mut columns = Vec::new();

        if features.contains(&Feature::MovingAverages) {
            for &w in &self.settings.sma_windows {
                columns.push(DerivedSeries::new(sma_column(w), calculate_sma(&closes, w)));
            }
        }

        if features.contains(&Feature::Rsi) {
            columns.push(DerivedSeries::new(
                RSI_COLUMN,
                calculate_rsi(&closes, self.settings.rsi_window),
            ));
        }

        if features.contains(&Feature::Volatility) {
            columns.push(DerivedSeries::new(
                DAILY_RETURNS_COLUMN,
                calculate_daily_returns(&closes),
            ));
            columns.push(DerivedSeries::new(
                VOLATILITY_COLUMN,
                calculate_volatility(&closes, self.settings.volatility_window),
            ));
        }

        debug!(
            rows = series.len(),
            columns = columns.len(),
            "indicator columns computed"
        );

        AugmentedTable { series, columns }
    }
}
