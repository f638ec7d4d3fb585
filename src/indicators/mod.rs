// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free rolling-window indicators. Every function takes a
// close-price slice and returns a vector aligned 1:1 with it, using `None`
// for periods without enough history. Missing is never reported as zero.

pub mod returns;
pub mod rolling;
pub mod rsi;
pub mod sma;
pub mod volatility;

use serde::Serialize;

pub use returns::calculate_daily_returns;
pub use rsi::{calculate_rsi, rsi_zone, RsiZone};
pub use sma::calculate_sma;
pub use volatility::calculate_volatility;

/// Column name of the RSI series.
pub const RSI_COLUMN: &str = "RSI";
/// Column name of the day-over-day return series.
pub const DAILY_RETURNS_COLUMN: &str = "Daily Returns";
/// Column name of the rolling volatility series.
pub const VOLATILITY_COLUMN: &str = "Volatility";

/// Column name of an SMA series, e.g. `SMA_20`.
pub fn sma_column(window: usize) -> String {
    format!("SMA_{window}")
}

/// A named indicator column aligned with its source price series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedSeries {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl DerivedSeries {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Most recent defined value.
    pub fn latest(&self) -> Option<f64> {
        latest_value(&self.values)
    }
}

/// Last defined entry of an aligned series.
pub fn latest_value(values: &[Option<f64>]) -> Option<f64> {
    values.iter().rev().find_map(|v| *v)
}
