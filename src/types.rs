// =============================================================================
// Shared types used across the dashboard service
// =============================================================================

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Coarse look-back period understood by the market-data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "max")]
    Max,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Self::OneDay,
        Self::FiveDays,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::FiveYears,
        Self::Max,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::FiveYears => "5y",
            Self::Max => "max",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|tf| tf.as_str() == wanted)
            .ok_or_else(|| QueryError::UnknownTimeframe(s.trim().to_string()))
    }
}

/// A toggleable dashboard section. Ordering follows the page layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "Historical Trends")]
    HistoricalTrends,
    #[serde(rename = "Trading Volume")]
    TradingVolume,
    #[serde(rename = "Moving Averages")]
    MovingAverages,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "Volatility")]
    Volatility,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Self::HistoricalTrends,
        Self::TradingVolume,
        Self::MovingAverages,
        Self::Rsi,
        Self::Volatility,
    ];

    /// Label shown in the feature picker.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::HistoricalTrends => "Historical Trends",
            Self::TradingVolume => "Trading Volume",
            Self::MovingAverages => "Moving Averages",
            Self::Rsi => "RSI",
            Self::Volatility => "Volatility",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Feature {
    type Err = QueryError;

    /// Accepts the display name case-insensitively, with spaces, dashes or
    /// underscores as separators ("moving-averages", "Moving Averages").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = |name: &str| -> String {
            name.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect()
        };
        let wanted = key(s);
        Self::ALL
            .into_iter()
            .find(|f| key(f.display_name()) == wanted)
            .ok_or_else(|| QueryError::UnknownFeature(s.trim().to_string()))
    }
}

pub type FeatureSet = BTreeSet<Feature>;

/// Sections enabled on a fresh dashboard.
pub fn default_features() -> FeatureSet {
    [
        Feature::HistoricalTrends,
        Feature::TradingVolume,
        Feature::MovingAverages,
    ]
    .into_iter()
    .collect()
}

/// Parse a comma-separated feature list. Blank entries are ignored, so an
/// empty string yields an empty set.
pub fn parse_features(list: &str) -> Result<FeatureSet, QueryError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Feature::from_str)
        .collect()
}

/// Which slice of history to fetch.
///
/// Deserialisation goes through [`QueryWindow::range`], so an empty range is
/// rejected wherever a window arrives as JSON (events, request bodies, the
/// config file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", try_from = "RawQueryWindow")]
pub enum QueryWindow {
    /// Explicit calendar range. `end` is exclusive; `None` means "up to now".
    Range {
        start: NaiveDate,
        end: Option<NaiveDate>,
    },
    /// Coarse period ending now.
    Period { timeframe: Timeframe },
}

/// Unchecked wire form of `QueryWindow`.
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawQueryWindow {
    Range {
        start: NaiveDate,
        #[serde(default)]
        end: Option<NaiveDate>,
    },
    Period {
        timeframe: Timeframe,
    },
}

impl TryFrom<RawQueryWindow> for QueryWindow {
    type Error = QueryError;

    fn try_from(raw: RawQueryWindow) -> Result<Self, Self::Error> {
        match raw {
            RawQueryWindow::Range { start, end } => Self::range(start, end),
            RawQueryWindow::Period { timeframe } => Ok(Self::Period { timeframe }),
        }
    }
}

impl QueryWindow {
    /// Build a validated date range.
    pub fn range(start: NaiveDate, end: Option<NaiveDate>) -> Result<Self, QueryError> {
        if let Some(end) = end {
            if start >= end {
                return Err(QueryError::EmptyRange {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        Ok(Self::Range { start, end })
    }
}

impl std::fmt::Display for QueryWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Range {
                start,
                end: Some(end),
            } => write!(f, "{start}..{end}"),
            Self::Range { start, end: None } => write!(f, "{start}..now"),
            Self::Period { timeframe } => write!(f, "{timeframe}"),
        }
    }
}

/// Parse a `YYYY-MM-DD` date, naming the offending field on failure.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, QueryError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| QueryError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Canonical ticker form: trimmed and upper-cased.
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}
