// =============================================================================
// Dashboard View Model
// =============================================================================
//
// `render(config, data)` is a pure function from the user's options and the
// fetched price data to everything a front end needs to draw the page:
// metric, chart sections, notices and the export descriptor. It never fetches
// and never fails; problems become notices and the rest of the page still
// renders.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{AugmentedTable, IndicatorEngine};
use crate::export;
use crate::indicators::{rsi_zone, sma_column, RSI_COLUMN, VOLATILITY_COLUMN};
use crate::market_data::PriceSeries;
use crate::runtime_config::DashboardConfig;
use crate::types::Feature;

pub const DASHBOARD_TITLE: &str = "Enhanced Stock Trading Dashboard";
const DASHBOARD_SUBTITLE: &str =
    "Analyze and customize stock trends, indicators, and charts for informed decision-making.";

const PRICE_CAPTION: &str = "X-axis: Time | Y-axis: Price ($)";
const VOLUME_CAPTION: &str = "X-axis: Time | Y-axis: Volume";
const RSI_CAPTION: &str = "X-axis: Time | Y-axis: RSI";
const VOLATILITY_CAPTION: &str = "X-axis: Time | Y-axis: Volatility";

// =============================================================================
// Input
// =============================================================================

/// Result of fetching one ticker.
#[derive(Debug, Clone, PartialEq)]
pub enum DataOutcome {
    /// No fetch has been attempted yet.
    NotRequested,
    Loaded(PriceSeries),
    /// User-facing failure message.
    Failed(String),
}

impl DataOutcome {
    pub fn series(&self) -> Option<&PriceSeries> {
        match self {
            Self::Loaded(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonData {
    pub ticker: String,
    pub outcome: DataOutcome,
}

/// Everything fetched for one render.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardData {
    pub primary: DataOutcome,
    pub comparisons: Vec<ComparisonData>,
}

impl Default for DashboardData {
    fn default() -> Self {
        Self {
            primary: DataOutcome::NotRequested,
            comparisons: Vec::new(),
        }
    }
}

// =============================================================================
// Output
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLine {
    pub name: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeBar {
    pub time: DateTime<Utc>,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One block of the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Section {
    LineChart {
        title: String,
        caption: String,
        lines: Vec<ChartLine>,
    },
    BarChart {
        title: String,
        caption: String,
        bars: Vec<VolumeBar>,
    },
    Candlestick {
        title: String,
        candles: Vec<Candle>,
    },
}

impl Section {
    pub fn title(&self) -> &str {
        match self {
            Self::LineChart { title, .. }
            | Self::BarChart { title, .. }
            | Self::Candlestick { title, .. } => title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }
}

/// Latest-price headline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMetric {
    pub heading: String,
    pub label: &'static str,
    pub value: f64,
    pub display: String,
}

/// What the download button offers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportDescriptor {
    pub file_name: String,
    pub mime: &'static str,
    pub columns: Vec<String>,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub ticker: String,
    pub window: String,
    pub metric: Option<PriceMetric>,
    pub sections: Vec<Section>,
    pub notices: Vec<Notice>,
    pub export: Option<ExportDescriptor>,
}

impl DashboardView {
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title() == title)
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Render with the default indicator windows.
pub fn render(config: &DashboardConfig, data: &DashboardData) -> DashboardView {
    render_with(&IndicatorEngine::default(), config, data)
}

/// Render using `engine`'s indicator windows.
pub fn render_with(
    engine: &IndicatorEngine,
    config: &DashboardConfig,
    data: &DashboardData,
) -> DashboardView {
    let mut view = DashboardView {
        title: DASHBOARD_TITLE,
        subtitle: DASHBOARD_SUBTITLE,
        ticker: config.ticker.clone(),
        window: config.window.to_string(),
        metric: None,
        sections: Vec::new(),
        notices: Vec::new(),
        export: None,
    };

    let series = match &data.primary {
        DataOutcome::Loaded(series) => series,
        DataOutcome::Failed(message) => {
            view.notices.push(Notice::error(message.clone()));
            return view;
        }
        DataOutcome::NotRequested => {
            view.notices.push(Notice::info("No data loaded yet."));
            return view;
        }
    };

    match series.latest_close() {
        Some(price) => {
            view.metric = Some(PriceMetric {
                heading: format!("Current Stock Price: {}", config.ticker),
                label: "Price",
                value: price,
                display: format!("${price:.2}"),
            })
        }
        None => view
            .notices
            .push(Notice::error("Error calculating current price.")),
    }

    let table = engine.augment(series, &config.features);
    let features = &config.features;

    if features.contains(&Feature::HistoricalTrends) {
        view.sections.push(Section::LineChart {
            title: "Historical Stock Trends".into(),
            caption: PRICE_CAPTION.into(),
            lines: vec![close_line("Close", series)],
        });
    }

    if features.contains(&Feature::TradingVolume) {
        view.sections.push(Section::BarChart {
            title: "Trading Volume".into(),
            caption: VOLUME_CAPTION.into(),
            bars: series
                .bars()
                .iter()
                .map(|b| VolumeBar {
                    time: b.timestamp,
                    volume: b.volume,
                })
                .collect(),
        });
    }

    if features.contains(&Feature::MovingAverages) {
        let mut lines = vec![close_line("Close", series)];
        lines.extend(
            engine
                .settings()
                .sma_windows
                .iter()
                .filter_map(|&w| derived_line(&table, &sma_column(w))),
        );
        view.sections.push(Section::LineChart {
            title: "Simple Moving Averages (SMA)".into(),
            caption: PRICE_CAPTION.into(),
            lines,
        });
    }

    if features.contains(&Feature::Rsi) {
        let caption = match table.column(RSI_COLUMN).and_then(|c| c.latest()) {
            Some(v) => format!("{RSI_CAPTION} | Latest: {v:.2} ({})", rsi_zone(v)),
            None => RSI_CAPTION.to_string(),
        };
        view.sections.push(Section::LineChart {
            title: "Relative Strength Index (RSI)".into(),
            caption,
            lines: derived_line(&table, RSI_COLUMN).into_iter().collect(),
        });
    }

    if features.contains(&Feature::Volatility) {
        view.sections.push(Section::LineChart {
            title: "Volatility (Standard Deviation of Returns)".into(),
            caption: VOLATILITY_CAPTION.into(),
            lines: derived_line(&table, VOLATILITY_COLUMN).into_iter().collect(),
        });
    }

    view.sections.push(Section::Candlestick {
        title: "Candlestick Chart".into(),
        candles: series
            .bars()
            .iter()
            .map(|b| Candle {
                time: b.timestamp,
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
            })
            .collect(),
    });

    if !data.comparisons.is_empty() {
        let mut lines = vec![close_line(&config.ticker, series)];
        for cmp in &data.comparisons {
            match &cmp.outcome {
                DataOutcome::Loaded(s) => lines.push(close_line(&cmp.ticker, s)),
                DataOutcome::Failed(message) => view.notices.push(Notice::error(message.clone())),
                DataOutcome::NotRequested => {}
            }
        }
        view.sections.push(Section::LineChart {
            title: "Stock Comparison".into(),
            caption: PRICE_CAPTION.into(),
            lines,
        });
    }

    view.export = Some(ExportDescriptor {
        file_name: export::file_name(&config.ticker),
        mime: "text/csv",
        columns: export::header(&table),
        rows: series.len(),
    });

    view
}

fn close_line(name: &str, series: &PriceSeries) -> ChartLine {
    ChartLine {
        name: name.to_string(),
        points: series
            .bars()
            .iter()
            .map(|b| ChartPoint {
                time: b.timestamp,
                value: Some(b.close),
            })
            .collect(),
    }
}

fn derived_line(table: &AugmentedTable<'_>, column: &str) -> Option<ChartLine> {
    let derived = table.column(column)?;
    let points = table
        .series()
        .bars()
        .iter()
        .zip(&derived.values)
        .map(|(b, v)| ChartPoint {
            time: b.timestamp,
            value: *v,
        })
        .collect();
    Some(ChartLine {
        name: derived.name.clone(),
        points,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::series::fixtures::series_from_closes;
    use crate::types::FeatureSet;

    fn config_with(features: &[Feature]) -> DashboardConfig {
        DashboardConfig {
            features: features.iter().copied().collect(),
            ..DashboardConfig::default()
        }
    }

    fn loaded(closes: &[f64]) -> DashboardData {
        DashboardData {
            primary: DataOutcome::Loaded(series_from_closes(closes)),
            comparisons: Vec::new(),
        }
    }

    fn titles(view: &DashboardView) -> Vec<&str> {
        view.sections.iter().map(Section::title).collect()
    }

    #[test]
    fn default_layout() {
        let view = render(&DashboardConfig::default(), &loaded(&[100.0, 101.0, 102.5]));
        assert_eq!(
            titles(&view),
            vec![
                "Historical Stock Trends",
                "Trading Volume",
                "Simple Moving Averages (SMA)",
                "Candlestick Chart"
            ]
        );
        let metric = view.metric.unwrap();
        assert_eq!(metric.display, "$102.50");
        assert_eq!(metric.heading, "Current Stock Price: AAPL");
        assert!(view.notices.is_empty());

        let export = view.export.unwrap();
        assert_eq!(export.file_name, "AAPL_data.csv");
        assert_eq!(export.rows, 3);
        assert_eq!(export.columns.len(), 9);
    }

    #[test]
    fn every_feature_renders_in_page_order() {
        let view = render(&config_with(&Feature::ALL), &loaded(&[100.0; 25]));
        assert_eq!(
            titles(&view),
            vec![
                "Historical Stock Trends",
                "Trading Volume",
                "Simple Moving Averages (SMA)",
                "Relative Strength Index (RSI)",
                "Volatility (Standard Deviation of Returns)",
                "Candlestick Chart"
            ]
        );
    }

    #[test]
    fn moving_average_section_has_close_and_three_smas() {
        let view = render(&config_with(&[Feature::MovingAverages]), &loaded(&[100.0; 25]));
        let Some(Section::LineChart { lines, .. }) = view.section("Simple Moving Averages (SMA)")
        else {
            panic!("missing SMA section");
        };
        let names: Vec<&str> = lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Close", "SMA_20", "SMA_50", "SMA_200"]);
        assert_eq!(lines[1].points[18].value, None);
        assert_eq!(lines[1].points[19].value, Some(100.0));
    }

    #[test]
    fn rsi_caption_reports_zone() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let view = render(&config_with(&[Feature::Rsi]), &loaded(&closes));
        let Some(Section::LineChart { caption, .. }) = view.section("Relative Strength Index (RSI)")
        else {
            panic!("missing RSI section");
        };
        assert!(caption.ends_with("Latest: 100.00 (OVERBOUGHT)"), "{caption}");
    }

    #[test]
    fn failed_fetch_renders_notice_only() {
        let data = DashboardData {
            primary: DataOutcome::Failed("Failed to retrieve data for ZZZZ: boom".into()),
            comparisons: Vec::new(),
        };
        let view = render(&DashboardConfig::default(), &data);
        assert!(view.sections.is_empty());
        assert!(view.metric.is_none());
        assert!(view.export.is_none());
        assert_eq!(view.notices, vec![Notice::error("Failed to retrieve data for ZZZZ: boom")]);
    }

    #[test]
    fn empty_series_reports_price_error_but_keeps_rendering() {
        let view = render(&DashboardConfig::default(), &loaded(&[]));
        assert!(view.metric.is_none());
        assert_eq!(view.notices, vec![Notice::error("Error calculating current price.")]);
        assert!(view.section("Candlestick Chart").is_some());
        assert_eq!(view.export.unwrap().rows, 0);
    }

    #[test]
    fn not_requested_is_informational() {
        let view = render(&DashboardConfig::default(), &DashboardData::default());
        assert_eq!(view.notices[0].severity, Severity::Info);
    }

    #[test]
    fn comparison_section_collects_loaded_tickers() {
        let mut data = loaded(&[10.0, 11.0]);
        data.comparisons = vec![
            ComparisonData {
                ticker: "MSFT".into(),
                outcome: DataOutcome::Loaded(series_from_closes(&[20.0, 21.0])),
            },
            ComparisonData {
                ticker: "NOPE".into(),
                outcome: DataOutcome::Failed("Failed to retrieve data for NOPE: gone".into()),
            },
        ];
        let config = DashboardConfig {
            comparison: "MSFT,NOPE".into(),
            features: FeatureSet::new(),
            ..DashboardConfig::default()
        };
        let view = render(&config, &data);
        let Some(Section::LineChart { lines, .. }) = view.section("Stock Comparison") else {
            panic!("missing comparison section");
        };
        let names: Vec<&str> = lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["AAPL", "MSFT"]);
        assert_eq!(view.notices.len(), 1);
        assert_eq!(view.notices[0].severity, Severity::Error);
    }

    #[test]
    fn missing_values_serialise_as_null() {
        let view = render(&config_with(&[Feature::Volatility]), &loaded(&[1.0, 2.0]));
        let json = serde_json::to_value(&view).unwrap();
        let section = &json["sections"][0];
        assert_eq!(section["kind"], "line_chart");
        assert!(section["lines"][0]["points"][0]["value"].is_null());
    }
}
