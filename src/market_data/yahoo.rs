// =============================================================================
// Yahoo Finance chart API client
// =============================================================================
//
// Public, unauthenticated endpoint:
//   GET {base_url}/v8/finance/chart/{ticker}?range=1mo&interval=1d
//   GET {base_url}/v8/finance/chart/{ticker}?period1=..&period2=..&interval=1d
//
// Unknown tickers come back as HTTP 404 with a `chart.error` object; that
// object is surfaced verbatim so the user sees the vendor's explanation.
// =============================================================================

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::market_data::{MarketDataSource, PriceBar, PriceSeries};
use crate::types::QueryWindow;

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// The chart endpoint rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) stock-dashboard";

/// Longest upstream body echoed back in an error message.
const MAX_ERROR_BODY: usize = 256;

// ---------------------------------------------------------------------------
// Response payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the Yahoo Finance chart API.
#[derive(Clone)]
pub struct YahooFinanceClient {
    base_url: Url,
    client: reqwest::Client,
}

impl YahooFinanceClient {
    /// Build a client against `base_url` (no trailing slash needed) with a
    /// per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for Yahoo Finance")?;

        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid Yahoo Finance base URL '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            bail!("Yahoo Finance base URL '{base_url}' cannot carry a path");
        }
        debug!(base_url = %base_url, "YahooFinanceClient initialised");

        Ok(Self { base_url, client })
    }

    /// Full request URL for `ticker` over `window`.
    ///
    /// The ticker is a single escaped path segment; `/`, `?` and `#` in user
    /// input cannot change the endpoint or the query.
    fn chart_url(&self, ticker: &str, window: &QueryWindow) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL can carry a path.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v8", "finance", "chart"])
                .push(ticker);
        }

        {
            let mut query = url.query_pairs_mut();
            match window {
                QueryWindow::Period { timeframe } => {
                    query.append_pair("range", timeframe.as_str());
                }
                QueryWindow::Range { start, end } => {
                    let period2 = end
                        .map(midnight_utc)
                        .unwrap_or_else(|| Utc::now().timestamp());
                    query
                        .append_pair("period1", &midnight_utc(*start).to_string())
                        .append_pair("period2", &period2.to_string());
                }
            }
            query
                .append_pair("interval", "1d")
                .append_pair("includePrePost", "false");
        }
        url
    }

    /// GET the chart for `ticker` and convert it into a validated series.
    #[instrument(skip(self), name = "yahoo::fetch_chart")]
    pub async fn fetch_chart(
        &self,
        ticker: &str,
        window: &QueryWindow,
    ) -> Result<PriceSeries, FetchError> {
        if ticker.trim().is_empty() {
            return Err(FetchError::EmptyTicker);
        }

        let url = self.chart_url(ticker, window);
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            // 404 for unknown symbols still carries a structured error.
            if let Ok(envelope) = serde_json::from_str::<ChartEnvelope>(&body) {
                if let Some(err) = envelope.chart.error {
                    warn!(ticker, code = %err.code, "chart request rejected upstream");
                    return Err(FetchError::Upstream {
                        code: err.code,
                        description: err.description,
                    });
                }
            }
            warn!(ticker, status = status.as_u16(), "chart request failed");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let series = parse_chart(ticker, &body)?;
        debug!(ticker, rows = series.len(), "chart fetched");
        Ok(series)
    }
}

#[async_trait]
impl MarketDataSource for YahooFinanceClient {
    async fn fetch(&self, ticker: &str, window: &QueryWindow) -> Result<PriceSeries, FetchError> {
        self.fetch_chart(ticker, window).await
    }
}

impl std::fmt::Debug for YahooFinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooFinanceClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Convert a chart payload into a `PriceSeries`.
///
/// Rows with any null OHLCV field are skipped (Yahoo emits them for halted
/// sessions). Rows are sorted and de-duplicated by timestamp before the
/// series invariants are checked. A result without timestamps is a valid,
/// empty series: the ticker exists but had no trading in the window.
fn parse_chart(ticker: &str, body: &str) -> Result<PriceSeries, FetchError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    if let Some(err) = envelope.chart.error {
        return Err(FetchError::Upstream {
            code: err.code,
            description: err.description,
        });
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FetchError::NoData(ticker.to_string()))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut skipped = 0usize;
    for (i, &ts) in timestamps.iter().enumerate() {
        let row = (
            DateTime::from_timestamp(ts, 0),
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
            quote.volume.get(i).copied().flatten(),
        );
        match row {
            (Some(t), Some(o), Some(h), Some(l), Some(c), Some(v)) => {
                bars.push(PriceBar::new(t, o, h, l, c, v));
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(ticker, skipped, "skipped incomplete chart rows");
    }

    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);

    Ok(PriceSeries::new(bars)?)
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

/// UNIX seconds of `date` at 00:00 UTC.
fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timeframe;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "AAPL", "regularMarketPrice": 190.0 },
                "timestamp": [1704205800, 1704292200, 1704378600, 1704292200],
                "indicators": {
                    "quote": [{
                        "open":   [187.15, 184.22, null,   184.22],
                        "high":   [188.44, 185.88, 183.09, 185.88],
                        "low":    [183.89, 183.43, 180.88, 183.43],
                        "close":  [185.64, 184.25, 181.91, 184.25],
                        "volume": [82488700, 58414500, 71983600, 58414500]
                    }],
                    "adjclose": [{ "adjclose": [185.0, 184.0, 181.0, 184.0] }]
                }
            }],
            "error": null
        }
    }"#;

    fn client() -> YahooFinanceClient {
        YahooFinanceClient::new("http://localhost:9/", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn parse_skips_null_rows_and_dedups() {
        let series = parse_chart("AAPL", SAMPLE).unwrap();
        // Row 2 has a null open; row 3 duplicates row 1.
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![185.64, 184.25]);
        assert_eq!(series.volumes(), vec![82_488_700, 58_414_500]);
    }

    #[test]
    fn parse_sorts_out_of_order_rows() {
        let body = r#"{"chart":{"result":[{
            "timestamp":[200000, 100000],
            "indicators":{"quote":[{
                "open":[2.0,1.0],"high":[2.0,1.0],"low":[2.0,1.0],
                "close":[2.0,1.0],"volume":[5,6]}]}}],"error":null}}"#;
        let series = parse_chart("X", body).unwrap();
        assert_eq!(series.closes(), vec![1.0, 2.0]);
    }

    #[test]
    fn parse_maps_chart_error_to_upstream() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        match parse_chart("ZZZZ", body) {
            Err(FetchError::Upstream { code, .. }) => assert_eq!(code, "Not Found"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_missing_result_is_no_data() {
        let body = r#"{"chart":{"result":[],"error":null}}"#;
        assert!(matches!(parse_chart("AAPL", body), Err(FetchError::NoData(t)) if t == "AAPL"));
    }

    #[test]
    fn parse_without_timestamps_is_empty_series() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        let series = parse_chart("AAPL", body).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_chart("AAPL", "<html>"),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn parse_rejects_non_positive_prices() {
        let body = r#"{"chart":{"result":[{
            "timestamp":[100000],
            "indicators":{"quote":[{
                "open":[0.0],"high":[1.0],"low":[1.0],"close":[1.0],"volume":[1]}]}}],"error":null}}"#;
        assert!(matches!(
            parse_chart("X", body),
            Err(FetchError::InvalidSeries(_))
        ));
    }

    #[test]
    fn chart_url_for_period() {
        let url = client().chart_url(
            "MSFT",
            &QueryWindow::Period {
                timeframe: Timeframe::SixMonths,
            },
        );
        assert_eq!(
            url.as_str(),
            "http://localhost:9/v8/finance/chart/MSFT?range=6mo&interval=1d&includePrePost=false"
        );
    }

    #[test]
    fn chart_url_escapes_ticker_as_one_segment() {
        let window = QueryWindow::Period {
            timeframe: Timeframe::OneMonth,
        };
        let url = client().chart_url("../../v7/finance/quote?symbols=X#", &window);

        assert!(url.path().starts_with("/v8/finance/chart/"), "{url}");
        assert_eq!(url.path_segments().map(|s| s.count()), Some(4));
        assert_eq!(url.fragment(), None);

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("range".to_string(), "1mo".to_string()),
                ("interval".to_string(), "1d".to_string()),
                ("includePrePost".to_string(), "false".to_string()),
            ]
        );

        let url = client().chart_url("BRK/B", &window);
        assert!(url.path().ends_with("/chart/BRK%2FB"), "{url}");
    }

    #[test]
    fn new_rejects_unusable_base_url() {
        assert!(YahooFinanceClient::new("not a url", Duration::from_secs(1)).is_err());
        assert!(YahooFinanceClient::new("mailto:x@y.z", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn chart_url_for_range_uses_midnight_utc() {
        let window = QueryWindow::Range {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2020, 1, 2),
        };
        let url = client().chart_url("AAPL", &window);
        assert!(
            url.as_str().contains("period1=1577836800&period2=1577923200"),
            "{url}"
        );
    }

    #[tokio::test]
    async fn empty_ticker_fails_without_request() {
        let window = QueryWindow::Period {
            timeframe: Timeframe::OneDay,
        };
        assert!(matches!(
            client().fetch_chart("  ", &window).await,
            Err(FetchError::EmptyTicker)
        ));
    }

    // ── HTTP error paths, against a local server ────────────────────────

    /// Serve every request with `status` and a body built from the request
    /// path, and return a client pointed at it.
    async fn serve<F>(status: axum::http::StatusCode, body: F) -> YahooFinanceClient
    where
        F: Fn(&str) -> String + Clone + Send + Sync + 'static,
    {
        let app = axum::Router::new().fallback(move |uri: axum::http::Uri| {
            let body = body.clone();
            async move { (status, body(uri.path())) }
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        YahooFinanceClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap()
    }

    fn one_month() -> QueryWindow {
        QueryWindow::Period {
            timeframe: Timeframe::OneMonth,
        }
    }

    #[tokio::test]
    async fn not_found_with_chart_error_maps_to_upstream() {
        let client = serve(axum::http::StatusCode::NOT_FOUND, |path| {
            format!(
                r#"{{"chart":{{"result":null,"error":{{"code":"Not Found","description":"{path}"}}}}}}"#
            )
        })
        .await;

        match client.fetch_chart("BRK/B", &one_month()).await {
            Err(FetchError::Upstream { code, description }) => {
                assert_eq!(code, "Not Found");
                // The server saw the escaped ticker on the chart endpoint.
                assert_eq!(description, "/v8/finance/chart/BRK%2FB");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unstructured_error_maps_to_truncated_status() {
        let client = serve(axum::http::StatusCode::INTERNAL_SERVER_ERROR, |_| {
            "x".repeat(MAX_ERROR_BODY + 50)
        })
        .await;

        match client.fetch_chart("AAPL", &one_month()).await {
            Err(FetchError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body.chars().count(), MAX_ERROR_BODY + 1);
                assert!(body.ends_with('…'));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_goes_through_the_trait() {
        let client = serve(axum::http::StatusCode::OK, |_| SAMPLE.to_string()).await;
        let source: &dyn MarketDataSource = &client;
        let series = source.fetch("AAPL", &one_month()).await.unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
