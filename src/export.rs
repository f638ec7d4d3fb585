// =============================================================================
// CSV export of the augmented price table
// =============================================================================
//
// Layout: `Date,Open,High,Low,Close,Volume,<derived columns...>`, one row per
// bar. Dates are RFC 3339, numbers use the shortest round-trip formatting and
// missing indicator values are empty fields.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::engine::AugmentedTable;

/// Fixed leading columns of every export.
pub const BASE_COLUMNS: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];

/// Header row of `table`'s export.
pub fn header(table: &AugmentedTable<'_>) -> Vec<String> {
    BASE_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(table.columns().iter().map(|c| c.name.clone()))
        .collect()
}

/// Download name offered to the browser, e.g. `AAPL_data.csv`.
pub fn file_name(ticker: &str) -> String {
    format!("{ticker}_data.csv")
}

/// Serialise the whole table as CSV text.
pub fn to_csv(table: &AugmentedTable<'_>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(header(table))
        .context("failed to write CSV header")?;

    for (i, bar) in table.series().bars().iter().enumerate() {
        let mut record = vec![
            bar.timestamp.to_rfc3339(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ];
        record.extend(table.columns().iter().map(|c| {
            c.values
                .get(i)
                .copied()
                .flatten()
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        writer
            .write_record(&record)
            .with_context(|| format!("failed to write CSV row {i}"))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("failed to flush CSV buffer: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// One data row read back from an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub date: DateTime<Utc>,
    /// Every column after `Date`, in header order.
    pub values: Vec<Option<f64>>,
}

/// An export read back into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<ParsedRow>,
}

/// Parse text produced by [`to_csv`].
pub fn parse_csv(text: &str) -> Result<ParsedTable> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let columns: Vec<String> = reader
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();

    if columns.first().map(String::as_str) != Some("Date") {
        anyhow::bail!("CSV header must start with Date, got {columns:?}");
    }

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read CSV row {i}"))?;
        let date = DateTime::parse_from_rfc3339(&record[0])
            .with_context(|| format!("invalid date '{}' in row {i}", &record[0]))?
            .with_timezone(&Utc);
        let values = record
            .iter()
            .skip(1)
            .map(|field| {
                if field.is_empty() {
                    Ok(None)
                } else {
                    field
                        .parse::<f64>()
                        .map(Some)
                        .with_context(|| format!("invalid number '{field}' in row {i}"))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push(ParsedRow { date, values });
    }

    Ok(ParsedTable { columns, rows })
}
