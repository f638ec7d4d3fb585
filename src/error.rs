// =============================================================================
// Domain error types
// =============================================================================
//
// Typed errors for the data model, the market-data fetch and request-parameter
// parsing. Application plumbing (config files, CSV buffers, startup) keeps
// using `anyhow` with context strings.
// =============================================================================

use thiserror::Error;
use uuid::Uuid;

/// Violations of the `PriceSeries` invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("timestamp at row {index} is not after the previous row")]
    NonIncreasingTimestamp { index: usize },

    #[error("{field} at row {index} must be positive and finite, got {value}")]
    InvalidPrice {
        index: usize,
        field: &'static str,
        value: f64,
    },
}

/// Failure of the market-data collaborator. Every variant is shown to the
/// user as a notice; none of them is fatal.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("ticker symbol is empty")]
    EmptyTicker,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("market data service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{code}: {description}")]
    Upstream { code: String, description: String },

    #[error("no data returned for {0}")]
    NoData(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid price data: {0}")]
    InvalidSeries(#[from] SeriesError),
}

/// Rejected user input (query parameters, event payloads).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("unknown timeframe '{0}' (expected one of 1d, 5d, 1mo, 3mo, 6mo, 1y, 5y, max)")]
    UnknownTimeframe(String),

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("invalid {field} date '{value}' (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },

    #[error("start date {start} must be before end date {end}")]
    EmptyRange { start: String, end: String },

    #[error("'period' cannot be combined with 'start'/'end'")]
    ConflictingWindow,
}

/// Refused write-back of an updated session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionStoreError {
    #[error("session {0} not found")]
    NotFound(Uuid),

    #[error("session {id} was changed by another request (stored revision {stored}, update based on revision {base})")]
    Conflict { id: Uuid, stored: u64, base: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_messages_are_user_facing() {
        let err = FetchError::Upstream {
            code: "Not Found".into(),
            description: "No data found, symbol may be delisted".into(),
        };
        assert_eq!(
            err.to_string(),
            "Not Found: No data found, symbol may be delisted"
        );

        let err: FetchError = SeriesError::NonIncreasingTimestamp { index: 3 }.into();
        assert_eq!(
            err.to_string(),
            "invalid price data: timestamp at row 3 is not after the previous row"
        );
    }

    #[test]
    fn query_error_names_the_bad_value() {
        let err = QueryError::UnknownTimeframe("2w".into());
        assert!(err.to_string().starts_with("unknown timeframe '2w'"));
    }
}
