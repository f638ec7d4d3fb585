// =============================================================================
// Market-data source seam
// =============================================================================
//
// The dashboard never talks to a vendor directly. It asks a `MarketDataSource`
// for a validated `PriceSeries`; the Yahoo client is the production
// implementation and tests plug in an in-memory one.
// =============================================================================

use async_trait::async_trait;

use crate::error::FetchError;
use crate::market_data::PriceSeries;
use crate::types::QueryWindow;

/// Anything that can produce a price history for a ticker.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the history of `ticker` over `window`.
    ///
    /// `ticker` is expected in canonical (trimmed, upper-case) form.
    async fn fetch(&self, ticker: &str, window: &QueryWindow) -> Result<PriceSeries, FetchError>;
}
