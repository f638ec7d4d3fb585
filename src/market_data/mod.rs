pub mod series;
pub mod source;
pub mod yahoo;

// Re-export the core types for convenient access (e.g. `use crate::market_data::PriceSeries`).
pub use series::{PriceBar, PriceSeries};
pub use source::MarketDataSource;
pub use yahoo::YahooFinanceClient;
