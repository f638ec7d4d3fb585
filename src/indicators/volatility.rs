// =============================================================================
// Rolling Volatility
// =============================================================================
//
// Sample standard deviation of daily returns over a trailing window. Not
// annualised. Because the first return is missing, the first defined value
// sits at index `window` rather than `window - 1`.
// =============================================================================

use super::returns::calculate_daily_returns;
use super::rolling::{rolling, sample_std};

/// Rolling sample standard deviation of the daily returns of `closes`.
pub fn calculate_volatility(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(&calculate_daily_returns(closes), window, sample_std)
}
