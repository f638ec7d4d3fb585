// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
//   SMA_t = (close_{t-n+1} + ... + close_t) / n
//
// Unweighted trailing mean. The dashboard draws 20, 50 and 200-period SMAs on
// top of the close line.
// =============================================================================

use super::rolling::{defined, mean, rolling};

/// Compute the SMA series for `closes` over a trailing `window`.
///
/// Output is aligned with `closes`: entry `i` is defined for
/// `i >= window - 1`. A series shorter than `window` (or `window == 0`)
/// yields an all-missing vector of the same length.
pub fn calculate_sma(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(&defined(closes), window, mean)
}
