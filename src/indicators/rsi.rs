// =============================================================================
// Relative Strength Index (RSI): rolling simple means
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1: delta_t = close_t - close_{t-1}. The first period has no
//         predecessor and counts as no movement (gain = loss = 0).
// Step 2: gain_t = max(delta_t, 0), loss_t = max(-delta_t, 0).
// Step 3: avg_gain / avg_loss = trailing simple means over `period`
//         (plain rolling means, not Wilder's smoothing).
// Step 4: RS  = avg_gain / avg_loss
//         RSI = 100 - 100 / (1 + RS)
//
// Thresholds:  RSI >= 70 => OVERBOUGHT,  RSI <= 30 => OVERSOLD.
// =============================================================================

use serde::Serialize;

use super::rolling::{mean, rolling};

/// Compute the RSI series for `closes` over `period`.
///
/// Output is aligned with `closes`; entry `i` is defined for
/// `i >= period - 1`.
///
/// # Edge cases
/// - `period == 0` or fewer than `period` closes => all missing.
/// - Average loss zero with some gain => 100.0.
/// - No movement at all in the window => 50.0.
/// - Non-finite results are reported as missing.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if closes.is_empty() {
        return Vec::new();
    }

    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    gains.push(Some(0.0));
    losses.push(Some(0.0));
    for w in closes.windows(2) {
        let delta = w[1] - w[0];
        gains.push(Some(if delta > 0.0 { delta } else { 0.0 }));
        losses.push(Some(if delta < 0.0 { -delta } else { 0.0 }));
    }

    let avg_gain = rolling(&gains, period, mean);
    let avg_loss = rolling(&losses, period, mean);

    avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|pair| match pair {
            (Some(g), Some(l)) => rsi_from_averages(g, l),
            _ => None,
        })
        .collect()
}

/// Qualitative reading of an RSI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsiZone {
    Overbought,
    Neutral,
    Oversold,
}

impl std::fmt::Display for RsiZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overbought => write!(f, "OVERBOUGHT"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Oversold => write!(f, "OVERSOLD"),
        }
    }
}

/// Classify an RSI reading.
pub fn rsi_zone(value: f64) -> RsiZone {
    if value >= 70.0 {
        RsiZone::Overbought
    } else if value <= 30.0 {
        RsiZone::Oversold
    } else {
        RsiZone::Neutral
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - If both averages are zero, RSI is 50.0 (no movement).
/// - If average loss is zero (only gains), RSI is 100.0.
/// - Returns `None` when the result is non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    rsi.is_finite().then_some(rsi)
}
