// =============================================================================
// Daily Return
// =============================================================================
//
//   r_t = (close_t - close_{t-1}) / close_{t-1}
//
// The first entry has no predecessor and is missing. A zero previous close
// gives a missing entry, never an error.

/// Period-over-period percentage change of `closes` (as a fraction).
pub fn calculate_daily_returns(closes: &[f64]) -> Vec<Option<f64>> {
    if closes.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(closes.len());
    out.push(None);
    out.extend(closes.windows(2).map(|w| {
        let (prev, cur) = (w[0], w[1]);
        if prev == 0.0 {
            return None;
        }
        let r = (cur - prev) / prev;
        r.is_finite().then_some(r)
    }));
    out
}
