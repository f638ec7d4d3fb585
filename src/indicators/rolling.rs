// =============================================================================
// Rolling-window primitives
// =============================================================================
//
// A trailing window of `window` entries ends at every index. The output at an
// index is missing when the window does not fit yet (the first `window - 1`
// entries), when any input inside the window is missing, or when the reducer
// itself yields nothing or a non-finite value.

/// Apply `reduce` to every complete trailing window of `values`.
///
/// The output is aligned 1:1 with the input.
pub fn rolling<F>(values: &[Option<f64>], window: usize, reduce: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }

    let mut buf = Vec::with_capacity(window);
    for end in (window - 1)..values.len() {
        buf.clear();
        buf.extend(values[end + 1 - window..=end].iter().flatten().copied());
        if buf.len() == window {
            out[end] = reduce(&buf).filter(|v| v.is_finite());
        }
    }
    out
}

/// Arithmetic mean. The plain sum divided by the count, so a single-element
/// window returns its element unchanged.
pub fn mean(window: &[f64]) -> Option<f64> {
    if window.is_empty() {
        return None;
    }
    Some(window.iter().sum::<f64>() / window.len() as f64)
}

/// Sample standard deviation (divisor `n - 1`); undefined below two points.
pub fn sample_std(window: &[f64]) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let m = mean(window)?;
    let ss: f64 = window.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (window.len() - 1) as f64).sqrt())
}

/// Lift a slice of defined values into the optional form used by `rolling`.
pub fn defined(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_prefix_is_missing() {
        let out = rolling(&defined(&[1.0, 2.0, 3.0, 4.0]), 3, mean);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn rolling_window_zero_or_too_long_is_all_missing() {
        let values = defined(&[1.0, 2.0]);
        assert!(rolling(&values, 0, mean).iter().all(Option::is_none));
        assert!(rolling(&values, 3, mean).iter().all(Option::is_none));
        assert!(rolling(&[], 3, mean).is_empty());
    }

    #[test]
    fn rolling_missing_input_poisons_its_windows() {
        let values = vec![Some(1.0), None, Some(3.0), Some(5.0), Some(7.0)];
        let out = rolling(&values, 2, mean);
        assert_eq!(out, vec![None, None, None, Some(4.0), Some(6.0)]);
    }

    #[test]
    fn rolling_drops_non_finite_results() {
        let out = rolling(&defined(&[1.0, 2.0]), 1, |_| Some(f64::INFINITY));
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn sample_std_known_value() {
        // Sample variance of 2,4,4,4,5,5,7,9 is 32/7.
        let sd = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn sample_std_needs_two_points() {
        assert_eq!(sample_std(&[1.0]), None);
        assert_eq!(sample_std(&[3.0, 3.0]), Some(0.0));
    }
}
