//! Population-relative min-max scaling

/// Spans at or below this are treated as constant
const CONSTANT_SPAN: f64 = 1e-8;

/// Scale to [0, 1] using the observed min and max; a constant column maps to 0
pub fn minmax(values: &[f64]) -> Vec<f64> {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = hi - lo;
    if values.is_empty() || span.abs() <= CONSTANT_SPAN {
        if !values.is_empty() {
            log::debug!("constant column (value {}) normalised to zeros", lo);
        }
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - lo) / span).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_minmax_spans_unit_interval() {
        let scaled = minmax(&[1.0, 12.0, 3.0]);
        assert_eq!(scaled[0], 0.0);
        assert_eq!(scaled[1], 1.0);
        assert_abs_diff_eq!(scaled[2], 2.0 / 11.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_column_is_zero() {
        assert_eq!(minmax(&[0.4, 0.4, 0.4]), vec![0.0; 3]);
        assert_eq!(minmax(&[0.4, 0.4 + 1e-10]), vec![0.0; 2]);
        assert!(minmax(&[]).is_empty());
    }
}
