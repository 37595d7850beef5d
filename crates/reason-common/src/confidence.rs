/// Confidence arithmetic shared by graph merging, seeding and fusion.

/// Aggregate confidence from multiple independent evidence sources
/// using the noisy-OR model: p = 1 - Π(1 - p_i)
pub fn aggregate_confidence(confidences: &[f64]) -> f64 {
    if confidences.is_empty() {
        return 0.0;
    }
    let product: f64 = confidences.iter().map(|&p| 1.0 - p.clamp(0.0, 1.0)).product();
    1.0 - product
}

/// Running confidence-weighted mean.
///
/// `acc_weight` is the cumulative weight behind `acc_value`. Returns the merged
/// value and the new cumulative weight. When both weights are zero the two
/// values are averaged with equal weight so a zero-confidence merge still moves
/// the estimate.
pub fn weighted_merge(acc_value: f64, acc_weight: f64, value: f64, weight: f64) -> (f64, f64) {
    let total = acc_weight + weight;
    if total <= f64::EPSILON {
        return ((acc_value + value) / 2.0, 0.0);
    }
    ((acc_value * acc_weight + value * weight) / total, total)
}

/// Check that a confidence lies in [0, 1] and is finite.
pub fn is_valid_confidence(c: f64) -> bool {
    c.is_finite() && (0.0..=1.0).contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_noisy_or() {
        // Two independent pieces of evidence at 0.7 each
        // Expected: 1 - (0.3 * 0.3) = 0.91
        let agg = aggregate_confidence(&[0.7, 0.7]);
        assert!((agg - 0.91).abs() < 1e-9);
        assert_eq!(aggregate_confidence(&[]), 0.0);
    }

    #[test]
    fn test_weighted_merge_favours_confident_value() {
        let (v, w) = weighted_merge(0.2, 0.9, 0.8, 0.1);
        assert!((v - 0.26).abs() < 1e-9);
        assert!((w - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_merge_converges_under_alternation() {
        // Alternating inputs must settle rather than flip between extremes
        let (mut v, mut w) = (1.0, 0.5);
        let mut last_step = f64::MAX;
        for i in 0..50 {
            let input = if i % 2 == 0 { 0.0 } else { 1.0 };
            let (nv, nw) = weighted_merge(v, w, input, 0.5);
            let step = (nv - v).abs();
            assert!(step <= last_step + 1e-12);
            last_step = step;
            v = nv;
            w = nw;
        }
        assert!(last_step < 0.05);
    }

    #[test]
    fn test_zero_weight_merge_averages() {
        let (v, w) = weighted_merge(0.0, 0.0, 1.0, 0.0);
        assert_eq!(v, 0.5);
        assert_eq!(w, 0.0);
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(is_valid_confidence(0.0));
        assert!(is_valid_confidence(1.0));
        assert!(!is_valid_confidence(1.01));
        assert!(!is_valid_confidence(f64::NAN));
    }
}
