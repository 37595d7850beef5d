//! Score normalisation functions.
//!
//! Propagation scores are unbounded and signed; these map them into the
//! [0, 1] range the fuser expects. Normalisation is done per candidate kind.

use reason_common::PropagationNormalisation;

/// Rank-based normalisation: the best score gets 1.0, the worst 1/N.
/// Ties share the average of their ranks.
/// Returns normalised scores in the same order as input.
pub fn rank_normalise(raw_scores: &[f64]) -> Vec<f64> {
    let n = raw_scores.len();
    if n == 0 {
        return vec![];
    }

    let mut indexed: Vec<(usize, f64)> = raw_scores.iter().copied().enumerate().collect();

    // Worst first, so rank r → r / N puts the best at 1.0
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut ranks = vec![0.0f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n - 1 && (indexed[j].1 - indexed[j + 1].1).abs() < 1e-10 {
            j += 1;
        }
        let avg_rank = (i + 1 + j + 1) as f64 / 2.0;
        for item in &indexed[i..=j] {
            ranks[item.0] = avg_rank;
        }
        i = j + 1;
    }

    ranks.iter().map(|&r| r / n as f64).collect()
}

/// |x| / max |x|. All-zero input stays all-zero.
pub fn maxabs_normalise(raw_scores: &[f64]) -> Vec<f64> {
    let max = raw_scores.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
    if max == 0.0 {
        return vec![0.0; raw_scores.len()];
    }
    raw_scores.iter().map(|s| (s.abs() / max).clamp(0.0, 1.0)).collect()
}

/// Map raw propagation scores of one candidate kind into [0, 1].
///
/// Magnitude is what counts: a strongly inhibited node is as perturbed as a
/// strongly activated one.
pub fn normalise_propagation(raw_scores: &[f64], method: PropagationNormalisation) -> Vec<f64> {
    match method {
        PropagationNormalisation::MaxAbs => maxabs_normalise(raw_scores),
        PropagationNormalisation::Rank => {
            let magnitudes: Vec<f64> = raw_scores.iter().map(|s| s.abs()).collect();
            if magnitudes.iter().all(|&m| m == 0.0) {
                return vec![0.0; raw_scores.len()];
            }
            rank_normalise(&magnitudes)
        }
    }
}
