//! Ranking-quality metrics.
//!
//! Pure functions over parallel slices of relevance labels and ranking
//! scores. All metrics are defined on every input: degenerate cases (empty
//! results, a single result, zero relevant items, a zero denominator)
//! evaluate to 0.0 rather than failing.

/// Normalized Discounted Cumulative Gain.
///
/// Items are ranked by descending `scores` with a stable sort, so ties keep
/// the order the backend returned them in. Gains are the binary labels,
/// discounted by `log2(position + 1)` with 1-indexed positions:
///
/// ```text
/// DCG  = Σ rel_i / log2(i + 1)
/// NDCG = DCG / IDCG
/// ```
///
/// Returns 0.0 for fewer than two items (a singleton ranking carries no
/// ordering information), when no item is relevant (`IDCG == 0`), or when
/// any score is non-finite.
pub fn ndcg(labels: &[f64], scores: &[f64]) -> f64 {
    debug_assert_eq!(labels.len(), scores.len());
    if labels.len() < 2 || labels.len() != scores.len() {
        return 0.0;
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let dcg: f64 = order
        .iter()
        .enumerate()
        .map(|(i, &idx)| labels[idx] / ((i + 2) as f64).log2())
        .sum();

    let mut ideal = labels.to_vec();
    ideal.sort_by(|a, b| b.total_cmp(a));
    let idcg: f64 = ideal
        .iter()
        .enumerate()
        .map(|(i, rel)| rel / ((i + 2) as f64).log2())
        .sum();

    if idcg == 0.0 { 0.0 } else { dcg / idcg }
}

/// Fraction of returned results that are relevant.
pub fn precision(relevant_returned: usize, total_results: usize) -> f64 {
    ratio(relevant_returned, total_results)
}

/// Fraction of the dataset's relevant items that were returned.
pub fn recall(relevant_returned: usize, relevant_in_dataset: usize) -> f64 {
    ratio(relevant_returned, relevant_in_dataset)
}

/// Fraction of returned results that belong to the evaluated query.
pub fn accuracy(correctly_returned: usize, total_results: usize) -> f64 {
    ratio(correctly_returned, total_results)
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
