//! Ranking utilities.

use ordered_float::NotNan;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// The `k` highest finite scores as `(item, score)`, best first.
///
/// Non-finite scores are skipped. Unlike a pure probability top-k, negative scores are kept:
/// affinity scores are signed.
pub fn top_k(scores: &[f64], k: usize) -> Vec<(usize, f64)> {
    if k == 0 || scores.is_empty() {
        return Vec::new();
    }
    let mut heap = BinaryHeap::with_capacity(k + 1);
    for (i, &score) in scores.iter().enumerate() {
        if !score.is_finite() {
            continue;
        }
        let Ok(s) = NotNan::new(score) else { continue };
        if heap.len() < k {
            heap.push(Reverse((s, Reverse(i))));
        } else if let Some(&Reverse((min_score, _))) = heap.peek() {
            if s > min_score {
                heap.pop();
                heap.push(Reverse((s, Reverse(i))));
            }
        }
    }
    let mut results: Vec<(NotNan<f64>, usize)> =
        heap.into_iter().map(|Reverse((s, Reverse(i)))| (s, i)).collect();
    // Ties break toward the lower item id.
    results.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    results.into_iter().map(|(s, i)| (i, s.into_inner())).collect()
}

/// Scale `scores` in place to unit L1 mass. No-op when the sum is not positive.
pub fn normalize(scores: &mut [f64]) {
    let sum: f64 = scores.iter().sum();
    if sum > 0.0 {
        for s in scores {
            *s /= sum;
        }
    }
}
