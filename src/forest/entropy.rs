//! Discrete entropy utilities shared by forest models.
//!
//! These are engine-owned so that any model over discrete labels can
//! reuse them. The split search tests *every* threshold between
//! adjacent sorted scores in a single sweep: class histograms for the
//! two sides are maintained incrementally, and the `x ln x` terms of
//! the entropy come from a table precomputed once per training run, so
//! each candidate position costs O(1).

use super::ScoreIndex;

/// Table of `i * ln(i)` for `i = 0..=n`, with the `0 ln 0 = 0`
/// convention. Computed once per `train()` call.
pub fn precalculate_xlogx(n: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(n + 1);
    table.push(0.0);
    for i in 1..=n {
        let x = i as f64;
        table.push(x * x.ln());
    }
    table
}

/// Entropy of the label histogram over `bag`, in nats:
/// `(N ln N - sum_k c_k ln c_k) / N`.
///
/// `xlogx` must cover counts up to `bag.len()`.
pub fn fast_discrete_entropy(
    bag: &[u32],
    labels: &[u32],
    n_labels: usize,
    xlogx: &[f64],
) -> f64 {
    let n = bag.len();
    if n == 0 {
        return 0.0;
    }
    let mut counts = vec![0usize; n_labels];
    for &i in bag {
        counts[labels[i as usize] as usize] += 1;
    }
    let class_sum: f64 = counts.iter().map(|&c| xlogx[c]).sum();
    (xlogx[n] - class_sum) / n as f64
}

/// Find the threshold minimising the children's summed (unnormalised)
/// entropy over score-sorted data.
///
/// Returns `(best_children_impurity, threshold)` where the impurity is
/// `sum_side (m ln m - sum_k c_k ln c_k)`; callers normalise by the
/// total count when converting to an information gain. The threshold
/// is the midpoint of the best adjacent score pair. Positions between
/// equal scores are skipped — no threshold can separate them.
///
/// `data` must be sorted ascending by score, hold at least two
/// elements, and span more than one distinct score.
pub fn fast_discrete_entropy_split(
    data: &[ScoreIndex],
    labels: &[u32],
    n_labels: usize,
    xlogx: &[f64],
) -> (f64, f32) {
    let n = data.len();
    debug_assert!(n >= 2, "cannot split fewer than two samples");

    // Left histogram starts with only data[0]; the sweep moves one
    // sample across per candidate position.
    let mut left = vec![0usize; n_labels];
    let mut right = vec![0usize; n_labels];
    left[labels[data[0].index as usize] as usize] = 1;
    for pair in &data[1..] {
        right[labels[pair.index as usize] as usize] += 1;
    }
    let mut left_partial = 0.0; // xlogx[1] == 0
    let mut right_partial: f64 = right.iter().map(|&c| xlogx[c]).sum();

    let mut best_impurity = f64::INFINITY;
    let mut thresh = 0.0f32;

    for d in 0..n - 1 {
        if d > 0 {
            // Sample d moves from the right side to the left.
            let class = labels[data[d].index as usize] as usize;
            left_partial += xlogx[left[class] + 1] - xlogx[left[class]];
            left[class] += 1;
            right_partial += xlogx[right[class] - 1] - xlogx[right[class]];
            right[class] -= 1;
        }
        if data[d].score == data[d + 1].score {
            continue;
        }
        let impurity =
            (xlogx[d + 1] - left_partial) + (xlogx[n - d - 1] - right_partial);
        if impurity < best_impurity {
            best_impurity = impurity;
            thresh = 0.5 * (data[d].score + data[d + 1].score);
        }
    }

    (best_impurity, thresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    /// O(N*K) reference: recompute both side histograms from scratch at
    /// every candidate position.
    fn brute_force_split(
        data: &[ScoreIndex],
        labels: &[u32],
        n_labels: usize,
    ) -> (f64, f32) {
        let n = data.len();
        let mut best = f64::INFINITY;
        let mut thresh = 0.0f32;
        for d in 0..n - 1 {
            if data[d].score == data[d + 1].score {
                continue;
            }
            let mut impurity = 0.0;
            for (lo, hi) in [(0, d + 1), (d + 1, n)] {
                let m = hi - lo;
                let mut counts = vec![0usize; n_labels];
                for pair in &data[lo..hi] {
                    counts[labels[pair.index as usize] as usize] += 1;
                }
                let mf = m as f64;
                impurity += mf * mf.ln();
                for &c in &counts {
                    if c > 0 {
                        let cf = c as f64;
                        impurity -= cf * cf.ln();
                    }
                }
            }
            if impurity < best {
                best = impurity;
                thresh = 0.5 * (data[d].score + data[d + 1].score);
            }
        }
        (best, thresh)
    }

    #[test]
    fn xlogx_table_values() {
        let table = precalculate_xlogx(4);
        assert_eq!(table.len(), 5);
        assert_abs_diff_eq!(table[0], 0.0);
        assert_abs_diff_eq!(table[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(table[2], 2.0 * 2f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(table[4], 4.0 * 4f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn entropy_of_pure_bag_is_zero() {
        let labels = vec![1u32; 10];
        let bag: Vec<u32> = (0..10).collect();
        let xlogx = precalculate_xlogx(10);
        let h = fast_discrete_entropy(&bag, &labels, 3, &xlogx);
        assert_abs_diff_eq!(h, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn entropy_of_balanced_bag_is_ln_k() {
        let labels: Vec<u32> = (0..12).map(|i| i % 3).collect();
        let bag: Vec<u32> = (0..12).collect();
        let xlogx = precalculate_xlogx(12);
        let h = fast_discrete_entropy(&bag, &labels, 3, &xlogx);
        assert_abs_diff_eq!(h, 3f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn entropy_is_never_negative() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        for _ in 0..200 {
            let n = rng.gen_range(1..40);
            let k = rng.gen_range(2..6);
            let labels: Vec<u32> = (0..n).map(|_| rng.gen_range(0..k)).collect();
            let bag: Vec<u32> = (0..n as u32).collect();
            let xlogx = precalculate_xlogx(n);
            assert!(fast_discrete_entropy(&bag, &labels, k as usize, &xlogx) >= -1e-12);
        }
    }

    #[test]
    fn split_separates_a_perfectly_separable_sample() {
        // Class 0 scores below 1.0, class 1 above.
        let labels = vec![0u32, 0, 0, 1, 1, 1];
        let data: Vec<ScoreIndex> = [0.1f32, 0.2, 0.3, 1.5, 1.7, 1.9]
            .iter()
            .enumerate()
            .map(|(i, &score)| ScoreIndex { score, index: i as u32 })
            .collect();
        let xlogx = precalculate_xlogx(6);

        let (impurity, thresh) = fast_discrete_entropy_split(&data, &labels, 2, &xlogx);
        assert_abs_diff_eq!(impurity, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(thresh, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn equal_scores_are_never_split() {
        // The only impurity-reducing boundary falls between equal
        // scores and must be skipped.
        let labels = vec![0u32, 0, 1, 1];
        let data: Vec<ScoreIndex> = [0.5f32, 1.0, 1.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, &score)| ScoreIndex { score, index: i as u32 })
            .collect();
        let xlogx = precalculate_xlogx(4);

        let (_, thresh) = fast_discrete_entropy_split(&data, &labels, 2, &xlogx);
        // Only boundaries 0|1 and 2|3 are testable.
        assert!(
            (thresh - 0.75).abs() < 1e-6 || (thresh - 1.5).abs() < 1e-6,
            "threshold {thresh} lies between equal scores"
        );
    }

    #[test]
    fn matches_brute_force_on_random_data() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(99);
        for trial in 0..1200 {
            let n = rng.gen_range(2..50);
            let k = rng.gen_range(2..7) as usize;
            let labels: Vec<u32> = (0..n).map(|_| rng.gen_range(0..k as u32)).collect();
            let mut data: Vec<ScoreIndex> = (0..n)
                .map(|i| ScoreIndex {
                    // Quantised scores so duplicate values occur often.
                    score: (rng.gen_range(0..10) as f32) * 0.5,
                    index: i as u32,
                })
                .collect();
            data.sort_unstable_by(|a, b| a.score.total_cmp(&b.score));
            if data[0].score == data[n as usize - 1].score {
                continue; // no valid boundary; the engine filters these
            }

            let xlogx = precalculate_xlogx(n as usize);
            let (fast, fast_thresh) =
                fast_discrete_entropy_split(&data, &labels, k, &xlogx);
            let (slow, slow_thresh) = brute_force_split(&data, &labels, k);

            assert_abs_diff_eq!(fast, slow, epsilon = 1e-9);
            assert_abs_diff_eq!(fast_thresh, slow_thresh, epsilon = 1e-6);

            let _ = trial;
        }
    }
}
