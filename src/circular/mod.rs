//! Random forest regression over circular labels.
//!
//! [`CircularRegressor`] binds the forest engine to angular labels in
//! `[-pi, pi]` with [`VonMisesDistribution`] at the nodes. Split
//! quality is a circular sum of squared deviations around the bag's
//! mean direction, swept over a fixed grid of candidate thresholds.

use std::io::Write;

use crate::dist::VonMisesDistribution;
use crate::error::ReadError;
use crate::forest::io::ModelReader;
use crate::forest::{Forest, ForestModel, ScoreIndex, SplitCandidate};

/// Candidate thresholds tested per split trial.
const NUM_SPLIT_TRIALS: usize = 100;

/// Gain threshold below which a regressor node becomes a leaf.
const DEFAULT_MIN_INFO_GAIN: f32 = 0.1;

/// A random forest regressor over angles.
pub type CircularRegressor<const P: usize> = Forest<CircularRegressorModel, P>;

/// The circular regressor's [`ForestModel`]: angular labels, von Mises
/// node distributions, SSD splits.
#[derive(Debug, Clone)]
pub struct CircularRegressorModel {
    min_info_gain: f32,
    /// Per-label sine table, alive only during a `train()` call.
    sin_precalc: Vec<f64>,
    /// Per-label cosine table, alive only during a `train()` call.
    cos_precalc: Vec<f64>,
}

impl Default for CircularRegressorModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CircularRegressorModel {
    pub fn new() -> Self {
        Self {
            min_info_gain: DEFAULT_MIN_INFO_GAIN,
            sin_precalc: Vec::new(),
            cos_precalc: Vec::new(),
        }
    }

    /// Squared circular deviation sum of the elements of `data[range]`
    /// around the direction `mu`, via the precalculated tables.
    ///
    /// Each term is `[0.5 (1 - cos(l_i - mu))]^2`, which is 0 at the
    /// mean direction and 1 at its antipode.
    fn deviation_sum(&self, data: &[ScoreIndex], mu: f64) -> f64 {
        let (sin_mu, cos_mu) = mu.sin_cos();
        let mut sum = 0.0;
        for pair in data {
            let i = pair.index as usize;
            let cos_delta = self.cos_precalc[i] * cos_mu + self.sin_precalc[i] * sin_mu;
            let dev = 0.5 * (1.0 - cos_delta);
            sum += dev * dev;
        }
        sum
    }
}

impl<const P: usize> ForestModel<P> for CircularRegressorModel {
    type Label = f32;
    type NodeDist = VonMisesDistribution;

    fn init_node_dist(&self) -> VonMisesDistribution {
        VonMisesDistribution::new()
    }

    fn training_precalculations(&mut self, labels: &[f32]) {
        self.sin_precalc = labels.iter().map(|&l| (l as f64).sin()).collect();
        self.cos_precalc = labels.iter().map(|&l| (l as f64).cos()).collect();
    }

    fn cleanup_precalculations(&mut self) {
        self.sin_precalc = Vec::new();
        self.cos_precalc = Vec::new();
    }

    fn single_node_impurity(
        &self,
        _labels: &[f32],
        bag: &[u32],
        _tree: usize,
        _node: usize,
    ) -> f32 {
        let mut s = 0.0;
        let mut c = 0.0;
        for &i in bag {
            s += self.sin_precalc[i as usize];
            c += self.cos_precalc[i as usize];
        }
        let mu = s.atan2(c);
        let (sin_mu, cos_mu) = mu.sin_cos();

        let mut sum = 0.0;
        for &i in bag {
            let cos_delta =
                self.cos_precalc[i as usize] * cos_mu + self.sin_precalc[i as usize] * sin_mu;
            let dev = 0.5 * (1.0 - cos_delta);
            sum += dev * dev;
        }
        sum as f32
    }

    /// Fixed-grid threshold sweep.
    ///
    /// The score range is divided into [`NUM_SPLIT_TRIALS`] intervals
    /// and every interior grid point tried as a threshold. Consecutive
    /// grid points often fall between the same pair of sorted scores —
    /// a *plateau* — in which case the impurity is not recomputed; when
    /// the split point finally moves on, the threshold stored for the
    /// best trial is centred on the plateau that produced it.
    fn best_split(
        &self,
        data: &[ScoreIndex],
        _labels: &[f32],
        _tree: usize,
        _node: usize,
        initial_impurity: f32,
    ) -> SplitCandidate {
        let n = data.len();
        let min_score = data[0].score;
        let max_score = data[n - 1].score;
        let h_space = (max_score - min_score) / NUM_SPLIT_TRIALS as f32;

        // Cumulative resultant components over the sorted order, for
        // O(1) mean directions at any split point.
        let mut cum_sin = Vec::with_capacity(n);
        let mut cum_cos = Vec::with_capacity(n);
        let mut s = 0.0;
        let mut c = 0.0;
        for pair in data {
            s += self.sin_precalc[pair.index as usize];
            c += self.cos_precalc[pair.index as usize];
            cum_sin.push(s);
            cum_cos.push(c);
        }
        let (total_sin, total_cos) = (s, c);

        let mut best_impurity = f64::INFINITY;
        let mut best_thresh = 0.0f32;
        // First element with score >= the current threshold.
        let mut split_idx = 0usize;
        let mut prev_split_idx = usize::MAX;
        // Threshold that opened the plateau of the current best trial,
        // pending re-centring once the split point moves.
        let mut plateau_open: Option<f32> = None;
        let mut prev_tau = min_score;

        for h in 1..NUM_SPLIT_TRIALS {
            let tau = min_score + h as f32 * h_space;
            while split_idx < n && data[split_idx].score < tau {
                split_idx += 1;
            }

            // A grid point that would leave one side empty (possible
            // only through float rounding at the range ends) cannot be
            // a split; treat it like a trial that did not move.
            if split_idx == 0 || split_idx >= n || split_idx == prev_split_idx {
                prev_tau = tau;
                continue;
            }

            if let Some(open_tau) = plateau_open.take() {
                best_thresh = 0.5 * (open_tau + prev_tau);
            }
            prev_split_idx = split_idx;

            // The first grid point lies above min_score and the last
            // below max_score, so both sides are non-empty.
            let s_left = cum_sin[split_idx - 1];
            let c_left = cum_cos[split_idx - 1];
            let mu_left = s_left.atan2(c_left);
            let mu_right = (total_sin - s_left).atan2(total_cos - c_left);

            let impurity = self.deviation_sum(&data[..split_idx], mu_left)
                + self.deviation_sum(&data[split_idx..], mu_right);

            if impurity < best_impurity {
                best_impurity = impurity;
                best_thresh = tau;
                plateau_open = Some(tau);
            }
            prev_tau = tau;
        }

        SplitCandidate {
            info_gain: (initial_impurity as f64 - best_impurity) as f32,
            thresh: best_thresh,
        }
    }

    fn min_info_gain(&self, _tree: usize, _node: usize) -> f32 {
        self.min_info_gain
    }

    fn header_description(&self) -> &str {
        ""
    }

    fn write_header<W: Write>(&self, _w: &mut W) -> std::io::Result<()> {
        Ok(())
    }

    fn read_header(&mut self, reader: &mut ModelReader<'_>) -> Result<(), ReadError> {
        reader.take_line("regressor header")?;
        Ok(())
    }
}

impl<const P: usize> Forest<CircularRegressorModel, P> {
    /// An untrained circular regressor with `num_trees` trees of up to
    /// `num_levels` levels.
    pub fn new(num_trees: usize, num_levels: usize) -> Self {
        Forest::with_model(CircularRegressorModel::new(), num_trees, num_levels)
    }

    /// Replace the default information-gain threshold (0.1).
    pub fn with_min_info_gain(mut self, threshold: f32) -> Self {
        self.model.min_info_gain = threshold;
        self
    }
}
