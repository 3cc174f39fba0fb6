//! The forest training loop.
//!
//! Trees are independent and train in parallel; each owns its bag
//! storage, score buffers, and a PRNG seeded from `TrainOptions::seed`
//! plus the tree index, so a fixed seed reproduces the same forest
//! regardless of thread scheduling.

use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::dist::NodeDistribution;
use crate::error::TrainError;
use crate::features::GroupwiseFeatureExtractor;
use crate::params::ParameterSampler;

use super::logger::TrainingLogger;
use super::node::Tree;
use super::{Forest, ForestModel, ScoreIndex, Verbosity};

// =============================================================================
// TrainOptions
// =============================================================================

/// Parameters for [`Forest::train`].
///
/// Use struct construction with `..Default::default()`:
///
/// ```ignore
/// let opts = TrainOptions {
///     num_param_combos: 20,
///     bag_proportion: 0.7,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct TrainOptions {
    // --- Split search ---
    /// Number of random parameter combinations trialled per split node.
    pub num_param_combos: usize,

    // --- Bagging ---
    /// Train each tree on a random subset of the samples.
    pub bagging: bool,
    /// Fraction of samples per tree when bagging; must lie in `(0, 1]`.
    pub bag_proportion: f32,

    // --- Tree structure ---
    /// Also fit distributions at split nodes. Required if the saved
    /// model is ever to be reloaded at a truncated depth.
    pub fit_split_nodes: bool,
    /// Below this many samples a node becomes a leaf.
    pub min_training_data: usize,

    // --- Resource control ---
    /// Number of threads for the per-tree fan-out.
    ///
    /// - `0`: use rayon's global thread pool (default)
    /// - `1`: strictly sequential
    /// - `n > 1`: a dedicated pool of `n` threads for this call
    pub n_threads: usize,

    // --- Reproducibility ---
    /// Seed for the per-tree PRNGs (bagging and parameter sampling).
    pub seed: u64,

    // --- Logging ---
    /// Progress output level.
    pub verbosity: Verbosity,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            num_param_combos: 10,
            bagging: true,
            bag_proportion: 0.5,
            fit_split_nodes: true,
            min_training_data: 50,
            n_threads: 0,
            seed: 42,
            verbosity: Verbosity::Silent,
        }
    }
}

// =============================================================================
// Training entry point
// =============================================================================

impl<M: ForestModel<P>, const P: usize> Forest<M, P> {
    /// Train the forest.
    ///
    /// `ids` identify the training samples to the caller's feature
    /// extractor; `labels` is aligned with `ids`. The engine keeps
    /// internal indices into these slices and never copies labels.
    ///
    /// Both functors may be invoked concurrently from different trees.
    ///
    /// # Errors
    /// Rejected before any work begins: a `bag_proportion` outside
    /// `(0, 1]` while bagging, misaligned `ids`/`labels`, or a forest
    /// that is already trained.
    pub fn train<F, G>(
        &mut self,
        ids: &[usize],
        labels: &[M::Label],
        features: &F,
        sampler: &G,
        opts: &TrainOptions,
    ) -> Result<(), TrainError>
    where
        F: GroupwiseFeatureExtractor<P>,
        G: ParameterSampler<P>,
    {
        if self.valid {
            return Err(TrainError::AlreadyTrained);
        }
        if opts.bagging && !(opts.bag_proportion > 0.0 && opts.bag_proportion <= 1.0) {
            return Err(TrainError::InvalidBagProportion(opts.bag_proportion));
        }
        if ids.len() != labels.len() {
            return Err(TrainError::LabelMismatch {
                ids: ids.len(),
                labels: labels.len(),
            });
        }

        self.fit_split_nodes = opts.fit_split_nodes;
        self.model.training_precalculations(labels);

        let logger = TrainingLogger::new(opts.verbosity);
        logger.start_training(self.n_trees, ids.len());

        let trainer = TreeTrainer {
            model: &self.model,
            ids,
            labels,
            features,
            sampler,
            opts,
            n_levels: self.n_levels,
            n_nodes: self.n_nodes,
        };

        let n_trees = self.n_trees;
        let run_parallel = || {
            (0..n_trees)
                .into_par_iter()
                .map(|t| {
                    let tree = trainer.train_tree(t);
                    logger.tree_trained(t);
                    tree
                })
                .collect::<Vec<_>>()
        };

        self.trees = match opts.n_threads {
            1 => (0..n_trees)
                .map(|t| {
                    let tree = trainer.train_tree(t);
                    logger.tree_trained(t);
                    tree
                })
                .collect(),
            0 => run_parallel(),
            n => ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .expect("failed to create training thread pool")
                .install(run_parallel),
        };

        self.model.cleanup_precalculations();
        self.valid = true;
        logger.finish_training(self.n_trees);
        Ok(())
    }
}

// =============================================================================
// Per-tree training
// =============================================================================

/// Borrowed training context shared (immutably) by all tree workers.
struct TreeTrainer<'a, M: ForestModel<P>, F, G, const P: usize> {
    model: &'a M,
    ids: &'a [usize],
    labels: &'a [M::Label],
    features: &'a F,
    sampler: &'a G,
    opts: &'a TrainOptions,
    n_levels: usize,
    n_nodes: usize,
}

impl<M, F, G, const P: usize> TreeTrainer<'_, M, F, G, P>
where
    M: ForestModel<P>,
    F: GroupwiseFeatureExtractor<P>,
    G: ParameterSampler<P>,
{
    /// Index of the last node that may still split; anything beyond is
    /// in the bottom layer.
    #[inline]
    fn last_split_node(&self) -> usize {
        (1usize << self.n_levels) - 2
    }

    fn train_tree(&self, t: usize) -> Tree<M::NodeDist, P> {
        let n_samples = self.ids.len();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.opts.seed.wrapping_add(t as u64));
        let mut tree: Tree<M::NodeDist, P> = Tree::new(self.n_nodes);
        let mut bags: Vec<Vec<u32>> = vec![Vec::new(); self.n_nodes];

        bags[0] = self.root_bag(n_samples, &mut rng);

        // A node needs at least two samples to have a testable split.
        let min_bag = self.opts.min_training_data.max(2);
        let last_split_node = self.last_split_node();

        // Reused trial buffers.
        let mut params = [0i32; P];
        let mut id_buf: Vec<usize> = Vec::new();
        let mut scores: Vec<f32> = Vec::new();
        let mut pairs: Vec<ScoreIndex> = Vec::new();
        let mut best_pairs: Vec<ScoreIndex> = Vec::new();

        for n in 0..self.n_nodes {
            // Taking the bag releases the slot's storage once the node
            // is done, keeping peak memory near the live frontier.
            let bag = std::mem::take(&mut bags[n]);

            if n > last_split_node || bag.len() < min_bag || tree.nodes[n].is_leaf {
                self.fit_leaf(&mut tree, n, &bag);
                continue;
            }

            let initial_impurity = self.model.single_node_impurity(self.labels, &bag, t, n);

            let mut best_gain = f32::NEG_INFINITY;
            let mut best_thresh = 0.0f32;
            let mut best_params = [0i32; P];
            let mut valid_trials = 0usize;

            for _ in 0..self.opts.num_param_combos {
                self.sampler.sample(&mut rng, &mut params);

                id_buf.clear();
                id_buf.extend(bag.iter().map(|&i| self.ids[i as usize]));
                scores.clear();
                scores.resize(bag.len(), 0.0);
                self.features.extract(&id_buf, &params, &mut scores);

                pairs.clear();
                pairs.extend(
                    scores
                        .iter()
                        .zip(&bag)
                        .map(|(&score, &index)| ScoreIndex { score, index }),
                );
                pairs.sort_unstable_by(|a, b| a.score.total_cmp(&b.score));

                // A spread this small cannot be thresholded meaningfully.
                let spread = pairs[bag.len() - 1].score - pairs[0].score;
                if spread <= f32::MIN_POSITIVE * bag.len() as f32 {
                    continue;
                }
                valid_trials += 1;

                let candidate =
                    self.model
                        .best_split(&pairs, self.labels, t, n, initial_impurity);
                if candidate.info_gain > best_gain {
                    best_gain = candidate.info_gain;
                    best_thresh = candidate.thresh;
                    best_params = params;
                    std::mem::swap(&mut best_pairs, &mut pairs);
                }
            }

            if valid_trials > 0 && best_gain > self.model.min_info_gain(t, n) {
                tree.nodes[n].params = best_params;
                tree.nodes[n].thresh = best_thresh;

                for pair in &best_pairs {
                    let child = if pair.score < best_thresh { 2 * n + 1 } else { 2 * n + 2 };
                    bags[child].push(pair.index);
                }
                debug_assert!(
                    !bags[2 * n + 1].is_empty() && !bags[2 * n + 2].is_empty(),
                    "accepted split produced an empty child"
                );

                if self.opts.fit_split_nodes {
                    tree.nodes[n].dist = Some(self.fit_dist(&bag));
                }
            } else {
                self.fit_leaf(&mut tree, n, &bag);
            }
        }

        tree
    }

    /// The root bag: every internal index, optionally subsampled.
    fn root_bag(&self, n_samples: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<u32> {
        let mut root: Vec<u32> = (0..n_samples as u32).collect();
        if self.opts.bagging {
            let keep = (n_samples as f64 * self.opts.bag_proportion as f64).floor() as usize;
            // Partial Fisher-Yates: only the kept prefix needs shuffling.
            for i in 0..keep.min(n_samples) {
                let j = rng.gen_range(i..n_samples);
                root.swap(i, j);
            }
            root.truncate(keep);
        }
        root
    }

    /// Fit a distribution to the labels selected by `bag`.
    fn fit_dist(&self, bag: &[u32]) -> M::NodeDist {
        let mut dist = self.model.init_node_dist();
        dist.fit(bag.iter().map(|&i| self.labels[i as usize]));
        dist
    }

    /// Declare node `n` a leaf.
    ///
    /// A distribution is fitted unless the node is an orphan (its
    /// parent is already a leaf). Unless the node sits in the bottom
    /// layer, both children are pre-marked as leaves so later passes
    /// and the file writer treat them as orphans.
    fn fit_leaf(&self, tree: &mut Tree<M::NodeDist, P>, n: usize, bag: &[u32]) {
        let orphan = n > 0 && tree.nodes[(n - 1) / 2].is_leaf;
        if !orphan {
            tree.nodes[n].dist = Some(self.fit_dist(bag));
        }
        tree.nodes[n].is_leaf = true;

        if n <= self.last_split_node() {
            tree.nodes[2 * n + 1].is_leaf = true;
            tree.nodes[2 * n + 2].is_leaf = true;
        }
    }
}
