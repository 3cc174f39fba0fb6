//! The generic random forest engine.
//!
//! [`Forest`] implements everything a forest model shares regardless of
//! its label space: the tree memory layout, the training loop (bagging,
//! split search, leaf fitting), the prediction traversals, and the text
//! model format. The label-specific parts — which distribution to fit,
//! how to score a candidate split — are supplied by a [`ForestModel`]
//! implementation; [`crate::classifier`] and [`crate::circular`] provide
//! the two shipped models.
//!
//! The engine calls the model through plain trait dispatch resolved at
//! compile time; `Forest<M, P>` is monomorphised per model, so the
//! arrangement costs nothing over the original's template-based
//! polymorphism.

use std::io::Write;

use crate::dist::NodeDistribution;
use crate::error::ReadError;

pub mod entropy;
pub mod io;
mod logger;
mod node;
mod predict;
mod train;

pub use logger::Verbosity;
pub use node::{Node, Tree};
pub use train::TrainOptions;

use self::io::ModelReader;

// =============================================================================
// Split search types
// =============================================================================

/// A feature score paired with the internal training index it was
/// computed for. Split search sorts vectors of these by score.
#[derive(Debug, Clone, Copy)]
pub struct ScoreIndex {
    /// Feature score from the caller's extractor.
    pub score: f32,
    /// Internal index into the training id/label slices.
    pub index: u32,
}

/// Result of a model's split search over one parameter trial.
#[derive(Debug, Clone, Copy)]
pub struct SplitCandidate {
    /// Information gain relative to the node's initial impurity.
    pub info_gain: f32,
    /// The threshold realising that gain.
    pub thresh: f32,
}

// =============================================================================
// Model contract
// =============================================================================

/// The label-specific capabilities a forest model plugs into the engine.
///
/// `P` is the feature-parameter arity and must match the forest's.
/// Implementations hold whatever per-training state they need
/// (`training_precalculations` is called once before the per-tree
/// fan-out, `cleanup_precalculations` after it; between the two, the
/// model is only accessed through `&self` and so may be read from
/// every tree worker concurrently).
pub trait ForestModel<const P: usize>: Send + Sync {
    /// The label type predicted by the model.
    type Label: Copy + Send + Sync;
    /// The distribution fitted at tree nodes.
    type NodeDist: NodeDistribution<Label = Self::Label>;

    /// A blank node distribution of the right shape for fitting.
    fn init_node_dist(&self) -> Self::NodeDist;

    /// Precompute per-label tables used by the impurity callbacks.
    fn training_precalculations(&mut self, labels: &[Self::Label]);

    /// Release the buffers built by
    /// [`training_precalculations`](Self::training_precalculations).
    fn cleanup_precalculations(&mut self);

    /// Impurity of one node's bag before splitting.
    fn single_node_impurity(
        &self,
        labels: &[Self::Label],
        bag: &[u32],
        tree: usize,
        node: usize,
    ) -> f32;

    /// Best threshold over score-sorted data, as an information gain
    /// relative to `initial_impurity`.
    ///
    /// `data` is sorted ascending by score and spans more than one
    /// distinct score value (degenerate trials are filtered out before
    /// this is called).
    fn best_split(
        &self,
        data: &[ScoreIndex],
        labels: &[Self::Label],
        tree: usize,
        node: usize,
        initial_impurity: f32,
    ) -> SplitCandidate;

    /// Gain below which a node becomes a leaf.
    fn min_info_gain(&self, tree: usize, node: usize) -> f32;

    /// Human-readable description of the header data line.
    fn header_description(&self) -> &str;

    /// Write the model-specific header data (no trailing newline).
    fn write_header<W: Write>(&self, w: &mut W) -> std::io::Result<()>;

    /// Read the model-specific header data.
    fn read_header(&mut self, reader: &mut ModelReader<'_>) -> Result<(), ReadError>;
}

// =============================================================================
// Forest
// =============================================================================

/// A random forest: `T` trees of up to `L + 1` levels, plus the
/// [`ForestModel`] that gives the trees their semantics.
///
/// A forest starts *invalid*; it becomes valid — and may then be
/// queried — after a successful [`train`](Forest::train) or
/// [`read_from_file`](Forest::read_from_file). A valid forest is
/// immutable through the prediction API and safe to share across
/// threads.
#[derive(Debug)]
pub struct Forest<M: ForestModel<P>, const P: usize> {
    pub(crate) model: M,
    pub(crate) trees: Vec<Tree<M::NodeDist, P>>,
    pub(crate) n_trees: usize,
    pub(crate) n_levels: usize,
    pub(crate) n_nodes: usize,
    pub(crate) fit_split_nodes: bool,
    pub(crate) valid: bool,
    pub(crate) feature_header: String,
    pub(crate) feature_string: String,
}

impl<M: ForestModel<P>, const P: usize> Forest<M, P> {
    /// Create an untrained forest of `num_trees` trees with at most
    /// `num_levels` levels below the root.
    ///
    /// Tree node arrays are pre-allocated to the full `2^(L+1) - 1`
    /// capacity.
    ///
    /// # Panics
    /// Panics unless `num_trees >= 1` and `num_levels >= 1`.
    pub fn with_model(model: M, num_trees: usize, num_levels: usize) -> Self {
        assert!(num_trees >= 1, "a forest needs at least one tree");
        assert!(num_levels >= 1, "a tree needs at least one level");
        let n_nodes = (1usize << (num_levels + 1)) - 1;
        Self {
            model,
            trees: (0..num_trees).map(|_| Tree::new(n_nodes)).collect(),
            n_trees: num_trees,
            n_levels: num_levels,
            n_nodes,
            fit_split_nodes: true,
            valid: false,
            feature_header: String::new(),
            feature_string: String::new(),
        }
    }

    /// Whether the forest holds a usable model.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of trees.
    #[inline]
    pub fn num_trees(&self) -> usize {
        self.n_trees
    }

    /// Maximum number of levels below the root.
    #[inline]
    pub fn num_levels(&self) -> usize {
        self.n_levels
    }

    /// Whether distributions were fitted at split nodes too.
    #[inline]
    pub fn has_split_dists(&self) -> bool {
        self.fit_split_nodes
    }

    /// The model giving the trees their semantics.
    #[inline]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The trees of the forest.
    #[inline]
    pub fn trees(&self) -> &[Tree<M::NodeDist, P>] {
        &self.trees
    }

    /// Attach a free-form description of the feature extraction
    /// process; persisted verbatim in the model file header.
    ///
    /// Both strings must be single lines.
    pub fn set_feature_definition(&mut self, header: &str, body: &str) {
        debug_assert!(
            !header.contains('\n') && !body.contains('\n'),
            "feature definition strings must be single lines"
        );
        self.feature_header = header.to_string();
        self.feature_string = body.to_string();
    }

    /// The feature definition `(header, body)` pair.
    pub fn feature_definition(&self) -> (&str, &str) {
        (&self.feature_header, &self.feature_string)
    }
}
