//! thicket: random decision forests as probabilistic predictors.
//!
//! A forest is an ensemble of binary decision trees; each tree routes a
//! data point from root to leaf by thresholding scalar feature scores,
//! and each leaf carries a probability distribution over the label
//! space. The forest aggregates per-tree leaf distributions into a
//! full predictive distribution, or scores the probability of a given
//! label.
//!
//! Two models ship with the crate:
//!
//! - [`Classifier`]: discrete labels in `0..K`, class-frequency leaf
//!   distributions, entropy-based split selection.
//! - [`CircularRegressor`]: angular labels in `[-pi, pi]`, von Mises
//!   leaf distributions, circular sum-of-squared-deviation splits.
//!
//! Both are instances of the generic engine in [`forest`], which is
//! polymorphic over the label type, the node and output distributions,
//! and the feature-parameter arity. Feature extraction stays with the
//! caller: training and prediction take closures (or
//! [`GroupwiseFeatureExtractor`] / [`SingleFeatureExtractor`]
//! implementations) that map `(data id, parameter tuple)` to a score.
//!
//! Trained models persist in a line-oriented text format and can be
//! reloaded with fewer trees or at a shallower depth than they were
//! trained with.

pub mod classifier;
pub mod circular;
pub mod dist;
pub mod error;
pub mod features;
pub mod forest;
pub mod params;
pub mod special;

pub use classifier::{Classifier, ClassifierModel};
pub use circular::{CircularRegressor, CircularRegressorModel};
pub use dist::{
    DiscreteDistribution, NodeDistribution, OutputDistribution, VonMisesDistribution,
};
pub use error::{ReadError, TrainError, WriteError};
pub use features::{GroupwiseFeatureExtractor, SingleFeatureExtractor};
pub use forest::{Forest, ForestModel, ScoreIndex, SplitCandidate, TrainOptions, Verbosity};
pub use params::{ParameterSampler, UniformParameterSampler};
