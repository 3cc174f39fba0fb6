//! Probability distributions over label spaces.
//!
//! The forest engine is generic over two *capability sets* rather than a
//! type hierarchy:
//!
//! - [`NodeDistribution`]: what a distribution stored at a tree node must
//!   support — fitting to a set of labels, point evaluation, and text
//!   persistence.
//! - [`OutputDistribution`]: what a prediction accumulator must support —
//!   resetting, combining with node distributions across trees, and a
//!   final normalisation.
//!
//! [`DiscreteDistribution`] and [`VonMisesDistribution`] implement both,
//! so they serve as their own output type, but a caller may aggregate
//! into any other type implementing [`OutputDistribution`].

use std::fmt::Debug;
use std::io;

use crate::error::ReadError;
use crate::forest::io::ModelReader;

mod discrete;
mod kappa;
mod von_mises;

pub use discrete::DiscreteDistribution;
pub use kappa::solve_kappa;
pub use von_mises::VonMisesDistribution;

/// Capability set for distributions stored at tree nodes.
///
/// The `id` argument of [`pdf`](Self::pdf) is the caller's data id; the
/// distributions in this crate ignore it, but the engine forwards it so
/// that a distribution conditioned on the query point can be plugged in.
pub trait NodeDistribution: Clone + Debug + Send + Sync {
    /// The label type this distribution is defined over.
    type Label: Copy;

    /// Fit the distribution to a set of labels.
    fn fit<I>(&mut self, labels: I)
    where
        I: ExactSizeIterator<Item = Self::Label>;

    /// Probability (density) of a label for the given data id.
    fn pdf(&self, x: Self::Label, id: usize) -> f32;

    /// Write the defining parameters as space-separated text.
    fn write_to<W: io::Write>(&self, w: &mut W) -> io::Result<()>;

    /// Read the defining parameters back from a model file.
    ///
    /// The distribution must already be initialised to the right shape
    /// (e.g. number of classes) before this is called.
    fn read_from(&mut self, reader: &mut ModelReader<'_>) -> Result<(), ReadError>;
}

/// Capability set for prediction accumulators.
///
/// An output distribution is `reset`, combined with one node
/// distribution per tree, and then normalised once. `combine` does not
/// normalise; intermediate states need not be valid distributions.
pub trait OutputDistribution<N> {
    /// Return to the blank pre-combination state.
    fn reset(&mut self);

    /// Fold one tree's node distribution into the accumulator.
    fn combine(&mut self, dist: &N, id: usize);

    /// Rescale so the accumulated state is a valid distribution.
    fn normalise(&mut self);
}
