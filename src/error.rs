//! Error types for training and model persistence.
//!
//! Configuration problems are rejected before any state is mutated;
//! parse failures leave the forest invalid. Numerical edge cases in the
//! von Mises code (saturated `R`, Bessel overflow) are clamped silently
//! and never surface here.

use thiserror::Error;

/// Errors raised by [`Forest::train`](crate::forest::Forest::train)
/// before any training work begins.
#[derive(Debug, Error)]
pub enum TrainError {
    /// `bag_proportion` must lie in `(0, 1]` when bagging is enabled.
    #[error("bag_proportion must be in (0, 1], got {0}")]
    InvalidBagProportion(f32),

    /// The label slice and the id slice must be aligned.
    #[error("labels length {labels} does not match ids length {ids}")]
    LabelMismatch { ids: usize, labels: usize },

    /// The forest already holds a trained (or loaded) model.
    #[error("forest is already trained; construct a new forest to retrain")]
    AlreadyTrained,
}

/// Errors raised when writing a model file.
#[derive(Debug, Error)]
pub enum WriteError {
    /// I/O error while creating or writing the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The forest holds no trained model to write.
    #[error("cannot write an untrained forest")]
    Invalid,
}

/// Errors raised when reading a model file.
///
/// Any variant other than [`ReadError::Io`] on open means the file was
/// at least partially parsed; the forest is left invalid in that case.
#[derive(Debug, Error)]
pub enum ReadError {
    /// I/O error while opening or reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A token failed to parse as the expected kind of value.
    #[error("line {line}: expected {expected}, found {found:?}")]
    Token {
        expected: &'static str,
        found: String,
        line: usize,
    },

    /// The file ended before the model was complete.
    #[error("unexpected end of file while reading {context}")]
    UnexpectedEnd { context: &'static str },

    /// The dimensions line holds an unusable tree or level count.
    #[error("invalid model dimensions: {0}")]
    InvalidDimensions(String),

    /// More trees were requested than the file contains.
    #[error("file contains {available} trees but {requested} were requested")]
    TreesExceedFile { requested: usize, available: usize },

    /// A deeper truncation depth was requested than the file contains.
    #[error("maximum depth {requested} exceeds the {available} levels stored in the file")]
    DepthExceedsFile { requested: usize, available: usize },

    /// Depth truncation needs distributions at split nodes, which the
    /// file was not saved with.
    #[error("depth truncation requires a model saved with split-node distributions")]
    DepthRequiresSplitDists,
}
