//! Random forest classification over discrete labels.
//!
//! [`Classifier`] binds the forest engine to integer labels in
//! `0..K` with [`DiscreteDistribution`] at the nodes. Split quality is
//! Shannon entropy, computed by the engine's incremental sweep that
//! tests every threshold between adjacent sorted scores
//! ([`crate::forest::entropy`]).
//!
//! # Example
//!
//! ```ignore
//! use thicket::{Classifier, TrainOptions, UniformParameterSampler};
//!
//! let mut model = Classifier::<1>::new(3, 64, 8);
//! let sampler = UniformParameterSampler::new(n_dims as i32 - 1);
//! model.train(&ids, &labels, &features, &sampler, &TrainOptions::default())?;
//!
//! let mut dists = vec![model.output_dist(); test_ids.len()];
//! model.predict_dist_groupwise(&test_ids, &mut dists, &test_features);
//! ```

use std::io::Write;

use crate::dist::DiscreteDistribution;
use crate::error::ReadError;
use crate::forest::entropy::{
    fast_discrete_entropy, fast_discrete_entropy_split, precalculate_xlogx,
};
use crate::forest::io::ModelReader;
use crate::forest::{Forest, ForestModel, ScoreIndex, SplitCandidate};

/// Gain threshold below which a classifier node becomes a leaf.
const DEFAULT_MIN_INFO_GAIN: f32 = 0.05;

/// A random forest classifier over labels `0..K`.
pub type Classifier<const P: usize> = Forest<ClassifierModel, P>;

/// The classifier's [`ForestModel`]: discrete labels, entropy splits.
#[derive(Debug, Clone)]
pub struct ClassifierModel {
    n_classes: usize,
    /// Explicitly assigned class names; may be shorter than
    /// `n_classes`, in which case the remainder are reported as
    /// `Class i`.
    class_names: Vec<String>,
    min_info_gain: f32,
    /// `x ln x` table, alive only during a `train()` call.
    xlogx: Vec<f64>,
}

impl ClassifierModel {
    /// A model over `num_classes` labels.
    pub fn new(num_classes: usize) -> Self {
        assert!(num_classes >= 2, "a classifier needs at least two classes");
        Self {
            n_classes: num_classes,
            class_names: Vec::new(),
            min_info_gain: DEFAULT_MIN_INFO_GAIN,
            xlogx: Vec::new(),
        }
    }

    /// Number of classes in the label space.
    #[inline]
    pub fn num_classes(&self) -> usize {
        self.n_classes
    }
}

impl<const P: usize> ForestModel<P> for ClassifierModel {
    type Label = u32;
    type NodeDist = DiscreteDistribution;

    fn init_node_dist(&self) -> DiscreteDistribution {
        DiscreteDistribution::new(self.n_classes)
    }

    fn training_precalculations(&mut self, labels: &[u32]) {
        self.xlogx = precalculate_xlogx(labels.len());
    }

    fn cleanup_precalculations(&mut self) {
        self.xlogx = Vec::new();
    }

    fn single_node_impurity(
        &self,
        labels: &[u32],
        bag: &[u32],
        _tree: usize,
        _node: usize,
    ) -> f32 {
        fast_discrete_entropy(bag, labels, self.n_classes, &self.xlogx) as f32
    }

    fn best_split(
        &self,
        data: &[ScoreIndex],
        labels: &[u32],
        _tree: usize,
        _node: usize,
        initial_impurity: f32,
    ) -> SplitCandidate {
        let (children_impurity, thresh) =
            fast_discrete_entropy_split(data, labels, self.n_classes, &self.xlogx);
        let info_gain =
            (initial_impurity as f64 - children_impurity / data.len() as f64) as f32;
        SplitCandidate { info_gain, thresh }
    }

    fn min_info_gain(&self, _tree: usize, _node: usize) -> f32 {
        self.min_info_gain
    }

    fn header_description(&self) -> &str {
        "Classes Class_Names"
    }

    fn write_header<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write!(w, "{}", self.n_classes)?;
        for name in &self.class_names {
            write!(w, " {name}")?;
        }
        Ok(())
    }

    fn read_header(&mut self, reader: &mut ModelReader<'_>) -> Result<(), ReadError> {
        self.n_classes = reader.parse("class count")?;
        self.class_names = reader
            .rest_of_line()
            .into_iter()
            .take(self.n_classes)
            .map(str::to_string)
            .collect();
        Ok(())
    }
}

impl<const P: usize> Forest<ClassifierModel, P> {
    /// An untrained classifier over `num_classes` labels with
    /// `num_trees` trees of up to `num_levels` levels.
    pub fn new(num_classes: usize, num_trees: usize, num_levels: usize) -> Self {
        Forest::with_model(ClassifierModel::new(num_classes), num_trees, num_levels)
    }

    /// Replace the default information-gain threshold (0.05).
    pub fn with_min_info_gain(mut self, threshold: f32) -> Self {
        self.model.min_info_gain = threshold;
        self
    }

    /// Number of classes in the label space.
    #[inline]
    pub fn num_classes(&self) -> usize {
        self.model.n_classes
    }

    /// Assign names to the classes.
    ///
    /// Names are persisted in the model file header, one token each,
    /// so they must not contain whitespace.
    ///
    /// # Panics
    /// Panics if the count does not match the number of classes or a
    /// name contains whitespace.
    pub fn set_class_names(&mut self, names: Vec<String>) {
        assert_eq!(
            names.len(),
            self.model.n_classes,
            "need one name per class"
        );
        assert!(
            names.iter().all(|n| !n.contains(char::is_whitespace)),
            "class names must not contain whitespace"
        );
        self.model.class_names = names;
    }

    /// The class names; classes without an explicit name are reported
    /// as `Class i`.
    pub fn class_names(&self) -> Vec<String> {
        (0..self.model.n_classes)
            .map(|c| {
                self.model
                    .class_names
                    .get(c)
                    .cloned()
                    .unwrap_or_else(|| format!("Class {c}"))
            })
            .collect()
    }

    /// A blank output distribution of the right shape for the
    /// `predict_dist_*` methods.
    pub fn output_dist(&self) -> DiscreteDistribution {
        DiscreteDistribution::new(self.model.n_classes)
    }

    /// Smooth every stored node distribution with the
    /// softmax-with-temperature transform
    /// ([`DiscreteDistribution::raise_temperature`]).
    ///
    /// Covers split-node distributions too, so a model reloaded at a
    /// truncated depth sees the same smoothing. No-op for `T <= 0`.
    pub fn raise_node_temperature(&mut self, t: f64) {
        for tree in &mut self.trees {
            for node in &mut tree.nodes {
                if let Some(dist) = &mut node.dist {
                    dist.raise_temperature(t);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip_with_names() {
        let mut model = ClassifierModel::new(3);
        model.class_names = vec!["cat".into(), "dog".into(), "bird".into()];

        let mut buf = Vec::new();
        ForestModel::<1>::write_header(&model, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "3 cat dog bird");

        let mut restored = ClassifierModel::new(2);
        let mut reader = ModelReader::new(&text);
        ForestModel::<1>::read_header(&mut restored, &mut reader).unwrap();
        assert_eq!(restored.n_classes, 3);
        assert_eq!(restored.class_names, vec!["cat", "dog", "bird"]);
    }

    #[test]
    fn header_fills_missing_names_lazily() {
        let mut model = ClassifierModel::new(2);
        let mut reader = ModelReader::new("4 first");
        ForestModel::<1>::read_header(&mut model, &mut reader).unwrap();
        assert_eq!(model.n_classes, 4);
        // Only the explicit name is stored; the rest appear as
        // defaults through the Classifier accessor.
        assert_eq!(model.class_names, vec!["first"]);

        let forest: Classifier<1> = Forest::with_model(model, 1, 1);
        assert_eq!(
            forest.class_names(),
            vec!["first", "Class 1", "Class 2", "Class 3"]
        );
    }

    #[test]
    fn gain_uses_normalised_children_impurity() {
        let mut model = ClassifierModel::new(2);
        let labels = vec![0u32, 0, 1, 1];
        ForestModel::<1>::training_precalculations(&mut model, &labels);

        let data: Vec<ScoreIndex> = [0.0f32, 0.1, 0.9, 1.0]
            .iter()
            .enumerate()
            .map(|(i, &score)| ScoreIndex { score, index: i as u32 })
            .collect();

        let bag: Vec<u32> = (0..4).collect();
        let initial =
            ForestModel::<1>::single_node_impurity(&model, &labels, &bag, 0, 0);
        let candidate = ForestModel::<1>::best_split(&model, &data, &labels, 0, 0, initial);

        // Perfectly separable: children impurity is zero, so the gain
        // equals the parent entropy ln 2.
        approx::assert_abs_diff_eq!(initial, std::f32::consts::LN_2, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(candidate.info_gain, initial, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(candidate.thresh, 0.5, epsilon = 1e-6);
    }

    #[test]
    #[should_panic(expected = "at least two classes")]
    fn rejects_single_class() {
        ClassifierModel::new(1);
    }
}
