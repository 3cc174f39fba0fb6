//! Prediction traversals.
//!
//! Two variants with identical semantics exist for every prediction:
//! *groupwise* pushes all query ids through a tree together, calling
//! the feature extractor once per split node (worthwhile when the
//! extractor amortises per-call overhead over a batch), while *single*
//! descends the trees one id at a time. The groupwise variant runs the
//! per-tree leaf-finding passes in parallel and combines serially per
//! id; the single variant parallelises over ids.

use rayon::prelude::*;

use crate::dist::{NodeDistribution, OutputDistribution};
use crate::features::{GroupwiseFeatureExtractor, SingleFeatureExtractor};

use super::node::Tree;
use super::{Forest, ForestModel};

impl<M: ForestModel<P>, const P: usize> Forest<M, P> {
    /// Predict a full output distribution per id, batching feature
    /// calls per split node.
    ///
    /// Each entry of `out` must already be initialised to the right
    /// shape (e.g. the number of classes); it is reset, combined with
    /// every tree's leaf distribution, and normalised.
    ///
    /// # Panics
    /// Panics if the forest is not valid or `out` is not as long as
    /// `ids`.
    pub fn predict_dist_groupwise<O, F>(&self, ids: &[usize], out: &mut [O], features: &F)
    where
        O: OutputDistribution<M::NodeDist>,
        F: GroupwiseFeatureExtractor<P>,
    {
        self.check_query(ids.len(), out.len());

        let per_tree: Vec<Vec<&M::NodeDist>> = self
            .trees
            .par_iter()
            .map(|tree| self.find_leaves_groupwise(tree, ids, features))
            .collect();

        for (i, dist) in out.iter_mut().enumerate() {
            dist.reset();
            for leaves in &per_tree {
                dist.combine(leaves[i], ids[i]);
            }
            dist.normalise();
        }
    }

    /// Predict a full output distribution per id, one feature call per
    /// (id, split node).
    ///
    /// Semantically identical to
    /// [`predict_dist_groupwise`](Self::predict_dist_groupwise).
    pub fn predict_dist_single<O, F>(&self, ids: &[usize], out: &mut [O], features: &F)
    where
        O: OutputDistribution<M::NodeDist> + Send,
        F: SingleFeatureExtractor<P>,
    {
        self.check_query(ids.len(), out.len());

        out.par_iter_mut().enumerate().for_each(|(i, dist)| {
            let id = ids[i];
            dist.reset();
            for tree in &self.trees {
                dist.combine(self.find_leaf_single(tree, id, features), id);
            }
            dist.normalise();
        });
    }

    /// Probability of a given label per id: the per-tree leaf pdfs
    /// averaged over trees, written into `out`.
    ///
    /// With `single_label`, `labels[0]` is shared by every id;
    /// otherwise `labels` is aligned with `ids`.
    pub fn probability_groupwise<F>(
        &self,
        ids: &[usize],
        labels: &[M::Label],
        out: &mut [f64],
        single_label: bool,
        features: &F,
    ) where
        F: GroupwiseFeatureExtractor<P>,
    {
        self.probability_groupwise_with(
            ids,
            labels,
            out,
            single_label,
            features,
            |leaf: &M::NodeDist, label, id| leaf.pdf(label, id) as f64,
            |_, fresh| fresh,
        );
    }

    /// Generalised form of
    /// [`probability_groupwise`](Self::probability_groupwise): `pdf`
    /// maps `(leaf distribution, label, id)` to a density (giving
    /// access to sub-distributions), and `combine` merges the per-id
    /// tree average into the pre-existing output cell — e.g.
    /// multiplication to accumulate evidence across calls.
    #[allow(clippy::too_many_arguments)]
    pub fn probability_groupwise_with<F, Q, B>(
        &self,
        ids: &[usize],
        labels: &[M::Label],
        out: &mut [f64],
        single_label: bool,
        features: &F,
        pdf: Q,
        combine: B,
    ) where
        F: GroupwiseFeatureExtractor<P>,
        Q: Fn(&M::NodeDist, M::Label, usize) -> f64,
        B: Fn(f64, f64) -> f64,
    {
        self.check_query(ids.len(), out.len());
        self.check_labels(ids.len(), labels.len(), single_label);

        let per_tree: Vec<Vec<&M::NodeDist>> = self
            .trees
            .par_iter()
            .map(|tree| self.find_leaves_groupwise(tree, ids, features))
            .collect();

        for i in 0..ids.len() {
            let label = labels[if single_label { 0 } else { i }];
            let mut acc = 0.0;
            for leaves in &per_tree {
                acc += pdf(leaves[i], label, ids[i]);
            }
            out[i] = combine(out[i], acc / self.n_trees as f64);
        }
    }

    /// Probability of a given label per id, one feature call per
    /// (id, split node). Semantically identical to
    /// [`probability_groupwise`](Self::probability_groupwise).
    pub fn probability_single<F>(
        &self,
        ids: &[usize],
        labels: &[M::Label],
        out: &mut [f64],
        single_label: bool,
        features: &F,
    ) where
        F: SingleFeatureExtractor<P>,
    {
        self.probability_single_with(
            ids,
            labels,
            out,
            single_label,
            features,
            |leaf: &M::NodeDist, label, id| leaf.pdf(label, id) as f64,
            |_, fresh| fresh,
        );
    }

    /// Generalised form of
    /// [`probability_single`](Self::probability_single); see
    /// [`probability_groupwise_with`](Self::probability_groupwise_with).
    #[allow(clippy::too_many_arguments)]
    pub fn probability_single_with<F, Q, B>(
        &self,
        ids: &[usize],
        labels: &[M::Label],
        out: &mut [f64],
        single_label: bool,
        features: &F,
        pdf: Q,
        combine: B,
    ) where
        F: SingleFeatureExtractor<P>,
        Q: Fn(&M::NodeDist, M::Label, usize) -> f64 + Sync,
        B: Fn(f64, f64) -> f64 + Sync,
    {
        self.check_query(ids.len(), out.len());
        self.check_labels(ids.len(), labels.len(), single_label);

        out.par_iter_mut().enumerate().for_each(|(i, slot)| {
            let id = ids[i];
            let label = labels[if single_label { 0 } else { i }];
            let mut acc = 0.0;
            for tree in &self.trees {
                acc += pdf(self.find_leaf_single(tree, id, features), label, id);
            }
            *slot = combine(*slot, acc / self.n_trees as f64);
        });
    }

    // -------------------------------------------------------------------------
    // Traversal internals
    // -------------------------------------------------------------------------

    fn check_query(&self, n_ids: usize, n_out: usize) {
        assert!(self.valid, "prediction on an invalid forest");
        assert_eq!(n_out, n_ids, "output slice must be as long as the id slice");
    }

    fn check_labels(&self, n_ids: usize, n_labels: usize, single_label: bool) {
        if single_label {
            assert!(
                n_ids == 0 || n_labels >= 1,
                "single_label requires at least one label"
            );
        } else {
            assert_eq!(n_labels, n_ids, "labels must be aligned with ids");
        }
    }

    /// Push all ids through `tree` simultaneously, returning each id's
    /// leaf distribution in query order.
    fn find_leaves_groupwise<'t, F>(
        &self,
        tree: &'t Tree<M::NodeDist, P>,
        ids: &[usize],
        features: &F,
    ) -> Vec<&'t M::NodeDist>
    where
        F: GroupwiseFeatureExtractor<P>,
    {
        // Query positions currently sitting at each node; processed in
        // breadth-first order so parents run before children.
        let mut membership: Vec<Vec<u32>> = vec![Vec::new(); self.n_nodes];
        membership[0] = (0..ids.len() as u32).collect();

        let mut leaves: Vec<Option<&'t M::NodeDist>> = vec![None; ids.len()];
        let mut id_buf: Vec<usize> = Vec::new();
        let mut scores: Vec<f32> = Vec::new();

        for n in 0..self.n_nodes {
            let members = std::mem::take(&mut membership[n]);
            if members.is_empty() {
                continue;
            }
            let node = &tree.nodes[n];
            if node.is_leaf {
                let dist = node.dist.as_ref().expect("leaf node without distribution");
                for &pos in &members {
                    leaves[pos as usize] = Some(dist);
                }
            } else {
                id_buf.clear();
                id_buf.extend(members.iter().map(|&pos| ids[pos as usize]));
                scores.clear();
                scores.resize(members.len(), 0.0);
                features.extract(&id_buf, &node.params, &mut scores);

                for (k, &pos) in members.iter().enumerate() {
                    let child = if scores[k] < node.thresh { 2 * n + 1 } else { 2 * n + 2 };
                    membership[child].push(pos);
                }
            }
        }

        leaves
            .into_iter()
            .map(|leaf| leaf.expect("every id must reach a leaf"))
            .collect()
    }

    /// Descend `tree` for a single id.
    fn find_leaf_single<'t, F>(
        &self,
        tree: &'t Tree<M::NodeDist, P>,
        id: usize,
        features: &F,
    ) -> &'t M::NodeDist
    where
        F: SingleFeatureExtractor<P>,
    {
        let mut n = 0;
        loop {
            let node = &tree.nodes[n];
            if node.is_leaf {
                return node.dist.as_ref().expect("leaf node without distribution");
            }
            let score = features.extract(id, &node.params);
            n = if score < node.thresh { 2 * n + 1 } else { 2 * n + 2 };
        }
    }
}
