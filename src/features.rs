//! Caller-supplied feature evaluation.
//!
//! The engine never computes features itself; it asks the caller to
//! score data ids against a tuple of `P` integer feature parameters.
//! Two call granularities exist with identical semantics:
//!
//! - *groupwise*: one call scores a whole batch of ids, amortising
//!   per-call overhead when the extractor benefits from batching;
//! - *single*: one call per id, used by the per-id prediction paths.
//!
//! Training and groupwise prediction invoke the extractor concurrently
//! from different trees, so implementations must be re-entrant — the
//! `Sync` bound enforces the data-race half of that contract, and
//! implementations must not rely on call ordering.
//!
//! Both traits have blanket impls for closures, so most callers pass a
//! capturing closure:
//!
//! ```ignore
//! let features = |ids: &[usize], params: &[i32; 1], out: &mut [f32]| {
//!     for (slot, &id) in out.iter_mut().zip(ids) {
//!         *slot = data[id][params[0] as usize];
//!     }
//! };
//! forest.train(&ids, &labels, &features, &sampler, &TrainOptions::default())?;
//! ```

/// Batched feature evaluation: score every id in `ids` against `params`,
/// writing one value per id into `out`.
///
/// `out` is exactly as long as `ids`.
pub trait GroupwiseFeatureExtractor<const P: usize>: Sync {
    fn extract(&self, ids: &[usize], params: &[i32; P], out: &mut [f32]);
}

impl<F, const P: usize> GroupwiseFeatureExtractor<P> for F
where
    F: Fn(&[usize], &[i32; P], &mut [f32]) + Sync,
{
    #[inline]
    fn extract(&self, ids: &[usize], params: &[i32; P], out: &mut [f32]) {
        self(ids, params, out)
    }
}

/// Per-id feature evaluation: score one id against `params`.
pub trait SingleFeatureExtractor<const P: usize>: Sync {
    fn extract(&self, id: usize, params: &[i32; P]) -> f32;
}

impl<F, const P: usize> SingleFeatureExtractor<P> for F
where
    F: Fn(usize, &[i32; P]) -> f32 + Sync,
{
    #[inline]
    fn extract(&self, id: usize, params: &[i32; P]) -> f32 {
        self(id, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_implement_both_shapes() {
        let table = [1.0f32, 2.0, 3.0];

        let groupwise = |ids: &[usize], _params: &[i32; 1], out: &mut [f32]| {
            for (slot, &id) in out.iter_mut().zip(ids) {
                *slot = table[id];
            }
        };
        let single = |id: usize, _params: &[i32; 1]| table[id];

        let mut out = [0.0f32; 2];
        GroupwiseFeatureExtractor::extract(&groupwise, &[2, 0], &[7], &mut out);
        assert_eq!(out, [3.0, 1.0]);

        assert_eq!(SingleFeatureExtractor::extract(&single, 1, &[7]), 2.0);
    }
}
