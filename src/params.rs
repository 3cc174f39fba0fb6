//! Random feature-parameter generation.
//!
//! At every candidate split the engine asks a [`ParameterSampler`] for a
//! fresh tuple of `P` integer feature parameters to trial. The sampler
//! receives the requesting tree's own seeded RNG, which keeps parallel
//! training deterministic for a fixed seed: each tree draws an
//! independent, reproducible parameter sequence no matter how the trees
//! are scheduled. Samplers that want their own entropy are free to
//! ignore the argument.

use rand::{Rng, RngCore};

/// Source of random feature-parameter tuples.
///
/// Called concurrently from different trees during training; the `Sync`
/// bound enforces that implementations tolerate this.
pub trait ParameterSampler<const P: usize>: Sync {
    /// Fill `params` with one parameter combination.
    fn sample(&self, rng: &mut dyn RngCore, params: &mut [i32; P]);
}

impl<F, const P: usize> ParameterSampler<P> for F
where
    F: Fn(&mut dyn RngCore, &mut [i32; P]) + Sync,
{
    #[inline]
    fn sample(&self, rng: &mut dyn RngCore, params: &mut [i32; P]) {
        self(rng, params)
    }
}

/// Samples each parameter independently and uniformly from
/// `[0, limit_p]` inclusive.
///
/// Suitable whenever feature parameters are plain indices into some
/// per-parameter range, e.g. selecting a feature dimension.
#[derive(Debug, Clone)]
pub struct UniformParameterSampler<const P: usize> {
    limits: [i32; P],
}

impl<const P: usize> UniformParameterSampler<P> {
    /// One shared inclusive upper limit for every parameter.
    pub fn new(limit: i32) -> Self {
        assert!(limit >= 0, "parameter limit must be non-negative, got {limit}");
        Self { limits: [limit; P] }
    }

    /// A separate inclusive upper limit per parameter.
    pub fn with_limits(limits: [i32; P]) -> Self {
        for (p, &limit) in limits.iter().enumerate() {
            assert!(
                limit >= 0,
                "parameter limit {p} must be non-negative, got {limit}"
            );
        }
        Self { limits }
    }

    /// The inclusive upper limits.
    #[inline]
    pub fn limits(&self) -> &[i32; P] {
        &self.limits
    }
}

impl<const P: usize> ParameterSampler<P> for UniformParameterSampler<P> {
    fn sample(&self, rng: &mut dyn RngCore, params: &mut [i32; P]) {
        for (param, &limit) in params.iter_mut().zip(&self.limits) {
            *param = rng.gen_range(0..=limit);
        }
    }
}
