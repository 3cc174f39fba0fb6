//! The von Mises distribution over circular labels.

use std::f64::consts::PI;
use std::io;

use crate::error::ReadError;
use crate::forest::io::ModelReader;
use crate::special::{bessel_i0, bessel_i1};

use super::kappa::solve_kappa;
use super::{NodeDistribution, OutputDistribution};

/// Concentration used when the sample is too concentrated for the
/// solver (`R > 0.98` has no well-conditioned solution).
const KAPPA_SATURATED: f32 = 25.0;

/// Concentration substituted when `I0(kappa)` overflows while
/// normalising a heavily combined distribution.
const KAPPA_OVERFLOW: f32 = 500.0;

/// `1 / (2 pi I0(500))`, the normaliser paired with [`KAPPA_OVERFLOW`].
const OVERFLOW_NORMALISER: f64 = 6.35397e-217;

/// A probability density over angles in `[-pi, pi]`.
///
/// Parameterised by the mean direction `mu` and the concentration
/// `kappa`. Used by the circular regressor as both the node and the
/// output distribution; combining across trees follows the sensor
/// fusion of Stienne 2011, where each distribution contributes a vector
/// of length `kappa` in direction `mu`.
#[derive(Debug, Clone)]
pub struct VonMisesDistribution {
    mu: f32,
    kappa: f32,
    /// Sine accumulator, used while fitting and combining.
    s: f64,
    /// Cosine accumulator, used while fitting and combining.
    c: f64,
    /// Cached `1 / (2 pi I0(kappa))`.
    pdf_normaliser: f64,
}

impl Default for VonMisesDistribution {
    fn default() -> Self {
        Self::new()
    }
}

impl VonMisesDistribution {
    /// A blank distribution: `mu = kappa = 0`, unit normaliser.
    pub fn new() -> Self {
        Self {
            mu: 0.0,
            kappa: 0.0,
            s: 0.0,
            c: 0.0,
            pdf_normaliser: 1.0,
        }
    }

    /// Return to the blank state.
    pub fn initialise(&mut self) {
        *self = Self::new();
    }

    /// The circular mean parameter.
    #[inline]
    pub fn mu(&self) -> f32 {
        self.mu
    }

    /// The concentration parameter.
    #[inline]
    pub fn kappa(&self) -> f32 {
        self.kappa
    }

    /// Probability density at angle `x` (radians).
    #[inline]
    pub fn pdf(&self, x: f32) -> f32 {
        (self.pdf_normaliser * ((self.kappa as f64) * ((x - self.mu) as f64).cos()).exp()) as f32
    }

    /// Differential entropy of the distribution.
    pub fn entropy(&self) -> f32 {
        let kappa = self.kappa as f64;
        let i0 = bessel_i0(kappa);
        ((2.0 * PI * i0).ln() - kappa * bessel_i1(kappa) / i0) as f32
    }

    /// Recompute the cached normaliser from the current `kappa`,
    /// clamping if `I0` overflows.
    fn update_normaliser(&mut self) {
        let i0 = bessel_i0(self.kappa as f64);
        if i0.is_infinite() {
            self.kappa = KAPPA_OVERFLOW;
            self.pdf_normaliser = OVERFLOW_NORMALISER;
        } else {
            self.pdf_normaliser = 1.0 / (2.0 * PI * i0);
        }
    }
}

impl NodeDistribution for VonMisesDistribution {
    type Label = f32;

    /// Maximum-likelihood fit: `mu` from the resultant direction,
    /// `kappa` from the mean resultant length `R = |resultant| / N`.
    /// Samples with `R > 0.98` are clamped to `kappa = 25` because the
    /// concentration equation is ill-conditioned there.
    fn fit<I>(&mut self, labels: I)
    where
        I: ExactSizeIterator<Item = f32>,
    {
        let n = labels.len();
        self.s = 0.0;
        self.c = 0.0;
        for label in labels {
            let l = label as f64;
            self.s += l.sin();
            self.c += l.cos();
        }

        self.mu = self.s.atan2(self.c) as f32;

        let r_bar = self.s.hypot(self.c) / n as f64;
        self.kappa = if r_bar > 0.98 {
            KAPPA_SATURATED
        } else {
            solve_kappa(r_bar) as f32
        };
        self.update_normaliser();
    }

    #[inline]
    fn pdf(&self, x: f32, _id: usize) -> f32 {
        VonMisesDistribution::pdf(self, x)
    }

    fn write_to<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{} {}", self.mu, self.kappa)
    }

    fn read_from(&mut self, reader: &mut ModelReader<'_>) -> Result<(), ReadError> {
        self.mu = reader.parse("mu")?;
        self.kappa = reader.parse("kappa")?;
        self.s = (self.mu as f64).sin();
        self.c = (self.mu as f64).cos();
        self.update_normaliser();
        Ok(())
    }
}

impl OutputDistribution<VonMisesDistribution> for VonMisesDistribution {
    fn reset(&mut self) {
        self.initialise();
    }

    /// Sensor fusion: add a vector of length `kappa` in direction `mu`
    /// to the accumulators.
    fn combine(&mut self, dist: &VonMisesDistribution, _id: usize) {
        self.s += dist.kappa as f64 * (dist.mu as f64).sin();
        self.c += dist.kappa as f64 * (dist.mu as f64).cos();
    }

    /// Read `mu` and `kappa` back off the accumulated resultant vector.
    fn normalise(&mut self) {
        self.mu = self.s.atan2(self.c) as f32;
        self.kappa = self.s.hypot(self.c) as f32;
        self.update_normaliser();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI as PI32;

    fn fitted(labels: &[f32]) -> VonMisesDistribution {
        let mut dist = VonMisesDistribution::new();
        dist.fit(labels.iter().copied());
        dist
    }

    #[test]
    fn fit_recovers_mean_direction() {
        let labels = [0.9f32, 1.0, 1.1, 1.0, 0.95, 1.05];
        let dist = fitted(&labels);
        assert_abs_diff_eq!(dist.mu(), 1.0, epsilon = 1e-3);
        assert!(dist.kappa() > 0.0);
    }

    #[test]
    fn identical_labels_saturate_kappa() {
        let labels = [0.0f32; 100];
        let dist = fitted(&labels);
        assert_abs_diff_eq!(dist.mu(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(dist.kappa(), 25.0, epsilon = 1e-6);

        // The pdf stays finite and peaks at the mean.
        let at_mean = dist.pdf(0.0);
        let at_antipode = dist.pdf(PI32);
        assert!(at_mean.is_finite());
        assert!(at_mean > at_antipode);
        assert!(at_antipode > 0.0);
    }

    #[test]
    fn dispersed_labels_give_low_kappa() {
        // Four points spread evenly around the circle: resultant ~ 0.
        let labels = [0.0f32, PI32 / 2.0, PI32, -PI32 / 2.0];
        let dist = fitted(&labels);
        assert!(dist.kappa() < 1e-4);
    }

    #[test]
    fn pdf_integrates_to_one() {
        let labels = [0.4f32, 0.5, 0.6, 0.45, 0.55];
        let dist = fitted(&labels);

        // Trapezoidal quadrature over [-pi, pi].
        let steps = 20_000;
        let h = 2.0 * PI / steps as f64;
        let mut integral = 0.0;
        for i in 0..=steps {
            let x = -PI + i as f64 * h;
            let weight = if i == 0 || i == steps { 0.5 } else { 1.0 };
            integral += weight * dist.pdf(x as f32) as f64;
        }
        integral *= h;
        assert_abs_diff_eq!(integral, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn combine_fuses_concentrations() {
        let mut a = VonMisesDistribution::new();
        a.fit([1.0f32; 50].iter().copied());
        let mut b = VonMisesDistribution::new();
        b.fit([1.0f32; 50].iter().copied());

        let mut out = VonMisesDistribution::new();
        out.reset();
        out.combine(&a, 0);
        out.combine(&b, 0);
        OutputDistribution::normalise(&mut out);

        // Two agreeing saturated distributions: direction preserved,
        // concentrations add.
        assert_abs_diff_eq!(out.mu(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out.kappa(), 50.0, epsilon = 1e-3);
    }

    #[test]
    fn opposing_distributions_cancel() {
        let mut a = VonMisesDistribution::new();
        a.fit([0.0f32; 50].iter().copied());
        let mut b = VonMisesDistribution::new();
        b.fit([PI32; 50].iter().copied());

        let mut out = VonMisesDistribution::new();
        out.reset();
        out.combine(&a, 0);
        out.combine(&b, 0);
        OutputDistribution::normalise(&mut out);

        assert!(out.kappa() < 1e-3);
    }

    #[test]
    fn overflow_clamp_keeps_pdf_finite() {
        // Combining very many concentrated trees drives kappa past the
        // Bessel overflow point; normalise must clamp rather than raise.
        let mut leaf = VonMisesDistribution::new();
        leaf.fit([0.5f32; 10].iter().copied());

        let mut out = VonMisesDistribution::new();
        out.reset();
        for _ in 0..40 {
            out.combine(&leaf, 0);
        }
        OutputDistribution::normalise(&mut out);

        assert_abs_diff_eq!(out.kappa(), 500.0, epsilon = 1e-6);
        let peak = out.pdf(0.5);
        assert!(peak.is_finite());
        assert!(peak > 0.0);
    }

    #[test]
    fn entropy_decreases_with_concentration() {
        let loose = fitted(&[0.0f32, 1.0, -1.0, 0.5, -0.5]);
        let tight = fitted(&[0.0f32, 0.01, -0.01, 0.005, -0.005]);
        assert!(tight.entropy() < loose.entropy());
    }
}
