//! Numerical solver for the von Mises concentration parameter.
//!
//! Maximum-likelihood fitting of a von Mises distribution reduces to the
//! scalar equation `I1(kappa) / I0(kappa) = R`, where `R` is the mean
//! resultant length of the sample. The ratio is strictly increasing from
//! 0 towards 1, so any bracketing root-finder works; this one uses plain
//! bisection, which is robust for the well-conditioned range the fit
//! restricts itself to (`R <= 0.98`, i.e. `kappa` below roughly 25).

use crate::special::{bessel_i0, bessel_i1};

/// Upper end of the search bracket. `R = 0.98` corresponds to
/// `kappa ~ 25.2`, comfortably inside.
const KAPPA_MAX: f64 = 50.0;

/// Absolute tolerance on the bracket width.
const TOLERANCE: f64 = 1e-10;

/// Solve `I1(kappa) / I0(kappa) = r_bar` for `kappa >= 0`.
///
/// `r_bar` must lie in `[0, 0.98]`; the von Mises fit clamps saturated
/// samples before calling this.
pub fn solve_kappa(r_bar: f64) -> f64 {
    debug_assert!((0.0..=0.98).contains(&r_bar), "r_bar out of range: {r_bar}");

    if r_bar <= 0.0 {
        return 0.0;
    }

    let f = |kappa: f64| bessel_i1(kappa) / bessel_i0(kappa) - r_bar;

    let mut lo = 0.0;
    let mut hi = KAPPA_MAX;
    // f(lo) < 0 and f(hi) > 0 for every r_bar in range.
    while hi - lo > TOLERANCE {
        let mid = 0.5 * (lo + hi);
        if f(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}
