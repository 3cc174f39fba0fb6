//! Shared helpers for integration tests: deterministic synthetic data.

// Each integration test binary compiles its own copy of this module
// and uses a different subset of it.
#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

/// The seeded RNG used throughout the integration tests.
pub fn rng(seed: u64) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(seed)
}

/// Two 1-D Gaussian clusters: `n_per_class` samples per class, class 0
/// around `mu0` and class 1 around `mu1`, unit standard deviation.
/// Returns `(features, labels)`.
pub fn two_gaussian_classes(
    n_per_class: usize,
    mu0: f64,
    mu1: f64,
    rng: &mut Xoshiro256PlusPlus,
) -> (Vec<f32>, Vec<u32>) {
    let mut features = Vec::with_capacity(2 * n_per_class);
    let mut labels = Vec::with_capacity(2 * n_per_class);
    for (class, mu) in [(0u32, mu0), (1u32, mu1)] {
        let normal = Normal::new(mu, 1.0).unwrap();
        for _ in 0..n_per_class {
            features.push(normal.sample(rng) as f32);
            labels.push(class);
        }
    }
    (features, labels)
}

/// Draw one angle from a von Mises distribution by Best & Fisher (1979)
/// rejection sampling. Returns a value in `[-pi, pi]`.
pub fn sample_von_mises(mu: f64, kappa: f64, rng: &mut Xoshiro256PlusPlus) -> f32 {
    use std::f64::consts::PI;

    if kappa < 1e-8 {
        return (rng.gen_range(-PI..PI)) as f32;
    }

    let a = 1.0 + (1.0 + 4.0 * kappa * kappa).sqrt();
    let b = (a - (2.0 * a).sqrt()) / (2.0 * kappa);
    let r = (1.0 + b * b) / (2.0 * b);

    loop {
        let u1: f64 = rng.gen();
        let z = (PI * u1).cos();
        let f = (1.0 + r * z) / (r + z);
        let c = kappa * (r - f);

        let u2: f64 = rng.gen();
        if c * (2.0 - c) - u2 > 0.0 || (c / u2).ln() + 1.0 - c >= 0.0 {
            let u3: f64 = rng.gen();
            let sign = if u3 > 0.5 { 1.0 } else { -1.0 };
            let mut theta = mu + sign * f.acos();
            // Wrap into [-pi, pi].
            while theta > PI {
                theta -= 2.0 * PI;
            }
            while theta < -PI {
                theta += 2.0 * PI;
            }
            return theta as f32;
        }
    }
}

/// Smallest absolute difference between two angles, in radians.
pub fn angular_distance(a: f32, b: f32) -> f32 {
    use std::f32::consts::PI;
    let mut d = (a - b) % (2.0 * PI);
    if d > PI {
        d -= 2.0 * PI;
    }
    if d < -PI {
        d += 2.0 * PI;
    }
    d.abs()
}
