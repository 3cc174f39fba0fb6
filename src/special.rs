//! Modified Bessel functions of the first kind.
//!
//! The von Mises distribution needs `I0` (pdf normaliser, entropy) and
//! `I1` (concentration fitting). Polynomial approximations from
//! Abramowitz & Stegun 9.8.1–9.8.4; absolute error below 2e-7 over the
//! small-argument range and relative error below 2e-7 beyond it, which
//! is far inside the tolerance of the concentration solver.
//!
//! For large arguments the leading `e^x` factor overflows `f64` around
//! `x ≈ 709`; callers that can reach that regime (combining many highly
//! concentrated distributions) check for an infinite result and clamp.

/// Modified Bessel function of the first kind, order zero.
///
/// A&S 9.8.1 (|x| < 3.75) and 9.8.2 (beyond). Returns
/// `f64::INFINITY` when `e^|x|` overflows.
pub fn bessel_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.75 {
        let t = x / 3.75;
        let t2 = t * t;
        0.0045813f64
            .mul_add(t2, 0.0360768)
            .mul_add(t2, 0.2659732)
            .mul_add(t2, 1.2067492)
            .mul_add(t2, 3.0899424)
            .mul_add(t2, 3.5156229)
            .mul_add(t2, 1.0)
    } else {
        let t = 3.75 / ax;
        let poly = 0.00392377f64
            .mul_add(t, -0.01647633)
            .mul_add(t, 0.02635537)
            .mul_add(t, -0.02057706)
            .mul_add(t, 0.00916281)
            .mul_add(t, -0.00157565)
            .mul_add(t, 0.00225319)
            .mul_add(t, 0.01328592)
            .mul_add(t, 0.39894228);
        ax.exp() / ax.sqrt() * poly
    }
}

/// Modified Bessel function of the first kind, order one.
///
/// A&S 9.8.3 (|x| < 3.75) and 9.8.4 (beyond). Odd in `x`.
pub fn bessel_i1(x: f64) -> f64 {
    let ax = x.abs();
    let result = if ax < 3.75 {
        let t = x / 3.75;
        let t2 = t * t;
        let poly = 0.00032411f64
            .mul_add(t2, 0.00301532)
            .mul_add(t2, 0.02658733)
            .mul_add(t2, 0.15084934)
            .mul_add(t2, 0.51498869)
            .mul_add(t2, 0.87890594)
            .mul_add(t2, 0.5);
        ax * poly
    } else {
        let t = 3.75 / ax;
        let poly = (-0.00420059f64)
            .mul_add(t, 0.01787654)
            .mul_add(t, -0.02895312)
            .mul_add(t, 0.02282967)
            .mul_add(t, -0.01031555)
            .mul_add(t, 0.00163801)
            .mul_add(t, -0.00362018)
            .mul_add(t, -0.03988024)
            .mul_add(t, 0.39894228);
        ax.exp() / ax.sqrt() * poly
    };
    if x < 0.0 {
        -result
    } else {
        result
    }
}
