//! Numeric primitives shared by the attribution and experimentation engines.
//!
//! Normal-distribution functions go through `statrs`' error-function
//! implementations; everything else is closed-form.

use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::SQRT_2;

/// Standard normal CDF Φ(x).
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal upper tail 1 − Φ(x), computed without cancellation.
pub fn normal_sf(x: f64) -> f64 {
    0.5 * erfc(x / SQRT_2)
}

/// Inverse standard normal CDF Φ⁻¹(p). `None` outside the open interval (0, 1).
pub fn inverse_normal_cdf(p: f64) -> Option<f64> {
    if p > 0.0 && p < 1.0 {
        Some(-SQRT_2 * erfc_inv(2.0 * p))
    } else {
        None
    }
}

/// Two-tailed p-value for a z statistic.
pub fn two_tailed_p_value(z: f64) -> f64 {
    (2.0 * normal_sf(z.abs())).min(1.0)
}

/// Two-sided critical z for a confidence level given in percent
/// (95.0 → 1.959964). `None` outside (0, 100).
pub fn z_critical(confidence_level: f64) -> Option<f64> {
    if !(confidence_level > 0.0 && confidence_level < 100.0) {
        return None;
    }
    let alpha = 1.0 - confidence_level / 100.0;
    inverse_normal_cdf(1.0 - alpha / 2.0)
}

/// Successes over trials; 0 when there are no trials.
pub fn rate(successes: u64, trials: u64) -> f64 {
    if trials == 0 {
        0.0
    } else {
        successes as f64 / trials as f64
    }
}

/// Combined rate of two samples under the hypothesis that they share one.
pub fn pooled_proportion(x1: u64, n1: u64, x2: u64, n2: u64) -> Option<f64> {
    let n = n1.checked_add(n2)?;
    if n == 0 {
        return None;
    }
    Some((x1 + x2) as f64 / n as f64)
}

/// Variance-stabilizing arcsine transform φ = 2·asin(√p).
pub fn arcsine_transform(p: f64) -> f64 {
    2.0 * p.clamp(0.0, 1.0).sqrt().asin()
}

/// Cohen's h for two proportions, φ(p2) − φ(p1).
///
/// Only defined on the open interval: returns 0 if either rate sits at 0 or 1.
pub fn cohens_h(p1: f64, p2: f64) -> f64 {
    let open = |p: f64| p > 0.0 && p < 1.0;
    if !open(p1) || !open(p2) {
        return 0.0;
    }
    arcsine_transform(p2) - arcsine_transform(p1)
}
