//! Power analysis for two-proportion tests.

use linkpulse_core::stats::{inverse_normal_cdf, z_critical};

const BISECTION_STEPS: usize = 100;

/// Sessions needed per variant to detect a relative lift of
/// `min_relative_effect` over `baseline_rate`.
///
/// Returns 0 when the inputs admit no answer: a baseline outside (0, 1), a
/// non-positive effect, a lifted rate at or above 1, a confidence level
/// outside (0, 100) or a power outside (0.5, 1). At or below 0.5 power
/// z_β turns non-positive and the required size would shrink as power grows.
pub fn recommend_sample_size(
    baseline_rate: f64,
    min_relative_effect: f64,
    confidence_level: f64,
    power: f64,
) -> u64 {
    match critical_values(confidence_level, power) {
        Some((z_alpha, z_beta)) => {
            required_sessions(baseline_rate, min_relative_effect, z_alpha, z_beta)
                .map(|n| n.ceil() as u64)
                .unwrap_or(0)
        }
        None => 0,
    }
}

/// Smallest relative lift over `baseline_rate` that `sessions_per_variant`
/// sessions can detect at the given confidence and power.
///
/// Found by bisection over [`recommend_sample_size`], so the two always
/// agree. Returns 0 under the same validity gate, when no sessions were
/// recorded, or when even the largest representable lift needs more
/// sessions than are available.
pub fn minimum_detectable_effect(
    baseline_rate: f64,
    sessions_per_variant: u64,
    confidence_level: f64,
    power: f64,
) -> f64 {
    if sessions_per_variant == 0 || !(baseline_rate > 0.0 && baseline_rate < 1.0) {
        return 0.0;
    }
    let Some((z_alpha, z_beta)) = critical_values(confidence_level, power) else {
        return 0.0;
    };
    let fits = |effect: f64| {
        required_sessions(baseline_rate, effect, z_alpha, z_beta)
            .map(|n| n.ceil() as u64 <= sessions_per_variant)
            .unwrap_or(false)
    };

    // Largest lift that keeps the treated rate below 1.
    let mut hi = (1.0 / baseline_rate - 1.0) * (1.0 - 1e-9);
    if !fits(hi) {
        return 0.0;
    }
    let mut lo = 0.0;
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if fits(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}

fn critical_values(confidence_level: f64, power: f64) -> Option<(f64, f64)> {
    if !(power > 0.5) {
        return None;
    }
    Some((z_critical(confidence_level)?, inverse_normal_cdf(power)?))
}

fn required_sessions(p1: f64, relative_effect: f64, z_alpha: f64, z_beta: f64) -> Option<f64> {
    if !(p1 > 0.0 && p1 < 1.0) || !(relative_effect > 0.0) {
        return None;
    }
    let p2 = p1 * (1.0 + relative_effect);
    if !(p2 < 1.0) {
        return None;
    }
    let p_bar = (p1 + p2) / 2.0;
    let spread = z_alpha * (2.0 * p_bar * (1.0 - p_bar)).sqrt()
        + z_beta * (p1 * (1.0 - p1) + p2 * (1.0 - p2)).sqrt();
    if !(spread > 0.0) {
        return None;
    }
    let delta = p2 - p1;
    Some(spread * spread / (delta * delta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sample_size() {
        // 10% baseline, 20% relative lift, 95% / 80%: about 3,841 per arm.
        let n = recommend_sample_size(0.10, 0.20, 95.0, 0.8);
        assert!((3_800..=3_900).contains(&n), "got {n}");
    }

    #[test]
    fn test_invalid_inputs_return_zero() {
        assert_eq!(recommend_sample_size(0.0, 0.1, 95.0, 0.8), 0);
        assert_eq!(recommend_sample_size(-0.2, 0.1, 95.0, 0.8), 0);
        assert_eq!(recommend_sample_size(1.0, 0.1, 95.0, 0.8), 0);
        assert_eq!(recommend_sample_size(1.4, 0.1, 95.0, 0.8), 0);
        assert_eq!(recommend_sample_size(0.1, 0.0, 95.0, 0.8), 0);
        assert_eq!(recommend_sample_size(0.1, -0.5, 95.0, 0.8), 0);
        assert_eq!(recommend_sample_size(f64::NAN, 0.1, 95.0, 0.8), 0);
        assert_eq!(recommend_sample_size(0.1, 0.1, 100.0, 0.8), 0);
        assert_eq!(recommend_sample_size(0.1, 0.1, 95.0, 1.0), 0);
        // Lifted rate would exceed 1.
        assert_eq!(recommend_sample_size(0.6, 1.0, 95.0, 0.8), 0);
    }

    #[test]
    fn test_smaller_effect_needs_more_sessions() {
        let mut previous = 0;
        for effect in [0.5, 0.3, 0.2, 0.1, 0.05, 0.02] {
            let n = recommend_sample_size(0.05, effect, 95.0, 0.8);
            assert!(n > previous, "effect {effect}: {n} <= {previous}");
            previous = n;
        }
    }

    #[test]
    fn test_smaller_baseline_needs_more_sessions() {
        let mut previous = 0;
        for baseline in [0.4, 0.2, 0.1, 0.05, 0.01] {
            let n = recommend_sample_size(baseline, 0.1, 95.0, 0.8);
            assert!(n > previous, "baseline {baseline}: {n} <= {previous}");
            previous = n;
        }
    }

    #[test]
    fn test_higher_power_or_confidence_needs_more_sessions() {
        let base = recommend_sample_size(0.05, 0.1, 95.0, 0.8);
        assert!(recommend_sample_size(0.05, 0.1, 95.0, 0.9) > base);
        assert!(recommend_sample_size(0.05, 0.1, 99.0, 0.8) > base);
        assert!(recommend_sample_size(0.05, 0.1, 90.0, 0.8) < base);
    }

    #[test]
    fn test_power_at_or_below_half_returns_zero() {
        for power in [0.02, 0.025, 0.05, 0.2, 0.5] {
            assert_eq!(recommend_sample_size(0.05, 0.1, 95.0, power), 0, "power {power}");
            assert_eq!(minimum_detectable_effect(0.05, 10_000, 95.0, power), 0.0);
        }
    }

    #[test]
    fn test_sample_size_grows_with_power() {
        // Below 0.5 the answer is 0, so the walk can only climb from there.
        let mut previous = 0;
        for power in [0.02, 0.025, 0.5, 0.51, 0.55, 0.6, 0.7, 0.8, 0.9, 0.95, 0.99] {
            let n = recommend_sample_size(0.05, 0.1, 95.0, power);
            assert!(n >= previous, "power {power}: {n} < {previous}");
            if power > 0.5 {
                assert!(n > previous, "power {power}: {n} <= {previous}");
            }
            previous = n;
        }
    }

    #[test]
    fn test_mde_consistent_with_sample_size() {
        let mde = minimum_detectable_effect(0.05, 10_000, 95.0, 0.8);
        assert!(mde > 0.0);
        assert!(recommend_sample_size(0.05, mde, 95.0, 0.8) <= 10_000);
        assert!(recommend_sample_size(0.05, mde * 0.99, 95.0, 0.8) > 10_000);
    }

    #[test]
    fn test_mde_shrinks_with_more_sessions() {
        let small = minimum_detectable_effect(0.05, 1_000, 95.0, 0.8);
        let large = minimum_detectable_effect(0.05, 100_000, 95.0, 0.8);
        assert!(large < small);
    }

    #[test]
    fn test_mde_degenerate_inputs() {
        assert_eq!(minimum_detectable_effect(0.05, 0, 95.0, 0.8), 0.0);
        assert_eq!(minimum_detectable_effect(0.0, 1_000, 95.0, 0.8), 0.0);
        assert_eq!(minimum_detectable_effect(0.05, 1_000, 0.0, 0.8), 0.0);
        // Two sessions can't detect anything.
        assert_eq!(minimum_detectable_effect(0.05, 2, 95.0, 0.8), 0.0);
    }
}
