//! Two-proportion z-test with pooled variance, Cohen's h and an unpooled
//! confidence interval for the rate difference.

use linkpulse_core::stats::{cohens_h, pooled_proportion, two_tailed_p_value, z_critical};
use linkpulse_core::types::{SignificanceResult, VariantResult};
use tracing::debug;

use crate::evaluator::ExperimentEvaluator;
use crate::sample_size::{minimum_detectable_effect, recommend_sample_size};

impl ExperimentEvaluator {
    /// Compare `variant` against `control` at `confidence_level` percent.
    ///
    /// Arms without sessions, counters with more conversions than sessions,
    /// or a confidence level outside (0, 100) yield a non-significant result
    /// with zeroed statistics and a p-value of 1.
    pub fn evaluate_significance(
        &self,
        control: &VariantResult,
        variant: &VariantResult,
        confidence_level: f64,
    ) -> SignificanceResult {
        let Some(z_crit) = z_critical(confidence_level) else {
            debug!(confidence_level, "Confidence level out of range");
            return inconclusive();
        };
        if !control.has_data() || !variant.has_data() {
            debug!(
                control_sessions = control.sessions,
                variant_sessions = variant.sessions,
                "Not enough data for a significance test"
            );
            return inconclusive();
        }

        let n1 = control.sessions as f64;
        let n2 = variant.sessions as f64;
        let p1 = control.conversion_rate();
        let p2 = variant.conversion_rate();

        let z = z_score(control, variant);
        let p_value = two_tailed_p_value(z);
        let is_significant = z != 0.0 && z.abs() >= z_crit;

        let improvement = if p1 > 0.0 { (p2 - p1) / p1 * 100.0 } else { 0.0 };

        let diff = p2 - p1;
        let se_unpooled = (p1 * (1.0 - p1) / n1 + p2 * (1.0 - p2) / n2).sqrt();
        let margin = z_crit * se_unpooled;

        let power = self.config().power;
        let result = SignificanceResult {
            is_significant,
            p_value,
            z_score: z,
            control_rate: p1,
            variant_rate: p2,
            improvement,
            effect_size: cohens_h(p1, p2),
            confidence_interval: (diff - margin, diff + margin),
            minimum_detectable_effect: minimum_detectable_effect(
                p1,
                control.sessions.min(variant.sessions),
                confidence_level,
                power,
            ),
            sample_size_recommendation: recommend_sample_size(
                p1,
                self.config().min_relative_effect,
                confidence_level,
                power,
            ),
        };

        debug!(
            control = %control.name,
            variant = %variant.name,
            z_score = result.z_score,
            p_value = result.p_value,
            significant = result.is_significant,
            "Significance evaluated"
        );
        result
    }
}

/// Pooled two-proportion z statistic, positive when the variant converts
/// better. 0 when the pooled standard error vanishes.
pub(crate) fn z_score(control: &VariantResult, variant: &VariantResult) -> f64 {
    let Some(pooled) = pooled_proportion(
        control.conversions,
        control.sessions,
        variant.conversions,
        variant.sessions,
    ) else {
        return 0.0;
    };
    if control.sessions == 0 || variant.sessions == 0 {
        return 0.0;
    }
    let se = (pooled * (1.0 - pooled)
        * (1.0 / control.sessions as f64 + 1.0 / variant.sessions as f64))
        .sqrt();
    if se > 0.0 {
        (variant.conversion_rate() - control.conversion_rate()) / se
    } else {
        0.0
    }
}

fn inconclusive() -> SignificanceResult {
    SignificanceResult {
        p_value: 1.0,
        ..Default::default()
    }
}
