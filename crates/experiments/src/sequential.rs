//! Wald's sequential probability ratio test on conversion counts — lets a
//! running experiment stop early without inflating the false-positive rate.
//!
//! H0: the variant converts at the control's observed rate p.
//! H1: the variant converts at p·(1 + lift).
//!
//! The control arm's likelihood is the same under both hypotheses, so the
//! log-likelihood ratio accumulates over the variant's conversions x and
//! non-conversions n − x:
//!
//!   LLR = x·ln(p₁/p) + (n − x)·ln((1 − p₁)/(1 − p))

use linkpulse_core::stats::two_tailed_p_value;
use linkpulse_core::types::{SequentialDecision, SequentialTestResult, VariantResult};
use tracing::debug;

use crate::evaluator::ExperimentEvaluator;
use crate::significance::z_score;

impl ExperimentEvaluator {
    /// Early-stopping check for `variant` against `control` with type I
    /// error `alpha` and type II error `beta`.
    ///
    /// Out-of-range error rates, arms without data and control rates at 0
    /// or 1 resolve to `continue` with a zero statistic.
    pub fn evaluate_sequential(
        &self,
        control: &VariantResult,
        variant: &VariantResult,
        alpha: f64,
        beta: f64,
    ) -> SequentialTestResult {
        let valid_rate = |r: f64| r > 0.0 && r < 1.0;
        if !valid_rate(alpha) || !valid_rate(beta) || alpha + beta >= 1.0 {
            return undecided(
                0.0,
                0.0,
                format!("alpha ({alpha}) and beta ({beta}) must lie in (0, 1) and sum below 1"),
            );
        }
        let upper = ((1.0 - beta) / alpha).ln();
        let lower = (beta / (1.0 - alpha)).ln();

        if !control.has_data() || !variant.has_data() {
            return undecided(upper, lower, "waiting for sessions in both arms".to_string());
        }
        let p0 = control.conversion_rate();
        if !valid_rate(p0) {
            return undecided(
                upper,
                lower,
                format!("control conversion rate {p0:.4} leaves no room to test a lift"),
            );
        }
        let p1 = p0 * (1.0 + self.config().sequential_relative_effect);
        if !valid_rate(p1) {
            return undecided(
                upper,
                lower,
                format!("hypothesized variant rate {p1:.4} is not a valid proportion"),
            );
        }

        let conversions = variant.conversions as f64;
        let misses = (variant.sessions - variant.conversions) as f64;
        let llr = conversions * (p1 / p0).ln() + misses * ((1.0 - p1) / (1.0 - p0)).ln();
        let confidence = (1.0 - two_tailed_p_value(z_score(control, variant))) * 100.0;

        let (decision, reason) = if llr >= upper {
            (
                SequentialDecision::TestWins,
                format!(
                    "log-likelihood ratio {llr:.3} crossed the upper boundary {upper:.3}: \
                     {} beats {}",
                    variant.name, control.name
                ),
            )
        } else if llr <= lower {
            (
                SequentialDecision::ControlWins,
                format!(
                    "log-likelihood ratio {llr:.3} crossed the lower boundary {lower:.3}: \
                     {} shows no lift over {}",
                    variant.name, control.name
                ),
            )
        } else {
            (
                SequentialDecision::Continue,
                format!(
                    "log-likelihood ratio {llr:.3} is {:.3} below the upper boundary and \
                     {:.3} above the lower boundary; keep collecting data",
                    upper - llr,
                    llr - lower
                ),
            )
        };

        debug!(
            control = %control.name,
            variant = %variant.name,
            llr,
            decision = %decision,
            "Sequential test evaluated"
        );

        SequentialTestResult {
            can_stop: decision != SequentialDecision::Continue,
            decision,
            confidence,
            log_likelihood_ratio: llr,
            upper_bound: upper,
            lower_bound: lower,
            reason,
        }
    }
}

fn undecided(upper: f64, lower: f64, reason: String) -> SequentialTestResult {
    SequentialTestResult {
        can_stop: false,
        decision: SequentialDecision::Continue,
        confidence: 0.0,
        log_likelihood_ratio: 0.0,
        upper_bound: upper,
        lower_bound: lower,
        reason,
    }
}
