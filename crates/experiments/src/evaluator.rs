//! Experiment evaluator — compares every treatment arm of an A/B/n test
//! against its control and rolls the comparisons up into a verdict.

use chrono::{DateTime, Utc};
use linkpulse_core::config::ExperimentConfig;
use linkpulse_core::types::{SequentialTestResult, SignificanceResult, VariantResult};
use linkpulse_core::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Outcome of one treatment arm against the control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantComparison {
    pub variant_id: Uuid,
    pub variant_name: String,
    pub sessions: u64,
    pub conversions: u64,
    pub significance: SignificanceResult,
    pub sequential: SequentialTestResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// No arm is significant and the arms are still below the planned size.
    Collecting,
    SignificanceReached,
    /// Planned size reached without a significant difference.
    Inconclusive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub experiment_id: Uuid,
    pub control_id: Uuid,
    /// Per-comparison confidence level after any multiple-testing correction.
    pub confidence_level: f64,
    pub comparisons: Vec<VariantComparison>,
    pub status: ExperimentStatus,
    pub winner: Option<Uuid>,
    pub evaluated_at: DateTime<Utc>,
}

/// Stateless experiment statistics. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct ExperimentEvaluator {
    config: ExperimentConfig,
}

impl ExperimentEvaluator {
    /// Fails with `EngineError::Config` for settings the statistics cannot
    /// honour, e.g. a non-positive sequential lift that would flip H1.
    pub fn new(config: ExperimentConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Evaluate all arms of an experiment. Exactly one variant must be
    /// flagged as the control.
    pub fn evaluate_experiment(
        &self,
        experiment_id: Uuid,
        variants: &[VariantResult],
    ) -> EngineResult<ExperimentReport> {
        if variants.len() < 2 {
            return Err(EngineError::InsufficientVariants(variants.len()));
        }
        let controls: Vec<&VariantResult> = variants.iter().filter(|v| v.is_control).collect();
        let control = match controls.as_slice() {
            [] => return Err(EngineError::MissingControl),
            [control] => *control,
            many => return Err(EngineError::MultipleControls(many.len())),
        };

        let treatments: Vec<&VariantResult> = variants.iter().filter(|v| !v.is_control).collect();
        let confidence_level = self.corrected_confidence(treatments.len());

        let comparisons: Vec<VariantComparison> = treatments
            .iter()
            .map(|variant| VariantComparison {
                variant_id: variant.variant_id,
                variant_name: variant.name.clone(),
                sessions: variant.sessions,
                conversions: variant.conversions,
                significance: self.evaluate_significance(control, variant, confidence_level),
                sequential: self.evaluate_sequential(
                    control,
                    variant,
                    self.config.sequential_alpha,
                    self.config.sequential_beta,
                ),
            })
            .collect();

        let smallest_arm = variants.iter().map(|v| v.sessions).min().unwrap_or(0);
        let status = if comparisons.iter().any(|c| c.significance.is_significant) {
            ExperimentStatus::SignificanceReached
        } else if comparisons.iter().any(|c| {
            let planned = c.significance.sample_size_recommendation;
            planned == 0 || smallest_arm < planned
        }) {
            ExperimentStatus::Collecting
        } else {
            ExperimentStatus::Inconclusive
        };

        let winner = pick_winner(control, &comparisons);

        info!(
            experiment_id = %experiment_id,
            arms = variants.len(),
            confidence_level,
            status = ?status,
            winner = ?winner,
            "Experiment evaluated"
        );

        Ok(ExperimentReport {
            experiment_id,
            control_id: control.variant_id,
            confidence_level,
            comparisons,
            status,
            winner,
            evaluated_at: Utc::now(),
        })
    }

    /// Bonferroni: with k treatment arms each comparison runs at
    /// 100 − (100 − level)/k.
    fn corrected_confidence(&self, treatment_arms: usize) -> f64 {
        let level = self.config.confidence_level;
        if self.config.bonferroni_correction && treatment_arms > 1 {
            100.0 - (100.0 - level) / treatment_arms as f64
        } else {
            level
        }
    }
}

impl Default for ExperimentEvaluator {
    fn default() -> Self {
        Self {
            config: ExperimentConfig::default(),
        }
    }
}

/// Best significant positive arm; the control when the only significant
/// arms lose to it.
fn pick_winner(control: &VariantResult, comparisons: &[VariantComparison]) -> Option<Uuid> {
    let significant: Vec<&VariantComparison> = comparisons
        .iter()
        .filter(|c| c.significance.is_significant)
        .collect();

    let best = significant
        .iter()
        .filter(|c| c.significance.z_score > 0.0)
        .max_by(|a, b| {
            a.significance
                .variant_rate
                .total_cmp(&b.significance.variant_rate)
        });

    match best {
        Some(best) => Some(best.variant_id),
        None if !significant.is_empty() => Some(control.variant_id),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_two_variants() {
        let eval = ExperimentEvaluator::default();
        let err = eval
            .evaluate_experiment(Uuid::new_v4(), &[VariantResult::new("control", 10, 1, true)])
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientVariants(1)));
    }

    #[test]
    fn test_requires_exactly_one_control() {
        let eval = ExperimentEvaluator::default();
        let none = [
            VariantResult::new("a", 10, 1, false),
            VariantResult::new("b", 10, 1, false),
        ];
        assert!(matches!(
            eval.evaluate_experiment(Uuid::new_v4(), &none),
            Err(EngineError::MissingControl)
        ));

        let two = [
            VariantResult::new("a", 10, 1, true),
            VariantResult::new("b", 10, 1, true),
        ];
        assert!(matches!(
            eval.evaluate_experiment(Uuid::new_v4(), &two),
            Err(EngineError::MultipleControls(2))
        ));
    }

    #[test]
    fn test_bonferroni_correction() {
        let eval = ExperimentEvaluator::default();
        assert!((eval.corrected_confidence(1) - 95.0).abs() < 1e-12);
        assert!((eval.corrected_confidence(2) - 97.5).abs() < 1e-12);
        assert!((eval.corrected_confidence(5) - 99.0).abs() < 1e-12);

        let uncorrected = ExperimentEvaluator::new(ExperimentConfig {
            bonferroni_correction: false,
            ..Default::default()
        })
        .unwrap();
        assert!((uncorrected.corrected_confidence(5) - 95.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_invalid_config() {
        for config in [
            ExperimentConfig {
                sequential_relative_effect: -0.1,
                ..Default::default()
            },
            ExperimentConfig {
                sequential_relative_effect: 0.0,
                ..Default::default()
            },
            ExperimentConfig {
                power: 0.025,
                ..Default::default()
            },
            ExperimentConfig {
                confidence_level: 100.0,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                ExperimentEvaluator::new(config),
                Err(EngineError::Config(_))
            ));
        }
    }

    #[test]
    fn test_significant_winner() {
        let eval = ExperimentEvaluator::default();
        let control = VariantResult::new("control", 1000, 50, true);
        let treatment = VariantResult::new("treatment", 1000, 80, false);
        let report = eval
            .evaluate_experiment(Uuid::new_v4(), &[control.clone(), treatment.clone()])
            .unwrap();

        assert_eq!(report.status, ExperimentStatus::SignificanceReached);
        assert_eq!(report.winner, Some(treatment.variant_id));
        assert_eq!(report.control_id, control.variant_id);
        assert_eq!(report.comparisons.len(), 1);
    }

    #[test]
    fn test_losing_treatment_crowns_control() {
        let eval = ExperimentEvaluator::default();
        let control = VariantResult::new("control", 1000, 80, true);
        let treatment = VariantResult::new("treatment", 1000, 50, false);
        let report = eval
            .evaluate_experiment(Uuid::new_v4(), &[control.clone(), treatment])
            .unwrap();
        assert_eq!(report.winner, Some(control.variant_id));
    }

    #[test]
    fn test_small_experiment_is_collecting() {
        let eval = ExperimentEvaluator::default();
        let report = eval
            .evaluate_experiment(
                Uuid::new_v4(),
                &[
                    VariantResult::new("control", 200, 10, true),
                    VariantResult::new("b", 200, 11, false),
                ],
            )
            .unwrap();
        assert_eq!(report.status, ExperimentStatus::Collecting);
        assert_eq!(report.winner, None);
    }

    #[test]
    fn test_large_flat_experiment_is_inconclusive() {
        let eval = ExperimentEvaluator::default();
        // 20% baseline needs ~6.5k sessions per arm for a 10% lift.
        let report = eval
            .evaluate_experiment(
                Uuid::new_v4(),
                &[
                    VariantResult::new("control", 20_000, 4_000, true),
                    VariantResult::new("b", 20_000, 4_010, false),
                ],
            )
            .unwrap();
        assert_eq!(report.status, ExperimentStatus::Inconclusive);
        assert_eq!(report.winner, None);
    }
}
