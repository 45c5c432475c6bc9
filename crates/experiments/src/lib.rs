//! Experiment evaluation — two-proportion significance testing, effect size,
//! power analysis and sequential early-stopping for A/B/n tests.

pub mod evaluator;
pub mod sample_size;
pub mod sequential;
pub mod significance;

pub use evaluator::{ExperimentEvaluator, ExperimentReport, ExperimentStatus, VariantComparison};
pub use sample_size::{minimum_detectable_effect, recommend_sample_size};
