use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// Root engine configuration. Loaded from environment variables with the
/// prefix `LINKPULSE__` and an optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub experiments: ExperimentConfig,
}

// ─── Attribution Config ─────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct AttributionConfig {
    /// Half-life of the time-decay model, in hours.
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
    /// Credit given to each of the first and last touchpoints of a
    /// position-based journey with three or more touches.
    #[serde(default = "default_position_endpoint_weight")]
    pub position_endpoint_weight: f64,
}

fn default_half_life_hours() -> f64 { 168.0 }
fn default_position_endpoint_weight() -> f64 { 0.4 }

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            half_life_hours: default_half_life_hours(),
            position_endpoint_weight: default_position_endpoint_weight(),
        }
    }
}

// ─── Experiment Config ──────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    /// Confidence level as a percentage, e.g. 95.0.
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Statistical power used for sample-size planning, e.g. 0.8.
    #[serde(default = "default_power")]
    pub power: f64,
    /// Relative lift the sample-size recommendation is planned for.
    #[serde(default = "default_min_relative_effect")]
    pub min_relative_effect: f64,
    /// Type I error rate of the sequential test.
    #[serde(default = "default_sequential_alpha")]
    pub sequential_alpha: f64,
    /// Type II error rate of the sequential test.
    #[serde(default = "default_sequential_beta")]
    pub sequential_beta: f64,
    /// Relative lift assumed under the sequential test's alternative hypothesis.
    #[serde(default = "default_sequential_relative_effect")]
    pub sequential_relative_effect: f64,
    /// Split the error budget across treatment arms in A/B/n experiments.
    #[serde(default = "default_bonferroni_correction")]
    pub bonferroni_correction: bool,
}

fn default_confidence_level() -> f64 { 95.0 }
fn default_power() -> f64 { 0.8 }
fn default_min_relative_effect() -> f64 { 0.10 }
fn default_sequential_alpha() -> f64 { 0.05 }
fn default_sequential_beta() -> f64 { 0.20 }
fn default_sequential_relative_effect() -> f64 { 0.10 }
fn default_bonferroni_correction() -> bool { true }

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            confidence_level: default_confidence_level(),
            power: default_power(),
            min_relative_effect: default_min_relative_effect(),
            sequential_alpha: default_sequential_alpha(),
            sequential_beta: default_sequential_beta(),
            sequential_relative_effect: default_sequential_relative_effect(),
            bonferroni_correction: default_bonferroni_correction(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("LINKPULSE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Reject values the statistics routines cannot work with.
    pub fn validate(&self) -> EngineResult<()> {
        self.attribution.validate()?;
        self.experiments.validate()
    }
}

impl AttributionConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.half_life_hours > 0.0 && self.half_life_hours.is_finite()) {
            return Err(EngineError::Config(format!(
                "attribution.half_life_hours must be positive, got {}",
                self.half_life_hours
            )));
        }
        if !(0.0..=0.5).contains(&self.position_endpoint_weight) {
            return Err(EngineError::Config(format!(
                "attribution.position_endpoint_weight must be within [0, 0.5], got {}",
                self.position_endpoint_weight
            )));
        }
        Ok(())
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 100.0) {
            return Err(EngineError::Config(format!(
                "experiments.confidence_level must be within (0, 100), got {}",
                self.confidence_level
            )));
        }
        // z_β must stay positive for sample-size planning.
        if !(self.power > 0.5 && self.power < 1.0) {
            return Err(EngineError::Config(format!(
                "experiments.power must be within (0.5, 1), got {}",
                self.power
            )));
        }
        for (name, value) in [
            ("sequential_alpha", self.sequential_alpha),
            ("sequential_beta", self.sequential_beta),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(EngineError::Config(format!(
                    "experiments.{name} must be within (0, 1), got {value}"
                )));
            }
        }
        if self.sequential_alpha + self.sequential_beta >= 1.0 {
            return Err(EngineError::Config(
                "experiments.sequential_alpha + sequential_beta must be below 1".to_string(),
            ));
        }
        for (name, value) in [
            ("min_relative_effect", self.min_relative_effect),
            ("sequential_relative_effect", self.sequential_relative_effect),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(EngineError::Config(format!(
                    "experiments.{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}
