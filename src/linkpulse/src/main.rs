//! LinkPulse — attribution and experiment statistics for short-link campaigns.
//!
//! Reads JSON snapshots of journeys or variant counters and prints the
//! computed attribution or verdict as JSON on stdout.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use linkpulse_attribution::{AttributionReport, AttributionResolver};
use linkpulse_core::config::AppConfig;
use linkpulse_core::types::{AttributionModel, ConversionJourney, VariantResult};
use linkpulse_experiments::{recommend_sample_size, ExperimentEvaluator};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "linkpulse")]
#[command(about = "Attribution and experiment statistics for short-link campaigns")]
#[command(version)]
struct Cli {
    /// Optional TOML config file (environment `LINKPULSE__*` overrides it)
    #[arg(long, global = true, env = "LINKPULSE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Distribute conversion credit across a journey's touchpoints
    Attribute {
        /// first_touch, last_touch, linear, time_decay or position_based
        #[arg(long, default_value = "linear")]
        model: String,
        /// Journey JSON: {"conversion_id": ..., "touchpoints": [...]}
        #[arg(long)]
        input: PathBuf,
        /// Conversion instant (RFC 3339) for the time-decay model
        #[arg(long)]
        conversion_time: Option<DateTime<Utc>>,
    },
    /// Two-proportion significance test of a variant against the control
    Significance {
        /// JSON: {"control": {...}, "variant": {...}}
        #[arg(long)]
        input: PathBuf,
        /// Confidence level in percent (overrides config)
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// Sessions per variant needed to detect a relative lift
    SampleSize {
        #[arg(long)]
        baseline: f64,
        /// Relative lift, e.g. 0.1 for +10%
        #[arg(long)]
        effect: f64,
        #[arg(long)]
        confidence: Option<f64>,
        #[arg(long)]
        power: Option<f64>,
    },
    /// Sequential early-stopping check of a variant against the control
    Sequential {
        /// JSON: {"control": {...}, "variant": {...}}
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        alpha: Option<f64>,
        #[arg(long)]
        beta: Option<f64>,
    },
    /// Evaluate every arm of an A/B/n experiment
    Experiment {
        /// JSON: {"experiment_id": ..., "variants": [...]}
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Deserialize)]
struct VariantPair {
    control: VariantResult,
    variant: VariantResult,
}

#[derive(Deserialize)]
struct ExperimentSnapshot {
    experiment_id: Uuid,
    variants: Vec<VariantResult>,
}

#[derive(Serialize)]
struct SampleSizeOutput {
    baseline_rate: f64,
    min_relative_effect: f64,
    confidence_level: f64,
    power: f64,
    sessions_per_variant: u64,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkpulse=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    config.validate().context("invalid configuration")?;

    info!(
        half_life_hours = config.attribution.half_life_hours,
        confidence_level = config.experiments.confidence_level,
        power = config.experiments.power,
        "Configuration loaded"
    );

    let output = match cli.command {
        Command::Attribute {
            model,
            input,
            conversion_time,
        } => {
            let model: AttributionModel = model.parse()?;
            let journey: ConversionJourney = read_json(&input)?;
            let resolver = AttributionResolver::new(&config.attribution)?;
            let report = AttributionReport {
                conversion_id: journey.conversion_id(),
                model,
                attributions: resolver.attribute_at(&journey, model, conversion_time),
                computed_at: Utc::now(),
            };
            serde_json::to_string_pretty(&report)?
        }
        Command::Significance { input, confidence } => {
            let pair: VariantPair = read_json(&input)?;
            let level = confidence.unwrap_or(config.experiments.confidence_level);
            let evaluator = ExperimentEvaluator::new(config.experiments)?;
            let result = evaluator.evaluate_significance(&pair.control, &pair.variant, level);
            serde_json::to_string_pretty(&result)?
        }
        Command::SampleSize {
            baseline,
            effect,
            confidence,
            power,
        } => {
            let confidence_level = confidence.unwrap_or(config.experiments.confidence_level);
            let power = power.unwrap_or(config.experiments.power);
            serde_json::to_string_pretty(&SampleSizeOutput {
                baseline_rate: baseline,
                min_relative_effect: effect,
                confidence_level,
                power,
                sessions_per_variant: recommend_sample_size(baseline, effect, confidence_level, power),
            })?
        }
        Command::Sequential { input, alpha, beta } => {
            let pair: VariantPair = read_json(&input)?;
            let alpha = alpha.unwrap_or(config.experiments.sequential_alpha);
            let beta = beta.unwrap_or(config.experiments.sequential_beta);
            let evaluator = ExperimentEvaluator::new(config.experiments)?;
            let result = evaluator.evaluate_sequential(&pair.control, &pair.variant, alpha, beta);
            serde_json::to_string_pretty(&result)?
        }
        Command::Experiment { input } => {
            let snapshot: ExperimentSnapshot = read_json(&input)?;
            let evaluator = ExperimentEvaluator::new(config.experiments)?;
            let report = evaluator.evaluate_experiment(snapshot.experiment_id, &snapshot.variants)?;
            serde_json::to_string_pretty(&report)?
        }
    };

    println!("{output}");
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
