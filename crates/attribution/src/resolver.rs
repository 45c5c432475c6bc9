//! Attribution resolver — distributes conversion credit across a journey's
//! touchpoints under first-touch, last-touch, linear, time-decay and
//! position-based models.

use chrono::{DateTime, Utc};
use linkpulse_core::config::AttributionConfig;
use linkpulse_core::types::{AttributionModel, ConversionJourney, Touchpoint, TouchpointAttribution};
use linkpulse_core::EngineResult;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::store::JourneySource;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Credit distribution for one conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionReport {
    pub conversion_id: Uuid,
    pub model: AttributionModel,
    pub attributions: Vec<TouchpointAttribution>,
    pub computed_at: DateTime<Utc>,
}

/// Stateless attribution calculator. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct AttributionResolver {
    half_life_hours: f64,
    position_endpoint_weight: f64,
}

impl AttributionResolver {
    /// Fails with `EngineError::Config` when the half-life or endpoint
    /// weight would produce weights that do not sum to 1.
    pub fn new(config: &AttributionConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: &AttributionConfig) -> Self {
        Self {
            half_life_hours: config.half_life_hours,
            position_endpoint_weight: config.position_endpoint_weight,
        }
    }

    /// Attribute an unordered set of touchpoints. The result is in
    /// chronological order.
    pub fn attribute(
        &self,
        touchpoints: &[Touchpoint],
        model: AttributionModel,
    ) -> Vec<TouchpointAttribution> {
        let mut ordered: Vec<&Touchpoint> = touchpoints.iter().collect();
        ordered.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        self.distribute(&ordered, model, None)
    }

    /// Attribute an already assembled journey.
    pub fn attribute_journey(
        &self,
        journey: &ConversionJourney,
        model: AttributionModel,
    ) -> Vec<TouchpointAttribution> {
        self.attribute_at(journey, model, None)
    }

    /// Attribute a journey with an explicit conversion instant. Only the
    /// time-decay model looks at it; without one the last touchpoint stands
    /// in for the conversion.
    pub fn attribute_at(
        &self,
        journey: &ConversionJourney,
        model: AttributionModel,
        conversion_time: Option<DateTime<Utc>>,
    ) -> Vec<TouchpointAttribution> {
        let ordered: Vec<&Touchpoint> = journey.touchpoints().iter().collect();
        debug!(
            conversion_id = %journey.conversion_id(),
            model = %model,
            touchpoints = ordered.len(),
            "Attributing conversion journey"
        );
        self.distribute(&ordered, model, conversion_time)
    }

    /// Attribute using a model name as received from callers, e.g. `"linear"`.
    pub fn attribute_named(
        &self,
        touchpoints: &[Touchpoint],
        model: &str,
    ) -> EngineResult<Vec<TouchpointAttribution>> {
        let model = model.parse::<AttributionModel>()?;
        Ok(self.attribute(touchpoints, model))
    }

    /// Fetch a journey from the store and attribute it. `None` when the
    /// store knows nothing about the conversion.
    pub fn attribute_conversion<S: JourneySource + ?Sized>(
        &self,
        source: &S,
        conversion_id: &Uuid,
        model: AttributionModel,
    ) -> Option<AttributionReport> {
        let journey = source.journey(conversion_id)?;
        Some(AttributionReport {
            conversion_id: *conversion_id,
            model,
            attributions: self.attribute_journey(&journey, model),
            computed_at: Utc::now(),
        })
    }

    fn distribute(
        &self,
        ordered: &[&Touchpoint],
        model: AttributionModel,
        conversion_time: Option<DateTime<Utc>>,
    ) -> Vec<TouchpointAttribution> {
        let weights = match ordered.len() {
            0 => return Vec::new(),
            1 => vec![1.0],
            n => match model {
                AttributionModel::FirstTouch => one_hot(n, 0),
                AttributionModel::LastTouch => one_hot(n, n - 1),
                AttributionModel::Linear => vec![1.0 / n as f64; n],
                AttributionModel::TimeDecay => self.time_decay(ordered, conversion_time),
                AttributionModel::PositionBased => self.position_based(n),
            },
        };

        ordered
            .iter()
            .zip(weights)
            .map(|(tp, weight)| TouchpointAttribution {
                touchpoint_id: tp.id,
                weight,
            })
            .collect()
    }

    fn time_decay(
        &self,
        ordered: &[&Touchpoint],
        conversion_time: Option<DateTime<Utc>>,
    ) -> Vec<f64> {
        // Non-empty: the caller short-circuits shorter journeys.
        let reference = conversion_time.unwrap_or(ordered[ordered.len() - 1].occurred_at);
        let ages: Vec<f64> = ordered
            .iter()
            .map(|tp| (reference - tp.occurred_at).num_milliseconds() as f64 / MILLIS_PER_HOUR)
            .collect();

        // Decay relative to the freshest touchpoint so old journeys don't
        // underflow to zero; the normalization cancels the shift.
        let freshest = ages.iter().copied().fold(f64::INFINITY, f64::min);
        let raw: Vec<f64> = ages
            .iter()
            .map(|age| (-(age - freshest) / self.half_life_hours).exp2())
            .collect();
        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|r| r / total).collect()
    }

    fn position_based(&self, n: usize) -> Vec<f64> {
        if n == 2 {
            return vec![0.5, 0.5];
        }
        let endpoint = self.position_endpoint_weight;
        let middle = (1.0 - 2.0 * endpoint) / (n - 2) as f64;
        let mut weights = vec![middle; n];
        weights[0] = endpoint;
        weights[n - 1] = endpoint;
        weights
    }
}

impl Default for AttributionResolver {
    fn default() -> Self {
        Self::from_valid(&AttributionConfig::default())
    }
}

fn one_hot(n: usize, index: usize) -> Vec<f64> {
    let mut weights = vec![0.0; n];
    weights[index] = 1.0;
    weights
}
