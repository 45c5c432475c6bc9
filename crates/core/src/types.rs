use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EngineError;

// ─── Attribution ────────────────────────────────────────────────────────

/// One marketing exposure (click, impression) recorded against a session
/// before a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Touchpoint {
    pub id: Uuid,
    pub session_id: String,
    /// Short code (or channel reference) the visitor came through.
    pub short_code: String,
    #[serde(default)]
    pub utm_source: String,
    #[serde(default)]
    pub utm_medium: String,
    #[serde(default)]
    pub utm_campaign: String,
    pub occurred_at: DateTime<Utc>,
}

impl Touchpoint {
    /// `source/medium`, or `direct` when the visit carried no campaign tags.
    pub fn channel(&self) -> String {
        match (self.utm_source.is_empty(), self.utm_medium.is_empty()) {
            (true, true) => "direct".to_string(),
            (false, true) => self.utm_source.clone(),
            (true, false) => self.utm_medium.clone(),
            (false, false) => format!("{}/{}", self.utm_source, self.utm_medium),
        }
    }

    /// Campaign name, or `direct` when untagged.
    pub fn campaign(&self) -> &str {
        if self.utm_campaign.is_empty() {
            "direct"
        } else {
            &self.utm_campaign
        }
    }
}

/// Touchpoints preceding one conversion, held in chronological order.
///
/// Storage order is never trusted: construction sorts by timestamp and
/// breaks ties by touchpoint id.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionJourney {
    conversion_id: Uuid,
    touchpoints: Vec<Touchpoint>,
}

impl ConversionJourney {
    pub fn new(conversion_id: Uuid, mut touchpoints: Vec<Touchpoint>) -> Self {
        touchpoints.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Self {
            conversion_id,
            touchpoints,
        }
    }

    pub fn conversion_id(&self) -> Uuid {
        self.conversion_id
    }

    pub fn touchpoints(&self) -> &[Touchpoint] {
        &self.touchpoints
    }

    pub fn len(&self) -> usize {
        self.touchpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touchpoints.is_empty()
    }

    pub fn first(&self) -> Option<&Touchpoint> {
        self.touchpoints.first()
    }

    pub fn last(&self) -> Option<&Touchpoint> {
        self.touchpoints.last()
    }

    /// Time between the first and last touchpoint.
    pub fn span(&self) -> Duration {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => last.occurred_at - first.occurred_at,
            _ => Duration::zero(),
        }
    }
}

impl<'de> Deserialize<'de> for ConversionJourney {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            conversion_id: Uuid,
            #[serde(default)]
            touchpoints: Vec<Touchpoint>,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(Self::new(raw.conversion_id, raw.touchpoints))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionModel {
    FirstTouch,
    LastTouch,
    Linear,
    TimeDecay,
    PositionBased,
}

impl AttributionModel {
    pub const ALL: [AttributionModel; 5] = [
        AttributionModel::FirstTouch,
        AttributionModel::LastTouch,
        AttributionModel::Linear,
        AttributionModel::TimeDecay,
        AttributionModel::PositionBased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionModel::FirstTouch => "first_touch",
            AttributionModel::LastTouch => "last_touch",
            AttributionModel::Linear => "linear",
            AttributionModel::TimeDecay => "time_decay",
            AttributionModel::PositionBased => "position_based",
        }
    }
}

impl fmt::Display for AttributionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributionModel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        AttributionModel::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| EngineError::InvalidModel(s.to_string()))
    }
}

/// Credit assigned to one touchpoint of a journey.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchpointAttribution {
    pub touchpoint_id: Uuid,
    pub weight: f64,
}

// ─── Experimentation ────────────────────────────────────────────────────

/// Aggregate counters for one arm of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantResult {
    pub variant_id: Uuid,
    pub name: String,
    pub sessions: u64,
    pub conversions: u64,
    #[serde(default)]
    pub is_control: bool,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub average_order_value: Option<f64>,
}

impl VariantResult {
    pub fn new(name: &str, sessions: u64, conversions: u64, is_control: bool) -> Self {
        Self {
            variant_id: Uuid::new_v4(),
            name: name.to_string(),
            sessions,
            conversions,
            is_control,
            revenue: None,
            average_order_value: None,
        }
    }

    /// Conversions per session; 0 when the arm has no sessions.
    pub fn conversion_rate(&self) -> f64 {
        crate::stats::rate(self.conversions, self.sessions)
    }

    /// Counters are usable for inference: sessions recorded and no more
    /// conversions than sessions.
    pub fn has_data(&self) -> bool {
        self.sessions > 0 && self.conversions <= self.sessions
    }
}

/// Two-proportion comparison of one variant against the control.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub is_significant: bool,
    /// Two-tailed p-value. 1.0 when the counters admit no test (an arm
    /// without sessions, conversions above sessions, or an invalid
    /// confidence level); every other statistic is then 0.
    pub p_value: f64,
    pub z_score: f64,
    pub control_rate: f64,
    pub variant_rate: f64,
    /// Relative change of the variant rate over the control rate, in percent.
    pub improvement: f64,
    /// Cohen's h.
    pub effect_size: f64,
    pub confidence_interval: (f64, f64),
    /// Smallest relative lift the current sample can detect.
    pub minimum_detectable_effect: f64,
    /// Sessions per variant needed to detect the configured target lift.
    pub sample_size_recommendation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequentialDecision {
    Continue,
    TestWins,
    ControlWins,
}

impl fmt::Display for SequentialDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SequentialDecision::Continue => "continue",
            SequentialDecision::TestWins => "test_wins",
            SequentialDecision::ControlWins => "control_wins",
        };
        f.write_str(s)
    }
}

/// Early-stopping verdict from the sequential probability ratio test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialTestResult {
    pub can_stop: bool,
    pub decision: SequentialDecision,
    /// Running two-sided confidence in percent.
    pub confidence: f64,
    pub log_likelihood_ratio: f64,
    pub upper_bound: f64,
    pub lower_bound: f64,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000, 0).unwrap()
    }

    fn touchpoint(id: u128, hours_ago: i64) -> Touchpoint {
        Touchpoint {
            id: Uuid::from_u128(id),
            session_id: format!("sess-{id}"),
            short_code: "abc123".to_string(),
            utm_source: String::new(),
            utm_medium: String::new(),
            utm_campaign: String::new(),
            occurred_at: base_time() - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn test_journey_sorts_by_timestamp() {
        let journey = ConversionJourney::new(
            Uuid::new_v4(),
            vec![touchpoint(1, 1), touchpoint(2, 48), touchpoint(3, 10)],
        );
        let ids: Vec<u128> = journey.touchpoints().iter().map(|t| t.id.as_u128()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(journey.span().num_hours(), 47);
    }

    #[test]
    fn test_journey_breaks_ties_by_id() {
        let at = base_time();
        let mut a = touchpoint(9, 0);
        let mut b = touchpoint(4, 0);
        a.occurred_at = at;
        b.occurred_at = at;
        let journey = ConversionJourney::new(Uuid::new_v4(), vec![a, b]);
        assert_eq!(journey.first().unwrap().id, Uuid::from_u128(4));
        assert_eq!(journey.last().unwrap().id, Uuid::from_u128(9));
    }

    #[test]
    fn test_deserialized_journey_is_sorted() {
        let json = serde_json::json!({
            "conversion_id": Uuid::from_u128(77),
            "touchpoints": [touchpoint(1, 1), touchpoint(2, 5)],
        });
        let journey: ConversionJourney = serde_json::from_value(json).unwrap();
        assert_eq!(journey.first().unwrap().id, Uuid::from_u128(2));
    }

    #[test]
    fn test_channel_labels() {
        let mut tp = touchpoint(1, 0);
        assert_eq!(tp.channel(), "direct");
        assert_eq!(tp.campaign(), "direct");
        tp.utm_source = "newsletter".to_string();
        assert_eq!(tp.channel(), "newsletter");
        tp.utm_medium = "email".to_string();
        tp.utm_campaign = "spring".to_string();
        assert_eq!(tp.channel(), "newsletter/email");
        assert_eq!(tp.campaign(), "spring");
    }

    #[test]
    fn test_model_parse_round_trip() {
        for model in AttributionModel::ALL {
            assert_eq!(model.to_string().parse::<AttributionModel>().unwrap(), model);
        }
        assert_eq!(
            "Time-Decay".parse::<AttributionModel>().unwrap(),
            AttributionModel::TimeDecay
        );
    }

    #[test]
    fn test_model_parse_rejects_unknown() {
        let err = "data_driven".parse::<AttributionModel>().unwrap_err();
        assert!(matches!(err, EngineError::InvalidModel(ref s) if s == "data_driven"));
    }

    #[test]
    fn test_conversion_rate_zero_sessions() {
        let v = VariantResult::new("control", 0, 0, true);
        assert_eq!(v.conversion_rate(), 0.0);
        assert!(!v.has_data());

        let v = VariantResult::new("b", 200, 10, false);
        assert!((v.conversion_rate() - 0.05).abs() < 1e-12);
        assert!(v.has_data());

        let v = VariantResult::new("broken", 10, 11, false);
        assert!(!v.has_data());
    }
}
