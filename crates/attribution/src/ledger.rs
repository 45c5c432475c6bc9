//! Campaign credit roll-up — sums per-touchpoint credit into
//! campaign/channel totals across many conversions.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use linkpulse_core::types::{ConversionJourney, TouchpointAttribution};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;
use uuid::Uuid;

/// Accumulated credit for one campaign on one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignCredit {
    pub campaign: String,
    pub channel: String,
    /// Fractional conversions credited to this campaign.
    pub attributed_conversions: f64,
    pub attributed_revenue: f64,
    pub touchpoints: u64,
    pub last_credited_at: DateTime<Utc>,
}

pub struct CreditLedger {
    credits: DashMap<(String, String), CampaignCredit>,
    conversions: AtomicU64,
}

impl CreditLedger {
    pub fn new() -> Self {
        Self {
            credits: DashMap::new(),
            conversions: AtomicU64::new(0),
        }
    }

    /// Add one conversion's attribution to the running totals. Attributions
    /// naming touchpoints outside the journey are skipped.
    pub fn credit(
        &self,
        journey: &ConversionJourney,
        attributions: &[TouchpointAttribution],
        revenue: Option<f64>,
    ) {
        if attributions.is_empty() {
            return;
        }
        let weights: HashMap<Uuid, f64> = attributions
            .iter()
            .map(|a| (a.touchpoint_id, a.weight))
            .collect();
        let revenue = revenue.unwrap_or(0.0);
        let now = Utc::now();

        let mut matched = 0usize;
        for touchpoint in journey.touchpoints() {
            let Some(weight) = weights.get(&touchpoint.id).copied() else {
                continue;
            };
            matched += 1;
            let key = (touchpoint.campaign().to_string(), touchpoint.channel());
            let mut entry = self
                .credits
                .entry(key.clone())
                .or_insert_with(|| CampaignCredit {
                    campaign: key.0,
                    channel: key.1,
                    attributed_conversions: 0.0,
                    attributed_revenue: 0.0,
                    touchpoints: 0,
                    last_credited_at: now,
                });
            entry.attributed_conversions += weight;
            entry.attributed_revenue += weight * revenue;
            entry.touchpoints += 1;
            entry.last_credited_at = now;
        }

        if matched < attributions.len() {
            warn!(
                conversion_id = %journey.conversion_id(),
                unmatched = attributions.len() - matched,
                "Attributions reference touchpoints outside the journey"
            );
        }
        self.conversions.fetch_add(1, Ordering::Relaxed);
    }

    /// Credits ordered by attributed conversions, highest first.
    pub fn summary(&self) -> Vec<CampaignCredit> {
        let mut rows: Vec<CampaignCredit> = self.credits.iter().map(|e| e.value().clone()).collect();
        rows.sort_by(|a, b| {
            b.attributed_conversions
                .total_cmp(&a.attributed_conversions)
                .then_with(|| a.campaign.cmp(&b.campaign))
                .then_with(|| a.channel.cmp(&b.channel))
        });
        rows
    }

    /// Number of conversions credited so far.
    pub fn conversion_count(&self) -> u64 {
        self.conversions.load(Ordering::Relaxed)
    }
}

impl Default for CreditLedger {
    fn default() -> Self {
        Self::new()
    }
}
