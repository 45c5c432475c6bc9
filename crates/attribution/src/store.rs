//! Journey storage seam — the resolver reads journeys through
//! [`JourneySource`]; an in-memory implementation backs tests and the CLI.

use dashmap::DashMap;
use linkpulse_core::types::{ConversionJourney, Touchpoint};
use uuid::Uuid;

/// Supplies the touchpoints recorded against a conversion.
pub trait JourneySource {
    /// `None` when nothing is known about the conversion.
    fn journey(&self, conversion_id: &Uuid) -> Option<ConversionJourney>;
}

/// Touchpoints kept in arrival order per conversion. Arrival order carries
/// no meaning; journeys are re-sorted when assembled.
pub struct InMemoryJourneyStore {
    touchpoints: DashMap<Uuid, Vec<Touchpoint>>,
}

impl InMemoryJourneyStore {
    pub fn new() -> Self {
        Self {
            touchpoints: DashMap::new(),
        }
    }

    pub fn record_touchpoint(&self, conversion_id: Uuid, touchpoint: Touchpoint) {
        self.touchpoints
            .entry(conversion_id)
            .or_default()
            .push(touchpoint);
    }

    pub fn remove(&self, conversion_id: &Uuid) -> Option<Vec<Touchpoint>> {
        self.touchpoints.remove(conversion_id).map(|(_, tps)| tps)
    }

    pub fn conversion_count(&self) -> usize {
        self.touchpoints.len()
    }

    pub fn conversion_ids(&self) -> Vec<Uuid> {
        self.touchpoints.iter().map(|e| *e.key()).collect()
    }
}

impl Default for InMemoryJourneyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JourneySource for InMemoryJourneyStore {
    fn journey(&self, conversion_id: &Uuid) -> Option<ConversionJourney> {
        self.touchpoints
            .get(conversion_id)
            .map(|tps| ConversionJourney::new(*conversion_id, tps.value().clone()))
    }
}
