use std::sync::Arc;

use serde::Serialize;

use crate::arrivals::{ArrivalPrediction, ArrivalsOutcome};
use crate::catalog::{StopCatalog, StopPoint};
use crate::distance::Position;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FeedStatus {
    /// Arrivals have not been requested yet.
    Pending,
    Live,
    Degraded { reason: String },
}

/// A catalog stop ranked by distance, with its arrivals once fetched.
#[derive(Debug, Clone)]
pub struct ProximityResult {
    pub stop: Arc<StopPoint>,
    pub distance_meters: f64,
    pub arrivals: Vec<ArrivalPrediction>,
    pub feed: FeedStatus,
}

impl ProximityResult {
    pub fn new(stop: Arc<StopPoint>, distance_meters: f64) -> Self {
        Self {
            stop,
            distance_meters,
            arrivals: Vec::new(),
            feed: FeedStatus::Pending,
        }
    }

    pub fn with_arrivals(self, outcome: ArrivalsOutcome) -> Self {
        let (arrivals, feed) = match outcome {
            ArrivalsOutcome::Live(predictions) => (predictions, FeedStatus::Live),
            ArrivalsOutcome::Degraded(e) => (
                Vec::new(),
                FeedStatus::Degraded {
                    reason: e.to_string(),
                },
            ),
        };
        Self {
            arrivals,
            feed,
            ..self
        }
    }
}

/// Stops within `radius_meters` of `position`, nearest first. Equal distances
/// keep catalog order.
pub fn nearby(position: Position, catalog: &StopCatalog, radius_meters: f64) -> Vec<ProximityResult> {
    let mut results: Vec<ProximityResult> = catalog
        .iter()
        .map(|stop| {
            let distance = position.distance_to(&stop.position());
            (stop, distance)
        })
        .filter(|(_, distance)| *distance <= radius_meters)
        .map(|(stop, distance)| ProximityResult::new(Arc::clone(stop), distance))
        .collect();

    // sort_by is stable
    results.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    results
}
