//! Joins the proximity ranking with live arrivals for every candidate stop.

use futures_util::future::join_all;
use tracing::{debug, info};

use crate::arrivals::ArrivalsFetcher;
use crate::catalog::StopCatalog;
use crate::distance::Position;
use crate::proximity::{nearby, FeedStatus, ProximityResult};

/// Nearby stops with arrivals attached, in proximity order.
///
/// Fetches run concurrently and the result waits for all of them. A stop whose
/// fetch fails keeps its place with no arrivals and a degraded feed status;
/// nothing here returns an error.
pub async fn aggregate(
    position: Position,
    catalog: &StopCatalog,
    radius_meters: f64,
    fetcher: &ArrivalsFetcher,
) -> Vec<ProximityResult> {
    let candidates = nearby(position, catalog, radius_meters);
    if candidates.is_empty() {
        debug!(
            "no stops within {}m of ({}, {})",
            radius_meters, position.latitude, position.longitude
        );
        return candidates;
    }

    // join_all yields outputs in input order regardless of completion order
    let outcomes = join_all(candidates.iter().map(|c| fetcher.fetch(&c.stop.id))).await;

    let results: Vec<ProximityResult> = candidates
        .into_iter()
        .zip(outcomes)
        .map(|(candidate, outcome)| candidate.with_arrivals(outcome))
        .collect();

    let degraded = results
        .iter()
        .filter(|r| r.feed != FeedStatus::Live)
        .count();
    info!(
        "aggregated {} stops within {}m ({} degraded)",
        results.len(),
        radius_meters,
        degraded
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrivals::tests::{bus, MockSource};
    use crate::proximity::tests::{stop_north, ORIGIN};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn catalog() -> StopCatalog {
        StopCatalog::new(vec![
            stop_north("C", 120.0),
            stop_north("A", 20.0),
            stop_north("B", 60.0),
            stop_north("Z", 900.0),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn one_failing_stop_does_not_fail_the_rest() {
        let source = MockSource::default()
            .with("A", json!([bus("24", "Pimlico", 300), bus("29", "Wood Green", 45)]))
            .failing("B", StatusCode::INTERNAL_SERVER_ERROR)
            .with("C", json!([bus("73", "Oxford Circus", 600)]));
        let fetcher = ArrivalsFetcher::new(Arc::new(source), Duration::from_secs(5));

        let results = aggregate(ORIGIN, &catalog(), 200.0, &fetcher).await;

        let ids: Vec<&str> = results.iter().map(|r| r.stop.id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "C"]);

        assert_eq!(results[0].feed, FeedStatus::Live);
        let a_lines: Vec<&str> = results[0].arrivals.iter().map(|a| a.line_name.as_str()).collect();
        assert_eq!(a_lines, ["29", "24"]);

        assert!(results[1].arrivals.is_empty());
        assert!(matches!(results[1].feed, FeedStatus::Degraded { .. }));

        assert_eq!(results[2].feed, FeedStatus::Live);
        assert_eq!(results[2].arrivals.len(), 1);
    }

    #[tokio::test]
    async fn completion_order_does_not_change_output_order() {
        let source = MockSource::default()
            .delayed("A", Duration::from_millis(80), json!([bus("24", "Pimlico", 30)]))
            .delayed("B", Duration::from_millis(40), json!([bus("29", "Wood Green", 30)]))
            .with("C", json!([bus("73", "Oxford Circus", 30)]));
        let fetcher = ArrivalsFetcher::new(Arc::new(source), Duration::from_secs(5));

        let results = aggregate(ORIGIN, &catalog(), 200.0, &fetcher).await;
        let pairs: Vec<(&str, &str)> = results
            .iter()
            .map(|r| (r.stop.id.as_str(), r.arrivals[0].line_name.as_str()))
            .collect();
        assert_eq!(pairs, [("A", "24"), ("B", "29"), ("C", "73")]);
    }

    #[tokio::test]
    async fn fetches_run_concurrently() {
        let delay = Duration::from_millis(150);
        let source = MockSource::default()
            .delayed("A", delay, json!([]))
            .delayed("B", delay, json!([]))
            .delayed("C", delay, json!([]));
        let fetcher = ArrivalsFetcher::new(Arc::new(source), Duration::from_secs(5));

        let started = std::time::Instant::now();
        let results = aggregate(ORIGIN, &catalog(), 200.0, &fetcher).await;
        assert_eq!(results.len(), 3);
        // sequential fetches would take at least 450ms
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn no_candidates_means_no_fetches() {
        // every stop would fail, but none is within range
        let fetcher = ArrivalsFetcher::new(Arc::new(MockSource::default()), Duration::from_secs(5));
        let results = aggregate(ORIGIN, &catalog(), 5.0, &fetcher).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn stop_without_buses_is_live_and_empty() {
        let source = MockSource::default()
            .with("A", json!([{ "modeName": "tube", "lineName": "Victoria", "timeToStation": 20 }]));
        let fetcher = ArrivalsFetcher::new(Arc::new(source), Duration::from_secs(5));
        let results = aggregate(ORIGIN, &catalog(), 50.0, &fetcher).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].arrivals.is_empty());
        assert_eq!(results[0].feed, FeedStatus::Live);
    }
}
