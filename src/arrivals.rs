//! Live arrival predictions for a single stop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;

pub const BUS_MODE: &str = "bus";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalPrediction {
    pub id: String,
    pub line_name: String,
    pub destination_name: String,
    pub direction: String,
    pub seconds_to_arrival: i64,
    pub stop_letter: Option<String>,
    pub station_name: Option<String>,
    pub expected_arrival: Option<DateTime<Utc>>,
}

impl ArrivalPrediction {
    pub fn display_time(&self) -> String {
        format_arrival_time(self.seconds_to_arrival)
    }
}

// Upstream record, all fields optional so one bad record can be skipped
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArrival {
    id: Option<String>,
    line_id: Option<String>,
    line_name: Option<String>,
    destination_name: Option<String>,
    direction: Option<String>,
    time_to_station: Option<f64>,
    station_letter: Option<String>,
    stop_letter: Option<String>,
    station_name: Option<String>,
    expected_arrival: Option<String>,
}

impl RawArrival {
    fn into_prediction(self) -> Option<ArrivalPrediction> {
        let line_name = self.line_name?;
        let seconds_to_arrival = self.time_to_station?.floor() as i64;
        let destination_name = self.destination_name.unwrap_or_default();

        let id = match self.id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => format!(
                "{}-{}-{}",
                self.line_id.as_deref().unwrap_or(&line_name),
                destination_name,
                seconds_to_arrival
            ),
        };

        Some(ArrivalPrediction {
            id,
            line_name,
            destination_name,
            direction: self.direction.unwrap_or_default(),
            seconds_to_arrival,
            stop_letter: self
                .station_letter
                .filter(|l| !l.is_empty())
                .or(self.stop_letter.filter(|l| !l.is_empty())),
            station_name: self.station_name,
            // display only, so an odd timestamp must not cost the record
            expected_arrival: self
                .expected_arrival
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc)),
        })
    }
}

/// Turn an arrivals response body into bus predictions, soonest first.
pub fn normalize_arrivals(body: Value) -> Result<Vec<ArrivalPrediction>, FetchError> {
    let Value::Array(records) = body else {
        return Err(FetchError::UnexpectedShape("arrivals body is not an array"));
    };

    let mut predictions: Vec<ArrivalPrediction> = records
        .into_iter()
        .filter(|record| record.get("modeName").and_then(Value::as_str) == Some(BUS_MODE))
        .filter_map(|record| match serde_json::from_value::<RawArrival>(record) {
            Ok(raw) => raw.into_prediction(),
            Err(e) => {
                debug!("skipping malformed arrival record: {}", e);
                None
            }
        })
        .collect();

    predictions.sort_by_key(|p| p.seconds_to_arrival);
    Ok(predictions)
}

// Format seconds to minutes
pub fn format_arrival_time(seconds: i64) -> String {
    if seconds <= 0 {
        return "Due".to_string();
    }
    let minutes = seconds / 60;
    if minutes == 0 {
        "Due".to_string()
    } else {
        format!("{} min", minutes)
    }
}

/// One remote call returning the raw arrivals body for a stop.
pub trait ArrivalsSource: Send + Sync {
    fn stop_arrivals<'a>(
        &'a self,
        stop_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Value, FetchError>> + Send + 'a>>;
}

/// Result of one arrivals fetch.
///
/// `Degraded` keeps the reason so callers can tell a failed source apart from
/// a stop with genuinely no buses, even though both render as an empty list.
#[derive(Debug)]
pub enum ArrivalsOutcome {
    Live(Vec<ArrivalPrediction>),
    Degraded(FetchError),
}

impl ArrivalsOutcome {
    pub fn predictions(&self) -> &[ArrivalPrediction] {
        match self {
            ArrivalsOutcome::Live(predictions) => predictions,
            ArrivalsOutcome::Degraded(_) => &[],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ArrivalsOutcome::Degraded(_))
    }

    pub fn into_predictions(self) -> Vec<ArrivalPrediction> {
        match self {
            ArrivalsOutcome::Live(predictions) => predictions,
            ArrivalsOutcome::Degraded(_) => Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct ArrivalsFetcher {
    source: Arc<dyn ArrivalsSource>,
    timeout: Duration,
}

impl ArrivalsFetcher {
    pub fn new(source: Arc<dyn ArrivalsSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch and normalise arrivals for `stop_id`. Never fails: any error
    /// comes back as [`ArrivalsOutcome::Degraded`].
    pub async fn fetch(&self, stop_id: &str) -> ArrivalsOutcome {
        let result = match tokio::time::timeout(self.timeout, self.source.stop_arrivals(stop_id)).await {
            Ok(result) => result.and_then(normalize_arrivals),
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };

        match result {
            Ok(predictions) => {
                debug!("{} bus arrivals for stop {}", predictions.len(), stop_id);
                ArrivalsOutcome::Live(predictions)
            }
            Err(e) => {
                warn!("arrivals for stop {} unavailable: {}", stop_id, e);
                ArrivalsOutcome::Degraded(e)
            }
        }
    }
}
