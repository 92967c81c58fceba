//! Client for the TfL unified API.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::arrivals::ArrivalsSource;
use crate::catalog::{RawStopPoint, StopPoint};
use crate::distance::Position;
use crate::error::FetchError;

pub const DEFAULT_BASE_URL: &str = "https://api.tfl.gov.uk";
const BUS_STOP_TYPES: &str = "NaptanPublicBusCoachTram";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusLine {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyStopPoint {
    pub stop: StopPoint,
    pub distance_meters: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopPointsResponse {
    #[serde(default)]
    stop_points: Vec<RawStopPoint>,
}

#[derive(Debug, Clone)]
pub struct TflClient {
    http: reqwest::Client,
    base_url: Url,
    app_key: Option<String>,
}

impl TflClient {
    pub fn new(base_url: &str, app_key: Option<String>) -> Result<Self, FetchError> {
        Self::with_client(reqwest::Client::new(), base_url, app_key)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        app_key: Option<String>,
    ) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url,
            app_key: app_key.filter(|k| !k.is_empty()),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        if let Some(key) = &self.app_key {
            url.query_pairs_mut().append_pair("app_key", key);
        }
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value, FetchError> {
        debug!("GET {}", url.path());
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `GET /StopPoint/{id}/Arrivals`, unparsed.
    pub async fn stop_arrivals(&self, stop_id: &str) -> Result<Value, FetchError> {
        let url = self.endpoint(&["StopPoint", stop_id, "Arrivals"])?;
        self.get_json(url).await
    }

    /// Every bus line TfL runs.
    pub async fn bus_lines(&self) -> Result<Vec<BusLine>, FetchError> {
        let url = self.endpoint(&["Line", "Mode", "bus"])?;
        parse_bus_lines(self.get_json(url).await?)
    }

    /// Bus stops within `radius_meters` of `position`, as TfL ranks them.
    pub async fn stop_points_near(
        &self,
        position: Position,
        radius_meters: f64,
    ) -> Result<Vec<NearbyStopPoint>, FetchError> {
        let mut url = self.endpoint(&["StopPoint"])?;
        url.query_pairs_mut()
            .append_pair("lat", &position.latitude.to_string())
            .append_pair("lon", &position.longitude.to_string())
            .append_pair("stopTypes", BUS_STOP_TYPES)
            .append_pair("modes", "bus")
            .append_pair("radius", &radius_meters.round().to_string());
        parse_stop_points(self.get_json(url).await?, position)
    }
}

impl ArrivalsSource for TflClient {
    fn stop_arrivals<'a>(
        &'a self,
        stop_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Value, FetchError>> + Send + 'a>> {
        Box::pin(TflClient::stop_arrivals(self, stop_id))
    }
}

pub fn parse_bus_lines(body: Value) -> Result<Vec<BusLine>, FetchError> {
    if !body.is_array() {
        return Err(FetchError::UnexpectedShape("line list is not an array"));
    }
    Ok(serde_json::from_value(body)?)
}

/// Parse a `/StopPoint` location search. Missing distances are computed from
/// `origin`; records that fail validation are dropped.
pub fn parse_stop_points(body: Value, origin: Position) -> Result<Vec<NearbyStopPoint>, FetchError> {
    let response: StopPointsResponse = serde_json::from_value(body)?;
    let mut stops: Vec<NearbyStopPoint> = response
        .stop_points
        .into_iter()
        .filter_map(|raw| {
            let reported = raw.distance;
            match StopPoint::try_from(raw) {
                Ok(stop) => {
                    let distance_meters =
                        reported.unwrap_or_else(|| origin.distance_to(&stop.position()));
                    Some(NearbyStopPoint {
                        stop,
                        distance_meters,
                    })
                }
                Err(e) => {
                    debug!("dropping stop point: {}", e);
                    None
                }
            }
        })
        .collect();
    stops.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    Ok(stops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_encoded_endpoints() {
        let client = TflClient::new("https://api.tfl.gov.uk/", Some("secret".into())).unwrap();
        let url = client.endpoint(&["StopPoint", "4900 77/E", "Arrivals"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.tfl.gov.uk/StopPoint/4900%2077%2FE/Arrivals?app_key=secret"
        );

        let client = TflClient::new("http://localhost:9000/tfl", None).unwrap();
        let url = client.endpoint(&["Line", "Mode", "bus"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/tfl/Line/Mode/bus");
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            TflClient::new("not a url", None),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            TflClient::new("mailto:someone@example.com", None),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn parses_bus_lines() {
        let body = json!([
            { "$type": "Tfl.Api.Presentation.Entities.Line", "id": "1", "name": "1", "modeName": "bus" },
            { "id": "n29", "name": "N29", "modeName": "bus" }
        ]);
        let lines = parse_bus_lines(body).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], BusLine { id: "n29".into(), name: "N29".into() });

        assert!(parse_bus_lines(json!({ "message": "error" })).is_err());
    }

    #[test]
    fn parses_stop_point_search() {
        let origin = Position::new(51.501, -0.1246);
        let body = json!({
            "$type": "Tfl.Api.Presentation.Entities.StopPointsResponse",
            "centrePoint": [51.501, -0.1246],
            "stopPoints": [
                {
                    "naptanId": "490000173RF",
                    "id": "490000173RF",
                    "commonName": "Westminster Station",
                    "indicator": "Stop RF",
                    "stopLetter": "RF",
                    "lat": 51.50153,
                    "lon": -0.12372,
                    "modes": ["bus"],
                    "lineGroup": [{ "lineIdentifier": ["12", "453"] }],
                    "distance": 92.4
                },
                {
                    "naptanId": "490000173V",
                    "commonName": "Parliament Square",
                    "lat": 51.50092,
                    "lon": -0.12542
                },
                { "commonName": "Broken", "lat": 51.5, "lon": -0.1 }
            ],
            "total": 3
        });

        let stops = parse_stop_points(body, origin).unwrap();
        assert_eq!(stops.len(), 2);
        // computed distance for the second stop is well under 92m
        assert_eq!(stops[0].stop.id, "490000173V");
        assert_eq!(stops[1].stop.id, "490000173RF");
        assert_eq!(stops[1].distance_meters, 92.4);
        assert!(stops[1].stop.serves_line("453"));
    }
}
