//! Postcode lookups against postcodes.io.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::distance::Position;
use crate::error::GeocodeError;

pub const DEFAULT_BASE_URL: &str = "https://api.postcodes.io";

#[derive(Debug, Deserialize)]
struct PostcodeResponse {
    status: u16,
    result: Option<PostcodeResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostcodeResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    status: u16,
    result: Option<Vec<ReverseResult>>,
}

#[derive(Debug, Deserialize)]
struct ReverseResult {
    admin_ward: Option<String>,
    admin_district: Option<String>,
    region: Option<String>,
}

/// The most local place name for the nearest postcode, ward first.
pub fn parse_reverse_response(body: Value) -> Result<Option<String>, GeocodeError> {
    let response: ReverseResponse = serde_json::from_value(body)?;
    if response.status != 200 {
        return Ok(None);
    }
    let place = response
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|nearest| {
            [nearest.admin_ward, nearest.admin_district, nearest.region]
                .into_iter()
                .flatten()
                .find(|name| !name.trim().is_empty())
        });
    Ok(place)
}

/// Uppercase and strip whitespace, e.g. `"sw1a 1aa"` becomes `"SW1A1AA"`.
pub fn normalize_postcode(postcode: &str) -> String {
    postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn parse_postcode_response(postcode: &str, body: Value) -> Result<Position, GeocodeError> {
    let response: PostcodeResponse = serde_json::from_value(body)?;
    if response.status != 200 {
        debug!(
            "postcode {} rejected: {}",
            postcode,
            response.error.as_deref().unwrap_or("no reason given")
        );
        return Err(GeocodeError::NotFound(postcode.to_string()));
    }

    // terminated and non-geographic postcodes come back without coordinates
    match response.result {
        Some(PostcodeResult {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }) => Ok(Position::new(latitude, longitude)),
        _ => Err(GeocodeError::NotFound(postcode.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct PostcodeClient {
    http: reqwest::Client,
    base_url: Url,
}

impl PostcodeClient {
    pub fn new(base_url: &str) -> Result<Self, GeocodeError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, GeocodeError> {
        let base_url = Url::parse(base_url).map_err(|e| GeocodeError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(GeocodeError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { http, base_url })
    }

    fn postcode_url(&self, postcode: &str) -> Result<Url, GeocodeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GeocodeError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["postcodes", postcode]);
        Ok(url)
    }

    pub async fn lookup(&self, postcode: &str) -> Result<Position, GeocodeError> {
        let postcode = normalize_postcode(postcode);
        if postcode.is_empty() {
            return Err(GeocodeError::NotFound(postcode));
        }
        let url = self.postcode_url(&postcode)?;
        // postcodes.io answers unknown postcodes with a 404 and a JSON body
        let body: Value = self.http.get(url).send().await?.json().await?;
        parse_postcode_response(&postcode, body)
    }

    fn reverse_url(&self, position: Position) -> Result<Url, GeocodeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GeocodeError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("postcodes");
        url.query_pairs_mut()
            .append_pair("lon", &position.longitude.to_string())
            .append_pair("lat", &position.latitude.to_string())
            .append_pair("limit", "1");
        Ok(url)
    }

    /// Name of the area around `position`, `None` when no postcode is nearby.
    pub async fn place_name(&self, position: Position) -> Result<Option<String>, GeocodeError> {
        let url = self.reverse_url(position)?;
        let body: Value = self.http.get(url).send().await?.json().await?;
        parse_reverse_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_postcodes() {
        assert_eq!(normalize_postcode(" sw1a 1aa "), "SW1A1AA");
        assert_eq!(normalize_postcode("N1\t9GU"), "N19GU");
    }

    #[test]
    fn parses_found_postcode() {
        let body = json!({
            "status": 200,
            "result": {
                "postcode": "SW1A 1AA",
                "latitude": 51.501009,
                "longitude": -0.141588,
                "admin_district": "Westminster"
            }
        });
        let position = parse_postcode_response("SW1A1AA", body).unwrap();
        assert_eq!(position, Position::new(51.501009, -0.141588));
    }

    #[test]
    fn unknown_postcode_is_not_found() {
        let body = json!({ "status": 404, "error": "Invalid postcode" });
        assert!(matches!(
            parse_postcode_response("ZZ99ZZ", body),
            Err(GeocodeError::NotFound(p)) if p == "ZZ99ZZ"
        ));
    }

    #[test]
    fn missing_coordinates_is_not_found() {
        let body = json!({ "status": 200, "result": { "latitude": null, "longitude": null } });
        assert!(matches!(
            parse_postcode_response("GY11AA", body),
            Err(GeocodeError::NotFound(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_postcode_response("N19GU", json!(["not", "an", "object"])),
            Err(GeocodeError::Malformed(_))
        ));
    }

    #[test]
    fn picks_most_local_place_name() {
        let body = json!({
            "status": 200,
            "result": [{
                "postcode": "NW1 2DU",
                "admin_ward": "Regent's Park",
                "admin_district": "Camden",
                "region": "London",
                "distance": 12.3
            }]
        });
        assert_eq!(parse_reverse_response(body).unwrap().as_deref(), Some("Regent's Park"));

        let body = json!({
            "status": 200,
            "result": [{ "admin_ward": "", "admin_district": null, "region": "London" }]
        });
        assert_eq!(parse_reverse_response(body).unwrap().as_deref(), Some("London"));
    }

    #[test]
    fn no_nearby_postcode_has_no_place() {
        let body = json!({ "status": 200, "result": null });
        assert_eq!(parse_reverse_response(body).unwrap(), None);
        let body = json!({ "status": 400, "error": "Invalid longitude/latitude submitted" });
        assert_eq!(parse_reverse_response(body).unwrap(), None);
    }

    #[test]
    fn builds_lookup_url() {
        let client = PostcodeClient::new("https://api.postcodes.io").unwrap();
        let url = client.postcode_url("SW1A1AA").unwrap();
        assert_eq!(url.as_str(), "https://api.postcodes.io/postcodes/SW1A1AA");
    }

    #[test]
    fn builds_reverse_url() {
        let client = PostcodeClient::new("https://api.postcodes.io/").unwrap();
        let url = client.reverse_url(Position::new(51.5265, -0.1357)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.postcodes.io/postcodes?lon=-0.1357&lat=51.5265&limit=1"
        );
    }
}
