use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::aggregator::aggregate;
use crate::arrivals::{ArrivalPrediction, ArrivalsFetcher};
use crate::catalog::{LineDirection, StopCatalog, StopPoint};
use crate::distance::Position;
use crate::error::GeocodeError;
use crate::favourites::{Favourite, Favourites};
use crate::geocode::PostcodeClient;
use crate::proximity::{FeedStatus, ProximityResult};
use crate::search::{classify, SearchQuery};
use crate::tfl::{BusLine, NearbyStopPoint, TflClient};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<StopCatalog>,
    pub fetcher: ArrivalsFetcher,
    pub tfl: Arc<TflClient>,
    pub postcodes: Arc<PostcodeClient>,
    pub favourites: Arc<RwLock<Favourites>>,
    pub default_radius: f64,
    pub arrivals_per_stop: usize,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/nearby", get(get_nearby))
        .route("/location", get(get_location))
        .route("/stop/{id}/arrivals", get(get_stop_arrivals))
        .route("/lines", get(get_lines))
        .route("/line/{line}/stops", get(get_line_stops))
        .route("/search", get(search))
        .route(
            "/favourites",
            get(list_favourites)
                .post(add_favourite)
                .delete(clear_favourites),
        )
        .route("/favourites/{id}", delete(remove_favourite))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopView {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub indicator: Option<String>,
    pub stop_letter: Option<String>,
    pub lines: Vec<String>,
}

impl From<&StopPoint> for StopView {
    fn from(stop: &StopPoint) -> Self {
        let mut lines: Vec<String> = Vec::new();
        for serviced in &stop.serviced_lines {
            if !lines.contains(&serviced.line) {
                lines.push(serviced.line.clone());
            }
        }
        Self {
            id: stop.id.clone(),
            name: stop.name.clone(),
            latitude: stop.latitude,
            longitude: stop.longitude,
            indicator: stop.indicator.clone(),
            stop_letter: stop.stop_letter.clone(),
            lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalView {
    pub id: String,
    pub line_name: String,
    pub destination_name: String,
    pub direction: String,
    pub stop_letter: Option<String>,
    pub seconds_to_arrival: i64,
    pub due: String,
}

impl From<&ArrivalPrediction> for ArrivalView {
    fn from(arrival: &ArrivalPrediction) -> Self {
        Self {
            id: arrival.id.clone(),
            line_name: arrival.line_name.clone(),
            destination_name: arrival.destination_name.clone(),
            direction: arrival.direction.clone(),
            stop_letter: arrival.stop_letter.clone(),
            seconds_to_arrival: arrival.seconds_to_arrival,
            due: arrival.display_time(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyStopView {
    #[serde(flatten)]
    pub stop: StopView,
    pub distance_meters: f64,
    pub arrivals: Vec<ArrivalView>,
    pub feed: FeedStatus,
}

impl NearbyStopView {
    fn new(result: &ProximityResult, limit: usize) -> Self {
        Self {
            stop: StopView::from(result.stop.as_ref()),
            distance_meters: result.distance_meters.round(),
            arrivals: result.arrivals.iter().take(limit).map(ArrivalView::from).collect(),
            feed: result.feed.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NearbyView {
    /// No position to search from, e.g. location permission was refused.
    Unavailable,
    NoneFound { radius_meters: f64 },
    Found {
        radius_meters: f64,
        stops: Vec<NearbyStopView>,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct NearbyQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius: Option<f64>,
    pub limit: Option<usize>,
}

pub async fn get_nearby(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<NearbyView>, ApiError> {
    let (Some(latitude), Some(longitude)) = (query.lat, query.lon) else {
        return Ok(Json(NearbyView::Unavailable));
    };

    let position = Position::new(latitude, longitude);
    if !position.is_valid() {
        return Err(bad_request(format!(
            "coordinates ({}, {}) are out of range",
            latitude, longitude
        )));
    }

    let radius_meters = query.radius.unwrap_or(state.default_radius);
    if !radius_meters.is_finite() || radius_meters < 0.0 {
        return Err(bad_request("radius must be a non-negative number of meters"));
    }
    let limit = query.limit.unwrap_or(state.arrivals_per_stop);

    let results = aggregate(position, &state.catalog, radius_meters, &state.fetcher).await;
    if results.is_empty() {
        return Ok(Json(NearbyView::NoneFound { radius_meters }));
    }

    let stops = results
        .iter()
        .map(|result| NearbyStopView::new(result, limit))
        .collect();
    Ok(Json(NearbyView::Found {
        radius_meters,
        stops,
    }))
}

const FALLBACK_PLACE: &str = "your area";

/// Header line for the nearby screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LocationView {
    Disabled,
    Near { place: String, position: Position },
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

pub async fn get_location(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<LocationView>, ApiError> {
    let (Some(latitude), Some(longitude)) = (query.lat, query.lon) else {
        return Ok(Json(LocationView::Disabled));
    };

    let position = Position::new(latitude, longitude);
    if !position.is_valid() {
        return Err(bad_request(format!(
            "coordinates ({}, {}) are out of range",
            latitude, longitude
        )));
    }

    // the label is cosmetic, so a failed lookup still answers
    let place = match state.postcodes.place_name(position).await {
        Ok(Some(place)) => place,
        Ok(None) => FALLBACK_PLACE.to_string(),
        Err(e) => {
            warn!("reverse geocode for {:?} failed: {}", position, e);
            FALLBACK_PLACE.to_string()
        }
    };
    Ok(Json(LocationView::Near { place, position }))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopArrivalsView {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub arrivals: Vec<ArrivalView>,
    pub degraded: bool,
}

pub async fn get_stop_arrivals(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<StopArrivalsView> {
    let outcome = state.fetcher.fetch(&id).await;
    let predictions = outcome.predictions();

    // stops found through postcode search may not be in the bundled catalog
    let stop_name = state
        .catalog
        .get(&id)
        .map(|stop| stop.name.clone())
        .or_else(|| predictions.first().and_then(|p| p.station_name.clone()));

    Json(StopArrivalsView {
        stop_id: id,
        stop_name,
        arrivals: predictions.iter().map(ArrivalView::from).collect(),
        degraded: outcome.is_degraded(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinesView {
    pub lines: Vec<BusLine>,
    pub degraded: bool,
}

pub async fn get_lines(State(state): State<AppState>) -> Json<LinesView> {
    match state.tfl.bus_lines().await {
        Ok(lines) => Json(LinesView {
            lines,
            degraded: false,
        }),
        Err(e) => {
            warn!("failed to fetch bus lines: {}", e);
            Json(LinesView {
                lines: Vec::new(),
                degraded: true,
            })
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LineStopsQuery {
    pub direction: Option<LineDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStopsView {
    pub line: String,
    pub direction: LineDirection,
    pub stops: Vec<StopView>,
}

pub async fn get_line_stops(
    State(state): State<AppState>,
    Path(line): Path<String>,
    Query(query): Query<LineStopsQuery>,
) -> Json<LineStopsView> {
    let direction = query.direction.unwrap_or_default();
    let stops = state
        .catalog
        .stops_for_line(&line, direction)
        .iter()
        .map(|stop| StopView::from(stop.as_ref()))
        .collect();
    Json(LineStopsView {
        line,
        direction,
        stops,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostcodeStopView {
    #[serde(flatten)]
    pub stop: StopView,
    pub distance_meters: f64,
}

impl From<&NearbyStopPoint> for PostcodeStopView {
    fn from(nearby: &NearbyStopPoint) -> Self {
        Self {
            stop: StopView::from(&nearby.stop),
            distance_meters: nearby.distance_meters.round(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SearchView {
    Empty,
    Line {
        line: String,
        stops: Vec<StopView>,
    },
    Postcode {
        postcode: String,
        position: Option<Position>,
        stops: Vec<PostcodeStopView>,
        degraded: bool,
    },
    StopName {
        query: String,
        stops: Vec<StopView>,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchView> {
    let view = match classify(&params.q) {
        None => SearchView::Empty,
        Some(SearchQuery::Line(line)) => {
            let stops = state
                .catalog
                .stops_for_line(&line, LineDirection::Inbound)
                .iter()
                .map(|stop| StopView::from(stop.as_ref()))
                .collect();
            SearchView::Line { line, stops }
        }
        Some(SearchQuery::StopName(query)) => {
            let stops = state
                .catalog
                .search_by_name(&query)
                .iter()
                .map(|stop| StopView::from(stop.as_ref()))
                .collect();
            SearchView::StopName { query, stops }
        }
        Some(SearchQuery::Postcode(postcode)) => search_postcode(&state, postcode).await,
    };
    Json(view)
}

async fn search_postcode(state: &AppState, postcode: String) -> SearchView {
    let position = match state.postcodes.lookup(&postcode).await {
        Ok(position) => position,
        Err(GeocodeError::NotFound(_)) => {
            return SearchView::Postcode {
                postcode,
                position: None,
                stops: Vec::new(),
                degraded: false,
            };
        }
        Err(e) => {
            warn!("postcode lookup for {} failed: {}", postcode, e);
            return SearchView::Postcode {
                postcode,
                position: None,
                stops: Vec::new(),
                degraded: true,
            };
        }
    };

    let (stops, degraded) = match state.tfl.stop_points_near(position, state.default_radius).await {
        Ok(stops) => (stops.iter().map(PostcodeStopView::from).collect(), false),
        Err(e) => {
            warn!("stop point search near {} failed: {}", postcode, e);
            (Vec::new(), true)
        }
    };

    SearchView::Postcode {
        postcode,
        position: Some(position),
        stops,
        degraded,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavouritesView {
    pub changed: bool,
    pub favourites: Vec<Favourite>,
}

pub async fn list_favourites(State(state): State<AppState>) -> Json<Vec<Favourite>> {
    Json(state.favourites.read().await.list().to_vec())
}

pub async fn add_favourite(
    State(state): State<AppState>,
    Json(favourite): Json<Favourite>,
) -> Result<Json<FavouritesView>, ApiError> {
    if favourite.id.trim().is_empty() {
        return Err(bad_request("favourite id must not be empty"));
    }

    let mut favourites = state.favourites.write().await;
    let id = favourite.id.clone();
    let changed = favourites.add(favourite);
    if changed {
        info!("added favourite {}", id);
    }
    Ok(Json(FavouritesView {
        changed,
        favourites: favourites.list().to_vec(),
    }))
}

pub async fn remove_favourite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<FavouritesView> {
    let mut favourites = state.favourites.write().await;
    let changed = favourites.remove(&id);
    Json(FavouritesView {
        changed,
        favourites: favourites.list().to_vec(),
    })
}

pub async fn clear_favourites(State(state): State<AppState>) -> Json<FavouritesView> {
    let mut favourites = state.favourites.write().await;
    let changed = !favourites.is_empty();
    favourites.clear();
    if changed {
        info!("cleared favourites");
    }
    Json(FavouritesView {
        changed,
        favourites: Vec::new(),
    })
}
