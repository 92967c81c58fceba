use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;

/// Failure talking to the TfL unified API.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {0}")]
    Status(StatusCode),
    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(&'static str),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Failure resolving a postcode to a position.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("postcode not found: {0}")]
    NotFound(String),
    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid stop json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid stop csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("unsupported stop dataset format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("stop point without an id")]
    MissingId,
    #[error("duplicate stop id {0}")]
    DuplicateId(String),
    #[error("stop {id} has out of range coordinates ({latitude}, {longitude})")]
    InvalidCoordinates {
        id: String,
        latitude: f64,
        longitude: f64,
    },
}
