//! The bundled stop-points dataset.
//!
//! Loaded once at startup and never mutated afterwards, so the catalog can be
//! shared behind an `Arc` by every request without locking.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::distance::Position;
use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicedLine {
    pub line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPoint {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub indicator: Option<String>,
    pub stop_letter: Option<String>,
    pub modes: Vec<String>,
    pub serviced_lines: Vec<ServicedLine>,
}

impl StopPoint {
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }

    pub fn serves_line(&self, line: &str) -> bool {
        self.serviced_lines
            .iter()
            .any(|l| l.line.eq_ignore_ascii_case(line))
    }
}

/// A stop point as TfL serialises it, both in the bundled dataset and in
/// `/StopPoint` search responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStopPoint {
    pub id: Option<String>,
    pub naptan_id: Option<String>,
    #[serde(default)]
    pub common_name: String,
    pub lat: f64,
    pub lon: f64,
    pub indicator: Option<String>,
    pub stop_letter: Option<String>,
    #[serde(default)]
    pub modes: Vec<String>,
    #[serde(default)]
    pub line_group: Vec<RawLineGroup>,
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLineGroup {
    #[serde(default)]
    pub line_identifier: Vec<String>,
    pub direction: Option<String>,
}

impl TryFrom<RawStopPoint> for StopPoint {
    type Error = CatalogError;

    fn try_from(raw: RawStopPoint) -> Result<Self, Self::Error> {
        let id = non_empty(raw.id)
            .or_else(|| non_empty(raw.naptan_id))
            .ok_or(CatalogError::MissingId)?;

        let mut serviced_lines: Vec<ServicedLine> = Vec::new();
        for group in raw.line_group {
            for line in group.line_identifier {
                let entry = ServicedLine {
                    line,
                    direction: group.direction.clone(),
                };
                if !serviced_lines.contains(&entry) {
                    serviced_lines.push(entry);
                }
            }
        }

        let stop = StopPoint {
            id,
            name: raw.common_name,
            latitude: raw.lat,
            longitude: raw.lon,
            indicator: non_empty(raw.indicator),
            stop_letter: non_empty(raw.stop_letter),
            modes: raw.modes,
            serviced_lines,
        };
        validate(&stop)?;
        Ok(stop)
    }
}

// Row layout for CSV datasets: lines are space separated
#[derive(Debug, Deserialize)]
struct CsvStopRecord {
    id: String,
    name: String,
    lat: f64,
    lon: f64,
    indicator: Option<String>,
    stop_letter: Option<String>,
    #[serde(default)]
    lines: String,
}

impl TryFrom<CsvStopRecord> for StopPoint {
    type Error = CatalogError;

    fn try_from(record: CsvStopRecord) -> Result<Self, Self::Error> {
        let id = non_empty(Some(record.id)).ok_or(CatalogError::MissingId)?;
        let stop = StopPoint {
            id,
            name: record.name,
            latitude: record.lat,
            longitude: record.lon,
            indicator: non_empty(record.indicator),
            stop_letter: non_empty(record.stop_letter),
            modes: vec!["bus".to_string()],
            serviced_lines: record
                .lines
                .split_whitespace()
                .map(|line| ServicedLine {
                    line: line.to_string(),
                    direction: None,
                })
                .collect(),
        };
        validate(&stop)?;
        Ok(stop)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate(stop: &StopPoint) -> Result<(), CatalogError> {
    if !stop.position().is_valid() {
        return Err(CatalogError::InvalidCoordinates {
            id: stop.id.clone(),
            latitude: stop.latitude,
            longitude: stop.longitude,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDirection {
    #[default]
    Inbound,
    Outbound,
}

#[derive(Debug, Default)]
pub struct StopCatalog {
    stops: Vec<Arc<StopPoint>>,
    by_id: HashMap<String, usize>,
}

impl StopCatalog {
    pub fn new(stops: Vec<StopPoint>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(stops.len());
        for (index, stop) in stops.iter().enumerate() {
            validate(stop)?;
            if by_id.insert(stop.id.clone(), index).is_some() {
                return Err(CatalogError::DuplicateId(stop.id.clone()));
            }
        }

        Ok(Self {
            stops: stops.into_iter().map(Arc::new).collect(),
            by_id,
        })
    }

    /// Load the dataset, picking the parser from the file extension.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let io_error = |source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        };

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                let mut contents = String::new();
                File::open(path)
                    .and_then(|mut file| file.read_to_string(&mut contents))
                    .map_err(io_error)?;
                Self::from_json_str(&contents)
            }
            Some("csv") => {
                let file = File::open(path).map_err(io_error)?;
                Self::from_csv_reader(file)
            }
            _ => Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let raw: Vec<RawStopPoint> = serde_json::from_str(json)?;
        let stops = raw
            .into_iter()
            .map(StopPoint::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(stops)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut stops = Vec::new();
        for result in rdr.deserialize() {
            let record: CsvStopRecord = result?;
            stops.push(StopPoint::try_from(record)?);
        }
        Self::new(stops)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Stops in dataset order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<StopPoint>> {
        self.stops.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<StopPoint>> {
        self.by_id.get(id).map(|&index| &self.stops[index])
    }

    /// Stops served by `line`, ordered along the direction by their indicator.
    pub fn stops_for_line(&self, line: &str, direction: LineDirection) -> Vec<Arc<StopPoint>> {
        let mut stops: Vec<Arc<StopPoint>> = self
            .stops
            .iter()
            .filter(|stop| stop.serves_line(line))
            .cloned()
            .collect();

        stops.sort_by(|a, b| {
            let ordering = compare_indicators(a.indicator.as_deref(), b.indicator.as_deref());
            match direction {
                LineDirection::Inbound => ordering,
                LineDirection::Outbound => ordering.reverse(),
            }
        });
        stops
    }

    pub fn search_by_name(&self, query: &str) -> Vec<Arc<StopPoint>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.stops
            .iter()
            .filter(|stop| stop.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

fn compare_indicators(a: Option<&str>, b: Option<&str>) -> Ordering {
    let a = a.unwrap_or_default();
    let b = b.unwrap_or_default();
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
