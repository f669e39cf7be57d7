//! Security Incident Map
//!
//! Joins point-level security incidents onto country polygons, shades every
//! country by its incident count and plots each located incident as a marker
//! in a single self-contained HTML document.
//!
//! # Pipeline
//!
//! ```text
//! incidents ─► normalize ─► count_by_country ─┐
//!                                             ├─► join_counts ─► ColorScale ─┐
//! polygons ───────────────────────────────────┘                              ├─► MapDocument ─► HTML
//! incidents with valid coordinates ─────────────────────────► markers ───────┘
//! ```
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Load | [`loader`] | `Vec<IncidentRecord>`, `Vec<CountryPolygon>` |
//! | Normalize | [`normalize`] | canonical country keys |
//! | Aggregate + join | [`aggregate`] | `Vec<JoinedCountry>` (left join, zero fill) |
//! | Color | [`colormap`] | `ColorScale` over the joined counts |
//! | Render | [`render`] | `MapDocument` / HTML |

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod colormap;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod render;

pub use aggregate::{count_by_country, join_counts, JoinOutcome};
pub use colormap::{ColorScale, Rgb};
pub use loader::LoadConfig;
pub use normalize::{AliasNormalizer, CountryNameNormalizer, ExactNormalizer};
pub use pipeline::{build_map, MapBuild, RunSummary};
pub use render::{MapDocument, RenderConfig};

/// Property holding the canonical country name in Natural Earth admin-0 files
pub const DEFAULT_ADMIN_FIELD: &str = "ADMIN";

/// Countries never rendered in the choropleth
pub const EXCLUDED_ADMIN_NAMES: [&str; 1] = ["Antarctica"];

#[derive(Error, Debug)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("GeoJSON parse error: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("Polygon source must be a GeoJSON FeatureCollection")]
    UnsupportedPolygonSource,
    #[error("Country polygon feature {index} has no '{field}' property")]
    MissingAdminName { index: usize, field: String },
    #[error("Country '{admin_name}' has no usable polygon geometry")]
    MissingGeometry { admin_name: String },
    #[error("Polygon source contains no countries")]
    EmptyPolygonSource,
    #[error("Alias '{alias}' maps to an empty country name")]
    InvalidAlias { alias: String },
}

pub type Result<T> = std::result::Result<T, MapError>;

/// Validate latitude is in valid range
pub fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

/// Validate longitude is in valid range
pub fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

/// A single security incident as read from the cleaned incident table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub incident_id: String,
    /// `None` when the date cell was blank or unparseable
    pub date: Option<NaiveDate>,
    /// Free-text country name, not yet normalized
    pub country: String,
    pub region: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub means_of_attack: String,
    pub total_killed: u32,
    pub total_wounded: u32,
    pub total_kidnapped: u32,
}

impl IncidentRecord {
    /// `(latitude, longitude)` when both are present and in range.
    ///
    /// Records without coordinates still count towards their country, they
    /// just never get a marker.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if is_valid_latitude(lat) && is_valid_longitude(lon) => {
                Some((lat, lon))
            }
            _ => None,
        }
    }
}

/// A country boundary from the polygon source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryPolygon {
    /// Canonical country name (the join key)
    pub admin_name: String,
    /// Polygon or MultiPolygon in EPSG:4326
    pub geometry: geojson::Geometry,
}

impl CountryPolygon {
    pub fn new(admin_name: impl Into<String>, geometry: geojson::Geometry) -> Self {
        Self {
            admin_name: admin_name.into(),
            geometry,
        }
    }
}

/// Incident total for one normalized country key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedCountryStat {
    pub country_key: String,
    pub incident_count: u64,
}

/// A country polygon with its joined incident count (0 when nothing matched)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedCountry {
    pub admin_name: String,
    pub geometry: geojson::Geometry,
    pub incident_count: u64,
}

impl JoinedCountry {
    pub fn from_polygon(polygon: &CountryPolygon, incident_count: u64) -> Self {
        Self {
            admin_name: polygon.admin_name.clone(),
            geometry: polygon.geometry.clone(),
            incident_count,
        }
    }
}
