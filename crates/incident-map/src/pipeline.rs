//! Single-pass pipeline: normalize → aggregate → join → color → render

use crate::aggregate::{count_by_country, join_counts};
use crate::colormap::ColorScale;
use crate::normalize::CountryNameNormalizer;
use crate::render::{build_document, MapDocument, RenderConfig};
use crate::{CountryPolygon, IncidentRecord, JoinedCountry, MapError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Counters reported at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub incidents_loaded: usize,
    pub markers_rendered: usize,
    pub incidents_without_coordinates: usize,
    pub incidents_without_date: usize,
    pub polygons_rendered: usize,
    pub countries_with_incidents: usize,
    pub unmatched_country_names: Vec<String>,
    pub unmatched_incidents: u64,
    pub scale_min: f64,
    pub scale_max: f64,
}

/// Output of one pipeline run
#[derive(Debug, Clone)]
pub struct MapBuild {
    pub joined: Vec<JoinedCountry>,
    pub document: MapDocument,
    pub summary: RunSummary,
}

/// Build the map document from loaded inputs.
///
/// Fails only on an empty polygon collection; unmatched names, missing
/// coordinates and missing dates degrade to zero counts and fewer markers.
pub fn build_map<N>(
    incidents: &[IncidentRecord],
    polygons: &[CountryPolygon],
    normalizer: &N,
    config: &RenderConfig,
) -> Result<MapBuild>
where
    N: CountryNameNormalizer + ?Sized,
{
    if polygons.is_empty() {
        return Err(MapError::EmptyPolygonSource);
    }

    let stats = count_by_country(incidents, normalizer);
    info!("Aggregated incidents into {} country keys", stats.len());

    let outcome = join_counts(polygons, &stats);

    // Calibrated on the joined set so zero-count countries widen the range
    let scale = ColorScale::from_counts(outcome.countries.iter().map(|c| c.incident_count))
        .ok_or(MapError::EmptyPolygonSource)?;
    info!("Color scale range: [{}, {}]", scale.min(), scale.max());

    let document = build_document(&outcome.countries, incidents, &scale, config);

    let summary = RunSummary {
        incidents_loaded: incidents.len(),
        markers_rendered: document.markers.markers.len(),
        incidents_without_coordinates: incidents.len() - document.markers.markers.len(),
        incidents_without_date: incidents.iter().filter(|i| i.date.is_none()).count(),
        polygons_rendered: document.choropleth.features.len(),
        countries_with_incidents: outcome.countries_with_incidents(),
        unmatched_country_names: outcome.unmatched_keys.clone(),
        unmatched_incidents: outcome.unmatched_incidents,
        scale_min: scale.min(),
        scale_max: scale.max(),
    };

    Ok(MapBuild {
        joined: outcome.countries,
        document,
        summary,
    })
}
