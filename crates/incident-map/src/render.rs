//! Interactive map document: base tiles, choropleth, incident markers, legend
//!
//! The [`MapDocument`] holds every layer definition as plain ordered data.
//! [`MapDocument::to_html`] embeds it in a single HTML page that draws the map
//! client-side with Leaflet, so the output needs no server to view.

use crate::colormap::ColorScale;
use crate::{IncidentRecord, JoinedCountry, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Number of labelled ticks under the legend gradient
pub const LEGEND_TICKS: usize = 5;

/// Fixed styling and framing for the rendered map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Page title
    pub title: String,
    /// Initial map center `[lat, lon]`
    pub center: [f64; 2],
    pub zoom_start: f64,
    pub min_zoom: f64,
    /// Keep panning inside the world bounds
    pub max_bounds: bool,
    pub tiles_url: String,
    pub tiles_attribution: String,
    /// Container color shown behind the tiles
    pub background_color: String,

    pub choropleth_name: String,
    pub stroke_color: String,
    pub stroke_weight: f64,
    pub fill_opacity: f64,
    pub tooltip_country_label: String,
    pub tooltip_count_label: String,
    pub tooltip_sticky: bool,
    pub tooltip_style: String,

    pub marker_radius: f64,
    pub marker_color: String,
    pub marker_fill_color: String,
    pub marker_fill_opacity: f64,
    pub popup_max_width: u32,

    pub legend_caption: String,

    pub leaflet_css_url: String,
    pub leaflet_js_url: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: "Security Incidents".to_string(),
            center: [10.0, 20.0],
            zoom_start: 2.5,
            min_zoom: 2.5,
            max_bounds: true,
            tiles_url: "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png".to_string(),
            tiles_attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors &copy; <a href=\"https://carto.com/attributions\">CARTO</a>".to_string(),
            background_color: "#d4dadc".to_string(),

            choropleth_name: "Choropleth".to_string(),
            stroke_color: "black".to_string(),
            stroke_weight: 0.5,
            fill_opacity: 0.7,
            tooltip_country_label: "Country:".to_string(),
            tooltip_count_label: "Security Incidents:".to_string(),
            tooltip_sticky: true,
            tooltip_style: "background-color: white; color: #333; font-family: sans-serif; font-size: 13px; \
                            padding: 5px; border-radius: 5px; box-shadow: 1px 1px 2px rgba(0,0,0,0.25);"
                .to_string(),

            marker_radius: 2.0,
            marker_color: "#5e3c99".to_string(),      // muted violet border
            marker_fill_color: "#b2abd2".to_string(), // soft purple fill
            marker_fill_opacity: 0.45,
            popup_max_width: 300,

            legend_caption: "Number of Security Incidents".to_string(),

            leaflet_css_url: "https://cdn.jsdelivr.net/npm/leaflet@1.9.4/dist/leaflet.css".to_string(),
            leaflet_js_url: "https://cdn.jsdelivr.net/npm/leaflet@1.9.4/dist/leaflet.js".to_string(),
        }
    }
}

/// Background tile layer and initial view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseLayer {
    pub center: [f64; 2],
    pub zoom_start: f64,
    pub min_zoom: f64,
    pub max_bounds: bool,
    pub tiles_url: String,
    pub attribution: String,
    pub background_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonStyle {
    pub stroke_color: String,
    pub weight: f64,
    pub fill_opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TooltipSpec {
    pub sticky: bool,
    pub style: String,
}

/// One shaded country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoroplethFeature {
    pub admin_name: String,
    pub incident_count: u64,
    pub fill_color: String,
    pub tooltip_html: String,
    pub geometry: geojson::Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoroplethLayer {
    pub name: String,
    pub style: PolygonStyle,
    pub tooltip: TooltipSpec,
    pub features: Vec<ChoroplethFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub radius: f64,
    pub color: String,
    pub fill_color: String,
    pub fill_opacity: f64,
}

/// One incident at its reported location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub incident_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub date: Option<NaiveDate>,
    pub country: String,
    pub region: String,
    pub means_of_attack: String,
    pub total_killed: u32,
    pub total_wounded: u32,
    pub total_kidnapped: u32,
    pub popup_html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerLayer {
    pub style: MarkerStyle,
    pub popup_max_width: u32,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendStop {
    /// Position along the gradient, 0-1
    pub offset: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendTick {
    pub value: f64,
    pub label: String,
}

/// Color gradient overlay with its caption and bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub caption: String,
    pub min: f64,
    pub max: f64,
    pub stops: Vec<LegendStop>,
    pub ticks: Vec<LegendTick>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAssets {
    pub title: String,
    pub leaflet_css_url: String,
    pub leaflet_js_url: String,
}

/// The rendered map, layers in drawing order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDocument {
    pub page: PageAssets,
    pub base: BaseLayer,
    pub choropleth: ChoroplethLayer,
    pub markers: MarkerLayer,
    pub legend: Legend,
}

/// Format a count with thousands separators (`12345` → `12,345`)
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Hover content for a country: name and incident count
pub fn tooltip_html(country: &JoinedCountry, config: &RenderConfig) -> String {
    format!(
        "<table><tr><th>{}</th><td>{}</td></tr><tr><th>{}</th><td>{}</td></tr></table>",
        escape(&config.tooltip_country_label),
        escape(&country.admin_name),
        escape(&config.tooltip_count_label),
        format_count(country.incident_count)
    )
}

/// Click content for an incident: date, place, attack type and casualties
pub fn popup_html(incident: &IncidentRecord) -> String {
    format!(
        "<strong>Date:</strong> {}<br>\
         <strong>Country:</strong> {}<br>\
         <strong>Region:</strong> {}<br>\
         <strong>Means of Attack:</strong> {}<br>\
         <strong>Killed:</strong> {}<br>\
         <strong>Wounded:</strong> {}<br>\
         <strong>Kidnapped:</strong> {}",
        incident
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        escape(&incident.country),
        escape(&incident.region),
        escape(&incident.means_of_attack),
        incident.total_killed,
        incident.total_wounded,
        incident.total_kidnapped
    )
}

fn tick_label(value: f64) -> String {
    if value.fract() == 0.0 && value >= 0.0 {
        format_count(value as u64)
    } else {
        format!("{:.1}", value)
    }
}

fn build_legend(scale: &ColorScale, config: &RenderConfig) -> Legend {
    Legend {
        caption: escape(&config.legend_caption),
        min: scale.min(),
        max: scale.max(),
        stops: scale
            .gradient_stops()
            .into_iter()
            .map(|(offset, color)| LegendStop {
                offset,
                color: color.to_hex(),
            })
            .collect(),
        ticks: scale
            .ticks(LEGEND_TICKS)
            .into_iter()
            .map(|value| LegendTick {
                value,
                label: tick_label(value),
            })
            .collect(),
    }
}

/// Marker for an incident with valid coordinates
pub fn marker_for(incident: &IncidentRecord) -> Option<Marker> {
    let (latitude, longitude) = incident.coordinates()?;
    Some(Marker {
        incident_id: incident.incident_id.clone(),
        latitude,
        longitude,
        date: incident.date,
        country: incident.country.clone(),
        region: incident.region.clone(),
        means_of_attack: incident.means_of_attack.clone(),
        total_killed: incident.total_killed,
        total_wounded: incident.total_wounded,
        total_kidnapped: incident.total_kidnapped,
        popup_html: popup_html(incident),
    })
}

/// Assemble the map document.
///
/// Choropleth features follow `joined` order and markers follow `incidents`
/// order, so identical inputs always produce identical layers.
pub fn build_document(
    joined: &[JoinedCountry],
    incidents: &[IncidentRecord],
    scale: &ColorScale,
    config: &RenderConfig,
) -> MapDocument {
    let features: Vec<ChoroplethFeature> = joined
        .iter()
        .map(|country| ChoroplethFeature {
            admin_name: country.admin_name.clone(),
            incident_count: country.incident_count,
            fill_color: scale.color_for_count(country.incident_count).to_hex(),
            tooltip_html: tooltip_html(country, config),
            geometry: country.geometry.clone(),
        })
        .collect();

    let markers: Vec<Marker> = incidents.iter().filter_map(marker_for).collect();

    debug!(
        "Built {} choropleth features and {} markers ({} incidents without coordinates)",
        features.len(),
        markers.len(),
        incidents.len() - markers.len()
    );

    MapDocument {
        page: PageAssets {
            title: config.title.clone(),
            leaflet_css_url: config.leaflet_css_url.clone(),
            leaflet_js_url: config.leaflet_js_url.clone(),
        },
        base: BaseLayer {
            center: config.center,
            zoom_start: config.zoom_start,
            min_zoom: config.min_zoom,
            max_bounds: config.max_bounds,
            tiles_url: config.tiles_url.clone(),
            attribution: config.tiles_attribution.clone(),
            background_color: config.background_color.clone(),
        },
        choropleth: ChoroplethLayer {
            name: config.choropleth_name.clone(),
            style: PolygonStyle {
                stroke_color: config.stroke_color.clone(),
                weight: config.stroke_weight,
                fill_opacity: config.fill_opacity,
            },
            tooltip: TooltipSpec {
                sticky: config.tooltip_sticky,
                style: config.tooltip_style.clone(),
            },
            features,
        },
        markers: MarkerLayer {
            style: MarkerStyle {
                radius: config.marker_radius,
                color: config.marker_color.clone(),
                fill_color: config.marker_fill_color.clone(),
                fill_opacity: config.marker_fill_opacity,
            },
            popup_max_width: config.popup_max_width,
            markers,
        },
        legend: build_legend(scale, config),
    }
}

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>__TITLE__</title>
<link rel="stylesheet" href="__LEAFLET_CSS__">
<script src="__LEAFLET_JS__"></script>
<style>
html, body { width: 100%; height: 100%; margin: 0; padding: 0; }
#map { position: absolute; top: 0; bottom: 0; left: 0; right: 0; background: __BACKGROUND__; }
.incident-tooltip { __TOOLTIP_STYLE__ }
.incident-tooltip th { text-align: left; padding-right: 6px; }
.incident-legend { background: rgba(255,255,255,0.85); padding: 6px 8px; font: 12px sans-serif; border-radius: 4px; }
.incident-legend .bar { width: 260px; height: 10px; }
.incident-legend .ticks { position: relative; width: 260px; height: 14px; }
.incident-legend .ticks span { position: absolute; transform: translateX(-50%); }
</style>
</head>
<body>
<div id="map"></div>
<script>
const doc = __DOCUMENT__;

const base = doc.base;
const map = L.map('map', {
  center: base.center,
  zoom: base.zoom_start,
  minZoom: base.min_zoom,
  zoomSnap: 0.5,
  maxBounds: base.max_bounds ? [[-90, -180], [90, 180]] : null,
  maxBoundsViscosity: base.max_bounds ? 1.0 : 0.0
});
L.tileLayer(base.tiles_url, { attribution: base.attribution, noWrap: true }).addTo(map);

const choro = doc.choropleth;
L.geoJSON({
  type: 'FeatureCollection',
  features: choro.features.map(f => ({
    type: 'Feature',
    geometry: f.geometry,
    properties: { fill_color: f.fill_color, tooltip_html: f.tooltip_html }
  }))
}, {
  style: f => ({
    fillColor: f.properties.fill_color,
    color: choro.style.stroke_color,
    weight: choro.style.weight,
    fillOpacity: choro.style.fill_opacity
  }),
  onEachFeature: (f, layer) => layer.bindTooltip(f.properties.tooltip_html, {
    sticky: choro.tooltip.sticky,
    className: 'incident-tooltip'
  })
}).addTo(map);

const ms = doc.markers.style;
for (const m of doc.markers.markers) {
  L.circleMarker([m.latitude, m.longitude], {
    radius: ms.radius,
    color: ms.color,
    fill: true,
    fillColor: ms.fill_color,
    fillOpacity: ms.fill_opacity
  }).bindPopup(m.popup_html, { maxWidth: doc.markers.popup_max_width }).addTo(map);
}

const legend = L.control({ position: 'topright' });
legend.onAdd = function () {
  const div = L.DomUtil.create('div', 'incident-legend');
  const gradient = doc.legend.stops.map(s => s.color + ' ' + (s.offset * 100) + '%').join(', ');
  const span = doc.legend.ticks.length > 1 ? doc.legend.max - doc.legend.min : 0;
  const ticks = doc.legend.ticks.map(t => {
    const left = span > 0 ? ((t.value - doc.legend.min) / span) * 100 : 0;
    return '<span style="left:' + left + '%">' + t.label + '</span>';
  }).join('');
  div.innerHTML = '<div class="bar" style="background: linear-gradient(to right, ' + gradient + ')"></div>'
    + '<div class="ticks">' + ticks + '</div>'
    + '<div class="caption">' + doc.legend.caption + '</div>';
  return div;
};
legend.addTo(map);
</script>
</body>
</html>
"#;

/// JSON safe to embed in a `<script>` element
fn script_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(json.replace("</", "<\\/").replace("<!--", "<\\!--"))
}

impl MapDocument {
    /// Layer definitions as pretty JSON
    pub fn to_layers_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Self-contained HTML page; identical documents render byte-identical pages
    pub fn to_html(&self) -> Result<String> {
        let document = script_json(self)?;
        let html = PAGE_TEMPLATE
            .replace("__TITLE__", &escape(&self.page.title))
            .replace("__LEAFLET_CSS__", &html_escape::encode_double_quoted_attribute(&self.page.leaflet_css_url))
            .replace("__LEAFLET_JS__", &html_escape::encode_double_quoted_attribute(&self.page.leaflet_js_url))
            .replace("__BACKGROUND__", &self.base.background_color)
            .replace("__TOOLTIP_STYLE__", &self.choropleth.tooltip.style)
            .replace("__DOCUMENT__", &document);
        Ok(html)
    }
}

/// Write `contents` via a temporary sibling so a failed run leaves no partial file
fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    if let Err(e) = fs::write(&tmp_path, contents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Render the document to HTML and write it to `path`
pub fn write_document(document: &MapDocument, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    info!("Writing map to {:?}", path);
    write_atomically(path, &document.to_html()?)
}

/// Write the layer definitions as JSON to `path`
pub fn write_layers_json(document: &MapDocument, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    info!("Writing layer definitions to {:?}", path);
    write_atomically(path, &document.to_layers_json()?)
}
