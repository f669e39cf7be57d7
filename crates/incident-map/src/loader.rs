//! Data loading from the incident table and the country polygon source

use crate::{
    CountryPolygon, IncidentRecord, MapError, Result, DEFAULT_ADMIN_FIELD, EXCLUDED_ADMIN_NAMES,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use geojson::{GeoJson, Geometry, Value};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Polygon source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Feature property holding the canonical country name
    pub admin_field: String,
    /// Admin names dropped from the polygon source
    pub excluded_admin_names: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            admin_field: DEFAULT_ADMIN_FIELD.to_string(),
            excluded_admin_names: EXCLUDED_ADMIN_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Raw incident row (CSV or JSON)
#[derive(Debug, Deserialize)]
struct RawIncident {
    incident_id: Option<String>,
    date: Option<String>,
    country: Option<String>,
    region: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    longitude: Option<f64>,
    means_of_attack: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    total_killed: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    total_wounded: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    total_kidnapped: Option<f64>,
}

/// Parse a calendar date, keeping only the date part of timestamps
fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    None
}

/// Casualty cells may be blank or float-typed ("3.0")
fn casualty_count(value: Option<f64>) -> u32 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.round() as u32,
        _ => 0,
    }
}

fn text(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Unusable cells degrade to `None` / 0; the record always survives
fn to_record(index: usize, raw: RawIncident) -> IncidentRecord {
    let date_text = raw.date.unwrap_or_default();
    let date = parse_date(&date_text);
    if date.is_none() {
        warn!("Incident record {}: no usable date in '{}', kept without one", index, date_text);
    }

    let incident_id = match raw.incident_id {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => format!("inc-{}", index),
    };

    IncidentRecord {
        incident_id,
        date,
        country: text(raw.country),
        region: text(raw.region),
        latitude: raw.latitude.filter(|v| v.is_finite()),
        longitude: raw.longitude.filter(|v| v.is_finite()),
        means_of_attack: text(raw.means_of_attack),
        total_killed: casualty_count(raw.total_killed),
        total_wounded: casualty_count(raw.total_wounded),
        total_kidnapped: casualty_count(raw.total_kidnapped),
    }
}

/// Read incident rows from CSV (header row required, extra columns ignored)
pub fn read_incidents_csv<R: Read>(reader: R) -> Result<Vec<IncidentRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (i, row) in csv_reader.deserialize::<RawIncident>().enumerate() {
        records.push(to_record(i, row?));
    }
    Ok(records)
}

/// Read incident rows from a JSON array
pub fn read_incidents_json<R: Read>(reader: R) -> Result<Vec<IncidentRecord>> {
    let rows: Vec<RawIncident> = serde_json::from_reader(reader)?;
    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| to_record(i, row))
        .collect())
}

/// Load the incident table; `.json` files are read as a JSON array, anything else as CSV
pub fn load_incidents(path: impl AsRef<Path>) -> Result<Vec<IncidentRecord>> {
    let path = path.as_ref();
    info!("Loading incidents from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let records = if is_json {
        read_incidents_json(reader)?
    } else {
        read_incidents_csv(reader)?
    };

    let without_coords = records.iter().filter(|r| r.coordinates().is_none()).count();
    let without_date = records.iter().filter(|r| r.date.is_none()).count();
    info!(
        "Loaded {} incidents ({} without usable coordinates, {} without a usable date)",
        records.len(),
        without_coords,
        without_date
    );

    Ok(records)
}

/// Polygon or MultiPolygon with at least one ring
fn is_usable_boundary(geometry: &Geometry) -> bool {
    match &geometry.value {
        Value::Polygon(rings) => rings.first().is_some_and(|ring| !ring.is_empty()),
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .any(|rings| rings.first().is_some_and(|ring| !ring.is_empty())),
        _ => false,
    }
}

/// Extract country polygons from parsed GeoJSON
pub fn read_country_polygons(geojson: GeoJson, config: &LoadConfig) -> Result<Vec<CountryPolygon>> {
    let collection = match geojson {
        GeoJson::FeatureCollection(collection) => collection,
        _ => return Err(MapError::UnsupportedPolygonSource),
    };

    let mut polygons = Vec::new();
    let mut excluded = 0;

    for (index, feature) in collection.features.into_iter().enumerate() {
        let admin_name = feature
            .property(&config.admin_field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| MapError::MissingAdminName {
                index,
                field: config.admin_field.clone(),
            })?;

        if config.excluded_admin_names.iter().any(|name| *name == admin_name) {
            debug!("Excluding {} from polygon source", admin_name);
            excluded += 1;
            continue;
        }

        let geometry = match feature.geometry {
            Some(geometry) if is_usable_boundary(&geometry) => geometry,
            _ => return Err(MapError::MissingGeometry { admin_name }),
        };

        polygons.push(CountryPolygon::new(admin_name, geometry));
    }

    if polygons.is_empty() {
        return Err(MapError::EmptyPolygonSource);
    }

    info!(
        "Loaded {} country polygons ({} excluded)",
        polygons.len(),
        excluded
    );

    Ok(polygons)
}

/// Load country polygons from a GeoJSON FeatureCollection file
pub fn load_country_polygons(path: impl AsRef<Path>, config: &LoadConfig) -> Result<Vec<CountryPolygon>> {
    let path = path.as_ref();
    info!("Loading country polygons from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let geojson = GeoJson::from_reader(reader)?;

    read_country_polygons(geojson, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    const CSV_HEADER: &str = "incident_id,date,country,region,latitude,longitude,means_of_attack,total_killed,total_wounded,total_kidnapped";

    fn square_feature(name: &str, lon: f64, lat: f64) -> String {
        format!(
            r#"{{"type": "Feature", "properties": {{"ADMIN": "{name}", "ISO_A3": "XXX"}},
                "geometry": {{"type": "Polygon", "coordinates": [[[{lon}, {lat}], [{lon2}, {lat}], [{lon2}, {lat2}], [{lon}, {lat2}], [{lon}, {lat}]]]}}}}"#,
            name = name,
            lon = lon,
            lat = lat,
            lon2 = lon + 1.0,
            lat2 = lat + 1.0
        )
    }

    fn collection(features: &[String]) -> String {
        format!(r#"{{"type": "FeatureCollection", "features": [{}]}}"#, features.join(","))
    }

    #[test]
    fn test_read_incidents_csv() {
        let csv = format!(
            "{}\n\
             1,2020-01-05,Afghanistan,Kabul,34.5,69.2,Shooting,2,1,0\n\
             2,2020-01-06,Afghanistan,Kabul,,,Kidnapping,0,0,3\n",
            CSV_HEADER
        );

        let records = read_incidents_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].incident_id, "1");
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2020, 1, 5));
        assert_eq!(records[0].coordinates(), Some((34.5, 69.2)));
        assert_eq!(records[0].total_killed, 2);
        assert_eq!(records[1].coordinates(), None);
        assert_eq!(records[1].total_kidnapped, 3);
    }

    #[test]
    fn test_blank_and_float_casualties() {
        let csv = format!(
            "{}\n1,2020-01-05,Mali,Gao,16.2,-0.03,Shelling,3.0,,1.0\n",
            CSV_HEADER
        );

        let records = read_incidents_csv(csv.as_bytes()).unwrap();
        assert_eq!(records[0].total_killed, 3);
        assert_eq!(records[0].total_wounded, 0);
        assert_eq!(records[0].total_kidnapped, 1);
    }

    #[test]
    fn test_extra_columns_and_column_order() {
        let csv = "country,year,incident_id,date,region,latitude,longitude,means_of_attack,total_killed,total_wounded,total_kidnapped,source\n\
                   Somalia,2019,7,2019-07-01,Banadir,2.04,45.34,Bodily assault,0,1,0,press\n";

        let records = read_incidents_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].country, "Somalia");
        assert_eq!(records[0].incident_id, "7");
    }

    #[test]
    fn test_timestamp_dates_keep_date_part() {
        assert_eq!(parse_date("2020-01-05 13:45:00"), NaiveDate::from_ymd_opt(2020, 1, 5));
        assert_eq!(parse_date("2020-01-05T13:45:00"), NaiveDate::from_ymd_opt(2020, 1, 5));
        assert_eq!(parse_date("2020-01-05T13:45:00+00:00"), NaiveDate::from_ymd_opt(2020, 1, 5));
        assert_eq!(parse_date("05/01/2020"), None);
    }

    #[test]
    fn test_unparseable_date_keeps_record() {
        let csv = format!(
            "{}\n1,not-a-date,Mali,Gao,16.2,-0.03,Shelling,0,0,0\n2,2020-01-06,Mali,Gao,16.3,-0.04,Shelling,1,0,0\n",
            CSV_HEADER
        );

        let records = read_incidents_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, None);
        assert_eq!(records[0].country, "Mali");
        assert_eq!(records[0].coordinates(), Some((16.2, -0.03)));
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2020, 1, 6));
    }

    #[test]
    fn test_blank_date_keeps_record() {
        let csv = format!("{}\n1,,Mali,Gao,16.2,-0.03,Shelling,0,0,0\n", CSV_HEADER);

        let records = read_incidents_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, None);
        assert_eq!(records[0].incident_id, "1");
    }

    #[test]
    fn test_non_numeric_cells_degrade_per_row() {
        let csv = format!(
            "{}\n1,2020-01-05,Mali,Gao,unknown,-0.03,Shelling,n/a,2,0\n2,2020-01-06,Niger,Tillaberi,14.2,1.4,Shooting,1,0,0\n",
            CSV_HEADER
        );

        let records = read_incidents_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].latitude, None);
        assert_eq!(records[0].longitude, Some(-0.03));
        assert_eq!(records[0].coordinates(), None);
        assert_eq!(records[0].total_killed, 0);
        assert_eq!(records[0].total_wounded, 2);
        assert_eq!(records[1].coordinates(), Some((14.2, 1.4)));
    }

    #[test]
    fn test_json_unparseable_date_keeps_record() {
        let json = r#"[{"incident_id": "j1", "date": "sometime", "country": "Chad", "region": "Lac"}]"#;

        let records = read_incidents_json(json.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, None);
        assert_eq!(records[0].country, "Chad");
    }

    #[test]
    fn test_missing_incident_id_synthesized() {
        let csv = format!("{}\n,2020-01-05,Mali,Gao,16.2,-0.03,Shelling,0,0,0\n", CSV_HEADER);

        let records = read_incidents_csv(csv.as_bytes()).unwrap();
        assert_eq!(records[0].incident_id, "inc-0");
    }

    #[test]
    fn test_load_incidents_json() {
        let json = r#"[
            {"incident_id": "a", "date": "2018-02-03", "country": "Syria", "region": "Idlib",
             "latitude": 35.9, "longitude": 36.6, "means_of_attack": "Aerial bombardment",
             "total_killed": 4, "total_wounded": 2, "total_kidnapped": 0},
            {"incident_id": "b", "date": "2018-02-04", "country": "Syria", "region": "Idlib",
             "latitude": null, "longitude": null, "means_of_attack": "Shooting"}
        ]"#;

        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let records = load_incidents(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].total_killed, 4);
        assert_eq!(records[1].coordinates(), None);
        assert_eq!(records[1].total_wounded, 0);
    }

    #[test]
    fn test_load_incidents_csv_file() {
        let csv = format!("{}\n1,2020-01-05,Mali,Gao,16.2,-0.03,Shelling,0,0,0\n", CSV_HEADER);

        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(csv.as_bytes()).unwrap();

        let records = load_incidents(file.path()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_load_country_polygons_excludes_antarctica() {
        let json = collection(&[
            square_feature("Countryland", 0.0, 0.0),
            square_feature("Antarctica", 0.0, -80.0),
            square_feature("Otherland", 10.0, 10.0),
        ]);

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let polygons = load_country_polygons(file.path(), &LoadConfig::default()).unwrap();
        let names: Vec<&str> = polygons.iter().map(|p| p.admin_name.as_str()).collect();
        assert_eq!(names, vec!["Countryland", "Otherland"]);
    }

    #[test]
    fn test_multipolygon_accepted() {
        let json = collection(&[r#"{"type": "Feature", "properties": {"ADMIN": "Archipelago"},
            "geometry": {"type": "MultiPolygon", "coordinates": [
                [[[0, 0], [1, 0], [1, 1], [0, 0]]],
                [[[2, 2], [3, 2], [3, 3], [2, 2]]]
            ]}}"#
            .to_string()]);

        let geojson: GeoJson = json.parse().unwrap();
        let polygons = read_country_polygons(geojson, &LoadConfig::default()).unwrap();
        assert_eq!(polygons.len(), 1);
    }

    #[test]
    fn test_missing_geometry_is_fatal() {
        let json = collection(&[
            square_feature("Countryland", 0.0, 0.0),
            r#"{"type": "Feature", "properties": {"ADMIN": "Nowhere"}, "geometry": null}"#.to_string(),
        ]);

        let geojson: GeoJson = json.parse().unwrap();
        let err = read_country_polygons(geojson, &LoadConfig::default()).unwrap_err();
        assert!(matches!(err, MapError::MissingGeometry { admin_name } if admin_name == "Nowhere"));
    }

    #[test]
    fn test_point_geometry_is_not_a_boundary() {
        let json = collection(&[r#"{"type": "Feature", "properties": {"ADMIN": "Dot"},
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}}"#
            .to_string()]);

        let geojson: GeoJson = json.parse().unwrap();
        assert!(matches!(
            read_country_polygons(geojson, &LoadConfig::default()),
            Err(MapError::MissingGeometry { .. })
        ));
    }

    #[test]
    fn test_missing_admin_name_is_fatal() {
        let json = collection(&[r#"{"type": "Feature", "properties": {"NAME": "Countryland"},
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}}"#
            .to_string()]);

        let geojson: GeoJson = json.parse().unwrap();
        assert!(matches!(
            read_country_polygons(geojson, &LoadConfig::default()),
            Err(MapError::MissingAdminName { index: 0, .. })
        ));
    }

    #[test]
    fn test_custom_admin_field() {
        let json = collection(&[r#"{"type": "Feature", "properties": {"NAME": "Countryland"},
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}}"#
            .to_string()]);

        let config = LoadConfig {
            admin_field: "NAME".to_string(),
            ..LoadConfig::default()
        };
        let geojson: GeoJson = json.parse().unwrap();
        let polygons = read_country_polygons(geojson, &config).unwrap();
        assert_eq!(polygons[0].admin_name, "Countryland");
    }

    #[test]
    fn test_empty_polygon_source_is_fatal() {
        let only_antarctica = collection(&[square_feature("Antarctica", 0.0, -80.0)]);
        let geojson: GeoJson = only_antarctica.parse().unwrap();
        assert!(matches!(
            read_country_polygons(geojson, &LoadConfig::default()),
            Err(MapError::EmptyPolygonSource)
        ));

        let empty: GeoJson = collection(&[]).parse().unwrap();
        assert!(matches!(
            read_country_polygons(empty, &LoadConfig::default()),
            Err(MapError::EmptyPolygonSource)
        ));
    }

    #[test]
    fn test_bare_geometry_rejected() {
        let geojson: GeoJson = r#"{"type": "Point", "coordinates": [0, 0]}"#.parse().unwrap();
        assert!(matches!(
            read_country_polygons(geojson, &LoadConfig::default()),
            Err(MapError::UnsupportedPolygonSource)
        ));
    }
}
