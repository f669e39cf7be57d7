//! Per-country incident counts and the polygon left join

use crate::normalize::CountryNameNormalizer;
use crate::{AggregatedCountryStat, CountryPolygon, IncidentRecord, JoinedCountry};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Count incidents per normalized country key.
///
/// One count per incident, never per casualty; same-day incidents in the same
/// country all count. Coordinates play no part here. Output is sorted by key.
pub fn count_by_country<N>(incidents: &[IncidentRecord], normalizer: &N) -> Vec<AggregatedCountryStat>
where
    N: CountryNameNormalizer + ?Sized,
{
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut blank = 0;

    for incident in incidents {
        if incident.country.trim().is_empty() {
            blank += 1;
            continue;
        }
        let key = normalizer.normalize(&incident.country);
        *counts.entry(key.into_owned()).or_insert(0) += 1;
    }

    if blank > 0 {
        debug!("{} incidents have no country and were not aggregated", blank);
    }

    counts
        .into_iter()
        .map(|(country_key, incident_count)| AggregatedCountryStat {
            country_key,
            incident_count,
        })
        .collect()
}

/// Result of joining aggregated stats onto polygons
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// One entry per input polygon, in input order
    pub countries: Vec<JoinedCountry>,
    /// Stat keys that matched no polygon, sorted
    pub unmatched_keys: Vec<String>,
    /// Incidents carried by the unmatched keys
    pub unmatched_incidents: u64,
}

impl JoinOutcome {
    /// Number of polygons with at least one incident
    pub fn countries_with_incidents(&self) -> usize {
        self.countries.iter().filter(|c| c.incident_count > 0).count()
    }
}

/// Left-outer-join `stats` onto `polygons` by exact `admin_name == country_key`.
///
/// Every polygon is kept; a polygon with no matching stat gets a count of 0.
/// The inputs are left untouched and a new joined collection is returned.
pub fn join_counts(polygons: &[CountryPolygon], stats: &[AggregatedCountryStat]) -> JoinOutcome {
    let by_key: HashMap<&str, u64> = stats
        .iter()
        .map(|s| (s.country_key.as_str(), s.incident_count))
        .collect();

    let countries: Vec<JoinedCountry> = polygons
        .iter()
        .map(|polygon| {
            let count = by_key.get(polygon.admin_name.as_str()).copied().unwrap_or(0);
            JoinedCountry::from_polygon(polygon, count)
        })
        .collect();

    let admin_names: HashSet<&str> = polygons.iter().map(|p| p.admin_name.as_str()).collect();
    let mut unmatched_keys = Vec::new();
    let mut unmatched_incidents = 0;

    for stat in stats {
        if !admin_names.contains(stat.country_key.as_str()) {
            warn!(
                "No country polygon for '{}' ({} incidents not attributed)",
                stat.country_key, stat.incident_count
            );
            unmatched_incidents += stat.incident_count;
            unmatched_keys.push(stat.country_key.clone());
        }
    }
    unmatched_keys.sort();

    let outcome = JoinOutcome {
        countries,
        unmatched_keys,
        unmatched_incidents,
    };

    info!(
        "Joined {} country keys onto {} polygons ({} with incidents, {} keys unmatched)",
        stats.len(),
        outcome.countries.len(),
        outcome.countries_with_incidents(),
        outcome.unmatched_keys.len()
    );

    outcome
}
