//! Prior-run itinerary recovery (spec §4.4.3, component C9).
//!
//! Keyed by `(colour, ref)` per city, this lets the route builder reorder a
//! variant's stops when this run's snapshot produces a detectably wrong
//! order but an earlier good run recorded the right one. A missing or
//! malformed recovery file is not fatal — the pipeline proceeds with an
//! empty store and a warning, mirroring `subway_io.read_recovery_data`.

use crate::error::Error;
use crate::geo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecoveredStation {
    /// Matches the wire field name of the system this recovery format is
    /// grounded on verbatim, typo and all, so existing recovery files stay
    /// loadable.
    #[serde(rename = "oms_id")]
    element_id: String,
    name: String,
    center: Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItineraryRecord {
    stations: Vec<RecoveredStation>,
    name: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

type RawCityData = HashMap<String, Vec<ItineraryRecord>>;
type RawRecoveryFile = HashMap<String, RawCityData>;

/// A single previously-recorded stop sequence for one route variant.
#[derive(Debug, Clone, Default)]
pub struct Itinerary {
    pub station_names: Vec<String>,
    pub station_ids: Vec<String>,
    pub coordinates: Vec<Point>,
    pub name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Itinerary {
    pub fn new(
        stations: Vec<(String, String, Point)>,
        name: Option<String>,
        from: Option<String>,
        to: Option<String>,
    ) -> Self {
        let mut station_ids = Vec::with_capacity(stations.len());
        let mut station_names = Vec::with_capacity(stations.len());
        let mut coordinates = Vec::with_capacity(stations.len());
        for (id, station_name, center) in stations {
            station_ids.push(id);
            station_names.push(station_name);
            coordinates.push(center);
        }
        Itinerary { station_names, station_ids, coordinates, name, from, to }
    }
}

impl From<ItineraryRecord> for Itinerary {
    fn from(rec: ItineraryRecord) -> Self {
        let mut station_ids = Vec::with_capacity(rec.stations.len());
        let mut station_names = Vec::with_capacity(rec.stations.len());
        let mut coordinates = Vec::with_capacity(rec.stations.len());
        for s in rec.stations {
            station_ids.push(s.element_id);
            station_names.push(s.name);
            coordinates.push(s.center);
        }
        Itinerary { station_names, station_ids, coordinates, name: rec.name, from: rec.from, to: rec.to }
    }
}

impl From<&Itinerary> for ItineraryRecord {
    fn from(it: &Itinerary) -> Self {
        ItineraryRecord {
            stations: it
                .station_ids
                .iter()
                .zip(it.station_names.iter())
                .zip(it.coordinates.iter())
                .map(|((id, name), center)| RecoveredStation {
                    element_id: id.clone(),
                    name: name.clone(),
                    center: *center,
                })
                .collect(),
            name: it.name.clone(),
            from: it.from.clone(),
            to: it.to.clone(),
        }
    }
}

/// One city's recovery data: every route variant's recorded itinerary,
/// keyed by `(colour, ref)` — a route is identified by name/ref/colour
/// rather than by relation id because relation ids are not stable across
/// snapshot regenerations (spec §4.4.3).
#[derive(Debug, Clone, Default)]
pub struct CityRecovery {
    routes: HashMap<(String, String), Vec<Itinerary>>,
}

impl CityRecovery {
    pub fn from_routes(routes: impl IntoIterator<Item = (String, String, Itinerary)>) -> CityRecovery {
        let mut map: HashMap<(String, String), Vec<Itinerary>> = HashMap::new();
        for (colour, route_ref, itinerary) in routes {
            map.entry((colour, route_ref)).or_default().push(itinerary);
        }
        CityRecovery { routes: map }
    }

    pub fn lookup(&self, colour: &str, route_ref: &str) -> Option<&Vec<Itinerary>> {
        self.routes.get(&(colour.to_string(), route_ref.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn route_key(colour: &str, route_ref: &str) -> String {
    serde_json::to_string(&(colour, route_ref)).unwrap_or_default()
}

fn parse_route_key(key: &str) -> Option<(String, String)> {
    serde_json::from_str::<(String, String)>(key).ok()
}

/// The whole-run recovery store: every city's [`CityRecovery`] (spec §2:
/// consulted by `City` during route building, refreshed from cities that
/// validated cleanly this run).
#[derive(Debug, Clone, Default)]
pub struct RecoveryStore {
    cities: HashMap<String, CityRecovery>,
}

impl RecoveryStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads recovery data from disk. Matches the original's tolerance for
    /// a missing or malformed file: log a warning and continue empty rather
    /// than fail the whole run.
    pub fn load(path: &Path) -> RecoveryStore {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot find recovery data file, continuing without it");
                return RecoveryStore::empty();
            }
        };
        let raw: RawRecoveryFile = match serde_json::from_slice(&bytes) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot load recovery data, continuing without it");
                return RecoveryStore::empty();
            }
        };

        let mut cities = HashMap::new();
        for (city_name, routes) in raw {
            let mut by_route = HashMap::new();
            for (key, itineraries) in routes {
                if let Some(route_key) = parse_route_key(&key) {
                    by_route.insert(route_key, itineraries.into_iter().map(Itinerary::from).collect());
                }
            }
            cities.insert(city_name, CityRecovery { routes: by_route });
        }
        RecoveryStore { cities }
    }

    pub fn for_city(&self, name: &str) -> Option<&CityRecovery> {
        self.cities.get(name)
    }

    /// Overwrites (or adds) a city's recovery data — called only for cities
    /// that validated with no errors this run (spec §4.4.3).
    pub fn set_city(&mut self, name: impl Into<String>, recovery: CityRecovery) {
        self.cities.insert(name.into(), recovery);
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let mut raw: RawRecoveryFile = HashMap::new();
        for (city_name, recovery) in &self.cities {
            let mut routes: RawCityData = HashMap::new();
            for ((colour, route_ref), itineraries) in &recovery.routes {
                let records: Vec<ItineraryRecord> = itineraries.iter().map(ItineraryRecord::from).collect();
                routes.insert(route_key(colour, route_ref), records);
            }
            raw.insert(city_name.clone(), routes);
        }
        let bytes = serde_json::to_vec_pretty(&raw)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let itinerary = Itinerary::new(
            vec![
                ("n1".into(), "Alpha".into(), Point::new(0.0, 0.0)),
                ("n2".into(), "Beta".into(), Point::new(1.0, 1.0)),
            ],
            Some("Line 1".into()),
            Some("Alpha".into()),
            Some("Beta".into()),
        );
        let mut store = RecoveryStore::empty();
        store.set_city("Testville", CityRecovery::from_routes([("ff0000".to_string(), "L1".to_string(), itinerary)]));

        let dir = std::env::temp_dir().join("transitfold-recovery-test.json");
        store.save(&dir).unwrap();
        let loaded = RecoveryStore::load(&dir);
        let recovered = loaded.for_city("Testville").unwrap().lookup("ff0000", "L1").unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].station_names, vec!["Alpha", "Beta"]);
        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn missing_file_yields_empty_store() {
        let store = RecoveryStore::load(Path::new("/nonexistent/path/recovery.json"));
        assert!(store.for_city("Anywhere").is_none());
    }
}
