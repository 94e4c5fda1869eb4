//! Top-level orchestration (spec §5): wires C1 → C6 → C7 → C8 over a whole
//! city catalogue. Flow: index the snapshot, assign elements to cities,
//! reconstruct and validate every city, resolve transfers across all of
//! them, then export, consulting the cache and recovery store along the
//! way (spec §2 flow diagram).
//!
//! Per-city work is independent and runs in parallel over rayon; the two
//! bookkeeping sets the cities would otherwise share — used entrances and
//! the transfer list — are never mutated by a worker. Each city reports its
//! own local view and this driver folds them together afterwards, matching
//! the "gathered by the driver, not shared mutable state" rule (spec §5).

use crate::city::City;
use crate::config::Config;
use crate::element::{ElementId, ElementRecord, ElementStore};
use crate::export::{self, Cache, ExportResult};
use crate::model::transfer;
use crate::model::Mode;
use crate::recovery::RecoveryStore;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Everything the pipeline needs beyond the snapshot and the catalogue
/// (spec §6). Both paths are optional: a missing one disables that side
/// channel (no cache reuse, no recovery-assisted reordering) rather than
/// failing the run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub config: Config,
    pub cache_path: Option<PathBuf>,
    pub recovery_path: Option<PathBuf>,
}

/// One run's outcome: every city's reconstructed topology and diagnostics,
/// the final export, and the process-wide bookkeeping the driver gathered
/// from them (spec §5).
pub struct PipelineResult {
    pub cities: Vec<City>,
    pub export: ExportResult,
    /// Every subway-entrance node attached to at least one station in at
    /// least one city, unioned across the whole run (spec §5).
    pub used_entrances: HashSet<ElementId>,
}

/// Runs the full pipeline over a decoded element snapshot and a parsed
/// catalogue (spec §2 flow).
pub fn run(records: impl IntoIterator<Item = ElementRecord>, mut cities: Vec<City>, options: &PipelineOptions) -> PipelineResult {
    let mut store = ElementStore::new();
    store.index(records);
    for id in store.compute_centres() {
        tracing::warn!(element = %id, "relation centre could not be resolved");
    }

    let recovery = match &options.recovery_path {
        Some(path) => RecoveryStore::load(path),
        None => RecoveryStore::empty(),
    };

    assign_elements(&mut cities, &store);

    cities.par_iter_mut().for_each(|city| {
        let city_recovery = recovery.for_city(&city.name);
        city.extract_routes(&store, &options.config, city_recovery);
    });

    let used_entrances = validate_cities(&mut cities, &store, &options.config);

    let global_transfers = resolve_transfers(&cities, &store);

    let export_result = run_export(&cities, &global_transfers, &store, options);

    save_recovery(&cities, &recovery, options);

    PipelineResult { cities, export: export_result, used_entrances }
}

/// Files every element into every city whose territory it falls in (spec
/// §4.6): a border station legitimately belongs to more than one city, so
/// this is a full cross product, not a partition.
fn assign_elements(cities: &mut [City], store: &ElementStore) {
    cities.par_iter_mut().for_each(|city| {
        for el in store.iter() {
            if city.contains(el) {
                city.add(el);
            }
        }
    });
}

/// Validates every city, collecting each one's local "used entrances" set
/// before merging them — running `City::validate` in parallel with one
/// shared `HashSet` would need a lock the original never has (spec §5).
fn validate_cities(cities: &mut [City], store: &ElementStore, config: &Config) -> HashSet<ElementId> {
    let local_sets: Vec<HashSet<ElementId>> = cities
        .par_iter_mut()
        .map(|city| {
            let mut used = HashSet::new();
            city.validate(store, config, &mut used);
            used
        })
        .collect();

    let mut used_entrances = HashSet::new();
    for set in local_sets {
        used_entrances.extend(set);
    }
    used_entrances
}

/// Collapses stop-area-group relations into transfers over the union of
/// every city's topology (spec §4.7, component C7), run once all cities
/// have validated. A per-city view can't see a transfer whose two member
/// stop areas were independently materialised by different cities sharing
/// a border, so this repeats the per-city resolution globally rather than
/// just concatenating each city's own `transfers`.
fn resolve_transfers(cities: &[City], store: &ElementStore) -> Vec<transfer::Transfer> {
    let mut used: HashSet<ElementId> = HashSet::new();
    let mut stations_by_element: HashMap<ElementId, HashSet<ElementId>> = HashMap::new();

    for city in cities {
        for master in city.route_masters() {
            for route in master.iter() {
                for stop in &route.stops {
                    used.insert(city.stop_areas[stop.stop_area as usize].id);
                }
            }
        }
        for (&el_id, area_idxs) in &city.stations {
            let entry = stations_by_element.entry(el_id).or_default();
            entry.extend(area_idxs.iter().map(|&idx| city.stop_areas[idx as usize].id));
        }
    }

    let groups = store.iter().filter(|el| el.tag("public_transport") == Some("stop_area_group"));
    transfer::find_transfers(groups, &stations_by_element, &used)
}

fn run_export(cities: &[City], global_transfers: &[transfer::Transfer], store: &ElementStore, options: &PipelineOptions) -> ExportResult {
    let mut good: Vec<(String, HashSet<Mode>)> = Vec::new();
    let mut bad: Vec<(String, HashSet<Mode>)> = Vec::new();
    for city in cities {
        let entry = (city.name.clone(), city.active_modes.clone());
        if city.is_good() {
            good.push(entry);
        } else {
            bad.push(entry);
        }
    }

    let mut cache = Cache::load(options.cache_path.clone(), &good, &bad);
    export::process(cities, global_transfers, store, &mut cache, &options.config)
}

/// Refreshes the recovery store from every city that validated with no
/// errors this run (spec §4.4.3) and persists it, if configured.
fn save_recovery(cities: &[City], recovery: &RecoveryStore, options: &PipelineOptions) {
    let Some(path) = &options.recovery_path else { return };

    let mut next = recovery.clone();
    for city in cities {
        if city.is_good() {
            next.set_city(city.name.clone(), city.recovery_snapshot());
        }
    }
    if let Err(e) = next.save(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to save recovery data");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementRecord as Rec, Tags};
    use std::collections::HashSet as Set;

    fn station_record(id: u64, lon: f64, lat: f64, name: &str) -> ElementRecord {
        let mut tags = Tags::default();
        tags.insert("railway".into(), "station".into());
        tags.insert("station".into(), "subway".into());
        tags.insert("name".into(), name.into());
        // Round-trips through the same JSON decoding the real pipeline uses.
        let json = serde_json::json!({
            "type": "node", "id": id, "lat": lat, "lon": lon, "tags": tags,
        });
        serde_json::from_value(json).expect("well-formed node record")
    }

    fn new_city(name: &str, bbox: [f64; 4]) -> City {
        City::new(
            1,
            name.to_string(),
            "Testland".into(),
            "Testinent".into(),
            Some(bbox),
            Set::new(),
            [Mode::Subway].into_iter().collect(),
            1,
            0,
            0,
            0,
        )
    }

    #[test]
    fn run_indexes_assigns_and_exports_a_single_station() {
        let records = vec![station_record(1, 0.0, 0.0, "Central")];
        let cities = vec![new_city("Testville", [-1.0, -1.0, 1.0, 1.0])];
        let options = PipelineOptions::default();

        let result = run(records, cities, &options);
        assert_eq!(result.cities.len(), 1);
        assert_eq!(result.cities[0].stop_areas.len(), 1);
        assert!(result.used_entrances.is_empty());
        assert!(result.export.networks.is_empty());
    }

    #[test]
    fn element_outside_every_bbox_is_not_assigned() {
        let records = vec![station_record(1, 50.0, 50.0, "Far")];
        let cities = vec![new_city("Testville", [-1.0, -1.0, 1.0, 1.0])];
        let result = run(records, cities, &PipelineOptions::default());
        assert!(result.cities[0].stop_areas.is_empty());
    }

    #[test]
    fn dangling_way_node_is_ignored_without_panicking() {
        // A way referencing a node never present in the snapshot shouldn't
        // blow up centre computation or city assignment.
        let json = serde_json::json!({
            "type": "way", "id": 1, "nodes": [999], "tags": {},
        });
        let way: Rec = serde_json::from_value(json).unwrap();
        let cities = vec![new_city("Testville", [-1.0, -1.0, 1.0, 1.0])];
        let result = run(vec![way], cities, &PipelineOptions::default());
        assert!(result.cities[0].stop_areas.is_empty());
    }
}
