//! Export cache (spec §4.8, §6): lets a city that fails validation this run
//! keep exporting its last known-good snapshot, once that snapshot has been
//! checked against the current dataset.

use super::{NetworkRecord, StopRecord};
use crate::config::{Config, EntrancePolicy};
use crate::element::{ElementId, ElementStore};
use crate::geo::{distance, Point};
use crate::model::{is_subway_entrance, station, Mode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedCity {
    network: NetworkRecord,
    stops: HashMap<String, StopRecord>,
    transfers: Vec<(u64, u64, u64)>,
}

type CacheFile = HashMap<String, CachedCity>;

/// Keyed by city name, matching the cache file's own top-level mapping
/// (spec §6). With no path configured every operation is a no-op, playing
/// the role the original splits into a separate `DummyCache` class.
pub struct Cache {
    path: Option<PathBuf>,
    data: CacheFile,
    good_city_modes: HashMap<String, HashSet<Mode>>,
    bad_city_modes: HashMap<String, HashSet<Mode>>,
    recovered: HashSet<String>,
    stop_cities: HashMap<u64, HashSet<String>>,
}

impl Cache {
    /// `good_cities`/`bad_cities` are used only to decide which cache
    /// entries are candidates for reuse (a good city overwrites its own
    /// entry instead) and which active-mode set an adoption check runs
    /// against.
    pub fn load(path: Option<PathBuf>, good_cities: &[(String, HashSet<Mode>)], bad_cities: &[(String, HashSet<Mode>)]) -> Cache {
        let data = path.as_ref().map(read_cache_file).unwrap_or_default();
        Cache {
            path,
            data,
            good_city_modes: good_cities.iter().cloned().collect(),
            bad_city_modes: bad_cities.iter().cloned().collect(),
            recovered: HashSet::new(),
            stop_cities: HashMap::new(),
        }
    }

    fn is_used(&self) -> bool {
        self.path.is_some()
    }

    /// Spec §6/§9: a cached station must still exist, still qualify as a
    /// station for the city's active modes, and sit within
    /// `displacement_tolerance_m` of where the cache last saw it. Under
    /// `EntrancePolicy::Strict`, each cached entrance/exit must also still
    /// resolve to a subway entrance. Any miss disqualifies the whole cached
    /// city, not just that one stop.
    fn is_cached_city_usable(&self, city_name: &str, store: &ElementStore, config: &Config) -> bool {
        let Some(cached) = self.data.get(city_name) else { return false };
        let Some(modes) = self.bad_city_modes.get(city_name) else { return false };

        for cached_stop in cached.stops.values() {
            let Some(station_id) = element_id_from_parts(&cached_stop.osm_type, cached_stop.osm_id) else {
                return false;
            };
            let Some(el) = store.get(station_id) else { return false };
            if !station::is_station(el, modes) {
                return false;
            }
            let Some(center) = el.center() else { return false };
            let cached_point = Point::new(cached_stop.lon, cached_stop.lat);
            if distance(center, cached_point) > config.displacement_tolerance_m {
                return false;
            }

            if config.cache_entrance_policy == EntrancePolicy::Strict {
                for entrance in cached_stop.entrances.iter().chain(&cached_stop.exits) {
                    let Some(entrance_id) = element_id_from_parts(&entrance.osm_type, entrance.osm_id) else {
                        return false;
                    };
                    match store.get(entrance_id) {
                        Some(e) if is_subway_entrance(e) => {}
                        _ => return false,
                    }
                }
            }
        }
        true
    }

    /// Pulls in every bad city's cache entry that still checks out, seeding
    /// the in-progress export with its stops and network (spec §4.8).
    pub fn provide_stops_and_networks(
        &mut self,
        stops: &mut HashMap<String, StopRecord>,
        networks: &mut Vec<NetworkRecord>,
        store: &ElementStore,
        config: &Config,
    ) {
        if !self.is_used() {
            return;
        }
        let bad_cities: Vec<String> = self.bad_city_modes.keys().cloned().collect();
        for name in bad_cities {
            if self.is_cached_city_usable(&name, store, config) {
                let cached = self.data.get(&name).expect("checked by is_cached_city_usable");
                stops.extend(cached.stops.clone());
                networks.push(cached.network.clone());
                tracing::info!(city = %name, "reusing cached export, city failed validation this run");
                self.recovered.insert(name);
            } else if self.data.contains_key(&name) {
                tracing::warn!(city = %name, "cached export for a failing city no longer matches the dataset, dropping it");
            }
        }
    }

    /// Folds the recovered cities' cached transfers into `transfers`,
    /// without overwriting a transfer this run already computed itself.
    pub fn provide_transfers(&self, transfers: &mut HashMap<(u64, u64), u64>) {
        if !self.is_used() {
            return;
        }
        for name in &self.recovered {
            if let Some(cached) = self.data.get(name) {
                for &(a, b, time) in &cached.transfers {
                    transfers.entry((a, b)).or_insert(time);
                }
            }
        }
    }

    /// Resets a good city's cache entry before its freshly-built network is
    /// recorded (spec §4.8) — the entry is replaced outright, it is never
    /// merged with whatever was cached from a previous run.
    pub fn initialize_good_city(&mut self, city_name: &str, network: NetworkRecord) {
        if !self.is_used() || !self.good_city_modes.contains_key(city_name) {
            return;
        }
        self.data.insert(city_name.to_string(), CachedCity { network, stops: HashMap::new(), transfers: Vec::new() });
    }

    /// Records that `stop_id` was encountered while building `city_name`'s
    /// routes, so a later [`Cache::add_stop`]/[`Cache::add_transfer`] knows
    /// which cache entries to update (a border stop area can belong to more
    /// than one city).
    pub fn link_stop_with_city(&mut self, stop_id: ElementId, city_name: &str) {
        if !self.is_used() {
            return;
        }
        self.stop_cities.entry(stop_id.uid()).or_default().insert(city_name.to_string());
    }

    pub fn add_stop(&mut self, stop_id: ElementId, record: StopRecord) {
        if !self.is_used() {
            return;
        }
        let key = stop_id.to_string();
        let Some(names) = self.stop_cities.get(&stop_id.uid()) else { return };
        for name in names {
            if let Some(city) = self.data.get_mut(name) {
                city.stops.insert(key.clone(), record.clone());
            }
        }
    }

    pub fn add_transfer(&mut self, uid1: u64, uid2: u64, seconds: u64) {
        if !self.is_used() {
            return;
        }
        let shared: Vec<String> = match (self.stop_cities.get(&uid1), self.stop_cities.get(&uid2)) {
            (Some(c1), Some(c2)) => self.good_city_modes.keys().filter(|n| c1.contains(*n) && c2.contains(*n)).cloned().collect(),
            _ => return,
        };
        for name in shared {
            if let Some(city) = self.data.get_mut(&name) {
                city.transfers.push((uid1, uid2, seconds));
            }
        }
    }

    /// Writes the cache back out. A write failure is logged and swallowed,
    /// matching the export run's other non-essential I/O (spec §5): a
    /// stale cache never aborts the batch it was meant to help.
    pub fn save(&self) {
        let Some(path) = &self.path else { return };
        match serde_json::to_vec_pretty(&self.data) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(path, bytes) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to save export cache");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize export cache"),
        }
    }
}

fn read_cache_file(path: &PathBuf) -> CacheFile {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "export cache is not valid json, starting from empty");
            CacheFile::new()
        }),
        Err(_) => CacheFile::new(),
    }
}

fn element_id_from_parts(osm_type: &str, osm_id: u64) -> Option<ElementId> {
    match osm_type {
        "node" => Some(ElementId::node(osm_id)),
        "way" => Some(ElementId::way(osm_id)),
        "relation" => Some(ElementId::relation(osm_id)),
        _ => None,
    }
}
