//! City orchestration (spec §4.6, component C6): drives station/stop-area
//! materialisation, route building, transfer formation and validation over
//! one city's element subset.

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::element::{Element, ElementId, ElementKind, ElementStore};
use crate::model::route::{self, StopAreaIndex};
use crate::model::station::{self, Station};
use crate::model::stop_area::StopArea;
use crate::model::transfer::{self, Transfer};
use crate::model::{Mode, RouteMaster};
use crate::recovery::CityRecovery;
use std::collections::{HashMap, HashSet};

/// A route master is keyed by its explicit master relation, or else by the
/// first variant's `ref` (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RouteKey {
    Master(ElementId),
    Ref(String),
}

/// Per-city expected/found validation counters (spec §4.6), surfaced
/// alongside the error/warning streams for reporting.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub stations_expected: u32,
    pub stations_found: u32,
    pub subway_lines_expected: u32,
    pub subway_lines_found: u32,
    pub light_rail_lines_expected: u32,
    pub light_rail_lines_found: u32,
    pub interchanges_expected: u32,
    pub interchanges_found: u32,
    pub networks_found: u32,
    pub unused_entrances: u32,
}

/// One city's catalogue metadata, owned element subset, and reconstructed
/// topology (spec §3).
pub struct City {
    pub id: u64,
    pub name: String,
    pub country: String,
    pub continent: String,
    /// `[lat_min, lon_min, lat_max, lon_max]`, absent for a malformed row.
    pub bbox: Option<[f64; 4]>,
    pub networks: HashSet<String>,
    pub active_modes: HashSet<Mode>,
    pub num_stations: u32,
    pub num_lines: u32,
    pub num_light_lines: u32,
    pub num_interchanges: u32,

    element_ids: HashSet<ElementId>,
    /// Route relation id → its route_master relation (spec §3 `masters`).
    masters: HashMap<ElementId, ElementId>,
    /// Station/stop/platform/entrance element id → stop-area relations that
    /// reference it as a member (spec §3 `stop_areas`).
    stop_area_relations_by_member: HashMap<ElementId, Vec<ElementId>>,

    pub station_ids: HashSet<ElementId>,
    stops_and_platforms: HashSet<ElementId>,
    /// Composite id → arena indices into `stop_areas` (spec §3 `stations`).
    pub stations: HashMap<ElementId, Vec<u32>>,
    pub stop_areas: Vec<StopArea>,
    route_masters: HashMap<RouteKey, RouteMaster>,
    pub transfers: Vec<Transfer>,

    pub diagnostics: Diagnostics,
    pub validation: ValidationResult,
}

impl City {
    pub fn new(
        id: u64,
        name: String,
        country: String,
        continent: String,
        bbox: Option<[f64; 4]>,
        networks: HashSet<String>,
        active_modes: HashSet<Mode>,
        num_stations: u32,
        num_lines: u32,
        num_light_lines: u32,
        num_interchanges: u32,
    ) -> City {
        City {
            id,
            name,
            country,
            continent,
            bbox,
            networks,
            active_modes,
            num_stations,
            num_lines,
            num_light_lines,
            num_interchanges,
            element_ids: HashSet::new(),
            masters: HashMap::new(),
            stop_area_relations_by_member: HashMap::new(),
            station_ids: HashSet::new(),
            stops_and_platforms: HashSet::new(),
            stations: HashMap::new(),
            stop_areas: Vec::new(),
            route_masters: HashMap::new(),
            transfers: Vec::new(),
            diagnostics: Diagnostics::default(),
            validation: ValidationResult::default(),
        }
    }

    /// Whether `el` falls within this city's territory (spec §4.6): inside
    /// the bbox if it has a centre, else — for centreless route-masters and
    /// stop-area-groups — simply "plausibly transit-related", matching the
    /// Python original's fallback.
    pub fn contains(&self, el: &Element) -> bool {
        if let Some(center) = el.center() {
            return match self.bbox {
                Some([lat_min, lon_min, lat_max, lon_max]) => {
                    lat_min <= center.lat && center.lat <= lat_max && lon_min <= center.lon && center.lon <= lon_max
                }
                None => false,
            };
        }
        el.tags().contains_key("route_master") || el.tags().contains_key("public_transport")
    }

    /// Files `el` into this city's element subset (spec §4.6 `City.add`):
    /// indexes route_master membership and stop_area membership for later
    /// lookup, same as the original's two side tables.
    pub fn add(&mut self, el: &Element) {
        self.element_ids.insert(el.id());

        if let Element::Relation(rel) = el {
            if rel.tags.get("type").map(String::as_str) == Some("route_master") {
                for m in rel.members.iter().filter(|m| m.target.kind == ElementKind::Relation) {
                    if self.masters.contains_key(&m.target) {
                        self.diagnostics.error("Route in two route_masters", Some(el));
                    }
                    self.masters.insert(m.target, el.id());
                }
            } else if rel.tags.get("public_transport").map(String::as_str) == Some("stop_area") {
                let mut warned = false;
                for m in &rel.members {
                    let entry = self.stop_area_relations_by_member.entry(m.target).or_default();
                    if entry.contains(&el.id()) {
                        if !warned {
                            self.diagnostics.warn("Duplicate element in a stop area", Some(el));
                            warned = true;
                        }
                    } else {
                        entry.push(el.id());
                    }
                }
            }
        }
    }

    /// Runs C2 → C5 over this city's elements (spec §4.6, steps 1–3).
    pub fn extract_routes(&mut self, store: &ElementStore, config: &Config, recovery: Option<&CityRecovery>) {
        materialize_stop_areas(self, store, config);
        materialize_routes(self, store, config, recovery);
        materialize_transfers(self, store);
    }

    pub fn is_good(&self) -> bool {
        self.diagnostics.is_good()
    }

    pub fn route_masters(&self) -> impl Iterator<Item = &RouteMaster> {
        self.route_masters.values()
    }

    pub fn stop_area_index(&self) -> StopAreaIndex<'_> {
        StopAreaIndex { stop_areas: &self.stop_areas, by_element: &self.stations }
    }

    /// Builds per-route-variant itinerary snapshots for the recovery store
    /// (spec §4.9), keyed by `(colour, ref)`.
    pub fn recovery_snapshot(&self) -> CityRecovery {
        let mut entries = Vec::new();
        for master in self.route_masters.values() {
            for route in master.iter() {
                let Some(colour) = &route.colour else { continue };
                let Some(route_ref) = &route.route_ref else { continue };
                let stations: Vec<(String, String, crate::geo::Point)> = route
                    .stops
                    .iter()
                    .map(|s| {
                        let area = &self.stop_areas[s.stop_area as usize];
                        (area.station_id.to_string(), area.name.clone(), s.stop_point)
                    })
                    .collect();
                entries.push((
                    colour.clone(),
                    route_ref.clone(),
                    crate::recovery::Itinerary::new(stations, route.name.clone(), None, None),
                ));
            }
        }
        CityRecovery::from_routes(entries)
    }

    /// Counts subway-entrance nodes unused by any stop area and marks every
    /// used one in `used_entrances` (spec §4.6 step 4, a process-wide
    /// bookkeeping set per spec §5 gathered by the driver, not shared
    /// mutable state between cities).
    fn count_unused_entrances(&mut self, store: &ElementStore, used_entrances: &mut HashSet<ElementId>) {
        let mut in_stop_area_relation: HashSet<ElementId> = HashSet::new();
        for &id in &self.element_ids {
            let Some(el) = store.get(id) else { continue };
            if let Element::Relation(rel) = el {
                if rel.tags.get("public_transport").map(String::as_str) == Some("stop_area") {
                    in_stop_area_relation.extend(rel.members.iter().map(|m| m.target));
                }
            }
        }

        let mut unused = 0u32;
        let mut not_in_stop_area = 0u32;
        for &id in &self.element_ids {
            let Some(el) = store.get(id) else { continue };
            if el.tag("railway") != Some("subway_entrance") || el.as_node().is_none() {
                continue;
            }
            if self.stations.contains_key(&id) {
                used_entrances.insert(id);
            }
            if !in_stop_area_relation.contains(&id) {
                not_in_stop_area += 1;
                if !self.stations.contains_key(&id) {
                    unused += 1;
                }
            }
        }
        self.validation.unused_entrances = unused;
        if unused > 0 {
            self.diagnostics.error(format!("Found {unused} entrances not used in routes or stop_areas"), None);
        }
        if not_in_stop_area > 0 {
            self.diagnostics.warn(format!("{not_in_stop_area} subway entrances are not in stop_area relations"), None);
        }
    }

    /// Compares reconstructed counts to the catalogue's expectations (spec
    /// §4.6 step 4) and records the outcome as errors/warnings.
    pub fn validate(&mut self, store: &ElementStore, config: &Config, used_entrances: &mut HashSet<ElementId>) {
        let mut networks: HashMap<String, u32> = HashMap::new();
        let mut unused_stations: HashSet<ElementId> = self.station_ids.clone();
        let mut light_rail_lines = 0u32;
        let mut subway_lines = 0u32;

        for master in self.route_masters.values() {
            *networks.entry(master.network.clone().unwrap_or_default()).or_insert(0) += 1;
            if master.mode != Some(Mode::Subway) {
                light_rail_lines += 1;
            } else {
                subway_lines += 1;
            }
            for route in master.iter() {
                for stop in &route.stops {
                    unused_stations.remove(&self.stop_areas[stop.stop_area as usize].station_id);
                }
            }
        }

        if !unused_stations.is_empty() {
            let mut ids: Vec<ElementId> = unused_stations.iter().copied().collect();
            ids.sort_unstable();
            self.diagnostics.warn(format!("{} unused stations: {}", ids.len(), format_elid_list(&ids)), None);
        }

        self.count_unused_entrances(store, used_entrances);

        self.validation.subway_lines_found = subway_lines;
        self.validation.light_rail_lines_found = light_rail_lines;
        self.validation.subway_lines_expected = self.num_lines;
        self.validation.light_rail_lines_expected = self.num_light_lines;
        if subway_lines != self.num_lines {
            self.diagnostics.error(format!("Found {subway_lines} subway lines, expected {}", self.num_lines), None);
        }
        if light_rail_lines != self.num_light_lines {
            self.diagnostics.error(
                format!("Found {light_rail_lines} light rail lines, expected {}", self.num_light_lines),
                None,
            );
        }

        let found_stations = (self.station_ids.len() - unused_stations.len()) as u32;
        self.validation.stations_found = found_stations;
        self.validation.stations_expected = self.num_stations;
        if found_stations != self.num_stations {
            let msg = format!("Found {found_stations} stations in routes, expected {}", self.num_stations);
            let ratio = if self.num_stations > 0 {
                (self.num_stations as f64 - found_stations as f64) / self.num_stations as f64
            } else {
                f64::NAN
            };
            let is_error = !(0.0..=config.allowed_station_mismatch).contains(&ratio);
            self.diagnostics.error_if(is_error, msg, None);
        }

        let found_interchanges = self.transfers.len() as u32;
        self.validation.interchanges_found = found_interchanges;
        self.validation.interchanges_expected = self.num_interchanges;
        if found_interchanges != self.num_interchanges {
            let msg = format!("Found {found_interchanges} interchanges, expected {}", self.num_interchanges);
            let ratio = if self.num_interchanges > 0 {
                (self.num_interchanges as f64 - found_interchanges as f64) / self.num_interchanges as f64
            } else {
                0.0
            };
            let is_error = self.num_interchanges != 0 && !(0.0..=config.allowed_transfer_mismatch).contains(&ratio);
            self.diagnostics.error_if(is_error, msg, None);
        }

        self.validation.networks_found = networks.len() as u32;
        if networks.len() > self.networks.len().max(1) {
            let summary: Vec<String> = networks.iter().map(|(k, v)| format!("{k} ({v})")).collect();
            self.diagnostics.warn(format!("More than one network: {}", summary.join("; ")), None);
        }
    }
}

/// Renders a sorted element id list for a diagnostic message, truncated to
/// 20 entries with a trailing count of the rest (spec SPEC_FULL §F.3,
/// `format_elid_list` in the original).
fn format_elid_list(ids: &[ElementId]) -> String {
    const LIMIT: usize = 20;
    let shown: Vec<String> = ids.iter().take(LIMIT).map(ElementId::to_string).collect();
    if ids.len() > LIMIT {
        format!("{}, ...{} more", shown.join(", "), ids.len() - LIMIT)
    } else {
        shown.join(", ")
    }
}

fn materialize_stop_areas(city: &mut City, store: &ElementStore, config: &Config) {
    let ids: Vec<ElementId> = city.element_ids.iter().copied().collect();
    let city_elements: Vec<&Element> = ids.iter().filter_map(|id| store.get(*id)).collect();
    let mut processed: HashSet<ElementId> = HashSet::new();

    let City {
        ref active_modes,
        ref stop_area_relations_by_member,
        ref mut diagnostics,
        ref mut stop_areas,
        ref mut stations,
        ref mut station_ids,
        ref mut stops_and_platforms,
        ..
    } = *city;

    for id in ids {
        let Some(el) = store.get(id) else { continue };
        if !station::is_station(el, active_modes) {
            continue;
        }
        let Some(st) = Station::from_element(el, active_modes, diagnostics) else { continue };
        station_ids.insert(st.id);

        let built: Vec<StopArea> = match stop_area_relations_by_member.get(&st.id) {
            Some(relation_ids) if !relation_ids.is_empty() => relation_ids
                .iter()
                .filter_map(|rid| store.get(*rid))
                .map(|rel| {
                    StopArea::build(
                        &st,
                        Some(rel),
                        |i| store.get(i),
                        city_elements.iter().copied(),
                        config,
                        diagnostics,
                    )
                })
                .collect(),
            _ => vec![StopArea::build(
                &st,
                None,
                |i| store.get(i),
                city_elements.iter().copied(),
                config,
                diagnostics,
            )],
        };

        for area in built {
            if !processed.insert(area.id) {
                continue;
            }
            let idx = stop_areas.len() as u32;
            for el_id in area.elements().collect::<Vec<_>>() {
                stations.entry(el_id).or_default().push(idx);
            }
            for sp in area.stops.iter().chain(area.platforms.iter()) {
                if !stops_and_platforms.insert(*sp) {
                    diagnostics.warn(
                        format!("A stop or a platform {sp} belongs to multiple stations, might be correct"),
                        None,
                    );
                }
            }
            stop_areas.push(area);
        }
    }
}

fn materialize_routes(city: &mut City, store: &ElementStore, config: &Config, recovery: Option<&CityRecovery>) {
    let ids: Vec<ElementId> = city.element_ids.iter().copied().collect();

    let City {
        ref networks,
        ref masters,
        ref stations,
        ref stop_areas,
        ref mut route_masters,
        ref mut diagnostics,
        ..
    } = *city;
    let stop_area_index = StopAreaIndex { stop_areas, by_element: stations };

    for id in ids {
        let Some(el) = store.get(id) else { continue };
        if !route::is_route(el) {
            continue;
        }
        let master_id = masters.get(&id).copied();
        let master_el = master_id.and_then(|mid| store.get(mid));

        if !networks.is_empty() {
            let network = route::get_network(el);
            let master_network = master_el.and_then(route::get_network);
            let in_networks =
                network.as_deref().is_some_and(|n| networks.contains(n))
                    || master_network.as_deref().is_some_and(|n| networks.contains(n));
            if !in_networks {
                continue;
            }
        }

        let built = route::build_route(el, master_el, |i| store.get(i), &stop_area_index, recovery, config, diagnostics);
        let route = match built {
            Ok(Some(r)) => r,
            Ok(None) => continue,
            Err(critical) => {
                diagnostics.error_ref(critical.message, critical.element);
                continue;
            }
        };

        let key = match master_id {
            Some(mid) => RouteKey::Master(mid),
            None => RouteKey::Ref(route.route_ref.clone().unwrap_or_default()),
        };
        let master_entry =
            route_masters.entry(key).or_insert_with(|| RouteMaster::new(master_el, &mut *diagnostics));
        master_entry.add(route, diagnostics);
    }

    route_masters.retain(|_, m| !m.is_empty());

    for master in route_masters.values() {
        master.check_return_routes(&stop_area_index, diagnostics);
    }
}

fn materialize_transfers(city: &mut City, store: &ElementStore) {
    let ids: Vec<ElementId> = city.element_ids.iter().copied().collect();

    let mut used: HashSet<ElementId> = HashSet::new();
    for master in city.route_masters.values() {
        for route in master.iter() {
            for stop in &route.stops {
                used.insert(city.stop_areas[stop.stop_area as usize].id);
            }
        }
    }

    // First-registered stop area only, matching the original's `self.stations[k][0]`:
    // an element can legitimately belong to more than one stop area within a city, but a
    // *local* transfer group must pick one, unlike the cross-city union the global
    // resolver in `pipeline.rs` builds over every city's index.
    let mut stations_by_element: HashMap<ElementId, HashSet<ElementId>> = HashMap::new();
    for (&el_id, area_idxs) in &city.stations {
        if let Some(&first) = area_idxs.first() {
            stations_by_element.entry(el_id).or_default().insert(city.stop_areas[first as usize].id);
        }
    }

    let relations: Vec<&Element> = ids
        .iter()
        .filter_map(|id| store.get(*id))
        .filter(|el| el.tag("public_transport") == Some("stop_area_group"))
        .collect();

    let transfers = transfer::find_transfers(relations.into_iter(), &stations_by_element, &used);

    let mut stamped: HashMap<ElementId, ElementId> = HashMap::new();
    for t in &transfers {
        for &member in &t.members {
            if let Some(&existing) = stamped.get(&member) {
                if existing != t.id {
                    city.diagnostics.error(format!("Stop area {member} belongs to two transfer groups"), None);
                    continue;
                }
            }
            stamped.insert(member, t.id);
            for area in city.stop_areas.iter_mut().filter(|a| a.id == member) {
                area.transfer = Some(t.id);
            }
        }
    }

    city.transfers = transfers;
}
