//! Export processing (spec §4.8, component C8): turns a batch of validated
//! cities into the flat JSON consumed by downstream routing/rendering
//! tools, reusing a failing city's last cached snapshot where possible.

pub mod cache;

pub use cache::Cache;

use crate::city::City;
use crate::config::Config;
use crate::element::{Element, ElementId, ElementKind, ElementStore};
use crate::geo::{distance, Point};
use crate::model::{route_master::RouteMaster, StopArea, Transfer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntranceRecord {
    pub osm_type: String,
    pub osm_id: u64,
    pub lon: f64,
    pub lat: f64,
    pub distance: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    pub name: String,
    pub int_name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub osm_type: String,
    pub osm_id: u64,
    pub id: u64,
    pub entrances: Vec<EntranceRecord>,
    pub exits: Vec<EntranceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryRecord {
    /// `(uid, cumulative seconds from the first stop)` per stop.
    pub stops: Vec<(u64, u64)>,
    pub interval: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub route_ref: Option<String>,
    pub name: Option<String>,
    pub colour: Option<String>,
    /// The route's own colour, present only when [`RouteRecord::colour`] has
    /// been swapped out for an infill colour (spec SPEC_FULL §F.1).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub casing: Option<String>,
    pub route_id: u64,
    pub itineraries: Vec<ItineraryRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub network: String,
    pub agency_id: u64,
    pub routes: Vec<RouteRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    pub stops: Vec<StopRecord>,
    pub transfers: Vec<(u64, u64, u64)>,
    pub networks: Vec<NetworkRecord>,
}

fn osm_type_name(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::Node => "node",
        ElementKind::Way => "way",
        ElementKind::Relation => "relation",
    }
}

fn entrance_record(id: ElementId, point: Point, stop_center: Point, config: &Config) -> EntranceRecord {
    let seconds = config.entrance_penalty_s + (distance(point, stop_center) / config.speed_to_entrance_mps()).round();
    EntranceRecord { osm_type: osm_type_name(id.kind).to_string(), osm_id: id.id, lon: point.lon, lat: point.lat, distance: seconds as u64 }
}

/// Resolves a platform element down to the raw nodes an exit can be sampled
/// from: itself if it's a node, its own nodes if a way, or the nodes of its
/// member ways if a relation (spec §4.8).
fn platform_nodes(platform: ElementId, store: &ElementStore) -> Vec<(ElementId, Point)> {
    let Some(el) = store.get(platform) else { return Vec::new() };
    match el {
        Element::Node(n) => vec![(ElementId::node(n.id), n.point)],
        Element::Way(w) => w
            .nodes
            .iter()
            .filter_map(|&nid| store.center(ElementId::node(nid)).map(|p| (ElementId::node(nid), p)))
            .collect(),
        Element::Relation(r) => r
            .members
            .iter()
            .filter(|m| m.target.kind == ElementKind::Way)
            .flat_map(|m| platform_nodes(m.target, store))
            .collect(),
    }
}

/// Picks a spread-out subset of platform nodes to stand in for missing
/// entrances/exits (spec §4.8): each node is kept unless it falls within
/// `min_distance` of one already kept, where `min_distance` locks in at
/// two-thirds of the first node's distance from the stop area's centre.
/// Ported with the original's falsy-zero quirk intact: a node exactly on
/// the centre makes that two-thirds threshold zero too, which is still
/// "unset" by the same test the first node used — so the threshold keeps
/// resetting to zero and every remaining node gets kept, spread-out or not.
fn find_exits_for_platform(center: Point, nodes: &[(ElementId, Point)]) -> Vec<(ElementId, Point)> {
    let mut exits: Vec<(ElementId, Point)> = Vec::new();
    let mut min_distance: f64 = 0.0;
    for &(id, point) in nodes {
        let d = distance(center, point);
        if min_distance == 0.0 {
            min_distance = d * 2.0 / 3.0;
        } else if d < min_distance {
            continue;
        }
        let too_close = exits.iter().any(|&(_, ep)| distance(ep, point) < min_distance);
        if !too_close {
            exits.push((id, point));
        }
    }
    exits
}

fn build_stop_record(
    area: &StopArea,
    platform_node_cache: &HashMap<ElementId, Vec<(ElementId, Point)>>,
    config: &Config,
) -> StopRecord {
    let mut entrances: Vec<EntranceRecord> = area
        .entrances
        .iter()
        .filter(|id| id.kind == ElementKind::Node)
        .filter_map(|&id| area.centers.get(&id).map(|&p| entrance_record(id, p, area.center, config)))
        .collect();
    let mut exits: Vec<EntranceRecord> = area
        .exits
        .iter()
        .filter(|id| id.kind == ElementKind::Node)
        .filter_map(|&id| area.centers.get(&id).map(|&p| entrance_record(id, p, area.center, config)))
        .collect();

    if entrances.is_empty() && exits.is_empty() {
        if !area.platforms.is_empty() {
            for &pl in &area.platforms {
                if let Some(nodes) = platform_node_cache.get(&pl) {
                    for &(id, point) in nodes {
                        let rec = entrance_record(id, point, area.center, config);
                        entrances.push(rec.clone());
                        exits.push(rec);
                    }
                }
            }
        } else {
            let fallback_point = area.centers.get(&area.station_id).copied().unwrap_or(area.center);
            let rec = EntranceRecord {
                osm_type: osm_type_name(area.station_id.kind).to_string(),
                osm_id: area.station_id.id,
                lon: fallback_point.lon,
                lat: fallback_point.lat,
                distance: config.entrance_penalty_s as u64,
            };
            entrances.push(rec.clone());
            exits.push(rec);
        }
    }

    StopRecord {
        name: area.name.clone(),
        int_name: area.int_name.clone(),
        lat: area.center.lat,
        lon: area.center.lon,
        osm_type: osm_type_name(area.station_id.kind).to_string(),
        osm_id: area.station_id.id,
        id: area.id.uid(),
        entrances,
        exits,
    }
}

fn build_network_record(
    city: &City,
    store: &ElementStore,
    config: &Config,
    route_stop_areas: &mut HashMap<String, StopArea>,
    platform_node_cache: &mut HashMap<ElementId, Vec<(ElementId, Point)>>,
    cache: &mut Cache,
) -> NetworkRecord {
    let network_name = city.route_masters().find_map(|m| m.network.clone()).unwrap_or_else(|| city.name.clone());
    let mut routes = Vec::new();

    for master in city.route_masters() {
        routes.push(build_route_record(master, city, store, config, route_stop_areas, platform_node_cache, cache));
    }

    NetworkRecord { network: network_name, agency_id: city.id, routes }
}

fn build_route_record(
    master: &RouteMaster,
    city: &City,
    store: &ElementStore,
    config: &Config,
    route_stop_areas: &mut HashMap<String, StopArea>,
    platform_node_cache: &mut HashMap<ElementId, Vec<(ElementId, Point)>>,
    cache: &mut Cache,
) -> RouteRecord {
    let mode = master.mode.map(|m| m.as_str().to_string()).unwrap_or_default();
    // When an infill colour is set, it takes the `colour` slot and the
    // route's own colour moves to `casing` (spec SPEC_FULL §F.1).
    let (colour, casing) = match &master.casing {
        Some(infill) => (Some(infill.clone()), master.colour.clone()),
        None => (master.colour.clone(), None),
    };

    let mut itineraries = Vec::with_capacity(master.len());
    for route in master.iter() {
        let mut stops = Vec::with_capacity(route.stops.len());
        for stop in &route.stops {
            let area = &city.stop_areas[stop.stop_area as usize];
            route_stop_areas.entry(area.id.to_string()).or_insert_with(|| area.clone());
            cache.link_stop_with_city(area.id, &city.name);

            // Precompute exit candidates from platform nodes only when the
            // stop area has nothing better to offer (spec §4.8).
            if area.entrances.is_empty() && area.exits.is_empty() {
                for &pl in &area.platforms {
                    platform_node_cache.entry(pl).or_insert_with(|| {
                        let nodes = platform_nodes(pl, store);
                        let center = area.centers.get(&pl).copied().unwrap_or(area.center);
                        find_exits_for_platform(center, &nodes)
                    });
                }
            }

            let seconds = (stop.distance_from_start / config.speed_on_line_mps()).round() as u64;
            stops.push((area.id.uid(), seconds));
        }
        let interval_min = route.interval_min.unwrap_or(config.default_interval_min);
        itineraries.push(ItineraryRecord { stops, interval: (interval_min * 60.0).round() as u64 });
    }

    RouteRecord {
        kind: mode,
        route_ref: master.route_ref.clone(),
        name: master.name.clone(),
        colour,
        casing,
        route_id: master.id().uid(),
        itineraries,
    }
}

/// Drives export (spec §4.8): builds networks and stop records for every
/// city that passed validation, falls back to the cache for the rest, and
/// computes transfer times over transfer sets already restricted to stop
/// areas referenced by at least one route (spec §4.7). The stop-area centre
/// lookup spans every city regardless of validation outcome, matching the
/// transfer resolver's own "all cities" input (spec §6): a transfer can
/// legitimately straddle one good and one bad city at a shared border.
pub fn process(
    cities: &[City],
    global_transfers: &[Transfer],
    store: &ElementStore,
    cache: &mut Cache,
    config: &Config,
) -> ExportResult {
    let mut stops: HashMap<String, StopRecord> = HashMap::new();
    let mut networks: Vec<NetworkRecord> = Vec::new();
    cache.provide_stops_and_networks(&mut stops, &mut networks, store, config);

    let mut route_stop_areas: HashMap<String, StopArea> = HashMap::new();
    let mut platform_node_cache: HashMap<ElementId, Vec<(ElementId, Point)>> = HashMap::new();

    for city in cities.iter().filter(|c| c.is_good()) {
        let network =
            build_network_record(city, store, config, &mut route_stop_areas, &mut platform_node_cache, cache);

        cache.initialize_good_city(&city.name, network.clone());
        networks.push(network);
    }

    let mut all_centers: HashMap<ElementId, Point> = HashMap::new();
    for city in cities {
        for area in &city.stop_areas {
            all_centers.insert(area.id, area.center);
        }
    }

    for (id_str, area) in &route_stop_areas {
        let record = build_stop_record(area, &platform_node_cache, config);
        stops.insert(id_str.clone(), record.clone());
        cache.add_stop(area.id, record);
    }

    let mut pairwise: HashMap<(u64, u64), u64> = HashMap::new();
    for transfer in global_transfers {
        for i in 0..transfer.members.len().saturating_sub(1) {
            for &b in &transfer.members[i + 1..] {
                let a = transfer.members[i];
                if !stops.contains_key(&a.to_string()) || !stops.contains_key(&b.to_string()) {
                    continue;
                }
                let (Some(&ca), Some(&cb)) = (all_centers.get(&a), all_centers.get(&b)) else { continue };
                let (u1, u2) = if a.uid() < b.uid() { (a.uid(), b.uid()) } else { (b.uid(), a.uid()) };
                let seconds = config.transfer_penalty_s + (distance(ca, cb) / config.speed_on_transfer_mps()).round();
                let seconds = seconds as u64;
                pairwise.insert((u1, u2), seconds);
                cache.add_transfer(u1, u2, seconds);
            }
        }
    }
    cache.provide_transfers(&mut pairwise);
    cache.save();

    ExportResult {
        stops: stops.into_values().collect(),
        transfers: pairwise.into_iter().map(|((a, b), t)| (a, b, t)).collect(),
        networks,
    }
}
