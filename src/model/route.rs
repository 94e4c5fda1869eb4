//! Route variant construction (spec §4.4, component C4 — the largest single
//! piece of the topology reconstruction).

use super::stop_area::StopArea;
use super::{is_platform, is_stop_position, is_under_construction, Mode};
use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::element::{Element, ElementId, ElementKind, ElementRef, Relation};
use crate::geo::{angle_between, distance, project_on_line, Point};
use crate::recovery::CityRecovery;
use std::collections::{HashMap, HashSet};

/// The one diagnostic kind that unwinds (spec §7): a route member the
/// dataset doesn't actually contain. Caught by the city orchestrator, which
/// folds it back into an ordinary error diagnostic and abandons just this
/// route.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CriticalError {
    pub message: String,
    pub element: Option<ElementRef>,
}

/// Read-only view over a city's stop-area arena and the element→stop-area
/// index (spec §3 `City.stations`), handed to the route builder instead of
/// the whole `City` so this module doesn't depend on it.
pub struct StopAreaIndex<'a> {
    pub stop_areas: &'a [StopArea],
    pub by_element: &'a HashMap<ElementId, Vec<u32>>,
}

impl<'a> StopAreaIndex<'a> {
    pub fn resolve(&self, id: ElementId) -> &[u32] {
        self.by_element.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, idx: u32) -> &StopArea {
        &self.stop_areas[idx as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberType {
    Stop,
    Platform,
}

fn classify_member_type(el: &Element, role: &str) -> Option<MemberType> {
    if is_stop_position(el) {
        Some(MemberType::Stop)
    } else if is_platform(el) {
        Some(MemberType::Platform)
    } else if super::station::is_any_station(el) {
        Some(if role.contains("platform") { MemberType::Platform } else { MemberType::Stop })
    } else {
        None
    }
}

/// A single appearance of a station inside a route variant (spec §3).
#[derive(Debug, Clone)]
pub struct RouteStop {
    pub stop_area: u32,
    pub stop_point: Point,
    pub projected_point: Option<Point>,
    pub platform_entry: Option<ElementId>,
    pub platform_exit: Option<ElementId>,
    pub can_enter: bool,
    pub can_exit: bool,
    pub seen_stop: bool,
    pub seen_platform_entry: bool,
    pub seen_platform_exit: bool,
    pub positions_on_rails: Vec<f64>,
    pub distance_from_start: f64,
    rail_position: Option<f64>,
}

impl RouteStop {
    pub(crate) fn new(stop_area: u32, center: Point) -> Self {
        RouteStop {
            stop_area,
            stop_point: center,
            projected_point: None,
            platform_entry: None,
            platform_exit: None,
            can_enter: false,
            can_exit: false,
            seen_stop: false,
            seen_platform_entry: false,
            seen_platform_exit: false,
            positions_on_rails: Vec::new(),
            distance_from_start: 0.0,
            rail_position: None,
        }
    }
}

fn apply_member(
    stop: &mut RouteStop,
    el: &Element,
    role: &str,
    relation_el: &Element,
    diagnostics: &mut Diagnostics,
) {
    if is_stop_position(el) {
        if role.contains("platform") {
            diagnostics.warn("Stop position in a platform role in a route", Some(el));
        }
        if let Some(c) = el.center() {
            stop.stop_point = c;
        }
        if !role.contains("entry_only") {
            stop.can_exit = true;
        }
        if !role.contains("exit_only") {
            stop.can_enter = true;
        }
        let was_seen = stop.seen_stop;
        stop.seen_stop = true;
        if was_seen {
            diagnostics.error(
                format!(
                    "Multiple stops for a station \"{}\" ({}) in a route relation",
                    el.display_name(),
                    el.id()
                ),
                Some(relation_el),
            );
        }
    } else if super::station::is_any_station(el) {
        if !stop.seen_stop && !(stop.seen_platform_entry || stop.seen_platform_exit) {
            if let Some(c) = el.center() {
                stop.stop_point = c;
            }
            stop.can_enter = true;
            stop.can_exit = true;
        }
    } else if is_platform(el) {
        if role.contains("stop") {
            diagnostics.warn("Platform in a stop role in a route", Some(el));
        }
        let was_seen = stop.seen_platform_entry || stop.seen_platform_exit;
        if !role.contains("exit_only") {
            stop.platform_entry = Some(el.id());
            stop.can_enter = true;
            stop.seen_platform_entry = true;
        }
        if !role.contains("entry_only") {
            stop.platform_exit = Some(el.id());
            stop.can_exit = true;
            stop.seen_platform_exit = true;
        }
        if !stop.seen_stop {
            if let Some(c) = el.center() {
                stop.stop_point = c;
            }
        }
        if was_seen {
            diagnostics.warn(
                format!(
                    "Multiple platforms for a station \"{}\" ({}) in a route relation",
                    el.display_name(),
                    el.id()
                ),
                Some(relation_el),
            );
        }
    } else {
        diagnostics.error("Not a stop or platform in a route relation", Some(el));
    }
}

/// Stitches a route relation's track ways into the longest contiguous
/// polyline of node ids (spec §4.4.1). Bug-for-bug with the system this
/// crate's topology logic is grounded on: a way that can't be joined to the
/// running chain is dropped entirely for that iteration, not used to seed a
/// new one (the next way starts the new chain instead).
fn build_longest_line(
    relation: &Relation,
    get: &impl Fn(ElementId) -> Option<&Element>,
    relation_el: &Element,
    diagnostics: &mut Diagnostics,
) -> (Vec<u64>, HashSet<u64>) {
    let mut line_nodes = HashSet::new();
    let mut last_track: Vec<u64> = Vec::new();
    let mut track: Vec<u64> = Vec::new();
    let mut warned_about_holes = false;
    let mut is_first = true;

    for m in &relation.members {
        if m.target.kind != ElementKind::Way {
            continue;
        }
        let Some(el) = get(m.target) else { continue };
        if !super::is_track(el) {
            continue;
        }
        let Some(way) = el.as_way() else { continue };
        if way.nodes.len() < 2 {
            diagnostics.error("Cannot find nodes in a railway", Some(el));
            continue;
        }
        let mut nodes = way.nodes.clone();
        if m.role == "backward" {
            nodes.reverse();
        }
        line_nodes.extend(nodes.iter().copied());

        if track.is_empty() {
            is_first = true;
            track = nodes;
            continue;
        }

        if nodes.first() == track.last() {
            track.extend(nodes.into_iter().skip(1));
            is_first = false;
        } else if nodes.last() == track.last() {
            track.extend(nodes.into_iter().rev().skip(1));
            is_first = false;
        } else if is_first && (track.first() == nodes.first() || track.first() == nodes.last()) {
            track.reverse();
            if nodes.first() == track.last() {
                track.extend(nodes.into_iter().skip(1));
            } else {
                track.extend(nodes.into_iter().rev().skip(1));
            }
            is_first = false;
        } else {
            if !warned_about_holes {
                diagnostics.warn(format!("Hole in route rails near node n{}", nodes[0]), Some(relation_el));
                warned_about_holes = true;
            }
            if track.len() > last_track.len() {
                last_track = std::mem::take(&mut track);
            } else {
                track.clear();
            }
            is_first = false;
        }
    }
    if track.len() > last_track.len() {
        last_track = track;
    }
    last_track.dedup();
    (last_track, line_nodes)
}

fn project_stops_on_line(
    stops: &mut [RouteStop],
    track: &mut Vec<Point>,
    config: &Config,
    relation_el: &Element,
    diagnostics: &mut Diagnostics,
) {
    if track.is_empty() || stops.is_empty() {
        return;
    }
    let projections: Vec<_> = stops
        .iter()
        .map(|s| project_on_line(s.stop_point, track, config.stop_to_line_tolerance_m))
        .collect();

    let in_tolerance = |i: usize| {
        projections[i]
            .as_ref()
            .map(|p| distance(stops[i].stop_point, p.point) <= config.stop_to_line_tolerance_m)
            .unwrap_or(false)
    };

    let mut start = 0;
    while start < stops.len() && !in_tolerance(start) {
        start += 1;
    }
    let mut end = stops.len() - 1;
    while end > start && !in_tolerance(end) {
        end -= 1;
    }

    let mut cap_start = Vec::new();
    let mut cap_end = Vec::new();
    for i in 0..stops.len() {
        if i < start {
            cap_start.push(stops[i].stop_point);
        } else if i > end {
            cap_end.push(stops[i].stop_point);
        } else {
            match &projections[i] {
                None => {
                    diagnostics.error(
                        format!("Stop \"{}\" is nowhere near the tracks", stops[i].stop_point_label()),
                        Some(relation_el),
                    );
                }
                Some(proj) => {
                    let d = distance(stops[i].stop_point, proj.point);
                    stops[i].projected_point = Some(proj.point);
                    stops[i].positions_on_rails = proj.positions.clone();
                    if d > config.stop_to_line_tolerance_m {
                        diagnostics.warn(
                            format!("Stop is {} meters from the tracks", d.round() as i64),
                            Some(relation_el),
                        );
                    } else {
                        stops[i].stop_point = proj.point;
                    }
                }
            }
        }
    }

    if start >= stops.len() {
        *track = cap_start;
    } else if !cap_start.is_empty() || !cap_end.is_empty() {
        let mut new_track = cap_start;
        new_track.extend(track.iter().copied());
        new_track.extend(cap_end);
        *track = new_track;
    }
}

impl RouteStop {
    fn stop_point_label(&self) -> String {
        format!("({:.5}, {:.5})", self.stop_point.lon, self.stop_point.lat)
    }
}

/// Walks the stops' positions-on-rails in order, picking the smallest entry
/// not less than the previous choice; a miss counts one violation and
/// resets the walk (spec §4.4.3). Chosen positions are written back onto
/// each stop for the along-line distance pass.
fn walk_positions_on_rails(stops: &mut [RouteStop]) -> usize {
    let mut violations = 0;
    let mut current = f64::NEG_INFINITY;
    for stop in stops.iter_mut() {
        let next = stop
            .positions_on_rails
            .iter()
            .copied()
            .filter(|&p| p >= current)
            .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a: f64| a.min(p))));
        match next {
            Some(p) => {
                current = p;
                stop.rail_position = Some(p);
            }
            None => {
                violations += 1;
                current = f64::NEG_INFINITY;
                stop.rail_position = None;
            }
        }
    }
    violations
}

fn reversed_positions(stops: &[RouteStop], track_len: usize) -> Vec<RouteStop> {
    let max_index = track_len.saturating_sub(1) as f64;
    let mut reversed: Vec<RouteStop> = stops.iter().rev().cloned().collect();
    for stop in &mut reversed {
        stop.positions_on_rails = stop.positions_on_rails.iter().map(|p| max_index - p).collect();
    }
    reversed
}

fn along_line_distance(track: &[Point], a: f64, b: f64) -> f64 {
    if track.len() < 2 {
        return 0.0;
    }
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let max_seg = (track.len() - 2) as f64;
    let lo = lo.clamp(0.0, max_seg + 1.0);
    let hi = hi.clamp(0.0, max_seg + 1.0);
    let lo_idx = lo.floor().min(max_seg) as usize;
    let hi_idx = hi.floor().min(max_seg) as usize;
    if lo_idx == hi_idx {
        return distance(track[lo_idx], track[lo_idx + 1]) * (hi - lo);
    }
    let mut total = distance(track[lo_idx], track[lo_idx + 1]) * (1.0 - (lo - lo_idx as f64));
    for i in (lo_idx + 1)..hi_idx {
        total += distance(track[i], track[i + 1]);
    }
    total += distance(track[hi_idx], track[hi_idx + 1]) * (hi - hi_idx as f64);
    total
}

fn compute_distances(stops: &mut [RouteStop], track: &[Point]) {
    let mut cumulative = 0.0;
    for i in 1..stops.len() {
        let direct = distance(stops[i - 1].stop_point, stops[i].stop_point);
        let along = match (stops[i - 1].rail_position, stops[i].rail_position) {
            (Some(a), Some(b)) if track.len() >= 2 => Some(along_line_distance(track, a, b)),
            _ => None,
        };
        let chosen = match along {
            Some(d) if d >= direct - 10.0 && d <= 2.0 * direct => d,
            _ => direct,
        };
        cumulative += chosen;
        stops[i].distance_from_start = cumulative;
    }
}

/// A route's (or a route-master's) network attribution (spec §4.5): the
/// `network` tag, falling back to `operator`.
pub fn get_network(el: &Element) -> Option<String> {
    el.tag("network").or_else(|| el.tag("operator")).map(str::to_string)
}

/// Whether `el` is a route relation this system reconstructs topology for
/// (spec §4.4, `Route::is_route`).
pub fn is_route(el: &Element) -> bool {
    let Element::Relation(rel) = el else { return false };
    if rel.tags.get("type").map(String::as_str) != Some("route") {
        return false;
    }
    if rel.members.is_empty() {
        return false;
    }
    if Mode::parse(rel.tags.get("route").map(String::as_str).unwrap_or("")).is_none() {
        return false;
    }
    if super::is_under_construction(el) {
        return false;
    }
    rel.tags.contains_key("ref") || rel.tags.contains_key("name")
}

/// One route relation reconstructed into an ordered, geometrically
/// validated itinerary (spec §3, component C4).
#[derive(Debug, Clone)]
pub struct Route {
    pub id: ElementId,
    /// The relation this variant was built from, kept for diagnostics raised
    /// later by the route-master aggregator, which no longer has the
    /// borrowed `Element` in hand.
    pub element: ElementRef,
    pub route_ref: Option<String>,
    pub name: Option<String>,
    pub mode: Mode,
    pub network: Option<String>,
    pub interval_min: Option<f64>,
    pub colour: Option<String>,
    pub infill_colour: Option<String>,
    pub stops: Vec<RouteStop>,
    pub track: Vec<Point>,
    pub is_circular: bool,
}

/// Builds a route variant from its relation (spec §4.4). Returns `Ok(None)`
/// if the route relation fails an ordinary (non-critical) precondition and
/// should simply be skipped; `Err` only for the one promoted diagnostic
/// kind (spec §7).
pub fn build_route(
    relation_el: &Element,
    master_el: Option<&Element>,
    get: impl Fn(ElementId) -> Option<&Element>,
    stop_areas: &StopAreaIndex,
    recovery: Option<&CityRecovery>,
    config: &Config,
    diagnostics: &mut Diagnostics,
) -> Result<Option<Route>, CriticalError> {
    let relation = relation_el.as_relation().expect("route element must be a relation");
    let master_tag = |key: &str| master_el.and_then(|m| m.tag(key));

    if relation_el.tag("ref").is_none() && master_tag("ref").is_none() {
        diagnostics.warn("Missing ref on a route", Some(relation_el));
    }
    let route_ref = relation_el
        .tag("ref")
        .or_else(|| master_tag("ref"))
        .or_else(|| relation_el.tag("name"))
        .map(str::to_string);
    let name = relation_el.tag("name").map(str::to_string);

    if relation_el.tag("colour").is_none() && master_tag("colour").is_none() {
        diagnostics.warn("Missing colour on a route", Some(relation_el));
    }
    let colour = match crate::colour::normalize_colour(relation_el.tag("colour").or_else(|| master_tag("colour"))) {
        Ok(c) => c,
        Err(e) => {
            diagnostics.warn(e.to_string(), Some(relation_el));
            None
        }
    };
    let infill_colour = match crate::colour::normalize_colour(
        relation_el.tag("colour:casing").or_else(|| master_tag("colour:casing")),
    ) {
        Ok(c) => c,
        Err(e) => {
            diagnostics.warn(e.to_string(), Some(relation_el));
            None
        }
    };
    let network = get_network(relation_el);
    let mode = Mode::parse(relation_el.tag("route").unwrap_or(""))
        .expect("is_route already verified a valid route mode");
    let interval_min = relation_el
        .tag("interval")
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| *v > 0.0);

    let (track_ids, line_nodes) = build_longest_line(relation, &get, relation_el, diagnostics);
    let mut track: Vec<Point> = Vec::with_capacity(track_ids.len());
    let mut missing_reported = false;
    for nid in &track_ids {
        match get(ElementId::node(*nid)).and_then(Element::center) {
            Some(c) => track.push(c),
            None => {
                if !missing_reported {
                    diagnostics.error(
                        format!("The dataset is missing the railway tracks node n{nid}"),
                        Some(relation_el),
                    );
                    missing_reported = true;
                }
            }
        }
    }
    if missing_reported {
        track.clear();
    }

    let check_stop_positions = line_nodes.len() > 50;

    let mut stops: Vec<RouteStop> = Vec::new();
    let mut stations_seen: HashSet<u32> = HashSet::new();
    let mut seen_stops = false;
    let mut seen_platforms = false;
    let mut repeat_pos: Option<usize> = None;

    for m in &relation.members {
        let candidates = stop_areas.resolve(m.target);
        if candidates.is_empty() {
            match get(m.target) {
                None => {
                    if m.role.contains("stop") || m.role.contains("platform") {
                        diagnostics.error(
                            format!("{} {} for route relation is not in the dataset", m.role, m.target),
                            Some(relation_el),
                        );
                        return Err(CriticalError {
                            message: format!(
                                "Stop or platform {} in relation {} is not in the dataset",
                                m.target,
                                relation_el.id()
                            ),
                            element: Some(ElementRef::from(relation_el)),
                        });
                    }
                }
                Some(el) => {
                    if m.role.contains("stop") || m.role.contains("platform") {
                        if is_under_construction(el) {
                            diagnostics.error(format!("An under construction {} in route", m.role), Some(el));
                        } else if matches!(el.tag("railway"), Some("station") | Some("halt")) {
                            diagnostics.error(format!("Missing station={mode} on a {}", m.role), Some(el));
                        } else {
                            diagnostics.error(
                                format!("{} {} is not connected to a station in route", m.role, m.target),
                                Some(relation_el),
                            );
                        }
                    }
                }
            }
            continue;
        }

        let area_idx = candidates[0];
        if candidates.len() > 1 {
            diagnostics.error(
                format!(
                    "Ambigous station {} in route. Please use stop_position or split interchange stations",
                    stop_areas.get(area_idx).name
                ),
                Some(relation_el),
            );
        }
        let Some(el) = get(m.target) else { continue };
        let Some(el_type) = classify_member_type(el, &m.role) else { continue };

        if repeat_pos.is_none() {
            if stops.is_empty() || !stations_seen.contains(&area_idx) {
                stops.push(RouteStop::new(area_idx, stop_areas.get(area_idx).center));
                stations_seen.insert(area_idx);
            } else if stops.last().map(|s| s.stop_area) == Some(area_idx) {
                // continuing to accumulate role signals onto the current stop
            } else {
                let complete = (seen_stops && seen_platforms)
                    || (el_type == MemberType::Stop && !seen_platforms)
                    || (el_type == MemberType::Platform && !seen_stops);
                if complete {
                    stops.push(RouteStop::new(area_idx, stop_areas.get(area_idx).center));
                    stations_seen.insert(area_idx);
                } else {
                    repeat_pos = Some(0);
                }
            }
        }

        if let Some(pos) = repeat_pos {
            if pos >= stops.len() {
                continue;
            }
            if (el_type == MemberType::Stop && seen_stops) || (el_type == MemberType::Platform && seen_platforms) {
                diagnostics.error(
                    format!(
                        "Found an out-of-place {}: \"{}\" ({})",
                        if el_type == MemberType::Stop { "stop" } else { "platform" },
                        el.display_name(),
                        m.target
                    ),
                    Some(relation_el),
                );
                continue;
            }
            let mut p = pos;
            while p < stops.len() && stops[p].stop_area != area_idx {
                p += 1;
            }
            if p >= stops.len() {
                diagnostics.error(format!("Incorrect order of stops at {}", m.target), Some(relation_el));
                continue;
            }
            repeat_pos = Some(p);
        }

        let idx = repeat_pos.unwrap_or(stops.len() - 1);
        apply_member(&mut stops[idx], el, &m.role, relation_el, diagnostics);
        if repeat_pos.is_none() {
            seen_stops |= stops[idx].seen_stop;
            seen_platforms |= stops[idx].seen_platform_entry || stops[idx].seen_platform_exit;
        }

        if check_stop_positions && is_stop_position(el) && !line_nodes.contains(&m.target.id) {
            diagnostics.error(
                format!("Stop position \"{}\" ({}) is not on tracks", el.display_name(), m.target),
                Some(relation_el),
            );
        }
    }

    if stops.is_empty() {
        diagnostics.error("Route has no stops", Some(relation_el));
        return Ok(None);
    }
    if stops.len() == 1 {
        diagnostics.error("Route has only one stop", Some(relation_el));
        return Ok(None);
    }

    let is_circular = stops.first().map(|s| s.stop_area) == stops.last().map(|s| s.stop_area);

    project_stops_on_line(&mut stops, &mut track, config, relation_el, diagnostics);

    for i in 0..stops.len().saturating_sub(2) {
        let angle = angle_between(stops[i].stop_point, stops[i + 1].stop_point, stops[i + 2].stop_point);
        if angle < config.min_angle_ok {
            let msg = format!(
                "Angle between stops around \"{}\" is too narrow, {angle} degrees",
                stop_areas.get(stops[i + 1].stop_area).name
            );
            diagnostics.error_if(angle < config.min_angle_hard, msg, Some(relation_el));
        }
    }

    let tolerance = if is_circular { 1 } else { 0 };
    let forward_violations = walk_positions_on_rails(&mut stops);
    if forward_violations > tolerance && !track.is_empty() {
        let mut reversed_stops = reversed_positions(&stops, track.len());
        let reverse_violations = walk_positions_on_rails(&mut reversed_stops);
        if reverse_violations <= tolerance {
            diagnostics.warn("Route rails run opposite to the stops order", Some(relation_el));
            track.reverse();
            stops = reversed_stops;
        } else if let Some(recovery) = recovery {
            let recovered = try_recover_order(
                &mut stops,
                stop_areas,
                colour.as_deref(),
                route_ref.as_deref(),
                relation_el.tag("from"),
                relation_el.tag("to"),
                recovery,
                config,
            );
            if recovered {
                diagnostics.warn("Stop order fixed with recovery data", Some(relation_el));
            } else {
                diagnostics.error("Incorrect stop order, and no recovery data could fix it", Some(relation_el));
            }
        } else {
            diagnostics.error("Incorrect stop order (forward and reverse both fail)", Some(relation_el));
        }
    }

    compute_distances(&mut stops, &track);

    Ok(Some(Route {
        id: relation_el.id(),
        element: ElementRef::from(relation_el),
        route_ref,
        name,
        mode,
        network,
        interval_min,
        colour,
        infill_colour,
        stops,
        track,
        is_circular,
    }))
}

/// Looks up a prior-run itinerary matching this variant by station-name
/// multiset and per-station displacement, reorders `stops` to match it on
/// success (spec §4.4.3).
fn try_recover_order(
    stops: &mut [RouteStop],
    stop_areas: &StopAreaIndex,
    colour: Option<&str>,
    route_ref: Option<&str>,
    from_tag: Option<&str>,
    to_tag: Option<&str>,
    recovery: &CityRecovery,
    config: &Config,
) -> bool {
    let Some(colour) = colour else { return false };
    let Some(route_ref) = route_ref else { return false };
    let Some(itineraries) = recovery.lookup(colour, route_ref) else {
        return false;
    };

    let current_names: Vec<&str> = stops.iter().map(|s| stop_areas.get(s.stop_area).name.as_str()).collect();
    let mut current_multiset: Vec<&str> = current_names.clone();
    current_multiset.sort_unstable();

    let mut matches: Vec<&crate::recovery::Itinerary> = itineraries
        .iter()
        .filter(|it| {
            let mut names = it.station_names.iter().map(String::as_str).collect::<Vec<_>>();
            names.sort_unstable();
            names == current_multiset
        })
        .filter(|it| {
            it.coordinates.len() == stops.len()
                && stops
                    .iter()
                    .zip(it.coordinates.iter())
                    .all(|(s, p)| distance(s.stop_point, *p) <= config.displacement_tolerance_m)
        })
        .collect();

    if matches.len() > 1 {
        matches.retain(|it| it.from.as_deref() == from_tag && it.to.as_deref() == to_tag);
    }
    let Some(chosen) = matches.first() else { return false };

    let mut reordered = Vec::with_capacity(stops.len());
    let mut remaining: Vec<RouteStop> = stops.to_vec();
    for name in &chosen.station_names {
        if let Some(pos) = remaining.iter().position(|s| &stop_areas.get(s.stop_area).name == name) {
            reordered.push(remaining.remove(pos));
        }
    }
    if reordered.len() != stops.len() {
        return false;
    }
    stops.clone_from_slice(&reordered);
    true
}
