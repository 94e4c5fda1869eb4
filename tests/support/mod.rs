//! Shared fixtures for the integration test suite. Not every test file uses
//! every helper here, so unused ones are expected rather than a smell.
#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use transitfold::city::City;
use transitfold::element::{Element, ElementId, ElementRecord, Member, Node, Relation, Tags, Way};
use transitfold::geo::Point;
use transitfold::model::Mode;

pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    let mut t = Tags::default();
    for (k, v) in pairs {
        t.insert((*k).to_string(), (*v).to_string());
    }
    t
}

pub fn station_node(id: u64, lon: f64, lat: f64, name: &str) -> Element {
    Element::Node(Node {
        id,
        tags: tags(&[("railway", "station"), ("station", "subway"), ("name", name)]),
        point: Point::new(lon, lat),
    })
}

pub fn under_construction_station_node(id: u64, lon: f64, lat: f64, name: &str) -> Element {
    Element::Node(Node {
        id,
        tags: tags(&[("railway", "station"), ("station", "subway"), ("name", name), ("construction", "yes")]),
        point: Point::new(lon, lat),
    })
}

pub fn plain_node(id: u64, lon: f64, lat: f64, extra: &[(&str, &str)]) -> Element {
    Element::Node(Node { id, tags: tags(extra), point: Point::new(lon, lat) })
}

pub fn track_way(id: u64, nodes: &[u64]) -> Element {
    Element::Way(Way { id, tags: tags(&[("railway", "subway")]), nodes: nodes.to_vec(), center: None })
}

pub fn member(role: &str, target: ElementId) -> Member {
    Member { role: role.to_string(), target }
}

pub fn route_relation(id: u64, extra_tags: &[(&str, &str)], members: Vec<Member>) -> Element {
    let mut t = tags(&[("type", "route"), ("route", "subway")]);
    for (k, v) in extra_tags {
        t.insert((*k).to_string(), (*v).to_string());
    }
    Element::Relation(Relation { id, tags: t, members, center: None })
}

pub fn route_master_relation(id: u64, extra_tags: &[(&str, &str)], members: Vec<Member>) -> Element {
    let mut t = tags(&[("type", "route_master"), ("route_master", "subway")]);
    for (k, v) in extra_tags {
        t.insert((*k).to_string(), (*v).to_string());
    }
    Element::Relation(Relation { id, tags: t, members, center: None })
}

pub fn stop_area_group_relation(id: u64, members: Vec<Member>) -> Element {
    Element::Relation(Relation { id, tags: tags(&[("public_transport", "stop_area_group")]), members, center: None })
}

/// A city with a generous bbox (everything in these fixtures sits within a
/// couple of degrees of the origin) and the given catalogue counts.
pub fn new_city(num_stations: u32, num_lines: u32, num_light_lines: u32, num_interchanges: u32) -> City {
    City::new(
        1,
        "Testville".to_string(),
        "Testland".to_string(),
        "Testinent".to_string(),
        Some([-2.0, -2.0, 2.0, 2.0]),
        HashSet::new(),
        [Mode::Subway].into_iter().collect(),
        num_stations,
        num_lines,
        num_light_lines,
        num_interchanges,
    )
}

// --- JSON-record builders, for tests that drive `transitfold::run`. ---

fn tags_map(pairs: &[(&str, &str)]) -> Map<String, Value> {
    let mut m = Map::new();
    for (k, v) in pairs {
        m.insert((*k).to_string(), json!(v));
    }
    m
}

pub fn node_value(id: u64, lon: f64, lat: f64, tags: &[(&str, &str)]) -> Value {
    json!({"type": "node", "id": id, "lat": lat, "lon": lon, "tags": tags_map(tags)})
}

pub fn way_value(id: u64, nodes: &[u64], tags: &[(&str, &str)]) -> Value {
    json!({"type": "way", "id": id, "nodes": nodes, "tags": tags_map(tags)})
}

/// `members`: `(osm_type, role, target_id)`.
pub fn relation_value(id: u64, members: &[(&str, &str, u64)], tags: &[(&str, &str)]) -> Value {
    let members: Vec<Value> =
        members.iter().map(|(kind, role, target)| json!({"type": kind, "ref": target, "role": role})).collect();
    json!({"type": "relation", "id": id, "members": members, "tags": tags_map(tags)})
}

pub fn record(v: Value) -> ElementRecord {
    serde_json::from_value(v).expect("well-formed element record")
}
