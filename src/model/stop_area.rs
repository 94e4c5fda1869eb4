//! StopArea assembly (spec §4.3, component C3).

use super::station::is_any_station;
use super::{is_platform, is_stop_position, is_subway_entrance, is_track, Mode, Station};
use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::element::{Element, ElementId};
use crate::geo::{distance, Point};
use std::collections::{HashMap, HashSet};

/// The operational unit a route refers to (spec §3): a station plus its
/// stop positions, platforms, entrances and exits.
#[derive(Debug, Clone)]
pub struct StopArea {
    pub id: ElementId,
    pub station_id: ElementId,
    pub modes: HashSet<Mode>,
    pub name: String,
    pub int_name: Option<String>,
    pub colour: Option<String>,
    pub stops: HashSet<ElementId>,
    pub platforms: HashSet<ElementId>,
    pub entrances: HashSet<ElementId>,
    pub exits: HashSet<ElementId>,
    pub centers: HashMap<ElementId, Point>,
    pub center: Point,
    pub transfer: Option<ElementId>,
}

impl StopArea {
    /// All element ids that make up the stop area (spec §4.3 `get_elements`):
    /// itself, its station, and every stop/platform/entrance/exit.
    pub fn elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::once(self.id)
            .chain((self.station_id != self.id).then_some(self.station_id))
            .chain(self.stops.iter().copied())
            .chain(self.platforms.iter().copied())
            .chain(self.entrances.iter().copied())
            .chain(self.exits.iter().copied())
    }

    /// Builds a stop area from a station and optionally its wrapping
    /// `public_transport=stop_area` relation. When `relation` is `None`, a
    /// proximity scan over `city_elements` attaches nearby subway entrances
    /// and exits only (spec §4.3: stops/platforms are never auto-attached).
    pub fn build<'a>(
        station: &Station,
        relation: Option<&Element>,
        get: impl Fn(ElementId) -> Option<&'a Element>,
        city_elements: impl Iterator<Item = &'a Element>,
        config: &Config,
        diagnostics: &mut Diagnostics,
    ) -> StopArea {
        let id = relation.map(Element::id).unwrap_or(station.id);

        let mut area = StopArea {
            id,
            station_id: station.id,
            modes: station.modes.clone(),
            name: station.name.clone(),
            int_name: station.int_name.clone(),
            colour: station.colour.clone(),
            stops: HashSet::new(),
            platforms: HashSet::new(),
            entrances: HashSet::new(),
            exits: HashSet::new(),
            centers: HashMap::new(),
            center: station.center,
            transfer: None,
        };

        match relation {
            Some(rel) => area.absorb_relation(rel, station, get, diagnostics),
            None => area.scan_nearby(city_elements, config),
        }

        let has_entrances = !area.entrances.is_empty();
        let has_exits = !area.exits.is_empty();
        if has_exits && !has_entrances {
            diagnostics.error("Only exits for a station, no entrances", relation);
        }
        if has_entrances && !has_exits {
            diagnostics.error("No exits for a station", relation);
        }

        area.centers.insert(area.station_id, station.center);
        for el_id in area
            .stops
            .iter()
            .chain(area.platforms.iter())
            .chain(area.entrances.iter())
            .chain(area.exits.iter())
            .copied()
            .collect::<Vec<_>>()
        {
            if let Some(el) = get(el_id) {
                if let Some(c) = el.center() {
                    area.centers.insert(el_id, c);
                }
            }
        }

        area.center = area.compute_center();
        area
    }

    fn absorb_relation<'a>(
        &mut self,
        relation: &Element,
        station: &Station,
        get: impl Fn(ElementId) -> Option<&'a Element>,
        diagnostics: &mut Diagnostics,
    ) {
        if let Some(name) = relation.tag("name") {
            self.name = name.to_string();
        }
        if let Some(int_name) = relation.tag("int_name").or_else(|| relation.tag("name:en")) {
            self.int_name = Some(int_name.to_string());
        }
        match crate::colour::normalize_colour(relation.tag("colour")) {
            Ok(Some(c)) => self.colour = Some(c),
            Ok(None) => {}
            Err(e) => diagnostics.warn(e.to_string(), Some(relation)),
        }

        let Some(rel) = relation.as_relation() else {
            return;
        };

        let mut seen = HashSet::new();
        let mut warned_duplicate = false;
        let mut warned_tracks = false;
        for member in &rel.members {
            if !seen.insert(member.target) && !warned_duplicate {
                diagnostics.warn("Duplicate member in a stop area relation", Some(relation));
                warned_duplicate = true;
            }

            let Some(m_el) = get(member.target) else {
                continue;
            };

            if is_any_station(m_el) {
                if member.target != station.id {
                    diagnostics.error("Stop area has multiple stations", Some(relation));
                }
            } else if is_stop_position(m_el) {
                self.stops.insert(member.target);
            } else if is_platform(m_el) {
                self.platforms.insert(member.target);
            } else if is_subway_entrance(m_el) {
                if m_el.as_node().is_none() {
                    diagnostics.warn("Subway entrance is not a node", Some(m_el));
                }
                if m_el.tag("entrance") != Some("exit") && member.role != "exit_only" {
                    self.entrances.insert(member.target);
                }
                if m_el.tag("entrance") != Some("entrance") && member.role != "entry_only" {
                    self.exits.insert(member.target);
                }
            } else if is_track(m_el) {
                if !warned_tracks {
                    diagnostics.error("Tracks in a stop_area relation", Some(relation));
                    warned_tracks = true;
                }
            }
        }
    }

    fn scan_nearby<'a>(&mut self, city_elements: impl Iterator<Item = &'a Element>, config: &Config) {
        let center = self.center;
        for el in city_elements {
            if el.tags().contains_key("station") {
                continue;
            }
            let Some(c) = el.center() else { continue };
            if is_subway_entrance(el) {
                if distance(center, c) <= config.entrance_proximity_m {
                    let etag = el.tag("entrance");
                    if etag != Some("exit") {
                        self.entrances.insert(el.id());
                    }
                    if etag != Some("entrance") {
                        self.exits.insert(el.id());
                    }
                }
            }
        }
    }

    fn compute_center(&self) -> Point {
        let members: Vec<ElementId> = self.stops.iter().chain(self.platforms.iter()).copied().collect();
        if members.is_empty() {
            return self.center;
        }
        let mut sum = Point::new(0.0, 0.0);
        let mut count = 0usize;
        for id in &members {
            if let Some(p) = self.centers.get(id) {
                sum.lon += p.lon;
                sum.lat += p.lat;
                count += 1;
            }
        }
        if count == 0 {
            self.center
        } else {
            Point::new(sum.lon / count as f64, sum.lat / count as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Member, Node, Relation, Tags};

    fn make_station(id: u64, point: Point) -> Station {
        Station {
            id: ElementId::node(id),
            modes: [Mode::Subway].into_iter().collect(),
            name: "Central".into(),
            int_name: None,
            colour: None,
            center: point,
        }
    }

    #[test]
    fn falls_back_to_station_center_without_members() {
        let station = make_station(1, Point::new(0.0, 0.0));
        let diagnostics = &mut Diagnostics::default();
        let area = StopArea::build(
            &station,
            None,
            |_| None,
            std::iter::empty(),
            &Config::default(),
            diagnostics,
        );
        assert_eq!(area.center, station.center);
        assert!(area.stops.is_empty());
        assert!(diagnostics.errors.is_empty());
    }

    #[test]
    fn averages_stop_and_platform_centers() {
        let station = make_station(1, Point::new(0.0, 0.0));
        let mut tags = Tags::default();
        tags.insert("public_transport".into(), "stop_area".into());
        let stop = Element::Node(Node {
            id: 2,
            tags: {
                let mut t = Tags::default();
                t.insert("public_transport".into(), "stop_position".into());
                t
            },
            point: Point::new(2.0, 0.0),
        });
        let relation = Element::Relation(Relation {
            id: 100,
            tags,
            members: vec![
                Member { role: String::new(), target: ElementId::node(1) },
                Member { role: String::new(), target: ElementId::node(2) },
            ],
            center: None,
        });

        let diagnostics = &mut Diagnostics::default();
        let area = StopArea::build(
            &station,
            Some(&relation),
            |id| if id == ElementId::node(2) { Some(&stop) } else { None },
            std::iter::empty(),
            &Config::default(),
            diagnostics,
        );
        assert_eq!(area.stops.len(), 1);
        assert_eq!(area.center, Point::new(1.0, 0.0));
    }

    #[test]
    fn entrance_without_exit_is_an_error() {
        let station = make_station(1, Point::new(0.0, 0.0));
        let mut tags = Tags::default();
        tags.insert("public_transport".into(), "stop_area".into());
        let mut entrance_tags = Tags::default();
        entrance_tags.insert("railway".into(), "subway_entrance".into());
        entrance_tags.insert("entrance".into(), "entrance".into());
        let entrance = Element::Node(Node { id: 3, tags: entrance_tags, point: Point::new(0.0, 0.0) });
        let relation = Element::Relation(Relation {
            id: 100,
            tags,
            members: vec![
                Member { role: String::new(), target: ElementId::node(1) },
                Member { role: String::new(), target: ElementId::node(3) },
            ],
            center: None,
        });

        let diagnostics = &mut Diagnostics::default();
        let _area = StopArea::build(
            &station,
            Some(&relation),
            |id| if id == ElementId::node(3) { Some(&entrance) } else { None },
            std::iter::empty(),
            &Config::default(),
            diagnostics,
        );
        assert_eq!(diagnostics.errors.len(), 1);
        assert!(diagnostics.errors[0].message.contains("No exits"));
    }

    #[test]
    fn duplicate_member_warns_once() {
        let station = make_station(1, Point::new(0.0, 0.0));
        let mut tags = Tags::default();
        tags.insert("public_transport".into(), "stop_area".into());
        let relation = Element::Relation(Relation {
            id: 100,
            tags,
            members: vec![
                Member { role: String::new(), target: ElementId::node(1) },
                Member { role: String::new(), target: ElementId::node(1) },
            ],
            center: None,
        });

        let diagnostics = &mut Diagnostics::default();
        let _area = StopArea::build(
            &station,
            Some(&relation),
            |_| None,
            std::iter::empty(),
            &Config::default(),
            diagnostics,
        );
        assert_eq!(
            diagnostics.warnings.iter().filter(|w| w.message.contains("Duplicate")).count(),
            1
        );
    }
}
