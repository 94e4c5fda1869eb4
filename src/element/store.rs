use super::{Element, ElementId, ElementRecord};
use crate::geo::Point;
use std::collections::HashMap;

/// Indexes raw elements by composite id and computes centres (spec §4.1,
/// component C1).
#[derive(Debug, Clone, Default)]
pub struct ElementStore {
    elements: HashMap<ElementId, Element>,
}

/// Route-masters and stop-area-groups are intentionally centreless (spec
/// §4.1, §9): their members are other relations spanning a whole line or a
/// whole interchange, not a single place. They are never fed into the
/// centre fixed-point loop and `center()` on them always returns `None`.
fn is_centerless_by_design(el: &Element) -> bool {
    let tags = el.tags();
    matches!(el, Element::Relation(_))
        && (tags.get("type").map(String::as_str) == Some("route_master")
            || tags.get("public_transport").map(String::as_str) == Some("stop_area_group"))
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a decoded snapshot. A relation without `members` is dropped
    /// (spec SPEC_FULL §F.5) rather than stored.
    pub fn index(&mut self, records: impl IntoIterator<Item = ElementRecord>) {
        for record in records {
            if let Some(el) = record.into_element() {
                self.elements.insert(el.id(), el);
            }
        }
    }

    pub fn insert(&mut self, el: Element) {
        self.elements.insert(el.id(), el);
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn contains_id(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// The element's centre, per spec §4.1: a node's own point, a way/
    /// relation's precomputed centre, or `None`.
    pub fn center(&self, id: ElementId) -> Option<Point> {
        self.get(id).and_then(Element::center)
    }

    /// Computes way and relation centres in a single forward pass (ways
    /// from their member nodes) followed by a fixed-point loop over
    /// relations (a relation's centre is the mean of present member
    /// centres; relations referencing only not-yet-resolved relations wait
    /// for a later pass). Returns the ids of relations left unresolved
    /// after the loop stalls — not fatal, just reported (spec §4.1).
    pub fn compute_centres(&mut self) -> Vec<ElementId> {
        self.compute_way_centres();
        self.compute_relation_centres()
    }

    fn compute_way_centres(&mut self) {
        let way_ids: Vec<u64> = self
            .elements
            .values()
            .filter_map(|e| match e {
                Element::Way(w) if w.center.is_none() => Some(w.id),
                _ => None,
            })
            .collect();

        for wid in way_ids {
            let id = ElementId::way(wid);
            let nodes = self.elements[&id].as_way().unwrap().nodes.clone();
            if let Some(center) = mean_of(nodes.iter().filter_map(|&nid| self.center(ElementId::node(nid))))
            {
                self.elements.get_mut(&id).unwrap().set_center(center);
            }
        }
    }

    fn compute_relation_centres(&mut self) -> Vec<ElementId> {
        let mut pending: Vec<u64> = self
            .elements
            .values()
            .filter_map(|e| match e {
                Element::Relation(r) if r.center.is_none() && !is_centerless_by_design(e) => {
                    Some(r.id)
                }
                _ => None,
            })
            .collect();

        loop {
            let mut next_pending = Vec::new();
            let mut progressed = false;
            for rid in pending {
                let id = ElementId::relation(rid);
                let members = self.elements[&id].as_relation().unwrap().members.clone();
                let center = mean_of(members.iter().filter_map(|m| self.center(m.target)));
                match center {
                    Some(c) => {
                        self.elements.get_mut(&id).unwrap().set_center(c);
                        progressed = true;
                    }
                    None => next_pending.push(rid),
                }
            }
            if !progressed || next_pending.is_empty() {
                return next_pending.into_iter().map(ElementId::relation).collect();
            }
            pending = next_pending;
        }
    }
}

fn mean_of(points: impl Iterator<Item = Point>) -> Option<Point> {
    let mut sum_lon = 0.0;
    let mut sum_lat = 0.0;
    let mut count = 0usize;
    for p in points {
        sum_lon += p.lon;
        sum_lat += p.lat;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(Point::new(sum_lon / count as f64, sum_lat / count as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Member, Node, Relation, Tags, Way};

    fn node(id: u64, lon: f64, lat: f64) -> Element {
        Element::Node(Node { id, tags: Tags::default(), point: Point::new(lon, lat) })
    }

    #[test]
    fn way_centre_is_mean_of_nodes() {
        let mut store = ElementStore::new();
        store.insert(node(1, 0.0, 0.0));
        store.insert(node(2, 2.0, 0.0));
        store.insert(Element::Way(Way {
            id: 10,
            tags: Tags::default(),
            nodes: vec![1, 2],
            center: None,
        }));
        let unresolved = store.compute_centres();
        assert!(unresolved.is_empty());
        let c = store.center(ElementId::way(10)).unwrap();
        assert_eq!(c, Point::new(1.0, 0.0));
    }

    #[test]
    fn relation_of_relations_resolves_via_fixed_point() {
        let mut store = ElementStore::new();
        store.insert(node(1, 0.0, 0.0));
        store.insert(node(2, 4.0, 0.0));
        store.insert(Element::Relation(Relation {
            id: 20,
            tags: Tags::default(),
            members: vec![Member { role: String::new(), target: ElementId::node(1) }],
            center: None,
        }));
        store.insert(Element::Relation(Relation {
            id: 21,
            tags: Tags::default(),
            members: vec![Member { role: String::new(), target: ElementId::node(2) }],
            center: None,
        }));
        store.insert(Element::Relation(Relation {
            id: 22,
            tags: Tags::default(),
            members: vec![
                Member { role: String::new(), target: ElementId::relation(20) },
                Member { role: String::new(), target: ElementId::relation(21) },
            ],
            center: None,
        }));
        let unresolved = store.compute_centres();
        assert!(unresolved.is_empty());
        assert_eq!(store.center(ElementId::relation(22)), Some(Point::new(2.0, 0.0)));
    }

    #[test]
    fn route_master_stays_centerless() {
        let mut store = ElementStore::new();
        store.insert(node(1, 0.0, 0.0));
        let mut tags = Tags::default();
        tags.insert("type".into(), "route_master".into());
        store.insert(Element::Relation(Relation {
            id: 30,
            tags,
            members: vec![Member { role: String::new(), target: ElementId::node(1) }],
            center: None,
        }));
        store.compute_centres();
        assert_eq!(store.center(ElementId::relation(30)), None);
    }

    #[test]
    fn unresolvable_cycle_is_reported() {
        let mut store = ElementStore::new();
        store.insert(Element::Relation(Relation {
            id: 40,
            tags: Tags::default(),
            members: vec![Member { role: String::new(), target: ElementId::relation(41) }],
            center: None,
        }));
        store.insert(Element::Relation(Relation {
            id: 41,
            tags: Tags::default(),
            members: vec![Member { role: String::new(), target: ElementId::relation(40) }],
            center: None,
        }));
        let unresolved = store.compute_centres();
        assert_eq!(unresolved.len(), 2);
    }
}
