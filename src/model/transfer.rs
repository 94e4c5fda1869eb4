//! Transfer resolution across all cities (spec §4.7, component C7).

use super::stop_area::StopArea;
use crate::element::{Element, ElementId};
use std::collections::{HashMap, HashSet};

/// A set of two or more [`StopArea`]s forming one interchange (spec §3),
/// referenced by the composite ids of its member stop areas. `id` is the
/// source stop-area-group relation's own composite id, stamped onto each
/// member [`StopArea`]'s `transfer` field (spec §4.6) so route-master
/// return-direction checking can treat two platforms of one interchange as
/// the same endpoint.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: ElementId,
    pub members: Vec<ElementId>,
}

/// Whether `el` is a stop-area-group relation (spec glossary).
fn is_stop_area_group(el: &Element) -> bool {
    matches!(el, Element::Relation(_)) && el.tag("public_transport") == Some("stop_area_group")
}

/// Collapses stop-area-group relations into [`Transfer`]s (spec §4.7). A
/// stop area may have been instantiated independently by two cities whose
/// territory shares a border, so `stations_by_element` is the *union* of
/// every city's `element id -> StopArea ids` index, keyed by composite id
/// rather than by city. `used` restricts membership to stop areas actually
/// referenced by at least one route (a group that degenerates below two
/// members after that filter is dropped).
pub fn find_transfers(
    elements: impl Iterator<Item = &Element>,
    stations_by_element: &HashMap<ElementId, HashSet<ElementId>>,
    used: &HashSet<ElementId>,
) -> Vec<Transfer> {
    let mut transfers = Vec::new();
    for el in elements {
        if !is_stop_area_group(el) {
            continue;
        }
        let Some(rel) = el.as_relation() else { continue };

        let mut members: HashSet<ElementId> = HashSet::new();
        for m in &rel.members {
            if let Some(stop_areas) = stations_by_element.get(&m.target) {
                members.extend(stop_areas.iter().copied().filter(|id| used.contains(id)));
            }
        }
        if members.len() > 1 {
            let mut members: Vec<ElementId> = members.into_iter().collect();
            members.sort_unstable();
            transfers.push(Transfer { id: el.id(), members });
        }
    }
    transfers
}
