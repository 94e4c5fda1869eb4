//! RouteMaster aggregation (spec §4.5, component C5).

use super::route::{get_network, Route, StopAreaIndex};
use super::Mode;
use crate::diagnostics::Diagnostics;
use crate::element::{Element, ElementId};
use std::collections::HashSet;

/// A line's variants, consolidated under an explicit `route_master` relation
/// or, absent one, the first variant keyed by `ref` (spec §3, §4.5).
#[derive(Debug, Clone)]
pub struct RouteMaster {
    id: Option<ElementId>,
    has_master: bool,
    pub route_ref: Option<String>,
    pub name: Option<String>,
    pub colour: Option<String>,
    pub casing: Option<String>,
    pub network: Option<String>,
    pub mode: Option<Mode>,
    pub interval_min: Option<f64>,
    interval_from_master: bool,
    pub variants: Vec<Route>,
    best: Option<usize>,
}

impl RouteMaster {
    /// Seeds a new master from its relation, if any. Tag fallbacks (ref,
    /// colour, casing, network, name) are read eagerly; `mode` and `id`
    /// without an explicit master are resolved from the first accepted
    /// variant in [`RouteMaster::add`].
    pub fn new(master: Option<&Element>, diagnostics: &mut Diagnostics) -> RouteMaster {
        match master {
            Some(m) => {
                let colour = match crate::colour::normalize_colour(m.tag("colour")) {
                    Ok(c) => c,
                    Err(e) => {
                        diagnostics.warn(e.to_string(), Some(m));
                        None
                    }
                };
                let casing = match crate::colour::normalize_colour(m.tag("colour:casing")) {
                    Ok(c) => c,
                    Err(e) => {
                        diagnostics.warn(e.to_string(), Some(m));
                        None
                    }
                };
                let interval_min = m.tag("interval").and_then(|v| v.parse::<f64>().ok()).filter(|v| *v > 0.0);
                RouteMaster {
                    id: Some(m.id()),
                    has_master: true,
                    route_ref: m.tag("ref").or_else(|| m.tag("name")).map(str::to_string),
                    name: m.tag("name").map(str::to_string),
                    colour,
                    casing,
                    network: get_network(m),
                    mode: Mode::parse(m.tag("route_master").unwrap_or("")),
                    interval_min,
                    interval_from_master: interval_min.is_some(),
                    variants: Vec::new(),
                    best: None,
                }
            }
            None => RouteMaster {
                id: None,
                has_master: false,
                route_ref: None,
                name: None,
                colour: None,
                casing: None,
                network: None,
                mode: None,
                interval_min: None,
                interval_from_master: false,
                variants: Vec::new(),
                best: None,
            },
        }
    }

    pub fn id(&self) -> ElementId {
        self.id.expect("RouteMaster::id read before any variant was added")
    }

    pub fn has_master(&self) -> bool {
        self.has_master
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Route> {
        self.variants.iter()
    }

    pub fn best(&self) -> &Route {
        &self.variants[self.best.expect("RouteMaster::best read with no accepted variants")]
    }

    /// Folds one more variant in (spec §4.5). Returns `false` (and leaves
    /// the master unchanged) if the variant's mode is incompatible — the
    /// one case the original refuses a variant outright rather than merely
    /// warning.
    pub fn add(&mut self, route: Route, diagnostics: &mut Diagnostics) -> bool {
        match self.network {
            None => self.network = route.network.clone(),
            Some(ref master_network) => {
                if let Some(route_network) = &route.network {
                    if route_network != master_network {
                        diagnostics.error_ref(
                            format!(
                                "Route has different network (\"{route_network}\") from master \"{master_network}\""
                            ),
                            Some(route.element.clone()),
                        );
                    }
                }
            }
        }

        match self.colour {
            None => self.colour = route.colour.clone(),
            Some(ref master_colour) => {
                if let Some(route_colour) = &route.colour {
                    if route_colour != master_colour {
                        diagnostics.warn_ref(
                            format!("Route \"{route_colour}\" has different colour from master \"{master_colour}\""),
                            Some(route.element.clone()),
                        );
                    }
                }
            }
        }

        match self.casing {
            None => self.casing = route.infill_colour.clone(),
            Some(ref master_casing) => {
                if let Some(route_casing) = &route.infill_colour {
                    if route_casing != master_casing {
                        diagnostics.warn_ref(
                            format!(
                                "Route \"{route_casing}\" has different casing colour from master \"{master_casing}\""
                            ),
                            Some(route.element.clone()),
                        );
                    }
                }
            }
        }

        match self.route_ref {
            None => self.route_ref = route.route_ref.clone(),
            Some(ref master_ref) => {
                if route.route_ref.as_ref() != Some(master_ref) {
                    diagnostics.warn_ref(
                        format!(
                            "Route \"{}\" has different ref from master \"{master_ref}\"",
                            route.route_ref.as_deref().unwrap_or("")
                        ),
                        Some(route.element.clone()),
                    );
                }
            }
        }

        if self.name.is_none() {
            self.name = route.name.clone();
        }

        match self.mode {
            None => self.mode = Some(route.mode),
            Some(master_mode) if master_mode != route.mode => {
                diagnostics.error_ref(
                    format!("Incompatible PT mode: master has {master_mode} and route has {}", route.mode),
                    Some(route.element.clone()),
                );
                return false;
            }
            _ => {}
        }

        if !self.has_master {
            match self.id {
                None => self.id = Some(route.id),
                Some(current) if current > route.id => self.id = Some(route.id),
                _ => {}
            }
        }

        if !self.interval_from_master {
            if let Some(v) = route.interval_min {
                self.interval_min = Some(self.interval_min.map_or(v, |cur| cur.min(v)));
            }
        }

        let is_best = match self.best {
            None => true,
            Some(i) => route.stops.len() > self.variants[i].stops.len(),
        };
        self.variants.push(route);
        if is_best {
            self.best = Some(self.variants.len() - 1);
        }
        true
    }

    /// Checks every variant has a return direction (spec §4.5): variants are
    /// keyed by `(start, end)` endpoint, using a stop area's transfer group
    /// when it has one so that two routes serving opposite platforms of the
    /// same interchange still match up. A variant whose reversed key is
    /// absent among the master's own keys gets a warning; an empty master
    /// (every variant rejected) is an error.
    pub fn check_return_routes(&self, stop_areas: &StopAreaIndex, diagnostics: &mut Diagnostics) {
        if self.variants.is_empty() {
            diagnostics.error_ref(
                "Route master has no accepted variants, possibly all are under construction",
                None,
            );
            return;
        }

        let endpoint = |area_idx: u32| -> ElementId {
            stop_areas.get(area_idx).transfer.unwrap_or_else(|| stop_areas.get(area_idx).id)
        };

        let keys: Vec<(ElementId, ElementId)> = self
            .variants
            .iter()
            .map(|route| {
                let start = endpoint(route.stops.first().expect("a built route always has stops").stop_area);
                let end = endpoint(route.stops.last().expect("a built route always has stops").stop_area);
                (start, end)
            })
            .collect();
        let seen: HashSet<(ElementId, ElementId)> = keys.iter().copied().collect();

        for (route, key) in self.variants.iter().zip(keys.iter()) {
            let reverse = (key.1, key.0);
            if !seen.contains(&reverse) {
                diagnostics.warn_ref("Route does not have a return direction", Some(route.element.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementRef;
    use crate::geo::Point;
    use crate::model::route::RouteStop;

    fn route(id: u64, network: Option<&str>, mode: Mode, stop_count: usize) -> Route {
        let stops = (0..stop_count).map(|i| RouteStop::new(i as u32, Point::new(0.0, 0.0))).collect();
        Route {
            id: ElementId::relation(id),
            element: ElementRef { id: ElementId::relation(id), name: String::new() },
            route_ref: Some("1".into()),
            name: None,
            mode,
            network: network.map(str::to_string),
            interval_min: None,
            colour: None,
            infill_colour: None,
            stops,
            track: Vec::new(),
            is_circular: false,
        }
    }

    #[test]
    fn network_mismatch_is_an_error() {
        let mut diagnostics = Diagnostics::default();
        let mut master = RouteMaster::new(None, &mut diagnostics);
        assert!(master.add(route(1, Some("Metro"), Mode::Subway, 2), &mut diagnostics));
        assert!(master.add(route(2, Some("Other"), Mode::Subway, 2), &mut diagnostics));
        assert_eq!(diagnostics.errors.len(), 1);
        assert!(diagnostics.errors[0].message.contains("different network"));
    }

    #[test]
    fn incompatible_mode_is_refused() {
        let mut diagnostics = Diagnostics::default();
        let mut master = RouteMaster::new(None, &mut diagnostics);
        assert!(master.add(route(1, None, Mode::Subway, 2), &mut diagnostics));
        assert!(!master.add(route(2, None, Mode::Tram, 2), &mut diagnostics));
        assert_eq!(master.len(), 1);
    }

    #[test]
    fn best_variant_is_the_longest() {
        let mut diagnostics = Diagnostics::default();
        let mut master = RouteMaster::new(None, &mut diagnostics);
        master.add(route(1, None, Mode::Subway, 2), &mut diagnostics);
        master.add(route(2, None, Mode::Subway, 5), &mut diagnostics);
        master.add(route(3, None, Mode::Subway, 3), &mut diagnostics);
        assert_eq!(master.best().stops.len(), 5);
    }

    #[test]
    fn id_without_master_is_the_smallest_variant_id() {
        let mut diagnostics = Diagnostics::default();
        let mut master = RouteMaster::new(None, &mut diagnostics);
        master.add(route(5, None, Mode::Subway, 2), &mut diagnostics);
        master.add(route(2, None, Mode::Subway, 2), &mut diagnostics);
        assert_eq!(master.id(), ElementId::relation(2));
    }
}
