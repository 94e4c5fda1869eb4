//! The reconstructed transit topology (spec §3–§4, components C2–C5, C7).

pub mod route;
pub mod route_master;
pub mod station;
pub mod stop_area;
pub mod transfer;

pub use route::{CriticalError, Route, RouteStop};
pub use route_master::RouteMaster;
pub use station::Station;
pub use stop_area::StopArea;
pub use transfer::Transfer;

use crate::element::Element;

/// Active transport modes (spec glossary, §4.2). The Python original this
/// crate's topology logic is grounded on only tracks `subway`/`light_rail`/
/// `monorail`; this crate's catalogue also covers the overground sheet
/// (spec §6), so `Tram` is a fourth first-class mode, gated by the
/// tram-stop tag exactly as spec §4.2 describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    Subway,
    LightRail,
    Monorail,
    Tram,
}

pub const RAIL_MODES: [Mode; 3] = [Mode::Subway, Mode::LightRail, Mode::Monorail];

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Subway => "subway",
            Mode::LightRail => "light_rail",
            Mode::Monorail => "monorail",
            Mode::Tram => "tram",
        }
    }

    pub fn parse(s: &str) -> Option<Mode> {
        match s {
            "subway" => Some(Mode::Subway),
            "light_rail" => Some(Mode::LightRail),
            "monorail" => Some(Mode::Monorail),
            "tram" => Some(Mode::Tram),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag keys that mark an element as under construction or merely proposed
/// (spec §1 Non-goals: no tag-repair; such elements are simply excluded).
pub const CONSTRUCTION_KEYS: [&str; 4] =
    ["construction", "proposed", "construction:railway", "proposed:railway"];

pub fn is_under_construction(el: &Element) -> bool {
    CONSTRUCTION_KEYS.iter().any(|k| el.tags().contains_key(*k))
}

/// The `{mode=yes}`/`{station=*}` mode set of an element (spec §4.2).
pub fn mode_set(el: &Element) -> std::collections::HashSet<Mode> {
    let mut modes = std::collections::HashSet::new();
    if let Some(v) = el.tag("station") {
        if let Some(m) = Mode::parse(v) {
            modes.insert(m);
        }
    }
    for m in RAIL_MODES {
        if el.tag(m.as_str()) == Some("yes") {
            modes.insert(m);
        }
    }
    modes
}

pub fn is_stop_position(el: &Element) -> bool {
    el.tag("railway") == Some("stop") || el.tag("public_transport") == Some("stop_position")
}

pub fn is_platform(el: &Element) -> bool {
    el.tag("railway") == Some("platform") || el.tag("public_transport") == Some("platform")
}

pub fn is_track(el: &Element) -> bool {
    matches!(el, Element::Way(_))
        && match el.tag("railway") {
            Some("rail") => true,
            Some(v) => Mode::parse(v).is_some(),
            None => false,
        }
}

pub fn is_subway_entrance(el: &Element) -> bool {
    el.tag("railway") == Some("subway_entrance")
}
