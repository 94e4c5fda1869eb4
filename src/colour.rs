//! CSS colour normalisation (spec §9 design notes).
//!
//! The element snapshot carries colours as free-form tag values: CSS hex
//! triplets/sextuplets, `rgb()` is not seen in practice, and a modest set of
//! CSS/X11 named colours. Unparseable colours are reported to the caller as
//! an error so city-level code can downgrade them to a warning rather than
//! aborting the pipeline (spec §7 propagation policy; nothing about colour
//! parsing is fatal anywhere in this system).

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ColourError {
    #[error("invalid colour value: {0:?}")]
    Invalid(String),
}

/// Normalises a raw tag value into a lowercase `rrggbb` string (no leading
/// `#`). Returns `Ok(None)` for an absent/empty value, `Err` for a value
/// that is neither a valid hex triplet/sextuplet nor a known CSS name.
pub fn normalize_colour(raw: Option<&str>) -> Result<Option<String>, ColourError> {
    let raw = match raw {
        None => return Ok(None),
        Some(s) if s.trim().is_empty() => return Ok(None),
        Some(s) => s.trim(),
    };

    if let Some(hex) = parse_hex(raw) {
        return Ok(Some(hex));
    }
    if let Some(hex) = named_colour(raw.to_ascii_lowercase().as_str()) {
        return Ok(Some(hex.to_string()));
    }
    Err(ColourError::Invalid(raw.to_string()))
}

fn parse_hex(raw: &str) -> Option<String> {
    let s = raw.strip_prefix('#').unwrap_or(raw);
    if !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match s.len() {
        6 => Some(s.to_ascii_lowercase()),
        3 => Some(
            s.chars()
                .map(|c| format!("{c}{c}"))
                .collect::<String>()
                .to_ascii_lowercase(),
        ),
        _ => None,
    }
}

/// A pragmatic subset of the CSS/X11 named-colour table: the ones actually
/// observed on transit route/station tags in practice.
fn named_colour(name: &str) -> Option<&'static str> {
    let table: &[(&str, &str)] = &[
        ("black", "000000"),
        ("white", "ffffff"),
        ("red", "ff0000"),
        ("green", "008000"),
        ("lime", "00ff00"),
        ("blue", "0000ff"),
        ("yellow", "ffff00"),
        ("orange", "ffa500"),
        ("purple", "800080"),
        ("violet", "ee82ee"),
        ("pink", "ffc0cb"),
        ("magenta", "ff00ff"),
        ("cyan", "00ffff"),
        ("teal", "008080"),
        ("navy", "000080"),
        ("maroon", "800000"),
        ("olive", "808000"),
        ("gray", "808080"),
        ("grey", "808080"),
        ("silver", "c0c0c0"),
        ("brown", "a52a2a"),
        ("gold", "ffd700"),
        ("indigo", "4b0082"),
        ("turquoise", "40e0d0"),
        ("darkgreen", "006400"),
        ("darkred", "8b0000"),
        ("darkblue", "00008b"),
        ("lightblue", "add8e6"),
        ("lightgreen", "90ee90"),
        ("skyblue", "87ceeb"),
        ("beige", "f5f5dc"),
    ];
    table
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, hex)| *hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_for_absent() {
        assert_eq!(normalize_colour(None), Ok(None));
    }

    #[test]
    fn parses_hash_sextuplet() {
        assert_eq!(
            normalize_colour(Some("#FF0000")),
            Ok(Some("ff0000".to_string()))
        );
    }

    #[test]
    fn parses_bare_triplet() {
        assert_eq!(normalize_colour(Some("f00")), Ok(Some("ff0000".to_string())));
    }

    #[test]
    fn resolves_named_colour() {
        assert_eq!(
            normalize_colour(Some("Red")),
            Ok(Some("ff0000".to_string()))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(normalize_colour(Some("not-a-colour")).is_err());
    }
}
