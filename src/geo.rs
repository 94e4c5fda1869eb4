//! Geometry helpers (spec §4.1, component C1).
//!
//! Distances use an equirectangular approximation on the WGS84 sphere —
//! adequate at city scale and exactly what the system this crate
//! reimplements relies on; a more accurate geodesic isn't warranted here.

/// A `(longitude, latitude)` point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl From<(f64, f64)> for Point {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

impl From<Point> for (f64, f64) {
    fn from(p: Point) -> Self {
        (p.lon, p.lat)
    }
}

/// Mean radius of the WGS84 sphere, in meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Equirectangular-approximation distance between two points, in meters.
pub fn distance(p1: Point, p2: Point) -> f64 {
    let dx = (p1.lon - p2.lon).to_radians() * (0.5 * (p1.lat + p2.lat).to_radians()).cos();
    let dy = (p1.lat - p2.lat).to_radians();
    EARTH_RADIUS_M * (dx * dx + dy * dy).sqrt()
}

/// Projects `p` onto the segment `(p1, p2)`. Returns `None` if the
/// perpendicular foot falls outside the segment's longitude span.
fn project_on_segment(p: Point, p1: Point, p2: Point) -> Option<Point> {
    let dx = p2.lon - p1.lon;
    let dy = p2.lat - p1.lat;
    let d2 = dx * dx + dy * dy;
    if d2 == 0.0 {
        return None;
    }
    let u = ((p.lon - p1.lon) * dx + (p.lat - p1.lat) * dy) / d2;
    let res = Point::new(p1.lon + u * dx, p1.lat + u * dy);
    let (lo, hi) = (p1.lon.min(p2.lon), p1.lon.max(p2.lon));
    if res.lon < lo || res.lon > hi {
        None
    } else {
        Some(res)
    }
}

/// Result of projecting a point onto a polyline: the closest point found,
/// and every fractional vertex index at which that closest point occurs
/// (plural because a polyline may revisit the same vertex/segment, e.g. a
/// loop service).
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub point: Point,
    pub positions: Vec<f64>,
}

/// Projects `p` onto `line`, preferring the closest vertex or segment foot
/// within `tolerance_m * 5` (the original's "nowhere" cutoff band); ties at
/// the same minimal distance all contribute a position. Returns `None` if
/// nothing within that band was found.
pub fn project_on_line(p: Point, line: &[Point], tolerance_m: f64) -> Option<Projection> {
    // Fixed admission band: a candidate only needs to beat this cutoff, not
    // the running minimum, so a tie arriving after the true minimum was
    // already found (a loop revisiting the same point) still gets collected.
    let cutoff = tolerance_m * 5.0;
    let mut candidates: Vec<(f64, Point, f64)> = Vec::new(); // (distance, point, index)

    for (i, vertex) in line.iter().enumerate() {
        let d = distance(p, *vertex);
        if d < cutoff {
            candidates.push((d, *vertex, i as f64));
        }
    }
    for seg in 0..line.len().saturating_sub(1) {
        let (a, b) = (line[seg], line[seg + 1]);
        let pad = tolerance_m;
        // crude bbox prefilter in degrees-ish units is wrong dimensionally but
        // mirrors the original's lon/lat-as-meters slack; keep it loose on
        // purpose since the exact projection check below is authoritative.
        let lon_lo = a.lon.min(b.lon) - pad / 111_320.0;
        let lon_hi = a.lon.max(b.lon) + pad / 111_320.0;
        let lat_lo = a.lat.min(b.lat) - pad / 110_540.0;
        let lat_hi = a.lat.max(b.lat) + pad / 110_540.0;
        if p.lon < lon_lo || p.lon > lon_hi || p.lat < lat_lo || p.lat > lat_hi {
            continue;
        }
        if let Some(proj) = project_on_segment(p, a, b) {
            let d = distance(p, proj);
            if d < cutoff {
                candidates.push((d, proj, seg as f64 + fractional_position(a, b, proj)));
            }
        }
    }

    if candidates.is_empty() {
        return None;
    }
    // Keep every candidate within float epsilon of the true minimum: a loop
    // line can have the same physical point at multiple vertex indices.
    let true_min = candidates
        .iter()
        .map(|(d, _, _)| *d)
        .fold(f64::INFINITY, f64::min);
    let point = candidates
        .iter()
        .find(|(d, _, _)| *d == true_min)
        .map(|(_, p, _)| *p)
        .unwrap();
    let positions = candidates
        .into_iter()
        .filter(|(d, _, _)| (*d - true_min).abs() < 1e-6)
        .map(|(_, _, pos)| pos)
        .collect();
    Some(Projection { point, positions })
}

fn fractional_position(a: Point, b: Point, proj: Point) -> f64 {
    let dx = b.lon - a.lon;
    let dy = b.lat - a.lat;
    let d2 = dx * dx + dy * dy;
    if d2 == 0.0 {
        0.0
    } else {
        (((proj.lon - a.lon) * dx + (proj.lat - a.lat) * dy) / d2).clamp(0.0, 1.0)
    }
}

/// Angle at `c`, between the rays `c -> p1` and `c -> p2`, in `[0, 180]` degrees.
pub fn angle_between(p1: Point, c: Point, p2: Point) -> f64 {
    let a1 = (p1.lat - c.lat).atan2(p1.lon - c.lon);
    let a2 = (p2.lat - c.lat).atan2(p2.lon - c.lon);
    let diff = (a1 - a2).to_degrees().abs().round();
    if diff <= 180.0 { diff } else { 360.0 - diff }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_zero_for_identical_points() {
        let p = Point::new(10.0, 20.0);
        assert_eq!(distance(p, p), 0.0);
    }

    #[test]
    fn distance_roughly_matches_known_separation() {
        // Paris to London, ~343 km.
        let paris = Point::new(2.3514, 48.8580);
        let london = Point::new(-0.1276, 51.5072);
        let d = distance(paris, london);
        assert!((d - 343_000.0).abs() < 5_000.0, "distance was {d}");
    }

    #[test]
    fn project_on_line_finds_vertex_for_exact_match() {
        let line = vec![Point::new(0.0, 0.0), Point::new(0.0, 0.001)];
        let proj = project_on_line(Point::new(0.0, 0.0), &line, 50.0).unwrap();
        assert_eq!(proj.point, Point::new(0.0, 0.0));
        assert!(proj.positions.contains(&0.0));
    }

    #[test]
    fn project_on_line_returns_multiple_positions_for_loop() {
        // A line that revisits the same vertex: 0 -> 1 -> 0 -> 2
        let line = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.001),
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.002),
        ];
        let proj = project_on_line(Point::new(0.0, 0.0), &line, 50.0).unwrap();
        assert!(proj.positions.len() >= 2);
    }

    #[test]
    fn angle_between_straight_line_is_180() {
        let a = angle_between(Point::new(-1.0, 0.0), Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        assert_eq!(a, 180.0);
    }

    #[test]
    fn angle_between_right_angle_is_90() {
        let a = angle_between(Point::new(1.0, 0.0), Point::new(0.0, 0.0), Point::new(0.0, 1.0));
        assert_eq!(a, 90.0);
    }
}
