//! Tunable constants for the pipeline (spec §6).

/// Policy for the open question in spec §9: whether a cached city's unused
/// entrances (present in the cache but no longer reachable during adoption
/// verification) should reject the cache entry outright (`Strict`) or be
/// silently ignored, matching the Python original's observed behaviour
/// (`Lenient`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntrancePolicy {
    Strict,
    #[default]
    Lenient,
}

/// All tunable constants recognised by the pipeline, with their documented
/// defaults (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Radius for auto-attaching entrances absent a stop-area relation.
    pub entrance_proximity_m: f64,
    /// Cap beyond which a stop is treated as off-line.
    pub stop_to_line_tolerance_m: f64,
    /// Max permitted station shift between runs for cache/recovery reuse.
    pub displacement_tolerance_m: f64,
    /// Fraction of expected station count treated as warning rather than error.
    pub allowed_station_mismatch: f64,
    /// Fraction of expected interchange count treated as warning rather than error.
    pub allowed_transfer_mismatch: f64,
    /// Angle-test thresholds, in degrees.
    pub min_angle_ok: f64,
    pub min_angle_hard: f64,
    /// Speeds, in km/h.
    pub speed_on_line_kmh: f64,
    pub speed_to_entrance_kmh: f64,
    pub speed_on_transfer_kmh: f64,
    /// Fixed costs, in seconds.
    pub entrance_penalty_s: f64,
    pub transfer_penalty_s: f64,
    /// Default headway when a route variant doesn't specify one, in minutes.
    pub default_interval_min: f64,
    /// Policy for cache entrance verification (spec §9 open question).
    pub cache_entrance_policy: EntrancePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entrance_proximity_m: 300.0,
            stop_to_line_tolerance_m: 50.0,
            displacement_tolerance_m: 300.0,
            allowed_station_mismatch: 0.02,
            allowed_transfer_mismatch: 0.07,
            min_angle_ok: 45.0,
            min_angle_hard: 20.0,
            speed_on_line_kmh: 40.0,
            speed_to_entrance_kmh: 5.0,
            speed_on_transfer_kmh: 3.5,
            entrance_penalty_s: 60.0,
            transfer_penalty_s: 30.0,
            default_interval_min: 2.5,
            cache_entrance_policy: EntrancePolicy::Lenient,
        }
    }
}

impl Config {
    pub(crate) fn speed_on_line_mps(&self) -> f64 {
        self.speed_on_line_kmh / 3.6
    }

    pub(crate) fn speed_to_entrance_mps(&self) -> f64 {
        self.speed_to_entrance_kmh / 3.6
    }

    pub(crate) fn speed_on_transfer_mps(&self) -> f64 {
        self.speed_on_transfer_kmh / 3.6
    }
}
