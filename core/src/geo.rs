//! Planar geo-kinematics.
//!
//! Positions are (lat, lon) in decimal degrees. All geometry runs in a
//! local equirectangular frame: north-km = dlat * KM_PER_DEG, east-km =
//! dlon * KM_PER_DEG * cos(mean latitude). Heading 0 = north, 90 = east.
//!
//! `distance`, `bearing` and `advance_exact` share the same frame, so
//! advancing along `bearing(a, b)` by `distance(a, b)` lands on `b`.

use crate::{config::NoiseConfig, rng::StreamRng};
use serde::{Deserialize, Serialize};

pub const KM_PER_DEG: f64 = 111.32;
pub const KM_PER_NM:  f64 = 1.852;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Kilometres per degree of longitude at `lat`.
fn lon_scale(lat: f64) -> f64 {
    // Clamp keeps the frame finite at the poles.
    KM_PER_DEG * lat.to_radians().cos().max(1e-3)
}

pub fn knots_to_km_per_sec(knots: f64) -> f64 {
    knots * KM_PER_NM / 3600.0
}

pub fn km_per_sec_to_knots(km_s: f64) -> f64 {
    km_s * 3600.0 / KM_PER_NM
}

/// Wrap any angle into [0, 360).
pub fn normalize_heading(deg: f64) -> f64 {
    let h = deg.rem_euclid(360.0);
    if h >= 360.0 { 0.0 } else { h }
}

/// Signed shortest turn from `from` to `to`, in (-180, 180].
pub fn heading_delta(from: f64, to: f64) -> f64 {
    let d = (to - from).rem_euclid(360.0);
    if d > 180.0 { d - 360.0 } else { d }
}

/// Turn `current` toward `desired` by at most `max_step` degrees.
pub fn turn_toward(current: f64, desired: f64, max_step: f64) -> f64 {
    let delta = heading_delta(current, desired);
    let step = delta.clamp(-max_step.abs(), max_step.abs());
    normalize_heading(current + step)
}

/// Local planar offset of `to` from `from` as (east_km, north_km).
pub fn offset_km(from: Coordinate, to: Coordinate) -> (f64, f64) {
    let mean_lat = 0.5 * (from.lat + to.lat);
    let north = (to.lat - from.lat) * KM_PER_DEG;
    let east = (to.lon - from.lon) * lon_scale(mean_lat);
    (east, north)
}

/// Move `from` by a local planar offset.
pub fn displace(from: Coordinate, east_km: f64, north_km: f64) -> Coordinate {
    let lat = from.lat + north_km / KM_PER_DEG;
    let mean_lat = 0.5 * (from.lat + lat);
    Coordinate {
        lat,
        lon: from.lon + east_km / lon_scale(mean_lat),
    }
}

/// Distance in kilometres.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let (east, north) = offset_km(a, b);
    east.hypot(north)
}

/// Bearing in [0, 360) from `from` toward `to`. Equal points give 0.
pub fn bearing(from: Coordinate, to: Coordinate) -> f64 {
    let (east, north) = offset_km(from, to);
    heading_of(east, north)
}

/// Heading of a planar vector; the zero vector maps to 0.
pub fn heading_of(east: f64, north: f64) -> f64 {
    if east == 0.0 && north == 0.0 {
        return 0.0;
    }
    normalize_heading(east.atan2(north).to_degrees())
}

/// Velocity as (east, north) in km/s.
pub fn velocity_km_s(heading_deg: f64, speed_kn: f64) -> (f64, f64) {
    let v = knots_to_km_per_sec(speed_kn);
    let h = heading_deg.to_radians();
    (v * h.sin(), v * h.cos())
}

/// Noise-free position update.
pub fn advance_exact(pos: Coordinate, heading_deg: f64, speed_kn: f64, dt_secs: f64) -> Coordinate {
    let (ve, vn) = velocity_km_s(heading_deg, speed_kn);
    displace(pos, ve * dt_secs, vn * dt_secs)
}

/// Position update with bounded station-keeping noise: the track made
/// good deviates from `heading_deg` by up to `heading_jitter_deg`, and the
/// hull slips sideways by up to `lateral_drift_m`. A stationary vessel
/// does not move.
pub fn advance(
    pos:         Coordinate,
    heading_deg: f64,
    speed_kn:    f64,
    dt_secs:     f64,
    noise:       &NoiseConfig,
    rng:         &mut StreamRng,
) -> Coordinate {
    if speed_kn <= 0.0 || dt_secs <= 0.0 {
        return pos;
    }
    let track = heading_deg + rng.symmetric(noise.heading_jitter_deg);
    let moved = advance_exact(pos, track, speed_kn, dt_secs);

    let slip_km = rng.symmetric(noise.lateral_drift_m) / 1000.0;
    let beam = (track + 90.0).to_radians();
    displace(moved, slip_km * beam.sin(), slip_km * beam.cos())
}
