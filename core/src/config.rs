//! Run configuration.
//!
//! Every constant the stepper and drivers read lives here. Production
//! values come from `SimConfig::default()` or a JSON file via `load()`;
//! tests use `SimConfig::default_test()`, which pins the seed and the
//! virtual start time so runs are reproducible.

use crate::error::{SimError, SimResult};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ── Area ───────────────────────────────────────────────────────────

/// Operating area. The bound is soft: vessels may drift outside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    /// Half-width of the spawn box, in degrees.
    pub radius_deg: f64,
}

impl Default for AreaConfig {
    fn default() -> Self {
        // Taiwan Strait near Penghu County.
        Self { center_lat: 24.0, center_lon: 119.5, radius_deg: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub friendly_count:  usize,
    pub adversary_count: usize,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self { friendly_count: 20, adversary_count: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Virtual seconds advanced per tick.
    pub tick_secs: f64,
    /// Virtual time of tick 0. None = midnight UTC of the current day.
    pub start_time: Option<DateTime<Utc>>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { tick_secs: 1.0, start_time: None }
    }
}

// ── Vessel dynamics ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FriendlyConfig {
    pub max_speed_kn:          f64,
    /// Speed held in the medium band while closing on station.
    pub cruise_speed_kn:       f64,
    pub accel_kn_per_sec:      f64,
    pub decel_kn_per_sec:      f64,
    pub turn_rate_deg_per_sec: f64,
    /// Battery drain per second = coeff * speed^exponent.
    pub battery_drain_coeff:    f64,
    pub battery_drain_exponent: i32,
    /// Below or at this level the vessel will not track.
    pub min_battery_pct:       f64,
    pub error_rate_per_sec:    f64,
    pub recover_rate_per_sec:  f64,
    /// Beyond this range from station: full speed.
    pub far_range_km:          f64,
    /// Within this range from station: velocity-matching station keeping.
    pub arrival_range_km:      f64,
    /// Any other vessel closer than this triggers avoidance.
    pub collision_radius_km:   f64,
    pub avoid_speed_kn:        f64,
    /// Station-keeping gain: closing velocity (km/s) per km of offset.
    pub station_gain_per_sec:  f64,
    /// How far ahead the target's track is projected.
    pub lead_secs:             f64,
}

impl Default for FriendlyConfig {
    fn default() -> Self {
        Self {
            max_speed_kn:           20.0,
            cruise_speed_kn:        16.0,
            accel_kn_per_sec:       1.0,
            decel_kn_per_sec:       2.0,
            turn_rate_deg_per_sec:  12.0,
            battery_drain_coeff:    2.0e-6,
            battery_drain_exponent: 3,
            min_battery_pct:        5.0,
            error_rate_per_sec:     0.002,
            recover_rate_per_sec:   0.05,
            far_range_km:           2.0,
            arrival_range_km:       0.5,
            collision_radius_km:    0.05,
            avoid_speed_kn:         3.0,
            station_gain_per_sec:   0.02,
            lead_secs:              30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdversaryConfig {
    pub max_speed_kn:           f64,
    pub min_speed_kn:           f64,
    pub accel_kn_per_sec:       f64,
    pub decel_kn_per_sec:       f64,
    pub turn_rate_deg_per_sec:  f64,
    pub retarget_interval_secs: f64,
    /// Chance of picking a new course at each re-target opportunity.
    pub retarget_probability:   f64,
    pub max_course_change_deg:  f64,
}

impl Default for AdversaryConfig {
    fn default() -> Self {
        Self {
            max_speed_kn:           12.0,
            min_speed_kn:           4.0,
            accel_kn_per_sec:       0.5,
            decel_kn_per_sec:       1.0,
            turn_rate_deg_per_sec:  5.0,
            retarget_interval_secs: 60.0,
            retarget_probability:   0.5,
            max_course_change_deg:  45.0,
        }
    }
}

// ── Tactics ────────────────────────────────────────────────────────

/// How friendly vessels are matched to adversaries at run start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPolicy {
    /// Contiguous equal-size groups, remainder to the last group.
    GroupPartition,
    /// Each friendly takes the adversary closest to its start position.
    NearestAdversary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    pub policy: AssignmentPolicy,
    /// Station bearings relative to the target's heading, handed out
    /// round-robin within each group.
    pub station_angles_deg:    Vec<f64>,
    pub intercept_distance_km: f64,
    pub standoff_multiple:     f64,
}

impl TacticsConfig {
    pub fn standoff_km(&self) -> f64 {
        self.intercept_distance_km * self.standoff_multiple
    }
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            policy: AssignmentPolicy::GroupPartition,
            // bow, bow quarters, beams, quarters, stern
            station_angles_deg: vec![0.0, 45.0, -45.0, 90.0, -90.0, 135.0, -135.0, 180.0],
            intercept_distance_km: 0.5,
            standoff_multiple:     1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Bound on the per-tick heading perturbation of the track made good.
    pub heading_jitter_deg: f64,
    /// Bound on the per-tick sideways drift.
    pub lateral_drift_m:    f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self { heading_jitter_deg: 1.0, lateral_drift_m: 1.0 }
    }
}

// ── Pacing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Wall-clock wait between batches at multiplier 1.0.
    pub base_interval_ms: u64,
    pub min_multiplier:   f64,
    pub max_multiplier:   f64,
    /// Bound on waiting for a stopped driver to quiesce.
    pub stop_timeout_ms:  u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 1000,
            min_multiplier:   0.1,
            max_multiplier:   100.0,
            stop_timeout_ms:  2000,
        }
    }
}

/// Upper bound on virtual seconds per tick: one day.
pub const MAX_TICK_SECS: f64 = 86_400.0;

// ── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub area:      AreaConfig,
    pub fleet:     FleetConfig,
    pub clock:     ClockConfig,
    pub friendly:  FriendlyConfig,
    pub adversary: AdversaryConfig,
    pub tactics:   TacticsConfig,
    pub noise:     NoiseConfig,
    pub pacing:    PacingConfig,
    /// Master seed for live runs. None = draw one per run.
    pub seed:      Option<u64>,
}

impl SimConfig {
    /// Load from a JSON file. Missing sections fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config with a pinned seed and start time for use in tests.
    pub fn default_test() -> Self {
        let mut config = Self::default();
        config.seed = Some(0x5EED_0000_0000_0001);
        config.clock.start_time = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single();
        config.pacing.base_interval_ms = 10;
        config.pacing.stop_timeout_ms = 1000;
        config
    }

    pub fn validate(&self) -> SimResult<()> {
        let f = &self.friendly;
        let a = &self.adversary;
        let p = &self.pacing;
        let rate = |v: f64| v.is_finite() && v >= 0.0;
        let checks: [(bool, &str); 17] = [
            (
                self.clock.tick_secs > 0.0 && self.clock.tick_secs <= MAX_TICK_SECS,
                "clock.tick_secs must be in (0, 86400]",
            ),
            (f.max_speed_kn > 0.0 && f.max_speed_kn.is_finite(), "friendly.max_speed_kn must be finite and > 0"),
            (f.cruise_speed_kn <= f.max_speed_kn, "friendly.cruise_speed_kn exceeds max_speed_kn"),
            (f.avoid_speed_kn <= f.max_speed_kn, "friendly.avoid_speed_kn exceeds max_speed_kn"),
            (
                rate(f.accel_kn_per_sec) && rate(f.decel_kn_per_sec) && rate(f.turn_rate_deg_per_sec),
                "friendly accel/decel/turn rates must be finite and >= 0",
            ),
            (rate(f.battery_drain_coeff), "friendly.battery_drain_coeff must be finite and >= 0"),
            (rate(f.error_rate_per_sec) && rate(f.recover_rate_per_sec), "friendly error rates must be finite and >= 0"),
            (f.arrival_range_km <= f.far_range_km, "friendly.arrival_range_km exceeds far_range_km"),
            (a.max_speed_kn > 0.0 && a.max_speed_kn.is_finite(), "adversary.max_speed_kn must be finite and > 0"),
            (rate(a.min_speed_kn), "adversary.min_speed_kn must be finite and >= 0"),
            (a.min_speed_kn <= a.max_speed_kn, "adversary.min_speed_kn exceeds max_speed_kn"),
            (
                rate(a.accel_kn_per_sec) && rate(a.decel_kn_per_sec) && rate(a.turn_rate_deg_per_sec),
                "adversary accel/decel/turn rates must be finite and >= 0",
            ),
            (rate(self.noise.heading_jitter_deg) && rate(self.noise.lateral_drift_m), "noise bounds must be finite and >= 0"),
            (!self.tactics.station_angles_deg.is_empty(), "tactics.station_angles_deg is empty"),
            (p.min_multiplier > 0.0, "pacing.min_multiplier must be > 0"),
            (p.min_multiplier <= p.max_multiplier, "pacing multiplier bounds are inverted"),
            (p.max_multiplier.is_finite(), "pacing.max_multiplier must be finite"),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, reason)) => Err(SimError::InvalidConfig((*reason).to_string())),
            None => Ok(()),
        }
    }
}
