//! Vessel entity — one mobile unit and its per-tick update rule.
//!
//! A vessel is a shared kinematic base (id, position, heading, speed)
//! plus a closed role variant: `Friendly` carries battery, status,
//! error and station assignment; `Adversary` carries its wander state.
//!
//! FRIENDLY STATUS TRANSITIONS (evaluated once per tick, first match wins):
//!   1. IDLE/TRACKING -> ERROR     random, rate-scaled by dt, only if battery > 0
//!   2. ERROR -> IDLE              random, only for recoverable causes
//!   3. IDLE -> TRACKING           target resolves and battery > minimum
//!   4. TRACKING -> IDLE           battery at minimum or target gone
//! Battery exhaustion after movement forces speed 0 and TRACKING -> IDLE.
//!
//! INVARIANTS (after every step):
//!   - 0 <= speed <= faction max
//!   - heading in [0, 360)
//!   - 0 <= battery <= 100, never increases
//!   - status ERROR => speed == 0

use crate::{
    config::{AdversaryConfig, FriendlyConfig, SimConfig},
    event::FleetEvent,
    geo::{self, Coordinate},
    rng::StreamRng,
    snapshot::{Snapshot, SnapshotDetail},
    types::{Tick, VesselId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Friendly,
    Adversary,
}

impl Faction {
    /// Tag used in the recorded-log `type` field.
    pub fn wire_tag(&self) -> &'static str {
        match self {
            Self::Friendly  => "usv",
            Self::Adversary => "adversary",
        }
    }

    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "usv" | "friendly" | "friend" => Some(Self::Friendly),
            "adversary" | "enemy" | "hostile" => Some(Self::Adversary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Idle,
    Tracking,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle     => "IDLE",
            Self::Tracking => "TRACKING",
            Self::Error    => "ERROR",
        }
    }

    /// Parse a recorded status. `MOVING` is the legacy name for TRACKING.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IDLE" => Some(Self::Idle),
            "TRACKING" | "MOVING" => Some(Self::Tracking),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCause {
    MotorFailure,
    GpsSignalLost,
    CommsTimeout,
}

impl ErrorCause {
    pub const ALL: [ErrorCause; 3] = [
        ErrorCause::MotorFailure,
        ErrorCause::GpsSignalLost,
        ErrorCause::CommsTimeout,
    ];

    /// Signal losses clear on their own; a motor failure never does.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::MotorFailure)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MotorFailure  => "Motor Failure",
            Self::GpsSignalLost => "GPS Signal Lost",
            Self::CommsTimeout  => "Comms Timeout",
        }
    }
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a friendly holds relative to its target: a bearing offset from
/// the target's heading and a stand-off distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub bearing_offset_deg: f64,
    pub standoff_km:        f64,
}

/// Read-only view of a vessel's kinematics at one point of a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id:       VesselId,
    pub position: Coordinate,
    pub heading:  f64,
    pub speed_kn: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FriendlyState {
    pub battery_pct: f64,
    pub status:      Status,
    pub error:       Option<ErrorCause>,
    /// Adversary id, re-resolved every tick. Never an owning reference.
    pub target:      Option<VesselId>,
    pub station:     Option<Station>,
}

impl FriendlyState {
    fn new() -> Self {
        Self {
            battery_pct: 100.0,
            status:      Status::Idle,
            error:       None,
            target:      None,
            station:     None,
        }
    }

    pub fn error_detail(&self) -> &'static str {
        self.error.map(|c| c.label()).unwrap_or("")
    }

    /// Look the assigned target up in this tick's adversary set. None is
    /// a valid idle condition, not a failure.
    pub fn resolve_target<'a>(&self, adversaries: &'a HashMap<VesselId, Contact>) -> Option<&'a Contact> {
        self.target.as_ref().and_then(|id| adversaries.get(id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdversaryState {
    /// Virtual seconds since the desired course was last reconsidered.
    pub since_retarget_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Friendly(FriendlyState),
    Adversary(AdversaryState),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vessel {
    pub id:               VesselId,
    pub position:         Coordinate,
    pub heading:          f64,
    pub speed_kn:         f64,
    pub desired_heading:  f64,
    pub desired_speed_kn: f64,
    pub role:             Role,
}

/// Everything a vessel reads from the rest of the world during one step.
pub struct StepEnv<'a> {
    pub tick:        Tick,
    pub dt_secs:     f64,
    pub config:      &'a SimConfig,
    /// Adversaries as they stand after this tick's adversary phase.
    pub adversaries: &'a HashMap<VesselId, Contact>,
    /// All vessels at the start of the friendly phase.
    pub contacts:    &'a [Contact],
}

impl Vessel {
    pub fn friendly(id: impl Into<VesselId>, position: Coordinate, heading: f64) -> Self {
        let heading = geo::normalize_heading(heading);
        Self {
            id: id.into(),
            position,
            heading,
            speed_kn: 0.0,
            desired_heading: heading,
            desired_speed_kn: 0.0,
            role: Role::Friendly(FriendlyState::new()),
        }
    }

    pub fn adversary(id: impl Into<VesselId>, position: Coordinate, heading: f64, speed_kn: f64) -> Self {
        let heading = geo::normalize_heading(heading);
        let speed_kn = speed_kn.max(0.0);
        Self {
            id: id.into(),
            position,
            heading,
            speed_kn,
            desired_heading: heading,
            desired_speed_kn: speed_kn,
            role: Role::Adversary(AdversaryState { since_retarget_secs: 0.0 }),
        }
    }

    /// Builder-style target + station assignment for friendlies.
    /// No effect on adversaries.
    pub fn with_assignment(mut self, target: impl Into<VesselId>, station: Station) -> Self {
        self.assign(target.into(), station);
        self
    }

    pub fn assign(&mut self, target: VesselId, station: Station) {
        if let Role::Friendly(fs) = &mut self.role {
            fs.target = Some(target);
            fs.station = Some(station);
        }
    }

    pub fn faction(&self) -> Faction {
        match self.role {
            Role::Friendly(_)  => Faction::Friendly,
            Role::Adversary(_) => Faction::Adversary,
        }
    }

    pub fn friendly_state(&self) -> Option<&FriendlyState> {
        match &self.role {
            Role::Friendly(fs) => Some(fs),
            Role::Adversary(_) => None,
        }
    }

    pub fn contact(&self) -> Contact {
        Contact {
            id:       self.id.clone(),
            position: self.position,
            heading:  self.heading,
            speed_kn: self.speed_kn,
        }
    }

    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> Snapshot {
        let detail = match &self.role {
            Role::Friendly(fs) => SnapshotDetail::Friendly {
                battery_pct:   fs.battery_pct,
                status:        fs.status,
                error_details: fs.error_detail().to_string(),
                target_id:     fs.target.clone(),
            },
            Role::Adversary(_) => SnapshotDetail::Adversary,
        };
        Snapshot {
            timestamp,
            vessel_id:   self.id.clone(),
            position:    self.position,
            speed_kn:    self.speed_kn,
            heading_deg: self.heading,
            detail,
        }
    }

    /// Turn and throttle toward the desired course within rate caps.
    fn apply_rate_limits(&mut self, turn_rate: f64, accel: f64, decel: f64, max_speed: f64, dt: f64) {
        self.heading = geo::turn_toward(self.heading, self.desired_heading, turn_rate * dt);
        let target = self.desired_speed_kn.clamp(0.0, max_speed);
        let delta = target - self.speed_kn;
        let step = if delta >= 0.0 { delta.min(accel * dt) } else { delta.max(-decel * dt) };
        self.speed_kn = (self.speed_kn + step).clamp(0.0, max_speed);
    }

    // ── Adversary ──────────────────────────────────────────────

    /// Autonomous wander: periodic random re-target of course and speed,
    /// pulled back toward the area centre once outside the area.
    pub fn step_adversary(
        &mut self,
        config:    &SimConfig,
        dt:        f64,
        rng:       &mut StreamRng,
        noise_rng: &mut StreamRng,
    ) {
        let cfg: &AdversaryConfig = &config.adversary;
        let Role::Adversary(state) = &mut self.role else {
            return;
        };

        state.since_retarget_secs += dt;
        if cfg.retarget_interval_secs > 0.0 && state.since_retarget_secs >= cfg.retarget_interval_secs {
            state.since_retarget_secs = 0.0;
            let center = Coordinate::new(config.area.center_lat, config.area.center_lon);
            let outside = (self.position.lat - center.lat).abs() > config.area.radius_deg
                || (self.position.lon - center.lon).abs() > config.area.radius_deg;
            if outside {
                self.desired_heading = geo::bearing(self.position, center);
                self.desired_speed_kn = rng.uniform(cfg.min_speed_kn, cfg.max_speed_kn);
            } else if rng.chance(cfg.retarget_probability) {
                self.desired_heading = geo::normalize_heading(
                    self.desired_heading + rng.symmetric(cfg.max_course_change_deg),
                );
                self.desired_speed_kn = rng.uniform(cfg.min_speed_kn, cfg.max_speed_kn);
            }
        }

        self.apply_rate_limits(
            cfg.turn_rate_deg_per_sec,
            cfg.accel_kn_per_sec,
            cfg.decel_kn_per_sec,
            cfg.max_speed_kn,
            dt,
        );
        self.position = geo::advance(self.position, self.heading, self.speed_kn, dt, &config.noise, noise_rng);
    }

    // ── Friendly ───────────────────────────────────────────────

    /// One friendly step: status transition, guidance, rate limits,
    /// battery drain, movement. Returns the events the step produced.
    pub fn step_friendly(
        &mut self,
        env:       &StepEnv<'_>,
        rng:       &mut StreamRng,
        noise_rng: &mut StreamRng,
    ) -> Vec<FleetEvent> {
        let cfg: &FriendlyConfig = &env.config.friendly;
        let dt = env.dt_secs;
        let tick = env.tick;
        let id = self.id.clone();
        let mut events = Vec::new();

        let Role::Friendly(fs) = &mut self.role else {
            return events;
        };

        // Target availability is absorbed locally: no target is a valid idle condition.
        let target = fs.resolve_target(env.adversaries).cloned();
        let before = fs.status;

        if fs.status != Status::Error && fs.battery_pct > 0.0 && rng.chance_over(cfg.error_rate_per_sec, dt) {
            let cause = *rng.pick(&ErrorCause::ALL).unwrap_or(&ErrorCause::MotorFailure);
            fs.status = Status::Error;
            fs.error = Some(cause);
            events.push(FleetEvent::ErrorRaised { tick, vessel_id: id.clone(), cause });
        } else if fs.status == Status::Error {
            if let Some(cause) = fs.error.filter(|c| c.is_recoverable()) {
                if rng.chance_over(cfg.recover_rate_per_sec, dt) {
                    fs.status = Status::Idle;
                    fs.error = None;
                    events.push(FleetEvent::ErrorCleared { tick, vessel_id: id.clone(), cause });
                }
            }
        } else if fs.status == Status::Idle && target.is_some() && fs.battery_pct > cfg.min_battery_pct {
            fs.status = Status::Tracking;
        } else if fs.status == Status::Tracking && (fs.battery_pct <= cfg.min_battery_pct || target.is_none()) {
            fs.status = Status::Idle;
            if let (None, Some(target_id)) = (&target, &fs.target) {
                events.push(FleetEvent::TargetLost { tick, vessel_id: id.clone(), target_id: target_id.clone() });
            }
        }

        let status = fs.status;
        let station = fs.station;

        match (status, target.as_ref(), station) {
            (Status::Error, _, _) => {
                self.desired_speed_kn = 0.0;
                self.speed_kn = 0.0;
            }
            (Status::Tracking, Some(target), Some(station)) => {
                self.guide(target, &station, env);
            }
            _ => {
                self.desired_speed_kn = 0.0;
            }
        }

        self.apply_rate_limits(
            cfg.turn_rate_deg_per_sec,
            cfg.accel_kn_per_sec,
            cfg.decel_kn_per_sec,
            cfg.max_speed_kn,
            dt,
        );

        let Role::Friendly(fs) = &mut self.role else {
            return events;
        };
        if fs.status == Status::Error {
            self.speed_kn = 0.0;
        }

        let had_charge = fs.battery_pct > 0.0;
        let drain = cfg.battery_drain_coeff * self.speed_kn.powi(cfg.battery_drain_exponent) * dt;
        fs.battery_pct = (fs.battery_pct - drain).clamp(0.0, 100.0);
        if fs.battery_pct <= 0.0 {
            self.speed_kn = 0.0;
            self.desired_speed_kn = 0.0;
            if fs.status == Status::Tracking {
                fs.status = Status::Idle;
            }
            if had_charge {
                events.push(FleetEvent::BatteryDepleted { tick, vessel_id: id.clone() });
            }
        }

        if fs.status != before {
            events.push(FleetEvent::StatusChanged { tick, vessel_id: id, from: before, to: fs.status });
        }

        self.position = geo::advance(
            self.position,
            self.heading,
            self.speed_kn,
            dt,
            &env.config.noise,
            noise_rng,
        );
        events
    }

    /// Pick the desired course while TRACKING.
    ///
    /// far band -> full speed at the station point; medium band -> cruise;
    /// arrival band -> match the target's velocity plus a proportional
    /// correction toward station. Any vessel inside the collision radius
    /// overrides all of it: slow down and open the range.
    fn guide(&mut self, target: &Contact, station: &Station, env: &StepEnv<'_>) {
        let cfg = &env.config.friendly;

        let threat = env
            .contacts
            .iter()
            .filter(|c| c.id != self.id)
            .map(|c| (c, geo::distance(self.position, c.position)))
            .filter(|(_, d)| *d < cfg.collision_radius_km)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((other, _)) = threat {
            self.desired_heading = geo::bearing(other.position, self.position);
            self.desired_speed_kn = cfg.avoid_speed_kn;
            return;
        }

        let point = station_point(target, station, cfg.lead_secs);
        let range = geo::distance(self.position, point);

        if range > cfg.far_range_km {
            self.desired_heading = geo::bearing(self.position, point);
            self.desired_speed_kn = cfg.max_speed_kn;
        } else if range > cfg.arrival_range_km {
            self.desired_heading = geo::bearing(self.position, point);
            self.desired_speed_kn = cfg.cruise_speed_kn;
        } else {
            let (oe, on) = geo::offset_km(self.position, point);
            let (te, tn) = geo::velocity_km_s(target.heading, target.speed_kn);
            let ve = te + cfg.station_gain_per_sec * oe;
            let vn = tn + cfg.station_gain_per_sec * on;
            let speed = geo::km_per_sec_to_knots(ve.hypot(vn));
            if speed > 1e-6 {
                self.desired_heading = geo::heading_of(ve, vn);
            }
            self.desired_speed_kn = speed.min(cfg.max_speed_kn);
        }
    }
}

/// The point a friendly holds: the target's position projected
/// `lead_secs` ahead along its track, then offset by the station
/// bearing (relative to the target's heading) and stand-off distance.
pub fn station_point(target: &Contact, station: &Station, lead_secs: f64) -> Coordinate {
    let led = geo::advance_exact(target.position, target.heading, target.speed_kn, lead_secs);
    let brg = (target.heading + station.bearing_offset_deg).to_radians();
    geo::displace(led, station.standoff_km * brg.sin(), station.standoff_km * brg.cos())
}
