//! The simulation stepper — advances the whole fleet one tick at a time.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Clock advances.
//!   2. Adversaries step, in fleet order.
//!   3. Adversary contacts are collected (post-move).
//!   4. Friendlies step, in fleet order, reading those contacts.
//!   5. One snapshot per vessel, stamped with the tick's virtual time.
//!
//! RULES:
//!   - Adversaries settle before any friendly computes a bearing.
//!   - All randomness flows through the RngBank streams, created once
//!     per engine; a fixed seed gives an identical snapshot sequence.

use crate::{
    clock::{self, SimClock},
    config::SimConfig,
    error::{SimError, SimResult},
    event::FleetEvent,
    geo::Coordinate,
    rng::{RngBank, StreamRng, StreamSlot},
    snapshot::Snapshot,
    tactics,
    types::{Tick, VesselId},
    vessel::{station_point, Contact, Role, StepEnv, Vessel},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Everything one tick produced.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub tick:      Tick,
    pub timestamp: DateTime<Utc>,
    pub snapshots: Vec<Snapshot>,
    pub events:    Vec<FleetEvent>,
}

pub struct SimEngine {
    pub clock:     SimClock,
    config:        SimConfig,
    seed:          u64,
    vessels:       Vec<Vessel>,
    adversary_rng: StreamRng,
    friendly_rng:  StreamRng,
    noise_rng:     StreamRng,
}

impl SimEngine {
    /// Engine over an explicit fleet. Assignments already on the
    /// vessels are kept as-is.
    pub fn with_fleet(seed: u64, config: SimConfig, vessels: Vec<Vessel>) -> SimResult<Self> {
        config.validate()?;
        let bank = RngBank::new(seed);
        let epoch = config.clock.start_time.unwrap_or_else(clock::default_epoch);
        Ok(Self {
            clock:         SimClock::new(epoch, config.clock.tick_secs),
            adversary_rng: bank.for_stream(StreamSlot::Adversary),
            friendly_rng:  bank.for_stream(StreamSlot::Friendly),
            noise_rng:     bank.for_stream(StreamSlot::Noise),
            config,
            seed,
            vessels,
        })
    }

    /// Build a fully populated engine: spawn the fleet inside the area,
    /// then run tactical assignment.
    pub fn build(seed: u64, config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let mut setup = RngBank::new(seed).for_stream(StreamSlot::Setup);
        let mut vessels = spawn_fleet(&config, &mut setup);
        let assignments = tactics::assign(&mut vessels, &config.tactics);
        log::info!(
            "Engine built: seed={seed} friendlies={} adversaries={} assignments={}",
            config.fleet.friendly_count,
            config.fleet.adversary_count,
            assignments.len()
        );
        Self::with_fleet(seed, config, vessels)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn vessels(&self) -> &[Vessel] {
        &self.vessels
    }

    pub fn vessel(&self, id: &str) -> Option<&Vessel> {
        self.vessels.iter().find(|v| v.id == id)
    }

    /// Remove a vessel mid-run. Friendlies assigned to it go idle on
    /// their next step.
    pub fn remove_vessel(&mut self, id: &str) -> Option<Vessel> {
        let idx = self.vessels.iter().position(|v| v.id == id)?;
        Some(self.vessels.remove(idx))
    }

    /// The projected station point a friendly is steering for right now.
    /// Fails with `NoActiveTarget` when `id` is not a friendly with a
    /// live target and a station.
    pub fn station_of(&self, id: &str) -> SimResult<Coordinate> {
        let no_target = || SimError::NoActiveTarget { vessel: id.to_string() };
        let fs = self.vessel(id).and_then(Vessel::friendly_state).ok_or_else(no_target)?;
        let station = fs.station.ok_or_else(no_target)?;
        let target = fs
            .target
            .as_deref()
            .and_then(|t| self.vessel(t))
            .filter(|v| matches!(v.role, Role::Adversary(_)))
            .ok_or_else(no_target)?;
        Ok(station_point(&target.contact(), &station, self.config.friendly.lead_secs))
    }

    /// Snapshots of the fleet at the current tick, without advancing.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        let now = self.clock.now();
        self.vessels.iter().map(|v| v.snapshot(now)).collect()
    }

    /// Advance one tick. This is the core simulation step.
    pub fn tick(&mut self) -> TickOutput {
        let tick = self.clock.advance();
        let dt = self.clock.tick_secs;

        for v in self.vessels.iter_mut().filter(|v| matches!(v.role, Role::Adversary(_))) {
            v.step_adversary(&self.config, dt, &mut self.adversary_rng, &mut self.noise_rng);
        }

        let contacts: Vec<Contact> = self.vessels.iter().map(Vessel::contact).collect();
        let adversaries: HashMap<VesselId, Contact> = self
            .vessels
            .iter()
            .filter(|v| matches!(v.role, Role::Adversary(_)))
            .map(|v| (v.id.clone(), v.contact()))
            .collect();

        let env = StepEnv {
            tick,
            dt_secs: dt,
            config: &self.config,
            adversaries: &adversaries,
            contacts: &contacts,
        };

        let mut events = Vec::new();
        for v in self.vessels.iter_mut().filter(|v| matches!(v.role, Role::Friendly(_))) {
            events.extend(v.step_friendly(&env, &mut self.friendly_rng, &mut self.noise_rng));
        }

        let timestamp = self.clock.now();
        let snapshots = self.vessels.iter().map(|v| v.snapshot(timestamp)).collect();
        log::debug!("tick={tick} vessels={} events={}", self.vessels.len(), events.len());

        TickOutput { tick, timestamp, snapshots, events }
    }

    /// Run n ticks in a loop. Used for testing and log generation.
    pub fn run_ticks(&mut self, n: u64) -> Vec<TickOutput> {
        (0..n).map(|_| self.tick()).collect()
    }
}

/// Scatter the fleet uniformly over the area box. Adversaries get a
/// random course and a cruising speed; friendlies start stopped.
fn spawn_fleet(config: &SimConfig, rng: &mut StreamRng) -> Vec<Vessel> {
    let area = &config.area;
    let random_position = |rng: &mut StreamRng| {
        Coordinate::new(
            area.center_lat + rng.symmetric(area.radius_deg),
            area.center_lon + rng.symmetric(area.radius_deg),
        )
    };

    let mut vessels = Vec::with_capacity(config.fleet.adversary_count + config.fleet.friendly_count);
    for i in 1..=config.fleet.adversary_count {
        let position = random_position(rng);
        let heading = rng.uniform(0.0, 360.0);
        let speed = rng.uniform(config.adversary.min_speed_kn, config.adversary.max_speed_kn);
        vessels.push(Vessel::adversary(format!("adv-{i}"), position, heading, speed));
    }
    for i in 1..=config.fleet.friendly_count {
        let position = random_position(rng);
        let heading = rng.uniform(0.0, 360.0);
        vessels.push(Vessel::friendly(format!("usv-{i}"), position, heading));
    }
    vessels
}
