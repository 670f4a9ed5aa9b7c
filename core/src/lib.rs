//! Swarm simulation and live-state engine.
//!
//! Bottom-up: `geo` (planar kinematics) -> `vessel` (entity + state
//! machine) -> `tactics` (target assignment) -> `engine` (fleet stepper)
//! -> `world` (shared latest-state store) -> `driver` (playback and live
//! producers) -> `arbiter` (one driver at a time) -> `command` (the
//! serialisable command interface).

pub mod arbiter;
pub mod clock;
pub mod command;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod event;
pub mod geo;
pub mod ingest;
pub mod rng;
pub mod snapshot;
pub mod tactics;
pub mod types;
pub mod vessel;
pub mod world;
