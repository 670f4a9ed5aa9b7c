//! Shared primitive types used across the entire simulation.

/// A simulation tick. One tick = one fixed quantum of virtual time.
pub type Tick = u64;

/// A stable, unique identifier for any vessel in the simulation.
/// Recorded logs may carry integer ids; ingest normalises them to strings.
pub type VesselId = String;

/// Identifier of one driver run (one live session or one playback).
pub type RunId = String;
