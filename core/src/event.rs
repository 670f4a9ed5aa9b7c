//! Fleet events — the notable state changes a tick produced.
//!
//! The stepper returns these alongside the tick's snapshots. They are
//! never required to reconstruct state (snapshots are complete); they
//! exist so drivers and tools can log or surface what changed.

use crate::{
    types::{Tick, VesselId},
    vessel::{ErrorCause, Status},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Variants are appended — never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FleetEvent {
    StatusChanged {
        tick:      Tick,
        vessel_id: VesselId,
        from:      Status,
        to:        Status,
    },
    ErrorRaised {
        tick:      Tick,
        vessel_id: VesselId,
        cause:     ErrorCause,
    },
    ErrorCleared {
        tick:      Tick,
        vessel_id: VesselId,
        cause:     ErrorCause,
    },
    BatteryDepleted {
        tick:      Tick,
        vessel_id: VesselId,
    },
    TargetLost {
        tick:      Tick,
        vessel_id: VesselId,
        target_id: VesselId,
    },
}

impl FleetEvent {
    pub fn vessel_id(&self) -> &str {
        match self {
            Self::StatusChanged { vessel_id, .. }
            | Self::ErrorRaised { vessel_id, .. }
            | Self::ErrorCleared { vessel_id, .. }
            | Self::BatteryDepleted { vessel_id, .. }
            | Self::TargetLost { vessel_id, .. } => vessel_id,
        }
    }
}

impl fmt::Display for FleetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusChanged { tick, vessel_id, from, to } => {
                write!(f, "tick={tick} {vessel_id}: {from} -> {to}")
            }
            Self::ErrorRaised { tick, vessel_id, cause } => {
                write!(f, "tick={tick} {vessel_id}: error raised ({cause})")
            }
            Self::ErrorCleared { tick, vessel_id, cause } => {
                write!(f, "tick={tick} {vessel_id}: error cleared ({cause})")
            }
            Self::BatteryDepleted { tick, vessel_id } => {
                write!(f, "tick={tick} {vessel_id}: battery depleted")
            }
            Self::TargetLost { tick, vessel_id, target_id } => {
                write!(f, "tick={tick} {vessel_id}: target {target_id} lost")
            }
        }
    }
}
