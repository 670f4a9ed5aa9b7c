//! Tactical assignment — who chases whom, and from where.
//!
//! Runs once at run start. The result is held fixed for the whole run:
//! there is no mid-run re-assignment or target hand-off. A friendly whose
//! target later disappears simply falls back to IDLE.
//!
//! Two policies, selected by `TacticsConfig::policy`:
//!   - GroupPartition (default): friendlies, in fleet order, are cut into
//!     contiguous groups of `friendlies / adversaries`; group g chases
//!     adversary g, and any remainder joins the last group.
//!   - NearestAdversary: each friendly chases the adversary closest to
//!     its start position.
//! Within each adversary's pack, station angles are handed out
//! round-robin from `station_angles_deg`. Every station uses the same
//! stand-off distance.

use crate::{
    config::{AssignmentPolicy, TacticsConfig},
    geo,
    vessel::{Contact, Role, Station, Vessel},
    types::VesselId,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub friendly_id: VesselId,
    pub target_id:   VesselId,
    pub station:     Station,
}

/// Compute assignments without touching the fleet.
pub fn plan(friendlies: &[Contact], adversaries: &[Contact], config: &TacticsConfig) -> Vec<Assignment> {
    if friendlies.is_empty() || adversaries.is_empty() || config.station_angles_deg.is_empty() {
        return Vec::new();
    }

    let targets: Vec<usize> = match config.policy {
        AssignmentPolicy::GroupPartition => {
            let group_size = (friendlies.len() / adversaries.len()).max(1);
            (0..friendlies.len())
                .map(|i| (i / group_size).min(adversaries.len() - 1))
                .collect()
        }
        AssignmentPolicy::NearestAdversary => friendlies
            .iter()
            .map(|f| {
                adversaries
                    .iter()
                    .enumerate()
                    .map(|(j, a)| (j, geo::distance(f.position, a.position)))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(j, _)| j)
                    .unwrap_or(0)
            })
            .collect(),
    };

    let standoff_km = config.standoff_km();
    let mut pack_sizes = vec![0usize; adversaries.len()];
    friendlies
        .iter()
        .zip(targets)
        .map(|(f, t)| {
            let slot = pack_sizes[t];
            pack_sizes[t] += 1;
            let angle = config.station_angles_deg[slot % config.station_angles_deg.len()];
            Assignment {
                friendly_id: f.id.clone(),
                target_id:   adversaries[t].id.clone(),
                station:     Station { bearing_offset_deg: angle, standoff_km },
            }
        })
        .collect()
}

/// Plan and apply assignments to the fleet. Returns what was applied.
pub fn assign(vessels: &mut [Vessel], config: &TacticsConfig) -> Vec<Assignment> {
    let friendlies: Vec<Contact> = vessels
        .iter()
        .filter(|v| matches!(v.role, Role::Friendly(_)))
        .map(Vessel::contact)
        .collect();
    let adversaries: Vec<Contact> = vessels
        .iter()
        .filter(|v| matches!(v.role, Role::Adversary(_)))
        .map(Vessel::contact)
        .collect();

    let assignments = plan(&friendlies, &adversaries, config);
    if assignments.is_empty() && !friendlies.is_empty() {
        log::info!("No adversaries to assign; {} friendlies stay idle", friendlies.len());
    }

    for a in &assignments {
        if let Some(v) = vessels.iter_mut().find(|v| v.id == a.friendly_id) {
            v.assign(a.target_id.clone(), a.station);
        }
    }
    log::debug!("tactics: {} assignments ({:?})", assignments.len(), config.policy);
    assignments
}
