//! World State Store — the shared map from vessel id to latest snapshot.
//!
//! RULES:
//!   - Only the active driver writes; any number of observers read.
//!   - A batch is applied under one write lock, so readers see either
//!     all of it or none of it.
//!   - Entries are replaced whole, never patched.
//!   - Every `reset` starts a new epoch. A write carrying an old epoch is
//!     rejected, which fences off a driver that outlived its stop timeout.

use crate::{snapshot::Snapshot, types::VesselId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Generation number of the store's contents.
pub type Epoch = u64;

#[derive(Debug, Default)]
struct WorldInner {
    epoch:   Epoch,
    vessels: HashMap<VesselId, Snapshot>,
    /// Batches applied in the current epoch.
    updates: u64,
}

#[derive(Debug, Default)]
pub struct WorldState {
    inner: RwLock<WorldInner>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking writer cannot leave a half-applied batch behind (the
    // map is only touched inside `apply_batch`), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, WorldInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorldInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear all entries and open a new epoch. Returns the new epoch.
    pub fn reset(&self) -> Epoch {
        let mut inner = self.write();
        inner.epoch += 1;
        inner.vessels.clear();
        inner.updates = 0;
        inner.epoch
    }

    pub fn epoch(&self) -> Epoch {
        self.read().epoch
    }

    /// Apply one batch atomically. Returns false (and changes nothing)
    /// when `epoch` is no longer current.
    pub fn apply_batch(&self, epoch: Epoch, batch: Vec<Snapshot>) -> bool {
        let mut inner = self.write();
        if inner.epoch != epoch {
            log::warn!(
                "Rejected stale batch of {} snapshots (epoch {epoch}, current {})",
                batch.len(),
                inner.epoch
            );
            return false;
        }
        for snapshot in batch {
            inner.vessels.insert(snapshot.vessel_id.clone(), snapshot);
        }
        inner.updates += 1;
        true
    }

    /// Copy of every entry, ordered by vessel id.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        let mut out: Vec<Snapshot> = self.read().vessels.values().cloned().collect();
        out.sort_by(|a, b| a.vessel_id.cmp(&b.vessel_id));
        out
    }

    pub fn get(&self, vessel_id: &str) -> Option<Snapshot> {
        self.read().vessels.get(vessel_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().vessels.is_empty()
    }

    /// Batches applied since the last reset.
    pub fn update_count(&self) -> u64 {
        self.read().updates
    }
}
