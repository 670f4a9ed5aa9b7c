//! Mode arbiter — at most one driver (live or playback) at a time.
//!
//! Installing a driver, in order:
//!   1. Construct and validate the new driver (a bad request changes nothing).
//!   2. Stop the current driver, waiting up to `pacing.stop_timeout_ms`.
//!      A timeout is logged and the install proceeds; the store's epoch
//!      fence keeps the straggler from writing.
//!   3. Reset the store (new epoch).
//!   4. Spawn the new driver's thread.
//!
//! Commands are serialised on the `active` mutex, which may be held for
//! a whole stop timeout. Queries never touch it: they read `status`, a
//! separate lock held only for a clone.

use crate::{
    clock::SpeedControl,
    config::SimConfig,
    driver::{
        live::LiveDriver, playback::PlaybackDriver, Driver, DriverContext, DriverHandle,
        DriverStatus,
    },
    engine::SimEngine,
    error::{SimError, SimResult},
    rng,
    snapshot::Snapshot,
    types::RunId,
    world::WorldState,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Live,
    Playback,
}

/// Result of the query interface: a copy of the store plus driver status.
#[derive(Debug, Clone, Serialize)]
pub struct WorldView {
    pub snapshots:        Vec<Snapshot>,
    pub active:           bool,
    pub speed_multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode:             Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id:           Option<RunId>,
}

struct ActiveDriver {
    mode:   Mode,
    handle: DriverHandle,
}

pub struct ModeArbiter {
    config: SimConfig,
    world:  Arc<WorldState>,
    speed:  Arc<SpeedControl>,
    active: Mutex<Option<ActiveDriver>>,
    status: RwLock<Option<(Mode, DriverStatus)>>,
}

impl ModeArbiter {
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            speed:  Arc::new(SpeedControl::new(&config.pacing)),
            world:  Arc::new(WorldState::new()),
            active: Mutex::new(None),
            status: RwLock::new(None),
            config,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Shared store handle, for observers that poll it directly.
    pub fn world(&self) -> Arc<WorldState> {
        Arc::clone(&self.world)
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveDriver>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.config.pacing.stop_timeout_ms)
    }

    /// Start a live run with the configured seed, or a fresh one.
    pub fn start_live(&self) -> SimResult<RunId> {
        let seed = self.config.seed.unwrap_or_else(rng::fresh_seed);
        self.start_live_seeded(seed)
    }

    pub fn start_live_seeded(&self, seed: u64) -> SimResult<RunId> {
        let engine = SimEngine::build(seed, self.config.clone())?;
        log::info!("Live run seeded with {seed}");
        self.install(Mode::Live, Box::new(LiveDriver::new(engine)))
    }

    pub fn start_playback(&self, log: Vec<Snapshot>) -> SimResult<RunId> {
        let driver = PlaybackDriver::new(log)?;
        log::info!(
            "Playback of {} records in {} batches",
            driver.len(),
            driver.batch_count()
        );
        self.install(Mode::Playback, Box::new(driver))
    }

    /// Stop the active driver, if any. A stop timeout is logged, not returned.
    pub fn stop(&self) -> SimResult<()> {
        let mut slot = self.slot();
        self.stop_active(&mut slot);
        Ok(())
    }

    /// Returns the effective (clamped) multiplier.
    pub fn set_speed(&self, multiplier: f64) -> SimResult<f64> {
        self.speed.set(multiplier)
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.speed.multiplier()
    }

    fn current(&self) -> Option<(Mode, DriverStatus)> {
        self.status.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_current(&self, current: Option<(Mode, DriverStatus)>) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = current;
    }

    pub fn is_active(&self) -> bool {
        self.current().is_some_and(|(_, s)| !s.is_finished())
    }

    pub fn world_state(&self) -> WorldView {
        let (active, mode, run_id) = match self.current() {
            Some((mode, status)) => (!status.is_finished(), Some(mode), Some(status.run_id)),
            None => (false, None, None),
        };
        WorldView {
            snapshots: self.world.snapshots(),
            active,
            speed_multiplier: self.speed.multiplier(),
            mode,
            run_id,
        }
    }

    fn stop_active(&self, slot: &mut Option<ActiveDriver>) {
        let Some(current) = slot.take() else {
            return;
        };
        self.set_current(None);
        match current.handle.stop(self.stop_timeout()) {
            Ok(report) => log::info!(
                "Stopped {:?} driver after {} batches ({:?})",
                current.mode, report.batches, report.exit
            ),
            Err(e @ SimError::DriverStopTimeout { .. }) => {
                log::warn!("{e}; proceeding with best-effort stop");
            }
            Err(e) => log::error!("Stopping {:?} driver failed: {e}", current.mode),
        }
    }

    fn install(&self, mode: Mode, driver: Box<dyn Driver>) -> SimResult<RunId> {
        let mut slot = self.slot();
        self.stop_active(&mut slot);

        let epoch = self.world.reset();
        let run_id = uuid::Uuid::new_v4().to_string();
        let ctx = DriverContext {
            run_id: run_id.clone(),
            world:  Arc::clone(&self.world),
            epoch,
            speed:  Arc::clone(&self.speed),
        };
        let handle = DriverHandle::spawn(driver, ctx)?;
        self.set_current(Some((mode, handle.status())));
        *slot = Some(ActiveDriver { mode, handle });
        log::info!("Installed {mode:?} driver (run {run_id}, epoch {epoch})");
        Ok(run_id)
    }
}

impl Drop for ModeArbiter {
    fn drop(&mut self) {
        let mut slot = self.slot();
        self.stop_active(&mut slot);
    }
}
