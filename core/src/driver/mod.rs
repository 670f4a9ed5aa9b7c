//! Drivers — background producers of world state.
//!
//! RULE: Every driver implements Driver. A driver only produces batches;
//! the shared run loop owns pacing, stop handling and store writes:
//!
//!   loop {
//!       stop raised?          -> exit Stopped
//!       next_batch() == None  -> exit Exhausted
//!       store rejects write   -> exit Superseded
//!       wait interval / speed (woken early by stop)
//!   }
//!
//! The loop runs on its own named thread. `DriverHandle::stop` raises the
//! stop flag, unparks the thread and waits a bounded time for it to finish.

pub mod live;
pub mod playback;

use crate::{
    clock::SpeedControl,
    error::{SimError, SimResult},
    snapshot::Snapshot,
    types::RunId,
    world::{Epoch, WorldState},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// The contract every driver must fulfil.
pub trait Driver: Send + 'static {
    /// Unique stable name for this driver kind.
    fn name(&self) -> &'static str;

    /// Produce the next batch to publish, or None when exhausted.
    fn next_batch(&mut self) -> Option<Vec<Snapshot>>;
}

/// Cooperative stop flag shared between a handle and its run loop.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleep for `interval` on the calling thread, returning early (true)
    /// once the signal is raised. Must be called from the thread that the
    /// raiser unparks.
    pub fn wait(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        loop {
            if self.is_raised() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            // park_timeout may wake spuriously; the loop re-checks both.
            thread::park_timeout(deadline - now);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    /// Stop signal observed.
    Stopped,
    /// Nothing left to publish.
    Exhausted,
    /// The store moved to a newer epoch under this driver.
    Superseded,
}

#[derive(Debug, Clone)]
pub struct DriverReport {
    pub driver:  &'static str,
    pub run_id:  RunId,
    pub batches: u64,
    pub exit:    DriverExit,
}

/// Sets the finished flag however the run loop ends, panics included.
struct FinishGuard(Arc<AtomicBool>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Everything the run loop needs besides the driver itself.
pub struct DriverContext {
    pub run_id: RunId,
    pub world:  Arc<WorldState>,
    pub epoch:  Epoch,
    pub speed:  Arc<SpeedControl>,
}

pub fn run_loop(mut driver: Box<dyn Driver>, ctx: DriverContext, stop: StopSignal) -> DriverReport {
    let name = driver.name();
    let mut batches = 0u64;
    log::info!("Driver '{name}' started (run {})", ctx.run_id);

    let exit = loop {
        if stop.is_raised() {
            break DriverExit::Stopped;
        }
        let Some(batch) = driver.next_batch() else {
            break DriverExit::Exhausted;
        };
        if !ctx.world.apply_batch(ctx.epoch, batch) {
            break DriverExit::Superseded;
        }
        batches += 1;
        if stop.wait(ctx.speed.interval()) {
            break DriverExit::Stopped;
        }
    };

    log::info!("Driver '{name}' finished: {exit:?} after {batches} batches (run {})", ctx.run_id);
    DriverReport { driver: name, run_id: ctx.run_id, batches, exit }
}

/// Cheap, clonable view of a driver's liveness for observers.
#[derive(Debug, Clone)]
pub struct DriverStatus {
    pub driver: &'static str,
    pub run_id: RunId,
    finished:   Arc<AtomicBool>,
}

impl DriverStatus {
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Owner-side handle on one driver's background thread.
pub struct DriverHandle {
    name:     &'static str,
    run_id:   RunId,
    stop:     StopSignal,
    finished: Arc<AtomicBool>,
    thread:   Option<JoinHandle<DriverReport>>,
}

impl DriverHandle {
    pub fn spawn(driver: Box<dyn Driver>, ctx: DriverContext) -> SimResult<Self> {
        let name = driver.name();
        let run_id = ctx.run_id.clone();
        let stop = StopSignal::new();
        let finished = Arc::new(AtomicBool::new(false));

        let loop_stop = stop.clone();
        let guard = FinishGuard(Arc::clone(&finished));
        let thread = thread::Builder::new()
            .name(format!("driver-{name}"))
            .spawn(move || {
                let _guard = guard;
                run_loop(driver, ctx, loop_stop)
            })?;

        Ok(Self { name, run_id, stop, finished, thread: Some(thread) })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn status(&self) -> DriverStatus {
        DriverStatus {
            driver:   self.name,
            run_id:   self.run_id.clone(),
            finished: Arc::clone(&self.finished),
        }
    }

    fn signal_stop(&self) {
        self.stop.raise();
        if let Some(t) = &self.thread {
            t.thread().unpark();
        }
    }

    /// Stop and wait up to `timeout` for the thread to finish. On timeout
    /// the thread is detached; it still exits at its next stop check.
    pub fn stop(mut self, timeout: Duration) -> SimResult<DriverReport> {
        self.signal_stop();
        let start = Instant::now();
        while !self.is_finished() {
            if start.elapsed() >= timeout {
                return Err(SimError::DriverStopTimeout {
                    driver:    self.name.to_string(),
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
            thread::sleep(Duration::from_millis(1));
        }
        let handle = self.thread.take().ok_or_else(|| {
            SimError::Other(anyhow::anyhow!("driver '{}' already joined", self.name))
        })?;
        handle
            .join()
            .map_err(|_| SimError::Other(anyhow::anyhow!("driver '{}' panicked", self.name)))
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.signal_stop();
        }
    }
}
