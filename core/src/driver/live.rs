//! Live driver — steps an owned engine and publishes every tick.

use super::Driver;
use crate::{engine::SimEngine, snapshot::Snapshot};

pub struct LiveDriver {
    engine: SimEngine,
    primed: bool,
}

impl LiveDriver {
    pub fn new(engine: SimEngine) -> Self {
        Self { engine, primed: false }
    }

    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }
}

impl Driver for LiveDriver {
    fn name(&self) -> &'static str { "live" }

    /// The first batch is the fleet at tick 0, so observers see every
    /// vessel before the first wait; each later batch is one tick.
    fn next_batch(&mut self) -> Option<Vec<Snapshot>> {
        if !self.primed {
            self.primed = true;
            return Some(self.engine.snapshots());
        }
        let out = self.engine.tick();
        for event in &out.events {
            log::info!("{event}");
        }
        Some(out.snapshots)
    }
}
