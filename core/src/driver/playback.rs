//! Playback driver — replays a recorded log, one timestamp per batch.

use super::Driver;
use crate::{
    error::{SimError, SimResult},
    snapshot::Snapshot,
};

pub struct PlaybackDriver {
    log:    Vec<Snapshot>,
    cursor: usize,
}

impl PlaybackDriver {
    /// Takes ownership of the log and sorts it by timestamp. The sort is
    /// stable, so entries sharing a timestamp keep their recorded order.
    pub fn new(mut log: Vec<Snapshot>) -> SimResult<Self> {
        if log.is_empty() {
            return Err(SimError::EmptyLog);
        }
        log.sort_by_key(|s| s.timestamp);
        Ok(Self { log, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Distinct timestamps, i.e. the number of batches a full replay produces.
    pub fn batch_count(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for s in &self.log {
            if last != Some(s.timestamp) {
                count += 1;
                last = Some(s.timestamp);
            }
        }
        count
    }
}

impl Driver for PlaybackDriver {
    fn name(&self) -> &'static str { "playback" }

    fn next_batch(&mut self) -> Option<Vec<Snapshot>> {
        let first = self.log.get(self.cursor)?;
        let ts = first.timestamp;
        let len = self.log[self.cursor..]
            .iter()
            .take_while(|s| s.timestamp == ts)
            .count();
        let batch = self.log[self.cursor..self.cursor + len].to_vec();
        self.cursor += len;
        log::debug!("playback: batch @ {ts} with {len} entries");
        Some(batch)
    }
}
