//! Recorded-log ingest: JSON Lines in, timestamp-bearing Snapshots out.
//!
//! One record per line; blank lines are skipped. Missing optional fields
//! get safe defaults (see `Snapshot`'s `TryFrom<WireRecord>`). The first
//! malformed line aborts the whole load with its line number.

use crate::{
    error::{SimError, SimResult},
    snapshot::{Snapshot, WireRecord},
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub fn parse_jsonl<R: BufRead>(reader: R) -> SimResult<Vec<Snapshot>> {
    let mut log = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: WireRecord = serde_json::from_str(&line).map_err(|e| {
            SimError::InvalidLogFormat { line: line_no, reason: e.to_string() }
        })?;
        let snapshot = Snapshot::try_from(record).map_err(|e| match e {
            SimError::InvalidLogFormat { reason, .. } => {
                SimError::InvalidLogFormat { line: line_no, reason }
            }
            other => other,
        })?;
        log.push(snapshot);
    }
    log::info!("Parsed {} log records", log.len());
    Ok(log)
}

pub fn parse_str(content: &str) -> SimResult<Vec<Snapshot>> {
    parse_jsonl(content.as_bytes())
}

pub fn read_log_file(path: impl AsRef<Path>) -> SimResult<Vec<Snapshot>> {
    let file = File::open(path.as_ref())?;
    parse_jsonl(BufReader::new(file))
}
