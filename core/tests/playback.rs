//! Playback driver and the shared run loop, driven synchronously.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Arc;
use swarm_core::{
    clock::SpeedControl,
    config::SimConfig,
    driver::{playback::PlaybackDriver, run_loop, Driver, DriverContext, DriverExit, StopSignal},
    error::SimError,
    geo::Coordinate,
    snapshot::{Snapshot, SnapshotDetail},
    vessel::Status,
    world::WorldState,
};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("valid date") + ChronoDuration::seconds(secs)
}

fn record(id: &str, ts: DateTime<Utc>, lat: f64) -> Snapshot {
    Snapshot {
        timestamp:   ts,
        vessel_id:   id.to_string(),
        position:    Coordinate::new(lat, 119.5),
        speed_kn:    5.0,
        heading_deg: 90.0,
        detail:      SnapshotDetail::Friendly {
            battery_pct:   80.0,
            status:        Status::Tracking,
            error_details: String::new(),
            target_id:     None,
        },
    }
}

fn context(world: &Arc<WorldState>) -> DriverContext {
    let epoch = world.reset();
    DriverContext {
        run_id: "test-run".into(),
        world:  Arc::clone(world),
        epoch,
        speed:  Arc::new(SpeedControl::new(&SimConfig::default_test().pacing)),
    }
}

#[test]
fn empty_log_is_rejected() {
    assert!(matches!(PlaybackDriver::new(Vec::new()), Err(SimError::EmptyLog)));
}

#[test]
fn entries_sharing_a_timestamp_form_one_batch() {
    let mut driver = PlaybackDriver::new(vec![
        record("A", t(0), 24.0),
        record("B", t(0), 24.1),
        record("A", t(1), 24.2),
    ])
    .expect("non-empty log");

    assert_eq!(driver.len(), 3);
    assert_eq!(driver.batch_count(), 2);

    let first = driver.next_batch().expect("first batch");
    assert_eq!(first.len(), 2);
    let second = driver.next_batch().expect("second batch");
    assert_eq!(second.len(), 1);
    assert!(driver.next_batch().is_none());
}

#[test]
fn replay_publishes_latest_state_and_exhausts() {
    let world = Arc::new(WorldState::new());
    let driver = PlaybackDriver::new(vec![
        record("A", t(0), 24.0),
        record("B", t(0), 24.1),
        record("A", t(1), 24.2),
    ])
    .expect("non-empty log");

    let report = run_loop(Box::new(driver), context(&world), StopSignal::new());

    assert_eq!(report.exit, DriverExit::Exhausted);
    assert_eq!(report.batches, 2);
    assert_eq!(world.update_count(), 2);
    assert_eq!(world.len(), 2);

    let a = world.get("A").expect("A present");
    assert_eq!(a.timestamp, t(1));
    assert_eq!(a.position.lat, 24.2);
    assert_eq!(world.get("B").expect("B present").timestamp, t(0));
}

#[test]
fn out_of_order_log_is_sorted_stably() {
    let mut driver = PlaybackDriver::new(vec![
        record("late", t(5), 24.0),
        record("first", t(1), 24.1),
        record("second", t(1), 24.2),
    ])
    .expect("non-empty log");

    let batch = driver.next_batch().expect("first batch");
    let ids: Vec<&str> = batch.iter().map(|s| s.vessel_id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second"]);
    assert_eq!(driver.next_batch().expect("second batch")[0].vessel_id, "late");
}

#[test]
fn raised_stop_publishes_nothing() {
    let world = Arc::new(WorldState::new());
    let driver = PlaybackDriver::new(vec![record("A", t(0), 24.0)]).expect("non-empty log");
    let stop = StopSignal::new();
    stop.raise();

    let report = run_loop(Box::new(driver), context(&world), stop);

    assert_eq!(report.exit, DriverExit::Stopped);
    assert_eq!(report.batches, 0);
    assert!(world.is_empty());
}

#[test]
fn stale_epoch_is_superseded_without_writing() {
    let world = Arc::new(WorldState::new());
    let ctx = context(&world);
    world.reset();

    let driver = PlaybackDriver::new(vec![record("A", t(0), 24.0)]).expect("non-empty log");
    let report = run_loop(Box::new(driver), ctx, StopSignal::new());

    assert_eq!(report.exit, DriverExit::Superseded);
    assert_eq!(report.batches, 0);
    assert!(world.is_empty());
}

#[test]
fn world_reset_clears_entries_and_bumps_epoch() {
    let world = WorldState::new();
    let epoch = world.reset();
    assert!(world.apply_batch(epoch, vec![record("A", t(0), 24.0)]));
    assert_eq!(world.len(), 1);

    let next = world.reset();
    assert!(next > epoch);
    assert!(world.is_empty());
    assert_eq!(world.update_count(), 0);
    assert!(!world.apply_batch(epoch, vec![record("A", t(1), 24.0)]));
    assert!(world.is_empty());
}
