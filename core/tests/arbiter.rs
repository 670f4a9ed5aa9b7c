//! Mode arbiter: one driver at a time, clean hand-over, pacing control.

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use swarm_core::{
    arbiter::{Mode, ModeArbiter},
    clock::SpeedControl,
    command::Command,
    config::SimConfig,
    driver::{Driver, DriverContext, DriverHandle},
    error::SimError,
    geo::Coordinate,
    snapshot::{Snapshot, SnapshotDetail},
    world::WorldState,
};

fn arbiter() -> ModeArbiter {
    let _ = env_logger::builder().is_test(true).try_init();
    ModeArbiter::new(SimConfig::default_test()).expect("valid test config")
}

/// Poll `cond` until it holds or two seconds pass.
fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// A recorded log of `batches` timestamps over two adversary contacts.
fn recorded_log(batches: i64) -> Vec<Snapshot> {
    let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().expect("valid date");
    (0..batches)
        .flat_map(|i| {
            ["rec-1", "rec-2"].into_iter().map(move |id| Snapshot {
                timestamp:   t0 + ChronoDuration::seconds(i),
                vessel_id:   id.to_string(),
                position:    Coordinate::new(24.0 + i as f64 * 1e-4, 119.5),
                speed_kn:    8.0,
                heading_deg: 0.0,
                detail:      SnapshotDetail::Adversary,
            })
        })
        .collect()
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut config = SimConfig::default_test();
    config.clock.tick_secs = 0.0;
    assert!(matches!(ModeArbiter::new(config), Err(SimError::InvalidConfig(_))));
}

#[test]
fn speed_multiplier_is_clamped_to_bounds() {
    let arbiter = arbiter();
    assert_eq!(arbiter.speed_multiplier(), 1.0);

    assert_eq!(arbiter.set_speed(0.01).expect("finite"), 0.1);
    assert_eq!(arbiter.set_speed(1000.0).expect("finite"), 100.0);
    assert_eq!(arbiter.set_speed(4.0).expect("finite"), 4.0);
    assert_eq!(arbiter.speed_multiplier(), 4.0);

    assert!(matches!(arbiter.set_speed(f64::NAN), Err(SimError::InvalidSpeedMultiplier(_))));
    assert_eq!(arbiter.speed_multiplier(), 4.0, "rejected value must not stick");
}

#[test]
fn empty_playback_changes_nothing() {
    let arbiter = arbiter();
    assert!(matches!(arbiter.start_playback(Vec::new()), Err(SimError::EmptyLog)));
    assert!(!arbiter.is_active());
    assert!(arbiter.world_state().snapshots.is_empty());
}

#[test]
fn live_run_publishes_the_whole_fleet_and_stops() {
    let arbiter = arbiter();
    let config = arbiter.config().clone();
    let fleet = config.fleet.friendly_count + config.fleet.adversary_count;

    let run_id = arbiter.start_live().expect("live start");
    assert!(arbiter.is_active());
    assert!(wait_until(|| arbiter.world().len() == fleet), "fleet never appeared");
    assert!(wait_until(|| arbiter.world().update_count() >= 3), "live run stalled");

    let view = arbiter.world_state();
    assert!(view.active);
    assert_eq!(view.mode, Some(Mode::Live));
    assert_eq!(view.run_id.as_deref(), Some(run_id.as_str()));

    arbiter.stop().expect("stop");
    assert!(!arbiter.is_active());
    let after = arbiter.world().update_count();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(arbiter.world().update_count(), after, "stopped driver kept writing");
}

#[test]
fn playback_runs_to_completion() {
    let arbiter = arbiter();
    arbiter.start_playback(recorded_log(3)).expect("playback start");

    assert!(wait_until(|| !arbiter.is_active()), "playback never finished");
    let view = arbiter.world_state();
    assert_eq!(view.mode, Some(Mode::Playback));
    assert!(!view.active);
    assert_eq!(view.snapshots.len(), 2);
    assert_eq!(arbiter.world().update_count(), 3);
}

#[test]
fn switching_to_live_discards_playback_state() {
    let arbiter = arbiter();
    arbiter.start_playback(recorded_log(200)).expect("playback start");
    assert!(wait_until(|| arbiter.world().len() == 2), "playback never published");

    let live_run = arbiter.start_live().expect("live start");
    let playback_ids = |snapshots: &[Snapshot]| snapshots.iter().any(|s| s.vessel_id.starts_with("rec-"));

    for _ in 0..20 {
        let view = arbiter.world_state();
        assert!(!playback_ids(&view.snapshots), "playback entry leaked into live run");
        thread::sleep(Duration::from_millis(5));
    }
    let view = arbiter.world_state();
    assert_eq!(view.mode, Some(Mode::Live));
    assert_eq!(view.run_id.as_deref(), Some(live_run.as_str()));
}

#[test]
fn each_start_gets_a_fresh_run_id() {
    let arbiter = arbiter();
    let first = arbiter.start_live_seeded(1).expect("first start");
    let second = arbiter.start_live_seeded(2).expect("second start");
    assert_ne!(first, second);
    assert_eq!(arbiter.world_state().run_id.as_deref(), Some(second.as_str()));
}

#[test]
fn stop_without_a_driver_is_harmless() {
    let arbiter = arbiter();
    arbiter.stop().expect("idle stop");
    arbiter.stop().expect("second idle stop");
    assert!(!arbiter.is_active());
}

#[test]
fn commands_report_success_and_failure() {
    let arbiter = arbiter();

    let reply = arbiter.execute(Command::SetSpeed { multiplier: 250.0 });
    assert!(reply.ok);
    assert_eq!(reply.speed_multiplier, Some(100.0));

    let reply = arbiter.execute(Command::SetSpeed { multiplier: f64::NAN });
    assert!(!reply.ok);
    assert_eq!(reply.error_kind, Some("invalid_speed_multiplier"));

    let reply = arbiter.execute(Command::StartPlayback { log: Vec::new() });
    assert!(!reply.ok);
    assert_eq!(reply.error_kind, Some("empty_log"));

    let reply = arbiter.execute(Command::StartLive { seed: Some(7) });
    assert!(reply.ok);
    assert!(reply.run_id.is_some());

    let reply = arbiter.execute(Command::GetState);
    let state = reply.state.expect("state attached");
    assert!(state.active);
    assert_eq!(state.speed_multiplier, 100.0);

    assert!(arbiter.execute(Command::Stop).ok);
    assert!(!arbiter.is_active());
}

#[test]
fn commands_parse_from_json_lines() {
    let cmd: Command = serde_json::from_str(r#"{"cmd":"set_speed","multiplier":2.5}"#).expect("parse");
    assert!(matches!(cmd, Command::SetSpeed { multiplier } if multiplier == 2.5));

    let cmd: Command = serde_json::from_str(r#"{"cmd":"start_live"}"#).expect("parse");
    assert!(matches!(cmd, Command::StartLive { seed: None }));

    let cmd: Command = serde_json::from_str(
        r#"{"cmd":"start_playback","log":[{"timestamp":"2025-01-01T00:00:00Z","boat_id":3,"lat":24.0,"lon":119.5}]}"#,
    )
    .expect("parse");
    match cmd {
        Command::StartPlayback { log } => {
            assert_eq!(log.len(), 1);
            assert_eq!(log[0].vessel_id, "3");
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn speed_change_applies_to_the_running_driver() {
    let arbiter = arbiter();
    let (min, max) = {
        let pacing = &arbiter.config().pacing;
        (pacing.min_multiplier, pacing.max_multiplier)
    };
    arbiter.set_speed(min).expect("finite");
    arbiter.start_playback(recorded_log(500)).expect("playback start");
    assert!(wait_until(|| arbiter.world().update_count() >= 1), "playback never published");

    // 10 ms base at 0.1x is 100 ms per batch.
    thread::sleep(Duration::from_millis(150));
    let slow = arbiter.world().update_count();
    assert!(slow <= 3, "{slow} batches at minimum speed");

    arbiter.set_speed(max).expect("finite");
    assert!(
        wait_until(|| arbiter.world().update_count() >= slow + 100),
        "speed-up never reached the driver ({} batches)",
        arbiter.world().update_count()
    );
    arbiter.stop().expect("stop");
}

/// Takes longer to produce a batch than any sane stop timeout.
struct SluggishDriver {
    delay: Duration,
}

impl Driver for SluggishDriver {
    fn name(&self) -> &'static str { "sluggish" }

    fn next_batch(&mut self) -> Option<Vec<Snapshot>> {
        thread::sleep(self.delay);
        Some(recorded_log(1))
    }
}

#[test]
fn late_driver_times_out_and_is_fenced_off() {
    let world = Arc::new(WorldState::new());
    let epoch = world.reset();
    let ctx = DriverContext {
        run_id: "late".into(),
        world:  Arc::clone(&world),
        epoch,
        speed:  Arc::new(SpeedControl::new(&SimConfig::default_test().pacing)),
    };
    let handle = DriverHandle::spawn(Box::new(SluggishDriver { delay: Duration::from_millis(300) }), ctx)
        .expect("spawn");
    let status = handle.status();
    thread::sleep(Duration::from_millis(10));

    match handle.stop(Duration::from_millis(20)) {
        Err(SimError::DriverStopTimeout { driver, .. }) => assert_eq!(driver, "sluggish"),
        other => panic!("expected DriverStopTimeout, got {other:?}"),
    }
    assert!(!status.is_finished());

    world.reset();
    assert!(wait_until(|| status.is_finished()), "late driver never exited");
    assert!(world.is_empty(), "late driver wrote into the new epoch");
    assert_eq!(world.update_count(), 0);
}
