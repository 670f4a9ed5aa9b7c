//! Friendly status transitions on hand-built fleets.

use swarm_core::{
    config::SimConfig,
    engine::SimEngine,
    error::SimError,
    event::FleetEvent,
    geo::{self, Coordinate, KM_PER_DEG},
    vessel::{ErrorCause, Role, Station, Status, Vessel},
};

fn quiet_config() -> SimConfig {
    let mut config = SimConfig::default_test();
    config.friendly.error_rate_per_sec = 0.0;
    config.adversary.retarget_probability = 0.0;
    config
}

fn station() -> Station {
    Station { bearing_offset_deg: 90.0, standoff_km: 0.5 }
}

fn pair() -> Vec<Vessel> {
    vec![
        Vessel::adversary("adv-1", Coordinate::new(24.0, 119.5), 180.0, 8.0),
        Vessel::friendly("usv-1", Coordinate::new(24.02, 119.52), 0.0).with_assignment("adv-1", station()),
    ]
}

fn status_of(engine: &SimEngine, id: &str) -> Status {
    engine
        .vessel(id)
        .and_then(|v| v.friendly_state())
        .map(|fs| fs.status)
        .expect("friendly exists")
}

fn force_error(vessel: &mut Vessel, cause: ErrorCause) {
    if let Role::Friendly(fs) = &mut vessel.role {
        fs.status = Status::Error;
        fs.error = Some(cause);
    }
}

#[test]
fn assigned_friendly_starts_tracking_on_first_tick() {
    let mut engine = SimEngine::with_fleet(1, quiet_config(), pair()).expect("engine");
    let out = engine.tick();

    assert_eq!(status_of(&engine, "usv-1"), Status::Tracking);
    assert!(out.events.iter().any(|e| matches!(
        e,
        FleetEvent::StatusChanged { from: Status::Idle, to: Status::Tracking, .. }
    )));
}

#[test]
fn friendly_without_target_stays_idle() {
    let fleet = vec![Vessel::friendly("usv-1", Coordinate::new(24.0, 119.5), 0.0)];
    let mut engine = SimEngine::with_fleet(1, quiet_config(), fleet).expect("engine");

    for out in engine.run_ticks(50) {
        let s = &out.snapshots[0];
        assert_eq!(s.status(), Some(Status::Idle));
        assert_eq!(s.speed_kn, 0.0);
    }
}

#[test]
fn removed_target_sends_friendly_back_to_idle() {
    let mut engine = SimEngine::with_fleet(1, quiet_config(), pair()).expect("engine");
    engine.run_ticks(20);
    assert_eq!(status_of(&engine, "usv-1"), Status::Tracking);

    engine.remove_vessel("adv-1").expect("adversary present");
    let out = engine.tick();

    assert_eq!(status_of(&engine, "usv-1"), Status::Idle);
    assert!(out.events.iter().any(|e| matches!(
        e,
        FleetEvent::TargetLost { target_id, .. } if target_id == "adv-1"
    )));

    // Decelerates to a stop and never resumes tracking.
    let outputs = engine.run_ticks(60);
    let last = outputs.last().expect("ran ticks");
    assert_eq!(last.snapshots[0].status(), Some(Status::Idle));
    assert_eq!(last.snapshots[0].speed_kn, 0.0);
}

#[test]
fn motor_failure_never_recovers() {
    let mut config = quiet_config();
    config.friendly.recover_rate_per_sec = 1.0e6;
    let mut fleet = pair();
    force_error(&mut fleet[1], ErrorCause::MotorFailure);
    let mut engine = SimEngine::with_fleet(1, config, fleet).expect("engine");

    for out in engine.run_ticks(100) {
        let s = out.snapshots.iter().find(|s| s.vessel_id == "usv-1").expect("usv-1");
        assert_eq!(s.status(), Some(Status::Error));
        assert_eq!(s.speed_kn, 0.0);
    }
}

#[test]
fn signal_loss_recovers_then_tracking_resumes() {
    let mut config = quiet_config();
    config.friendly.recover_rate_per_sec = 1.0e6;
    let mut fleet = pair();
    force_error(&mut fleet[1], ErrorCause::GpsSignalLost);
    let mut engine = SimEngine::with_fleet(1, config, fleet).expect("engine");

    let first = engine.tick();
    assert_eq!(status_of(&engine, "usv-1"), Status::Idle);
    assert!(first.events.iter().any(|e| matches!(
        e,
        FleetEvent::ErrorCleared { cause: ErrorCause::GpsSignalLost, .. }
    )));
    let snapshot = first.snapshots.iter().find(|s| s.vessel_id == "usv-1").expect("usv-1");
    assert_eq!(snapshot.status(), Some(Status::Idle));

    engine.tick();
    assert_eq!(status_of(&engine, "usv-1"), Status::Tracking);
}

#[test]
fn error_detail_is_set_only_while_in_error() {
    let mut config = SimConfig::default_test();
    config.friendly.error_rate_per_sec = 0.05;
    config.friendly.recover_rate_per_sec = 0.2;
    let mut engine = SimEngine::build(11, config).expect("engine");

    let labels: Vec<&str> = ErrorCause::ALL.iter().map(|c| c.label()).collect();
    for out in engine.run_ticks(400) {
        for s in &out.snapshots {
            if let swarm_core::snapshot::SnapshotDetail::Friendly { status, error_details, .. } = &s.detail {
                if *status == Status::Error {
                    assert!(labels.contains(&error_details.as_str()), "unexpected detail '{error_details}'");
                } else {
                    assert!(error_details.is_empty(), "{} not in error but detail '{error_details}'", s.vessel_id);
                }
            }
        }
    }
}

#[test]
fn tracking_at_minimum_battery_drops_to_idle_and_stays_there() {
    let config = quiet_config();
    let min = config.friendly.min_battery_pct;
    let mut fleet = pair();
    if let Role::Friendly(fs) = &mut fleet[1].role {
        fs.status = Status::Tracking;
        fs.battery_pct = min;
    }
    let mut engine = SimEngine::with_fleet(1, config, fleet).expect("engine");

    let first = engine.tick();
    assert_eq!(status_of(&engine, "usv-1"), Status::Idle);
    assert!(first.events.iter().any(|e| matches!(
        e,
        FleetEvent::StatusChanged { from: Status::Tracking, to: Status::Idle, .. }
    )));
    assert!(!first.events.iter().any(|e| matches!(e, FleetEvent::TargetLost { .. })));

    for out in engine.run_ticks(50) {
        let s = out.snapshots.iter().find(|s| s.vessel_id == "usv-1").expect("usv-1");
        assert_eq!(s.status(), Some(Status::Idle));
        assert!(s.battery_pct().expect("friendly") <= min);
    }
}

// ── Guidance bands ─────────────────────────────────────────────

/// A stationary adversary facing south, with the friendly's station
/// 0.5 km dead ahead of it.
fn parked_target(friendly_at: Coordinate, friendly_heading: f64) -> Vec<Vessel> {
    let ahead = Station { bearing_offset_deg: 0.0, standoff_km: 0.5 };
    vec![
        Vessel::adversary("adv-1", Coordinate::new(24.0, 119.5), 180.0, 0.0),
        Vessel::friendly("usv-1", friendly_at, friendly_heading).with_assignment("adv-1", ahead),
    ]
}

fn station_lat() -> f64 {
    24.0 - 0.5 / KM_PER_DEG
}

#[test]
fn far_from_station_runs_at_max_speed() {
    let config = quiet_config();
    let max = config.friendly.max_speed_kn;
    let fleet = parked_target(Coordinate::new(24.1, 119.5), 180.0);
    let mut engine = SimEngine::with_fleet(1, config, fleet).expect("engine");

    engine.tick();
    let usv = engine.vessel("usv-1").expect("friendly");
    assert_eq!(usv.desired_speed_kn, max);
    assert!(geo::heading_delta(usv.desired_heading, 180.0).abs() < 1.0);
}

#[test]
fn medium_range_holds_cruise_speed() {
    let config = quiet_config();
    let cruise = config.friendly.cruise_speed_kn;
    // 1 km south of station: inside the far range, outside arrival.
    let fleet = parked_target(Coordinate::new(station_lat() - 1.0 / KM_PER_DEG, 119.5), 0.0);
    let mut engine = SimEngine::with_fleet(1, config, fleet).expect("engine");

    engine.tick();
    let usv = engine.vessel("usv-1").expect("friendly");
    assert_eq!(usv.desired_speed_kn, cruise);
    assert!(geo::heading_delta(usv.desired_heading, 0.0).abs() < 1.0);
}

#[test]
fn close_neighbour_forces_slow_turn_away() {
    let config = quiet_config();
    let avoid = config.friendly.avoid_speed_kn;
    let here = Coordinate::new(24.1, 119.5);
    // An idle friendly parked 20 m due north.
    let neighbour = Coordinate::new(24.1 + 0.02 / KM_PER_DEG, 119.5);
    let mut fleet = parked_target(here, 180.0);
    fleet.push(Vessel::friendly("usv-2", neighbour, 0.0));
    let mut engine = SimEngine::with_fleet(1, config, fleet).expect("engine");

    engine.tick();
    let usv = engine.vessel("usv-1").expect("friendly");
    assert_eq!(usv.desired_speed_kn, avoid);
    assert!(geo::heading_delta(usv.desired_heading, 180.0).abs() < 1e-6);

    let start = geo::distance(here, neighbour);
    for _ in 0..10 {
        engine.tick();
        let usv = engine.vessel("usv-1").expect("friendly");
        assert!(usv.speed_kn <= avoid + 1e-9, "speed {} above avoid speed", usv.speed_kn);
    }
    let usv = engine.vessel("usv-1").expect("friendly");
    assert!(geo::distance(usv.position, neighbour) > start);
}

#[test]
fn station_query_reports_missing_targets() {
    let mut fleet = pair();
    fleet.push(Vessel::friendly("usv-2", Coordinate::new(24.1, 119.4), 0.0));
    let mut engine = SimEngine::with_fleet(1, quiet_config(), fleet).expect("engine");

    assert!(engine.station_of("usv-1").is_ok());
    for id in ["usv-2", "adv-1", "nobody"] {
        match engine.station_of(id) {
            Err(SimError::NoActiveTarget { vessel }) => assert_eq!(vessel, id),
            other => panic!("expected NoActiveTarget for {id}, got {other:?}"),
        }
    }

    engine.remove_vessel("adv-1").expect("adversary present");
    assert!(matches!(engine.station_of("usv-1"), Err(SimError::NoActiveTarget { .. })));
}
