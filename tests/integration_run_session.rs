use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{DateTime, TimeZone, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use stride_lib::tracking::{GateVerdict, RunAction};
use stride_lib::{
    FixOutcome, GeoFix, Pace, PaceConfig, RunSession, RunState, StateError, TrackerSettings, Unit,
};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_546_800 + secs, 0).unwrap()
}

fn fix(secs: i64, lat: f64, lon: f64, accuracy_m: f64) -> GeoFix {
    GeoFix::new(lat, lon, accuracy_m, t(secs))
}

fn started_at_origin() -> RunSession {
    let mut session = RunSession::default();
    session.start(fix(0, 0.0, 0.0, 5.0), t(0)).unwrap();
    session
}

#[test]
fn scenario_a_small_step_is_accepted() {
    let mut session = started_at_origin();
    assert_eq!(session.ingest_fix(fix(1, 0.0, 0.00001, 5.0), t(1)), FixOutcome::Accepted);
    assert_eq!(session.path().len(), 2);
    assert!((session.path().total_distance() - 1.11).abs() < 0.01);
}

#[test]
fn scenario_b_inaccurate_step_is_rejected() {
    let mut session = started_at_origin();
    assert_matches!(
        session.ingest_fix(fix(1, 0.0, 0.00001, 50.0), t(1)),
        FixOutcome::Rejected(GateVerdict::TooInaccurate)
    );
    assert_eq!(session.path().len(), 1);
    assert_eq!(session.raw_distance_m(), 0.0);
}

#[test]
fn scenario_c_paused_minute_is_excluded() {
    let mut session = started_at_origin();
    session.pause(t(30)).unwrap();
    session.resume(t(90)).unwrap();
    let summary = session.stop(t(120)).unwrap();

    // 30 s before the pause plus 30 s after it.
    assert_eq!(summary.elapsed, Duration::from_secs(60));
    assert_eq!(session.elapsed(), Duration::from_secs(60));
}

#[test]
fn scenario_d_five_k_in_twenty_five_minutes() {
    let mut session = started_at_origin();
    // Ten equal steps along the equator totalling 5000 m.
    let step_deg = 500.0 / (stride_lib::geo::EARTH_RADIUS_M.to_radians());
    for i in 1..=10 {
        let outcome = session.ingest_fix(fix(i * 150, 0.0, step_deg * i as f64, 5.0), t(i * 150));
        assert_eq!(outcome, FixOutcome::Accepted);
    }
    assert!((session.raw_distance_m() - 5000.0).abs() < 1e-6);
    session.tick(t(25 * 60));
    assert_eq!(session.elapsed(), Duration::from_secs(25 * 60));

    let km = session.average_pace(Unit::Kilometers).minutes_per_unit().unwrap();
    assert!((km - 5.0).abs() < 1e-6);

    let raw_bits = session.raw_distance_m().to_bits();
    session.set_unit(Unit::Miles);
    let miles = session.live_stats().average_pace.minutes_per_unit().unwrap();
    assert!((miles - 8.05).abs() < 0.01, "got {miles}");
    assert_eq!(session.raw_distance_m().to_bits(), raw_bits);
}

#[test]
fn distance_is_monotonic_over_random_walks() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut session = started_at_origin();
    let (mut lat, mut lon) = (0.0_f64, 0.0_f64);
    let mut previous = session.raw_distance_m();

    for i in 1..=500 {
        lat += rng.gen_range(-0.00005..0.00005);
        lon += rng.gen_range(-0.00005..0.00005);
        let accuracy = rng.gen_range(1.0..60.0);

        match i % 100 {
            40 => {
                session.pause(t(i)).unwrap();
            }
            60 => {
                session.resume(t(i)).unwrap();
            }
            _ => {}
        }

        let paused = session.state() == RunState::Paused;
        session.ingest_fix(fix(i, lat, lon, accuracy), t(i));
        let current = session.raw_distance_m();
        assert!(current >= previous);
        if paused {
            assert_eq!(current.to_bits(), previous.to_bits());
        }
        previous = current;
    }

    let summary = session.stop(t(501)).unwrap();
    assert_eq!(summary.raw_distance_m.to_bits(), previous.to_bits());
    session.ingest_fix(fix(502, lat + 0.01, lon, 5.0), t(502));
    assert_eq!(session.raw_distance_m().to_bits(), previous.to_bits());
}

#[test]
fn pause_neutrality_across_many_cycles() {
    let mut session = started_at_origin();
    session.tick(t(10));
    let before = session.elapsed();

    let mut paused_total = 0;
    let mut now = 10;
    for gap in [5, 17, 1, 42] {
        now += 3;
        session.pause(t(now)).unwrap();
        now += gap;
        paused_total += gap;
        session.resume(t(now)).unwrap();
    }
    now += 20;
    session.tick(t(now));

    let wall = (now - 10) as u64;
    assert_eq!(
        session.elapsed() - before,
        Duration::from_secs(wall - paused_total as u64)
    );
}

#[test]
fn fix_stamped_ahead_of_the_clock_does_not_advance_elapsed() {
    let mut session = started_at_origin();
    let skewed = fix(3600, 0.0, 0.001, 5.0);
    assert_eq!(session.ingest_fix(skewed, t(1)), FixOutcome::Accepted);
    assert_eq!(session.elapsed(), Duration::from_secs(1));

    session.tick(t(10));
    let live = session.elapsed();
    assert_eq!(live, Duration::from_secs(10));

    let summary = session.stop(t(20)).unwrap();
    assert_eq!(summary.elapsed, Duration::from_secs(20));
    assert!(summary.elapsed >= live);
}

#[test]
fn same_fix_twice_appends_once() {
    let mut session = started_at_origin();
    let step = fix(5, 0.0, 0.0002, 5.0);
    session.ingest_fix(step, t(5));
    session.ingest_fix(step, t(6));
    assert_eq!(session.path().len(), 2);
}

#[test]
fn unit_round_trip_is_bit_exact() {
    let mut session = started_at_origin();
    session.ingest_fix(fix(60, 0.001, 0.002, 5.0), t(60));
    let raw = session.raw_distance_m().to_bits();
    let before = session.live_stats();

    session.set_unit(Unit::Miles);
    assert_ne!(session.live_stats().distance, before.distance);
    session.set_unit(Unit::Kilometers);

    assert_eq!(session.raw_distance_m().to_bits(), raw);
    assert_eq!(session.live_stats(), before);
}

#[test]
fn average_pace_is_undefined_without_distance() {
    let mut session = started_at_origin();
    assert_eq!(session.average_pace(Unit::Kilometers), Pace::Undefined);
    session.tick(t(3600));
    assert_eq!(session.average_pace(Unit::Miles), Pace::Undefined);
    assert_eq!(session.average_pace(Unit::Miles).to_string(), "--:--");
}

#[test]
fn current_pace_fallback_after_sparse_fixes() {
    let mut session = started_at_origin();
    session.ingest_fix(fix(60, 0.0, 0.009, 5.0), t(60));
    session.tick(t(120));

    // Window (110..=120 s) holds no fixes: current pace is the scaled average.
    let average = session.average_pace(Unit::Kilometers).minutes_per_unit().unwrap();
    let current = session.current_pace(Unit::Kilometers).minutes_per_unit().unwrap();
    assert!((current - average * 0.7).abs() < 1e-9);

    let mut strict = RunSession::new(
        Default::default(),
        PaceConfig {
            strict_current_pace: true,
            ..PaceConfig::default()
        },
        Unit::Kilometers,
    );
    strict.start(fix(0, 0.0, 0.0, 5.0), t(0)).unwrap();
    strict.ingest_fix(fix(60, 0.0, 0.009, 5.0), t(60));
    strict.tick(t(120));
    assert_eq!(strict.current_pace(Unit::Kilometers), Pace::Undefined);
}

#[test]
fn state_errors_name_the_rejected_action() {
    let mut session = RunSession::default();
    assert_matches!(
        session.stop(t(0)),
        Err(StateError::InvalidTransition {
            action: RunAction::Stop,
            state: RunState::Idle
        })
    );
    assert_eq!(session.ingest_fix(fix(0, 0.0, 0.0, 5.0), t(0)), FixOutcome::Dropped);
}

#[test]
fn oversized_pace_window_from_settings_does_not_panic() {
    let settings: TrackerSettings =
        serde_json::from_str(r#"{"pace":{"windowSecs":10000000000000000}}"#).unwrap();
    let mut session = RunSession::new(settings.gate, settings.pace, settings.unit);
    session.start(fix(0, 0.0, 0.0, 5.0), t(0)).unwrap();
    session.ingest_fix(fix(30, 0.0, 0.001, 5.0), t(30));
    let stats = session.tick(t(60));

    // The window spans the whole path: 30 s over ~111 m.
    let minutes = stats.current_pace.minutes_per_unit().unwrap();
    assert!((minutes - 0.5 / 0.11119).abs() < 0.01, "got {minutes}");
}
