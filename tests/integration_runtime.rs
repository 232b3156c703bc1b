use std::io::Write;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use tokio::sync::mpsc;

use stride_lib::{
    dispatch, replay, CommandReply, GeoFix, RunCommand, RunController, RunEvent, RunState,
    StateError, TrackerSettings, Unit,
};

fn fix_now(lon: f64) -> GeoFix {
    GeoFix::new(0.0, lon, 5.0, Utc::now())
}

async fn next_progress(events: &mut tokio::sync::broadcast::Receiver<RunEvent>) -> f64 {
    loop {
        match events.recv().await {
            Ok(RunEvent::Progress(stats)) => return stats.raw_distance_m,
            Ok(_) => continue,
            Err(err) => panic!("event stream closed: {err}"),
        }
    }
}

#[tokio::test]
async fn commands_and_fixes_share_one_session() {
    let controller = RunController::new(TrackerSettings::default());
    let (tx, rx) = mpsc::channel(32);
    controller.attach_fix_source(rx).await.unwrap();
    let mut events = controller.subscribe();

    dispatch(&controller, RunCommand::Start(fix_now(0.0))).await.unwrap();

    tx.send(fix_now(0.001)).await.unwrap();
    let first = next_progress(&mut events).await;
    tx.send(fix_now(0.002)).await.unwrap();
    let second = next_progress(&mut events).await;
    assert!(second > first);

    dispatch(&controller, RunCommand::Pause).await.unwrap();
    tx.send(fix_now(0.01)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(controller.snapshot().await.raw_distance_m, second);
    assert_eq!(controller.path().await.len(), 3);

    dispatch(&controller, RunCommand::Resume).await.unwrap();
    let reply = dispatch(&controller, RunCommand::Stop).await.unwrap();
    let summary = assert_matches!(reply, CommandReply::Finished(summary) => summary);
    assert_eq!(summary.path.len(), 3);
    assert_eq!(summary.raw_distance_m, second);

    // Nothing can reach the finished run any more.
    assert!(tx.send(fix_now(0.02)).await.is_err());
    assert_eq!(controller.state().await, RunState::Finished);

    let mut completed = None;
    while let Ok(event) = events.try_recv() {
        if let RunEvent::RunCompleted(done) = event {
            completed = Some(done);
        }
    }
    assert_eq!(completed.map(|s| s.id), Some(summary.id));
}

#[tokio::test]
async fn concurrent_pause_and_fixes_never_split() {
    let controller = RunController::new(TrackerSettings::default());
    let (tx, rx) = mpsc::channel(256);
    controller.attach_fix_source(rx).await.unwrap();
    controller.start(fix_now(0.0)).await.unwrap();

    let producer = tokio::spawn(async move {
        for i in 1..=200 {
            if tx.send(fix_now(i as f64 * 0.0001)).await.is_err() {
                break;
            }
            tokio::task::yield_now().await;
        }
    });

    tokio::time::sleep(Duration::from_millis(5)).await;
    let paused = controller.pause().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Whatever was accepted before the pause is exactly what the path holds.
    assert_eq!(controller.path().await.len(), paused.path_len);
    assert_eq!(controller.snapshot().await.raw_distance_m, paused.raw_distance_m);

    controller.stop().await.unwrap();
    producer.await.unwrap();
}

#[tokio::test]
async fn state_errors_survive_anyhow() {
    let controller = RunController::new(TrackerSettings::default());
    let err = dispatch(&controller, RunCommand::Stop).await.unwrap_err();
    assert_matches!(
        err.downcast_ref::<StateError>(),
        Some(StateError::InvalidTransition { state: RunState::Idle, .. })
    );
}

#[test]
fn replay_file_round_trip() {
    let mut trace = tempfile::NamedTempFile::new().unwrap();
    writeln!(trace, r#"{{"command": {{"action": "start", "at": "2024-05-01T07:00:00Z"}}}}"#).unwrap();
    writeln!(
        trace,
        r#"{{"fix": {{"latitude": 0.0, "longitude": 0.0, "accuracyM": 4.0, "capturedAt": "2024-05-01T07:00:00Z"}}}}"#
    )
    .unwrap();
    writeln!(
        trace,
        r#"{{"fix": {{"latitude": 0.0, "longitude": 0.009, "accuracyM": 4.0, "capturedAt": "2024-05-01T07:05:00Z"}}}}"#
    )
    .unwrap();
    writeln!(trace, r#"{{"setUnit": "miles"}}"#).unwrap();
    writeln!(trace, r#"{{"command": {{"action": "stop", "at": "2024-05-01T07:05:00Z"}}}}"#).unwrap();

    let report = replay::run_file(trace.path(), &TrackerSettings::default()).unwrap();
    assert_eq!(report.summary.unit, Unit::Miles);
    assert_eq!(report.summary.elapsed, Duration::from_secs(300));
    let km_pace = report
        .summary
        .average_pace_in(Unit::Kilometers)
        .minutes_per_unit()
        .unwrap();
    assert!((km_pace - 5.0 / 1.00075).abs() < 0.01);
}

#[test]
fn summary_serializes_for_persistence() {
    let trace = concat!(
        r#"{"command": {"action": "start", "at": "2024-05-01T07:00:00Z"}}"#,
        "\n",
        r#"{"fix": {"latitude": 0.0, "longitude": 0.0, "accuracyM": 4.0, "capturedAt": "2024-05-01T07:00:00Z"}}"#,
        "\n",
        r#"{"command": {"action": "stop", "at": "2024-05-01T07:00:10Z"}}"#,
    );
    let report = replay::run_trace(trace.as_bytes(), &TrackerSettings::default()).unwrap();
    let json = serde_json::to_value(&report.summary).unwrap();
    assert_eq!(json["rawDistanceM"], 0.0);
    assert_eq!(json["averagePace"], "undefined");
    assert_eq!(json["path"].as_array().map(Vec::len), Some(1));
}
