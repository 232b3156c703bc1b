use serde::Serialize;
use tokio::sync::broadcast;

use crate::tracking::{LiveStats, RunSummary};

const EVENT_CAPACITY: usize = 64;

/// Published to UI and persistence collaborators.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum RunEvent {
    StateChanged(LiveStats),
    /// An accepted fix moved the totals.
    Progress(LiveStats),
    Tick(LiveStats),
    RunCompleted(RunSummary),
}

pub fn channel() -> broadcast::Sender<RunEvent> {
    broadcast::channel(EVENT_CAPACITY).0
}

/// Lagging or absent subscribers are not an error for the tracker.
pub fn emit(events: &broadcast::Sender<RunEvent>, event: RunEvent) {
    let _ = events.send(event);
}
