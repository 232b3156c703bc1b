//! Single-threaded driver that plays a recorded trace through a [`RunSession`].
//!
//! Each line of a trace is one JSON event:
//!
//! ```text
//! {"command": {"action": "start", "at": "2024-05-01T07:00:00Z"}}
//! {"fix": {"latitude": 0.0, "longitude": 0.0, "accuracyM": 5.0, "capturedAt": "2024-05-01T07:00:00Z"}}
//! {"tick": "2024-05-01T07:00:01Z"}
//! {"setUnit": "miles"}
//! ```
//!
//! Timestamps in the trace are the clock. A `start` command is seeded by the
//! next fix in the trace.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoFix;
use crate::settings::TrackerSettings;
use crate::tracking::{FixOutcome, RunAction, RunSession, RunState, RunSummary, Unit};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ReplayEvent {
    Fix(GeoFix),
    Command { action: RunAction, at: DateTime<Utc> },
    Tick(DateTime<Utc>),
    SetUnit(Unit),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub summary: RunSummary,
    pub accepted: usize,
    pub rejected: usize,
    pub dropped: usize,
}

impl ReplayReport {
    /// Unit for printing the report: the one asked for, else the one the run ended in.
    pub fn display_unit(&self, requested: Option<Unit>) -> Unit {
        requested.unwrap_or(self.summary.unit)
    }
}

pub struct Replay {
    session: RunSession,
    pending_start: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    accepted: usize,
    rejected: usize,
    dropped: usize,
}

impl Replay {
    pub fn new(settings: &TrackerSettings) -> Self {
        Self {
            session: RunSession::new(settings.gate, settings.pace, settings.unit),
            pending_start: None,
            last_seen: None,
            accepted: 0,
            rejected: 0,
            dropped: 0,
        }
    }

    pub fn session(&self) -> &RunSession {
        &self.session
    }

    fn observe(&mut self, at: DateTime<Utc>) {
        if self.last_seen.map_or(true, |seen| at > seen) {
            self.last_seen = Some(at);
        }
    }

    pub fn apply(&mut self, event: ReplayEvent) -> Result<()> {
        match event {
            ReplayEvent::Fix(fix) => {
                self.observe(fix.captured_at);
                if let Some(at) = self.pending_start.take() {
                    self.session.start(fix, at)?;
                    return Ok(());
                }
                match self.session.ingest_fix(fix, fix.captured_at) {
                    FixOutcome::Accepted => self.accepted += 1,
                    FixOutcome::Rejected(_) => self.rejected += 1,
                    FixOutcome::Dropped => self.dropped += 1,
                }
            }
            ReplayEvent::Command { action, at } => {
                self.observe(at);
                match action {
                    RunAction::Start => {
                        if self.session.state() != RunState::Idle || self.pending_start.is_some() {
                            bail!("cannot start a run that is {}", self.session.state());
                        }
                        self.pending_start = Some(at);
                    }
                    RunAction::Pause => {
                        self.session.pause(at)?;
                    }
                    RunAction::Resume => {
                        self.session.resume(at)?;
                    }
                    RunAction::Stop => {
                        self.session.stop(at)?;
                    }
                }
            }
            ReplayEvent::Tick(at) => {
                self.observe(at);
                self.session.tick(at);
            }
            ReplayEvent::SetUnit(unit) => self.session.set_unit(unit),
        }
        Ok(())
    }

    /// Returns the summary, stopping the run at the last seen timestamp if
    /// the trace never did.
    pub fn finish(mut self) -> Result<ReplayReport> {
        let summary = match self.session.state() {
            RunState::Finished => self
                .session
                .summary()
                .cloned()
                .ok_or_else(|| anyhow!("finished run has no summary"))?,
            RunState::Recording | RunState::Paused => {
                let at = self
                    .last_seen
                    .ok_or_else(|| anyhow!("trace has no timestamps"))?;
                log_warn!("trace ended without a stop; stopping at {}", at);
                self.session.stop(at)?
            }
            RunState::Idle => bail!("trace never started a run"),
        };

        log_info!(
            "replayed run {}: {} accepted, {} filtered, {} dropped",
            summary.id,
            self.accepted,
            self.rejected,
            self.dropped
        );

        Ok(ReplayReport {
            summary,
            accepted: self.accepted,
            rejected: self.rejected,
            dropped: self.dropped,
        })
    }
}

pub fn run_trace<R: BufRead>(reader: R, settings: &TrackerSettings) -> Result<ReplayReport> {
    let mut replay = Replay::new(settings);
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("failed to read trace line {line_no}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(line)
            .with_context(|| format!("invalid trace event on line {line_no}"))?;
        replay
            .apply(event)
            .with_context(|| format!("trace line {line_no}"))?;
    }
    replay.finish()
}

pub fn run_file(path: &Path, settings: &TrackerSettings) -> Result<ReplayReport> {
    let file = File::open(path).with_context(|| format!("failed to open trace {}", path.display()))?;
    run_trace(BufReader::new(file), settings)
}
