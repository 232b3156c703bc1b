use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::geo::GeoFix;

use super::clock::ElapsedClock;
use super::gate::{GateConfig, GateVerdict};
use super::pace::{average_pace, Pace, PaceConfig, Unit};
use super::path::PathStore;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    #[default]
    Idle,
    Recording,
    Paused,
    Finished,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Recording => "recording",
            RunState::Paused => "paused",
            RunState::Finished => "finished",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunAction {
    Start,
    Pause,
    Resume,
    Stop,
}

impl RunAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunAction::Start => "start",
            RunAction::Pause => "pause",
            RunAction::Resume => "resume",
            RunAction::Stop => "stop",
        }
    }
}

impl fmt::Display for RunAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command issued in a state that forbids it. The session is left untouched.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("cannot {action} a run that is {state}")]
    InvalidTransition { action: RunAction, state: RunState },
}

/// What happened to a fix handed to [`RunSession::ingest_fix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    Accepted,
    /// Filtered by the location gate. Routine, not a fault.
    Rejected(GateVerdict),
    /// The session was not recording.
    Dropped,
}

/// Display values as of the last recompute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    pub state: RunState,
    pub unit: Unit,
    pub distance: f64,
    pub raw_distance_m: f64,
    pub elapsed: Duration,
    pub current_pace: Pace,
    pub average_pace: Pace,
    pub path_len: usize,
}

/// Read-only record of a finished run, handed to persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub path: Vec<GeoFix>,
    pub raw_distance_m: f64,
    pub elapsed: Duration,
    pub average_pace: Pace,
    pub unit: Unit,
    pub rejected_fixes: u64,
}

impl RunSummary {
    pub fn distance(&self, unit: Unit) -> f64 {
        unit.of_meters(self.raw_distance_m)
    }

    pub fn average_pace_in(&self, unit: Unit) -> Pace {
        average_pace(self.distance(unit), self.elapsed)
    }
}

#[derive(Debug, Clone)]
pub struct RunSession {
    id: Uuid,
    state: RunState,
    path: PathStore,
    last_accepted: Option<GeoFix>,
    raw_distance_m: f64,
    clock: ElapsedClock,
    unit: Unit,
    gate: GateConfig,
    pace: PaceConfig,
    /// Instant of the last recompute; every live read is evaluated here.
    as_of: Option<DateTime<Utc>>,
    rejected_fixes: u64,
    summary: Option<RunSummary>,
}

impl Default for RunSession {
    fn default() -> Self {
        Self::new(GateConfig::default(), PaceConfig::default(), Unit::default())
    }
}

impl RunSession {
    pub fn new(gate: GateConfig, pace: PaceConfig, unit: Unit) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Idle,
            path: PathStore::new(),
            last_accepted: None,
            raw_distance_m: 0.0,
            clock: ElapsedClock::new(),
            unit,
            gate,
            pace,
            as_of: None,
            rejected_fixes: 0,
            summary: None,
        }
    }

    fn invalid(&self, action: RunAction) -> StateError {
        StateError::InvalidTransition {
            action,
            state: self.state,
        }
    }

    /// `Idle -> Recording`. The seeding fix bypasses the gate.
    pub fn start(&mut self, initial_fix: GeoFix, now: DateTime<Utc>) -> Result<LiveStats, StateError> {
        if self.state != RunState::Idle {
            return Err(self.invalid(RunAction::Start));
        }

        self.path.clear();
        self.path.append(initial_fix);
        self.last_accepted = Some(initial_fix);
        self.raw_distance_m = 0.0;
        self.rejected_fixes = 0;
        self.clock.start(now);
        self.state = RunState::Recording;
        self.as_of = None;
        self.recompute(now);

        log_info!("run {} started", self.id);
        Ok(self.live_stats())
    }

    /// Gates one candidate. `now` is the caller's clock, not the fix stamp, so a
    /// device clock running ahead cannot push elapsed time forward.
    pub fn ingest_fix(&mut self, candidate: GeoFix, now: DateTime<Utc>) -> FixOutcome {
        if self.state != RunState::Recording {
            return FixOutcome::Dropped;
        }

        match self.gate.evaluate(&candidate, self.last_accepted.as_ref()) {
            GateVerdict::Accept => {
                self.path.append(candidate);
                self.last_accepted = Some(candidate);
                self.raw_distance_m = self.path.total_distance();
                self.recompute(now);
                FixOutcome::Accepted
            }
            verdict => {
                self.rejected_fixes += 1;
                log_debug!("run {}: fix filtered ({:?})", self.id, verdict);
                FixOutcome::Rejected(verdict)
            }
        }
    }

    /// Re-evaluates display values for a clock tick. Only advances while recording.
    pub fn tick(&mut self, now: DateTime<Utc>) -> LiveStats {
        if self.state == RunState::Recording {
            self.recompute(now);
        }
        self.live_stats()
    }

    /// `Recording -> Paused`. Fix ingestion closes and the clock freezes.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<LiveStats, StateError> {
        if self.state != RunState::Recording {
            return Err(self.invalid(RunAction::Pause));
        }
        self.recompute(now);
        self.clock.pause(now);
        self.state = RunState::Paused;
        log_info!("run {} paused at {:.1} m", self.id, self.raw_distance_m);
        Ok(self.live_stats())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<LiveStats, StateError> {
        if self.state != RunState::Paused {
            return Err(self.invalid(RunAction::Resume));
        }
        self.clock.resume(now);
        self.state = RunState::Recording;
        self.recompute(now);
        log_info!("run {} resumed", self.id);
        Ok(self.live_stats())
    }

    /// `{Recording, Paused} -> Finished`, returning the frozen summary.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<RunSummary, StateError> {
        if !matches!(self.state, RunState::Recording | RunState::Paused) {
            return Err(self.invalid(RunAction::Stop));
        }
        if self.state == RunState::Recording {
            self.recompute(now);
        }
        self.clock.stop(now);
        self.state = RunState::Finished;

        let elapsed = self.elapsed();
        let summary = RunSummary {
            id: self.id,
            started_at: self.clock.started_at().unwrap_or(now),
            finished_at: now,
            path: self.path.fixes().to_vec(),
            raw_distance_m: self.raw_distance_m,
            elapsed,
            average_pace: self.average_pace(self.unit),
            unit: self.unit,
            rejected_fixes: self.rejected_fixes,
        };
        log_info!(
            "run {} finished: {:.1} m in {}s, {} fixes ({} filtered)",
            self.id,
            summary.raw_distance_m,
            elapsed.as_secs(),
            summary.path.len(),
            summary.rejected_fixes
        );
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// Only affects derived values; the path and raw distance are untouched.
    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
    }

    fn recompute(&mut self, now: DateTime<Utc>) {
        self.as_of = Some(match self.as_of {
            Some(prev) if prev > now => prev,
            _ => now,
        });
    }

    pub fn live_stats(&self) -> LiveStats {
        LiveStats {
            state: self.state,
            unit: self.unit,
            distance: self.current_distance(self.unit),
            raw_distance_m: self.raw_distance_m,
            elapsed: self.elapsed(),
            current_pace: self.current_pace(self.unit),
            average_pace: self.average_pace(self.unit),
            path_len: self.path.len(),
        }
    }

    pub fn current_distance(&self, unit: Unit) -> f64 {
        unit.of_meters(self.raw_distance_m)
    }

    pub fn elapsed(&self) -> Duration {
        self.as_of
            .map(|now| self.clock.elapsed(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn average_pace(&self, unit: Unit) -> Pace {
        self.pace.average_pace(self.current_distance(unit), self.elapsed())
    }

    pub fn current_pace(&self, unit: Unit) -> Pace {
        match self.as_of {
            Some(now) => self.pace.current_pace(&self.path, now, self.elapsed(), unit),
            None => Pace::Undefined,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn raw_distance_m(&self) -> f64 {
        self.raw_distance_m
    }

    pub fn path(&self) -> &PathStore {
        &self.path
    }

    pub fn last_accepted(&self) -> Option<&GeoFix> {
        self.last_accepted.as_ref()
    }

    pub fn rejected_fixes(&self) -> u64 {
        self.rejected_fixes
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }
}
