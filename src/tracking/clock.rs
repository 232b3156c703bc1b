use std::time::Duration;

use chrono::{DateTime, Utc};

/// Wall-clock elapsed time net of paused intervals.
///
/// `elapsed(now) = now - started_at - total_paused`, with `now` pinned to
/// `paused_at` while paused and to `stopped_at` once stopped. The clock owns no
/// timer; callers re-evaluate it on their own tick.
#[derive(Debug, Clone, Default)]
pub struct ElapsedClock {
    started_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    total_paused: Duration,
}

fn span(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}

impl ElapsedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, at: DateTime<Utc>) {
        *self = Self {
            started_at: Some(at),
            ..Self::default()
        };
    }

    pub fn pause(&mut self, at: DateTime<Utc>) {
        if self.paused_at.is_none() && self.stopped_at.is_none() {
            self.paused_at = Some(at);
        }
    }

    pub fn resume(&mut self, at: DateTime<Utc>) {
        if let Some(paused_at) = self.paused_at.take() {
            self.total_paused += span(paused_at, at);
        }
    }

    /// Freezes the clock. Stopping while paused freezes at the pause instant.
    pub fn stop(&mut self, at: DateTime<Utc>) {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(self.paused_at.unwrap_or(at));
        }
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let Some(started_at) = self.started_at else {
            return Duration::ZERO;
        };
        let effective_now = self.stopped_at.or(self.paused_at).unwrap_or(now);
        span(started_at, effective_now).saturating_sub(self.total_paused)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.stopped_at
    }

    pub fn total_paused(&self) -> Duration {
        self.total_paused
    }
}
