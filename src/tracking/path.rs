use chrono::{DateTime, Utc};

use crate::geo::{distance_m, GeoFix};

/// Append-only sequence of accepted fixes with a running distance total.
#[derive(Debug, Clone, Default)]
pub struct PathStore {
    fixes: Vec<GeoFix>,
    total_m: f64,
}

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one fix and the single segment it closes to the running total.
    ///
    /// A fix stamped earlier than the tail is re-stamped to the tail's time so
    /// the path stays non-decreasing in `captured_at`.
    pub fn append(&mut self, mut fix: GeoFix) {
        if let Some(last) = self.fixes.last() {
            if fix.captured_at < last.captured_at {
                fix.captured_at = last.captured_at;
            }
            self.total_m += distance_m(last, &fix);
        }
        self.fixes.push(fix);
    }

    pub fn total_distance(&self) -> f64 {
        self.total_m
    }

    pub fn clear(&mut self) {
        self.fixes.clear();
        self.total_m = 0.0;
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn last(&self) -> Option<&GeoFix> {
        self.fixes.last()
    }

    pub fn fixes(&self) -> &[GeoFix] {
        &self.fixes
    }

    /// Trailing slice of fixes captured at or after `since`.
    pub fn window_since(&self, since: DateTime<Utc>) -> &[GeoFix] {
        let start = self.fixes.partition_point(|fix| fix.captured_at < since);
        &self.fixes[start..]
    }
}
