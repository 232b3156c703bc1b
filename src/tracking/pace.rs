use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::distance_m;

use super::path::PathStore;

pub const METERS_PER_KILOMETER: f64 = 1000.0;
pub const METERS_PER_MILE: f64 = 1609.344;

pub const CURRENT_PACE_WINDOW_SECS: u64 = 10;
pub const FALLBACK_FACTOR: f64 = 0.7;
const FALLBACK_FACTOR_RANGE: (f64, f64) = (0.6, 0.8);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Unit {
    #[default]
    Kilometers,
    Miles,
}

impl Unit {
    pub fn meters(self) -> f64 {
        match self {
            Unit::Kilometers => METERS_PER_KILOMETER,
            Unit::Miles => METERS_PER_MILE,
        }
    }

    pub fn of_meters(self, meters: f64) -> f64 {
        meters / self.meters()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kilometers => "km",
            Unit::Miles => "mi",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minutes per distance unit, or `Undefined` when no distance has been covered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pace {
    Defined(f64),
    Undefined,
}

impl Pace {
    fn from_parts(minutes: f64, distance_in_unit: f64) -> Self {
        if distance_in_unit > 0.0 && minutes.is_finite() && distance_in_unit.is_finite() {
            Pace::Defined(minutes / distance_in_unit)
        } else {
            Pace::Undefined
        }
    }

    pub fn minutes_per_unit(&self) -> Option<f64> {
        match self {
            Pace::Defined(minutes) => Some(*minutes),
            Pace::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Pace::Defined(_))
    }

    fn scaled(self, factor: f64) -> Self {
        match self {
            Pace::Defined(minutes) => Pace::Defined(minutes * factor),
            Pace::Undefined => Pace::Undefined,
        }
    }
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minutes_per_unit() {
            Some(minutes) => {
                let total_secs = (minutes * 60.0).round() as u64;
                write!(f, "{}:{:02}", total_secs / 60, total_secs % 60)
            }
            None => f.write_str("--:--"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaceConfig {
    /// Trailing window used for the current pace.
    pub window_secs: u64,
    /// Applied to the average pace when the window holds too little movement.
    pub fallback_factor: f64,
    /// Report `Undefined` instead of the scaled fallback.
    pub strict_current_pace: bool,
}

impl Default for PaceConfig {
    fn default() -> Self {
        Self {
            window_secs: CURRENT_PACE_WINDOW_SECS,
            fallback_factor: FALLBACK_FACTOR,
            strict_current_pace: false,
        }
    }
}

impl PaceConfig {
    pub fn effective_fallback_factor(&self) -> f64 {
        if self.fallback_factor.is_finite() {
            self.fallback_factor
                .clamp(FALLBACK_FACTOR_RANGE.0, FALLBACK_FACTOR_RANGE.1)
        } else {
            FALLBACK_FACTOR
        }
    }

    /// Whole-session pace: elapsed minutes over distance in the display unit.
    pub fn average_pace(&self, total_distance_in_unit: f64, elapsed: Duration) -> Pace {
        average_pace(total_distance_in_unit, elapsed)
    }

    /// Pace over the trailing window ending at `now`.
    ///
    /// Falls back to `average_pace * fallback_factor` when fewer than two fixes
    /// fall inside the window or they cover no distance or no time. The
    /// fallback keeps a number on screen during the first seconds of a run at
    /// the cost of precision; `strict_current_pace` turns it into `Undefined`.
    pub fn current_pace(
        &self,
        path: &PathStore,
        now: DateTime<Utc>,
        elapsed: Duration,
        unit: Unit,
    ) -> Pace {
        // A window reaching past chrono's range covers the whole path.
        let since = i64::try_from(self.window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|window| now.checked_sub_signed(window));
        let recent = match since {
            Some(since) => path.window_since(since),
            None => path.fixes(),
        };

        if let (Some(first), Some(last)) = (recent.first(), recent.last()) {
            if recent.len() >= 2 {
                let meters: f64 = recent
                    .windows(2)
                    .map(|pair| distance_m(&pair[0], &pair[1]))
                    .sum();
                let span_ms = (last.captured_at - first.captured_at).num_milliseconds();
                let span_minutes = span_ms as f64 / 60_000.0;
                if meters > 0.0 && span_minutes > 0.0 {
                    return Pace::from_parts(span_minutes, unit.of_meters(meters));
                }
            }
        }

        if self.strict_current_pace {
            return Pace::Undefined;
        }

        average_pace(unit.of_meters(path.total_distance()), elapsed)
            .scaled(self.effective_fallback_factor())
    }
}

pub fn average_pace(total_distance_in_unit: f64, elapsed: Duration) -> Pace {
    Pace::from_parts(elapsed.as_secs_f64() / 60.0, total_distance_in_unit)
}
