use serde::{Deserialize, Serialize};

use crate::geo::{distance_m, GeoFix};

pub const MIN_DISTANCE_M: f64 = 1.0;
pub const MAX_ACCURACY_M: f64 = 30.0;

/// Thresholds applied to every candidate fix while recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateConfig {
    /// Candidates closer than this to the last accepted fix are standstill jitter.
    pub min_distance_m: f64,
    /// Candidates reporting accuracy at or above this radius are discarded.
    pub max_accuracy_m: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_distance_m: MIN_DISTANCE_M,
            max_accuracy_m: MAX_ACCURACY_M,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateVerdict {
    Accept,
    TooInaccurate,
    TooClose,
}

impl GateVerdict {
    pub fn is_accept(self) -> bool {
        matches!(self, GateVerdict::Accept)
    }
}

impl GateConfig {
    pub fn evaluate(&self, candidate: &GeoFix, last_accepted: Option<&GeoFix>) -> GateVerdict {
        if candidate.accuracy_m.is_nan() || candidate.accuracy_m >= self.max_accuracy_m {
            return GateVerdict::TooInaccurate;
        }

        match last_accepted {
            Some(last) if distance_m(last, candidate) < self.min_distance_m => GateVerdict::TooClose,
            _ => GateVerdict::Accept,
        }
    }

    pub fn accept(&self, candidate: &GeoFix, last_accepted: Option<&GeoFix>) -> bool {
        self.evaluate(candidate, last_accepted).is_accept()
    }
}

/// Gate with the default thresholds.
pub fn accept(candidate: &GeoFix, last_accepted: Option<&GeoFix>) -> bool {
    GateConfig::default().accept(candidate, last_accepted)
}
