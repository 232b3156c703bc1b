use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius of the spherical model, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A single position report from the device location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
    pub captured_at: DateTime<Utc>,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
            captured_at,
        }
    }
}

/// Great-circle distance between two fixes using the haversine formula.
///
/// Symmetric, zero for coincident points, and never fails: the inner term is
/// clamped so rounding cannot push `sqrt` outside its domain.
pub fn distance_m(a: &GeoFix, b: &GeoFix) -> f64 {
    haversine_m(a.latitude, a.longitude, b.latitude, b.longitude)
}

pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}
