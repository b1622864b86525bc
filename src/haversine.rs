//! Haversine travel time estimator (fallback when no provider answers).
//!
//! Uses great-circle distance to estimate travel time.
//! Less accurate than a routing engine (ignores roads) but always available.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::model::Coordinate;
use crate::traits::{TravelLeg, TravelTimeProvider};

/// Average urban travel speed assumption for time estimation.
pub const DEFAULT_SPEED_KMH: f64 = 30.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate haversine distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Haversine-based travel time estimator.
///
/// Estimates travel time using straight-line distance and an assumed speed.
#[derive(Debug, Clone, Copy)]
pub struct HaversineEstimator {
    /// Assumed average travel speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineEstimator {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineEstimator {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Estimated travel minutes between two points.
    pub fn estimate(&self, from: Coordinate, to: Coordinate) -> f64 {
        self.km_to_minutes(haversine_km(from, to))
    }

    /// Convert distance in km to travel time in minutes.
    fn km_to_minutes(&self, km: f64) -> f64 {
        (km / self.speed_kmh) * 60.0
    }
}

#[async_trait]
impl TravelTimeProvider for HaversineEstimator {
    async fn travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<TravelLeg, ProviderError> {
        Ok(TravelLeg::symmetric(self.estimate(origin, destination)))
    }

    fn name(&self) -> &str {
        "haversine"
    }
}
