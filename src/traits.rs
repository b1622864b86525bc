//! Core traits for the itinerary planner.
//!
//! Booking applications implement [`Booking`] for their own appointment
//! records; travel-time backends implement [`TravelTimeProvider`].

use std::fmt::{Debug, Display};
use std::hash::Hash;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};

use crate::error::ProviderError;
use crate::model::{Coordinate, LocationId};

/// Unique identifier for planner entities.
pub trait Id: Clone + Eq + Hash + Debug + Display {}

impl<T> Id for T where T: Clone + Eq + Hash + Debug + Display {}

/// An already-booked appointment to be placed on the itinerary.
pub trait Booking {
    type Id: Id;

    fn id(&self) -> &Self::Id;

    /// Location the service takes place at.
    fn location_id(&self) -> &LocationId;

    fn planned_start(&self) -> NaiveDateTime;

    fn planned_end(&self) -> NaiveDateTime;

    /// Whether the booked start is binding (the appointment may not start late).
    fn is_time_fixed(&self) -> bool {
        false
    }

    fn duration(&self) -> Duration {
        self.planned_end() - self.planned_start()
    }
}

/// A single measured trip between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelLeg {
    /// Minutes from origin to destination.
    pub minutes: f64,
    /// Minutes for the reverse trip, when the backend reports it.
    pub return_minutes: Option<f64>,
}

impl TravelLeg {
    pub fn symmetric(minutes: f64) -> Self {
        Self {
            minutes,
            return_minutes: None,
        }
    }
}

/// External source of travel times (directions API, routing engine, ...).
///
/// Failures are expected; callers fall back to an estimate.
#[async_trait]
pub trait TravelTimeProvider: Send + Sync {
    async fn travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<TravelLeg, ProviderError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}
