//! Plain data records supplied by the booking side of the application.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::traits::Booking;

/// A WGS84 point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and within latitude [-90, 90] / longitude [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// Identifier of a physical location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocationId(pub String);

impl LocationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthetic id for an ad-hoc position such as the traveler's origin.
    pub fn for_coordinate(coordinate: Coordinate) -> Self {
        Self(format!("@{:.6},{:.6}", coordinate.lat, coordinate.lng))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub coordinate: Coordinate,
    pub name: String,
    pub address: String,
}

impl Location {
    pub fn new(id: impl Into<LocationId>, coordinate: impl Into<Coordinate>) -> Self {
        Self {
            id: id.into(),
            coordinate: coordinate.into(),
            name: String::new(),
            address: String::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The traveler's starting point, keyed by its coordinate.
    pub fn origin(coordinate: Coordinate) -> Self {
        Self::new(LocationId::for_coordinate(coordinate), coordinate).named("origin")
    }
}

impl From<String> for LocationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A booked appointment as stored by the booking application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub location_id: LocationId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Fixed appointments cannot start later than booked.
    #[serde(default)]
    pub fixed_time: bool,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub specialist_name: String,
}

impl Appointment {
    pub fn new(
        id: impl Into<String>,
        location_id: impl Into<LocationId>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            location_id: location_id.into(),
            start,
            end,
            fixed_time: false,
            service_name: String::new(),
            customer_name: String::new(),
            specialist_name: String::new(),
        }
    }

    pub fn fixed(mut self) -> Self {
        self.fixed_time = true;
        self
    }

    pub fn service(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Copy of this record moved to a new slot; all other fields are kept.
    pub fn with_times(&self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            ..self.clone()
        }
    }
}

impl Booking for Appointment {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn location_id(&self) -> &LocationId {
        &self.location_id
    }

    fn planned_start(&self) -> NaiveDateTime {
        self.start
    }

    fn planned_end(&self) -> NaiveDateTime {
        self.end
    }

    fn is_time_fixed(&self) -> bool {
        self.fixed_time
    }
}
