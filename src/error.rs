//! Error types.

use std::fmt;

use thiserror::Error;

use crate::model::LocationId;

/// Errors surfaced to callers of the planner.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("route conflict: {0}")]
    RouteConflict(RouteConflict),

    #[error("no travel time resolved for {from} -> {to}")]
    MissingTravelTime { from: LocationId, to: LocationId },

    #[error("optimization cancelled")]
    Cancelled,
}

/// Why a request was rejected before any optimization ran.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("at least two appointments are required, got {0}")]
    TooFewAppointments(usize),

    #[error("appointment {appointment} references unknown location {location}")]
    UnknownLocation {
        appointment: String,
        location: LocationId,
    },

    #[error("location {0} has invalid coordinates")]
    InvalidCoordinate(LocationId),

    #[error("appointment {0} must end after it starts")]
    NonPositiveDuration(String),

    #[error("appointment {0} appears more than once")]
    DuplicateAppointment(String),
}

/// No remaining appointment can be reached in time.
///
/// `blocked` cannot follow the last entry of `placed` under the current
/// time constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteConflict {
    pub placed: Vec<String>,
    pub blocked: Vec<String>,
}

impl fmt::Display for RouteConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.placed.last() {
            Some(last) => write!(
                f,
                "{} cannot be reached in time after {}",
                self.blocked.join(", "),
                last
            ),
            None => write!(
                f,
                "{} cannot be reached in time from the origin",
                self.blocked.join(", ")
            ),
        }
    }
}

/// Failure of an external travel time provider. Never fatal to a run.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("no route between the requested points")]
    NoRoute,

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    InvalidValue { key: String, value: String },
}
