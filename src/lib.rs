//! itinerary-planner core
//!
//! Reorders a traveler's booked appointments into a shorter route and,
//! when asked, moves start times the new order cannot reach.

pub mod cache;
pub mod config;
pub mod error;
pub mod haversine;
pub mod matrix;
pub mod model;
pub mod osrm;
pub mod planner;
pub mod reschedule;
pub mod scoring;
pub mod solver;
pub mod supersede;
pub mod traits;

pub use config::PlannerConfig;
pub use error::{InputError, PlannerError, ProviderError};
pub use model::{Appointment, Coordinate, Location, LocationId};
pub use planner::{RoutePlanner, RouteRequest};
