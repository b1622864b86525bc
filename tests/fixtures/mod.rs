//! Test fixtures for itinerary-planner.
//!
//! Real Las Vegas / Henderson venues (from OpenStreetMap) and helpers that
//! turn them into planner locations and appointments.

#![allow(dead_code)]

pub mod las_vegas_locations;

pub use las_vegas_locations::*;
