//! Greedy route constructor that moves start times to remove travel conflicts.
//!
//! Order selection is the same as in [`crate::solver`]; an appointment that
//! cannot be reached by its booked start is shifted to the arrival time
//! instead of being rejected.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::PlannerError;
use crate::matrix::TravelMatrix;
use crate::model::Appointment;
use crate::scoring::{ConflictPolicy, OptimizableAppointment, Position};
use crate::solver::{construct, walk_in_order, RouteComparison, RouteMetrics, RouteNode, SolveOptions};
use crate::traits::Booking;

/// Tolerance when checking that the optimized route is not longer.
const TRAVEL_EPSILON_MINUTES: f64 = 1e-9;

/// An appointment whose booked slot was moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RescheduledAppointment<Id> {
    pub id: Id,
    pub original_start: NaiveDateTime,
    pub original_end: NaiveDateTime,
    pub new_start: NaiveDateTime,
    pub new_end: NaiveDateTime,
    pub delta_seconds: i64,
}

impl<Id> RescheduledAppointment<Id> {
    pub fn delta(&self) -> Duration {
        Duration::seconds(self.delta_seconds)
    }
}

/// Savings of the new sequence over the booked one. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Improvements {
    pub distance_reduction_km: f64,
    pub distance_reduction_percentage: f64,
    pub time_reduction_minutes: f64,
}

impl Improvements {
    fn from_comparison(comparison: &RouteComparison) -> Self {
        let original = &comparison.original;
        let distance_reduction_km = comparison.improvement.distance_km.max(0.0);
        let distance_reduction_percentage = if original.distance_km > 0.0 {
            distance_reduction_km / original.distance_km * 100.0
        } else {
            0.0
        };
        Self {
            distance_reduction_km,
            distance_reduction_percentage,
            time_reduction_minutes: comparison.improvement.minutes.max(0.0),
        }
    }
}

#[derive(Debug)]
pub struct RescheduleOutcome<'a, B: Booking> {
    pub nodes: Vec<RouteNode<'a, B>>,
    pub rescheduled: Vec<RescheduledAppointment<B::Id>>,
    pub improvements: Improvements,
    pub comparison: RouteComparison,
    /// Appointments reached late when driving the booked order.
    pub original_conflicts: usize,
    /// Whether travel savings reach the configured efficiency threshold.
    pub has_optimization: bool,
}

impl<'a, B: Booking> RescheduleOutcome<'a, B> {
    pub fn ids(&self) -> Vec<&'a B::Id> {
        self.nodes.iter().map(|node| node.booking.id()).collect()
    }
}

impl RescheduleOutcome<'_, Appointment> {
    /// Appointment records in the new order, carrying their new times.
    pub fn apply(&self) -> Vec<Appointment> {
        self.nodes
            .iter()
            .map(|node| node.booking.with_times(node.start, node.start + node.booking.duration()))
            .collect()
    }
}

/// Build a route, shifting late appointments forward.
///
/// Only fixed appointments, or shifts beyond `options.max_reschedule`, can
/// still produce a [`PlannerError::RouteConflict`]. The route never travels
/// further than the booked order: when the greedy order would and the booked
/// order cannot be kept either, the booked order's conflict is returned.
pub fn build_rescheduled_route<'a, B>(
    origin: &Position,
    mut candidates: Vec<OptimizableAppointment<'a, B>>,
    matrix: &TravelMatrix,
    options: &SolveOptions,
) -> Result<RescheduleOutcome<'a, B>, PlannerError>
where
    B: Booking + Sync,
{
    candidates.sort_by_key(|candidate| candidate.index);
    let original = RouteMetrics::for_sequence(
        &origin.location,
        candidates.iter().map(|candidate| &candidate.location_id),
        matrix,
    )?;

    let policy = ConflictPolicy::Reschedule {
        max_shift: options.max_reschedule,
    };
    let original_conflicts =
        walk_in_order(origin, &candidates, matrix, &options.weights, &policy, false)?
            .iter()
            .filter(|node| node.arrival > node.booking.planned_start())
            .count();

    let nodes = match construct(origin, candidates.clone(), matrix, &options.weights, &policy) {
        Ok(nodes) if RouteMetrics::from_nodes(&nodes).travel_minutes
            <= original.travel_minutes + TRAVEL_EPSILON_MINUTES =>
        {
            nodes
        }
        Ok(_) => {
            debug!("Greedy order travels further than booked order, keeping booked order");
            walk_in_order(origin, &candidates, matrix, &options.weights, &policy, true)?
        }
        Err(err) => {
            debug!("Greedy construction failed ({}), trying booked order", err);
            walk_in_order(origin, &candidates, matrix, &options.weights, &policy, true)
                .map_err(|_| err)?
        }
    };

    let rescheduled: Vec<_> = nodes
        .iter()
        .filter(|node| node.start != node.booking.planned_start())
        .map(|node| {
            let original_start = node.booking.planned_start();
            RescheduledAppointment {
                id: node.booking.id().clone(),
                original_start,
                original_end: node.booking.planned_end(),
                new_start: node.start,
                new_end: node.start + node.booking.duration(),
                delta_seconds: (node.start - original_start).num_seconds(),
            }
        })
        .collect();

    let comparison = RouteComparison::new(original, RouteMetrics::from_nodes(&nodes));
    let improvements = Improvements::from_comparison(&comparison);
    let has_optimization = comparison.is_actionable(options.min_efficiency_threshold);

    info!(
        "Rescheduled route: {} appointments moved, {:.1} min travel saved, {} conflicts in booked order",
        rescheduled.len(),
        improvements.time_reduction_minutes,
        original_conflicts
    );

    Ok(RescheduleOutcome {
        nodes,
        rescheduled,
        improvements,
        comparison,
        original_conflicts,
        has_optimization,
    })
}
