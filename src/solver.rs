//! Greedy route constructor (booked times are kept).
//!
//! Starting at the origin, the constructor repeatedly scores every remaining
//! appointment and appends the best feasible one. The result is compared
//! against the booked order over the same travel matrix.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PlannerError, RouteConflict};
use crate::matrix::TravelMatrix;
use crate::model::LocationId;
use crate::scoring::{
    best_feasible, score, score_all, ConflictPolicy, OptimizableAppointment, Position,
    ScoredCandidate, ScoringWeights,
};
use crate::traits::Booking;

/// Minimum efficiency for an optimization to be reported.
pub const DEFAULT_MIN_EFFICIENCY: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub weights: ScoringWeights,
    /// How late a fixed appointment may be reached when times are kept.
    pub late_tolerance: Duration,
    /// Largest start shift the rescheduling constructor may apply.
    pub max_reschedule: Option<Duration>,
    /// Improvements below this efficiency ratio are not reported.
    pub min_efficiency_threshold: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            late_tolerance: Duration::zero(),
            max_reschedule: None,
            min_efficiency_threshold: DEFAULT_MIN_EFFICIENCY,
        }
    }
}

/// An appointment placed on a route.
#[derive(Debug)]
pub struct RouteNode<'a, B> {
    pub booking: &'a B,
    pub position: usize,
    pub location_id: LocationId,
    /// Minutes from the previous node (or the origin).
    pub travel_minutes: f64,
    pub distance_km: f64,
    pub arrival: NaiveDateTime,
    /// Service start; never before arrival.
    pub start: NaiveDateTime,
    pub departure: NaiveDateTime,
    pub wait_minutes: f64,
}

impl<B> Clone for RouteNode<'_, B> {
    fn clone(&self) -> Self {
        Self {
            booking: self.booking,
            position: self.position,
            location_id: self.location_id.clone(),
            travel_minutes: self.travel_minutes,
            distance_km: self.distance_km,
            arrival: self.arrival,
            start: self.start,
            departure: self.departure,
            wait_minutes: self.wait_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RouteMetrics {
    pub travel_minutes: f64,
    pub distance_km: f64,
    pub stops: usize,
}

impl RouteMetrics {
    pub fn from_nodes<B>(nodes: &[RouteNode<'_, B>]) -> Self {
        Self {
            travel_minutes: nodes.iter().map(|node| node.travel_minutes).sum(),
            distance_km: nodes.iter().map(|node| node.distance_km).sum(),
            stops: nodes.len(),
        }
    }

    /// Metrics of visiting `sequence` in order, starting at `origin`.
    pub fn for_sequence<'l>(
        origin: &LocationId,
        sequence: impl IntoIterator<Item = &'l LocationId>,
        matrix: &TravelMatrix,
    ) -> Result<Self, PlannerError> {
        let mut metrics = Self::default();
        let mut previous = origin;
        for location in sequence {
            metrics.travel_minutes += matrix.travel_minutes(previous, location)?;
            metrics.distance_km += matrix.distance_km(previous, location);
            metrics.stops += 1;
            previous = location;
        }
        Ok(metrics)
    }
}

/// `original − optimized`; efficiency is the travel-time share saved, in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Improvement {
    pub minutes: f64,
    pub distance_km: f64,
    pub efficiency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteComparison {
    pub original: RouteMetrics,
    pub optimized: RouteMetrics,
    pub improvement: Improvement,
}

impl RouteComparison {
    pub fn new(original: RouteMetrics, optimized: RouteMetrics) -> Self {
        let minutes = original.travel_minutes - optimized.travel_minutes;
        let efficiency = if original.travel_minutes > 0.0 {
            (minutes / original.travel_minutes).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            original,
            optimized,
            improvement: Improvement {
                minutes,
                distance_km: original.distance_km - optimized.distance_km,
                efficiency,
            },
        }
    }

    /// Whether the saving is large enough to show to the traveler.
    pub fn is_actionable(&self, min_efficiency: f64) -> bool {
        self.improvement.minutes > 0.0 && self.improvement.efficiency >= min_efficiency
    }
}

#[derive(Debug)]
pub struct OptimizedRoute<'a, B> {
    pub nodes: Vec<RouteNode<'a, B>>,
    pub comparison: RouteComparison,
}

impl<'a, B: Booking> OptimizedRoute<'a, B> {
    /// Booking records in optimized order.
    pub fn bookings(&self) -> Vec<&'a B> {
        self.nodes.iter().map(|node| node.booking).collect()
    }

    pub fn ids(&self) -> Vec<&'a B::Id> {
        self.nodes.iter().map(|node| node.booking.id()).collect()
    }
}

/// Result of the greedy constructor. Distinct from every error: a valid
/// request that cannot be improved enough ends here.
#[derive(Debug)]
pub enum RouteOutcome<'a, B> {
    Improved(OptimizedRoute<'a, B>),
    NoSignificantImprovement { comparison: RouteComparison },
}

impl<'a, B> RouteOutcome<'a, B> {
    pub fn has_optimization(&self) -> bool {
        matches!(self, RouteOutcome::Improved(_))
    }

    pub fn comparison(&self) -> &RouteComparison {
        match self {
            RouteOutcome::Improved(route) => &route.comparison,
            RouteOutcome::NoSignificantImprovement { comparison } => comparison,
        }
    }

    pub fn route(&self) -> Option<&OptimizedRoute<'a, B>> {
        match self {
            RouteOutcome::Improved(route) => Some(route),
            RouteOutcome::NoSignificantImprovement { .. } => None,
        }
    }
}

/// Build a route with booked times kept.
///
/// Fails with [`PlannerError::RouteConflict`] when no remaining appointment
/// can be reached in time.
pub fn build_route<'a, B>(
    origin: &Position,
    mut candidates: Vec<OptimizableAppointment<'a, B>>,
    matrix: &TravelMatrix,
    options: &SolveOptions,
) -> Result<RouteOutcome<'a, B>, PlannerError>
where
    B: Booking + Sync,
{
    candidates.sort_by_key(|candidate| candidate.index);
    let original = RouteMetrics::for_sequence(
        &origin.location,
        candidates.iter().map(|candidate| &candidate.location_id),
        matrix,
    )?;

    let policy = ConflictPolicy::Reject {
        late_tolerance: options.late_tolerance,
    };
    let nodes = construct(origin, candidates, matrix, &options.weights, &policy)?;
    let comparison = RouteComparison::new(original, RouteMetrics::from_nodes(&nodes));

    if comparison.is_actionable(options.min_efficiency_threshold) {
        info!(
            "Route improved by {:.1} min ({:.1}%)",
            comparison.improvement.minutes,
            comparison.improvement.efficiency * 100.0
        );
        Ok(RouteOutcome::Improved(OptimizedRoute { nodes, comparison }))
    } else {
        debug!(
            "No significant improvement (efficiency {:.3} < {:.3})",
            comparison.improvement.efficiency, options.min_efficiency_threshold
        );
        Ok(RouteOutcome::NoSignificantImprovement { comparison })
    }
}

/// Greedy construction shared by both constructors.
pub(crate) fn construct<'a, B>(
    origin: &Position,
    mut remaining: Vec<OptimizableAppointment<'a, B>>,
    matrix: &TravelMatrix,
    weights: &ScoringWeights,
    policy: &ConflictPolicy,
) -> Result<Vec<RouteNode<'a, B>>, PlannerError>
where
    B: Booking + Sync,
{
    let mut current = origin.clone();
    let mut nodes = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let scored = score_all(&current, &remaining, matrix, weights, policy)?;
        let Some(best) = best_feasible(&scored) else {
            return Err(conflict(&nodes, &remaining));
        };
        let winner = remaining.remove(best);
        nodes.push(place(&mut current, winner, &scored[best], matrix, nodes.len()));
    }

    Ok(nodes)
}

/// Place `candidates` in the given order. With `strict`, an infeasible
/// appointment stops the walk with a conflict.
pub(crate) fn walk_in_order<'a, B>(
    origin: &Position,
    candidates: &[OptimizableAppointment<'a, B>],
    matrix: &TravelMatrix,
    weights: &ScoringWeights,
    policy: &ConflictPolicy,
    strict: bool,
) -> Result<Vec<RouteNode<'a, B>>, PlannerError>
where
    B: Booking,
{
    let mut current = origin.clone();
    let mut nodes = Vec::with_capacity(candidates.len());

    for (position, candidate) in candidates.iter().enumerate() {
        let scored = score(&current, candidate, matrix, weights, policy)?;
        if strict && !scored.feasible {
            return Err(conflict(&nodes, &candidates[position..position + 1]));
        }
        nodes.push(place(&mut current, candidate.clone(), &scored, matrix, position));
    }

    Ok(nodes)
}

fn place<'a, B>(
    current: &mut Position,
    candidate: OptimizableAppointment<'a, B>,
    scored: &ScoredCandidate,
    matrix: &TravelMatrix,
    position: usize,
) -> RouteNode<'a, B> {
    let start = scored.arrival.max(candidate.planned_start);
    let departure = start + candidate.duration;
    let node = RouteNode {
        booking: candidate.booking,
        position,
        distance_km: matrix.distance_km(&current.location, &candidate.location_id),
        location_id: candidate.location_id,
        travel_minutes: scored.travel_minutes,
        arrival: scored.arrival,
        start,
        departure,
        wait_minutes: scored.wait_minutes,
    };

    current.location = node.location_id.clone();
    current.time = departure;
    node
}

fn conflict<B: Booking>(
    placed: &[RouteNode<'_, B>],
    blocked: &[OptimizableAppointment<'_, B>],
) -> PlannerError {
    let conflict = RouteConflict {
        placed: placed.iter().map(|node| node.booking.id().to_string()).collect(),
        blocked: blocked
            .iter()
            .map(|candidate| candidate.booking.id().to_string())
            .collect(),
    };
    debug!("Route conflict: {}", conflict);
    PlannerError::RouteConflict(conflict)
}
