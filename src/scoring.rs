//! Candidate scoring for the greedy route constructor.
//!
//! Scoring only reads from the travel matrix; it never mutates run state.

use std::cmp::Ordering;

use chrono::{Duration, NaiveDateTime};
use rayon::prelude::*;

use crate::error::PlannerError;
use crate::matrix::TravelMatrix;
use crate::model::{Coordinate, Location, LocationId};
use crate::traits::Booking;

/// Scores closer than this are considered tied.
const SCORE_EPSILON: f64 = 1e-9;

/// Weights of the scoring sum. Lower scores win.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Weight per minute of travel.
    pub travel: f64,
    /// Weight per minute of idle time before the appointment starts.
    pub wait: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            travel: 1.0,
            wait: 0.25,
        }
    }
}

/// How a late arrival is treated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConflictPolicy {
    /// Booked times are kept. Fixed appointments reached later than
    /// `late_tolerance` after their start are infeasible.
    Reject { late_tolerance: Duration },
    /// Late arrivals move the appointment start. Fixed appointments cannot
    /// move; flexible ones may move by at most `max_shift`, if set.
    Reschedule { max_shift: Option<Duration> },
}

/// Where the traveler is and when they can leave.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub location: LocationId,
    pub time: NaiveDateTime,
}

/// An appointment resolved against its location for one run.
#[derive(Debug)]
pub struct OptimizableAppointment<'a, B> {
    pub booking: &'a B,
    /// Position in the booked order; the final tie-breaker.
    pub index: usize,
    pub location_id: LocationId,
    pub coordinate: Coordinate,
    pub planned_start: NaiveDateTime,
    pub duration: Duration,
    pub fixed: bool,
}

impl<B> Clone for OptimizableAppointment<'_, B> {
    fn clone(&self) -> Self {
        Self {
            booking: self.booking,
            index: self.index,
            location_id: self.location_id.clone(),
            coordinate: self.coordinate,
            planned_start: self.planned_start,
            duration: self.duration,
            fixed: self.fixed,
        }
    }
}

impl<'a, B: Booking> OptimizableAppointment<'a, B> {
    pub fn new(booking: &'a B, index: usize, location: &Location) -> Self {
        Self {
            booking,
            index,
            location_id: location.id.clone(),
            coordinate: location.coordinate,
            planned_start: booking.planned_start(),
            duration: booking.duration(),
            fixed: booking.is_time_fixed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    /// Booked-order index of the candidate.
    pub index: usize,
    pub travel_minutes: f64,
    pub arrival: NaiveDateTime,
    pub wait_minutes: f64,
    /// How far the start would move (rescheduling only).
    pub shift_minutes: f64,
    pub feasible: bool,
    pub score: f64,
}

/// Travel minutes as a whole-second duration, rounded up so arrivals never
/// precede `departure + travel`.
pub fn travel_duration(minutes: f64) -> Duration {
    Duration::seconds((minutes * 60.0).ceil() as i64)
}

pub(crate) fn duration_minutes(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 60.0
}

pub fn score<B>(
    current: &Position,
    candidate: &OptimizableAppointment<'_, B>,
    matrix: &TravelMatrix,
    weights: &ScoringWeights,
    policy: &ConflictPolicy,
) -> Result<ScoredCandidate, PlannerError> {
    let travel_minutes = matrix.travel_minutes(&current.location, &candidate.location_id)?;
    let arrival = current.time + travel_duration(travel_minutes);
    let late = (arrival - candidate.planned_start).max(Duration::zero());

    let (feasible, shift) = match policy {
        ConflictPolicy::Reject { late_tolerance } => {
            (!candidate.fixed || late <= *late_tolerance, Duration::zero())
        }
        ConflictPolicy::Reschedule { max_shift } => {
            let feasible = if candidate.fixed {
                late.is_zero()
            } else {
                max_shift.is_none_or(|max| late <= max)
            };
            (feasible, late)
        }
    };

    let wait_minutes = duration_minutes((candidate.planned_start - arrival).max(Duration::zero()));

    Ok(ScoredCandidate {
        index: candidate.index,
        travel_minutes,
        arrival,
        wait_minutes,
        shift_minutes: duration_minutes(shift),
        feasible,
        score: weights.travel * travel_minutes + weights.wait * wait_minutes,
    })
}

/// Score every candidate. Results keep the order of `candidates`.
pub fn score_all<B: Sync>(
    current: &Position,
    candidates: &[OptimizableAppointment<'_, B>],
    matrix: &TravelMatrix,
    weights: &ScoringWeights,
    policy: &ConflictPolicy,
) -> Result<Vec<ScoredCandidate>, PlannerError> {
    candidates
        .par_iter()
        .map(|candidate| score(current, candidate, matrix, weights, policy))
        .collect()
}

/// Selection order: score, then smaller shift, then booked order.
pub fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    if (a.score - b.score).abs() > SCORE_EPSILON {
        return a.score.total_cmp(&b.score);
    }
    a.shift_minutes
        .total_cmp(&b.shift_minutes)
        .then(a.index.cmp(&b.index))
}

/// Position (within `scored`) of the best feasible candidate.
pub fn best_feasible(scored: &[ScoredCandidate]) -> Option<usize> {
    scored
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.feasible)
        .min_by(|(_, a), (_, b)| compare(a, b))
        .map(|(position, _)| position)
}
