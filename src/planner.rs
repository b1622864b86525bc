//! Entry point used by the booking application.
//!
//! A run validates the request, resolves the travel matrix (the only step
//! that waits on I/O) and then runs one of the synchronous constructors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::TravelTimeCache;
use crate::config::PlannerConfig;
use crate::error::{InputError, PlannerError, ProviderError};
use crate::matrix::{TravelMatrix, TravelMatrixBuilder};
use crate::model::{Coordinate, Location, LocationId};
use crate::osrm::OsrmClient;
use crate::reschedule::{build_rescheduled_route, RescheduleOutcome};
use crate::scoring::{OptimizableAppointment, Position};
use crate::solver::{build_route, RouteOutcome};
use crate::traits::{Booking, TravelTimeProvider};

/// Inputs of one optimization run.
#[derive(Debug, Clone)]
pub struct RouteRequest<'a, B> {
    /// Where the traveler starts.
    pub origin: Coordinate,
    /// When the traveler leaves; defaults to the earliest booked start.
    pub departure: Option<NaiveDateTime>,
    /// Appointments in booked order.
    pub appointments: &'a [B],
    /// Locations referenced by the appointments.
    pub locations: &'a [Location],
}

impl<'a, B> RouteRequest<'a, B> {
    pub fn new(origin: Coordinate, appointments: &'a [B], locations: &'a [Location]) -> Self {
        Self {
            origin,
            departure: None,
            appointments,
            locations,
        }
    }

    pub fn departing_at(mut self, departure: NaiveDateTime) -> Self {
        self.departure = Some(departure);
        self
    }
}

struct PreparedRun<'a, B> {
    origin: Position,
    candidates: Vec<OptimizableAppointment<'a, B>>,
    matrix: TravelMatrix,
}

pub struct RoutePlanner {
    config: PlannerConfig,
    matrix_builder: TravelMatrixBuilder,
}

impl RoutePlanner {
    /// Planner over an injected cache and provider.
    pub fn new(
        config: PlannerConfig,
        cache: Arc<TravelTimeCache>,
        provider: Option<Arc<dyn TravelTimeProvider>>,
    ) -> Self {
        let matrix_builder = TravelMatrixBuilder::new(cache, provider, config.matrix.clone())
            .with_estimator(config.estimator);
        Self {
            config,
            matrix_builder,
        }
    }

    /// Planner with its own cache and, if configured, an OSRM provider.
    pub fn from_config(config: PlannerConfig) -> Result<Self, ProviderError> {
        let cache = Arc::new(TravelTimeCache::new(config.cache_ttl));
        let provider: Option<Arc<dyn TravelTimeProvider>> = match &config.osrm {
            Some(osrm) => Some(Arc::new(OsrmClient::new(osrm.clone())?)),
            None => None,
        };
        Ok(Self::new(config, cache, provider))
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TravelTimeCache> {
        self.matrix_builder.cache()
    }

    /// Reorder appointments without changing their times.
    pub async fn optimize<'a, B>(
        &self,
        request: &RouteRequest<'a, B>,
        cancel: &CancellationToken,
    ) -> Result<RouteOutcome<'a, B>, PlannerError>
    where
        B: Booking + Sync,
    {
        let run = self.prepare(request, cancel).await?;
        build_route(&run.origin, run.candidates, &run.matrix, &self.config.solve)
    }

    /// Reorder appointments and move start times that cannot be reached.
    pub async fn optimize_with_rescheduling<'a, B>(
        &self,
        request: &RouteRequest<'a, B>,
        cancel: &CancellationToken,
    ) -> Result<RescheduleOutcome<'a, B>, PlannerError>
    where
        B: Booking + Sync,
    {
        let run = self.prepare(request, cancel).await?;
        build_rescheduled_route(&run.origin, run.candidates, &run.matrix, &self.config.solve)
    }

    async fn prepare<'a, B>(
        &self,
        request: &RouteRequest<'a, B>,
        cancel: &CancellationToken,
    ) -> Result<PreparedRun<'a, B>, PlannerError>
    where
        B: Booking,
    {
        let (candidates, stops) = resolve_appointments(request)?;
        let origin_location = Location::origin(request.origin);
        let departure = match request.departure {
            Some(departure) => departure,
            None => candidates
                .iter()
                .map(|candidate| candidate.planned_start)
                .min()
                .ok_or(InputError::TooFewAppointments(0))?,
        };

        debug!(
            "Optimizing {} appointments at {} locations, departing {}",
            candidates.len(),
            stops.len(),
            departure
        );

        let matrix = self.matrix_builder.build(&origin_location, &stops, cancel).await?;
        if cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }

        Ok(PreparedRun {
            origin: Position {
                location: origin_location.id,
                time: departure,
            },
            candidates,
            matrix,
        })
    }
}

/// Validate the request and pair every appointment with its location.
fn resolve_appointments<'a, B: Booking>(
    request: &RouteRequest<'a, B>,
) -> Result<(Vec<OptimizableAppointment<'a, B>>, Vec<Location>), InputError> {
    if request.appointments.len() < 2 {
        return Err(InputError::TooFewAppointments(request.appointments.len()));
    }
    if !request.origin.is_valid() {
        return Err(InputError::InvalidCoordinate(LocationId::for_coordinate(request.origin)));
    }

    let by_id: HashMap<&LocationId, &Location> = request
        .locations
        .iter()
        .map(|location| (&location.id, location))
        .collect();

    let mut seen_ids = HashSet::new();
    let mut stop_ids = HashSet::new();
    let mut stops = Vec::new();
    let mut candidates = Vec::with_capacity(request.appointments.len());

    for (index, booking) in request.appointments.iter().enumerate() {
        if !seen_ids.insert(booking.id()) {
            return Err(InputError::DuplicateAppointment(booking.id().to_string()));
        }
        let location = by_id
            .get(booking.location_id())
            .copied()
            .ok_or_else(|| InputError::UnknownLocation {
                appointment: booking.id().to_string(),
                location: booking.location_id().clone(),
            })?;
        if !location.coordinate.is_valid() {
            return Err(InputError::InvalidCoordinate(location.id.clone()));
        }
        if booking.duration() <= chrono::Duration::zero() {
            return Err(InputError::NonPositiveDuration(booking.id().to_string()));
        }

        if stop_ids.insert(&location.id) {
            stops.push(location.clone());
        }
        candidates.push(OptimizableAppointment::new(booking, index, location));
    }

    Ok((candidates, stops))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::haversine::HaversineEstimator;
    use crate::model::Appointment;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    fn locations() -> Vec<Location> {
        vec![
            Location::new("A", (0.0, 0.0)),
            Location::new("B", (0.0, 0.1)),
        ]
    }

    #[test]
    fn test_rejects_single_appointment() {
        let locations = locations();
        let bookings = vec![Appointment::new("a", "A", at(9, 0), at(9, 30))];
        let request = RouteRequest::new(Coordinate::new(0.0, 0.0), &bookings, &locations);

        let err = resolve_appointments(&request).unwrap_err();
        assert_eq!(err, InputError::TooFewAppointments(1));
    }

    #[test]
    fn test_rejects_unknown_location() {
        let locations = locations();
        let bookings = vec![
            Appointment::new("a", "A", at(9, 0), at(9, 30)),
            Appointment::new("b", "Z", at(10, 0), at(10, 30)),
        ];
        let request = RouteRequest::new(Coordinate::new(0.0, 0.0), &bookings, &locations);

        let err = resolve_appointments(&request).unwrap_err();
        assert_eq!(
            err,
            InputError::UnknownLocation {
                appointment: "b".to_string(),
                location: LocationId::new("Z"),
            }
        );
    }

    #[test]
    fn test_rejects_invalid_coordinates() {
        let locations = vec![Location::new("A", (0.0, 0.0)), Location::new("B", (95.0, 0.0))];
        let bookings = vec![
            Appointment::new("a", "A", at(9, 0), at(9, 30)),
            Appointment::new("b", "B", at(10, 0), at(10, 30)),
        ];
        let request = RouteRequest::new(Coordinate::new(0.0, 0.0), &bookings, &locations);

        assert_eq!(
            resolve_appointments(&request).unwrap_err(),
            InputError::InvalidCoordinate(LocationId::new("B"))
        );
    }

    #[test]
    fn test_rejects_zero_duration_and_duplicates() {
        let locations = locations();
        let zero = vec![
            Appointment::new("a", "A", at(9, 0), at(9, 0)),
            Appointment::new("b", "B", at(10, 0), at(10, 30)),
        ];
        let request = RouteRequest::new(Coordinate::new(0.0, 0.0), &zero, &locations);
        assert_eq!(
            resolve_appointments(&request).unwrap_err(),
            InputError::NonPositiveDuration("a".to_string())
        );

        let duplicated = vec![
            Appointment::new("a", "A", at(9, 0), at(9, 30)),
            Appointment::new("a", "B", at(10, 0), at(10, 30)),
        ];
        let request = RouteRequest::new(Coordinate::new(0.0, 0.0), &duplicated, &locations);
        assert_eq!(
            resolve_appointments(&request).unwrap_err(),
            InputError::DuplicateAppointment("a".to_string())
        );
    }

    #[test]
    fn test_shared_locations_resolved_once() {
        let locations = locations();
        let bookings = vec![
            Appointment::new("a", "A", at(9, 0), at(9, 30)),
            Appointment::new("b", "A", at(10, 0), at(10, 30)),
            Appointment::new("c", "B", at(11, 0), at(11, 30)),
        ];
        let request = RouteRequest::new(Coordinate::new(0.0, 0.0), &bookings, &locations);

        let (candidates, stops) = resolve_appointments(&request).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(stops.len(), 2);
        assert_eq!(candidates[2].index, 2);
    }

    #[tokio::test]
    async fn test_estimator_speed_from_config() {
        let mut config = PlannerConfig::default();
        config.estimator = HaversineEstimator::new(60.0);
        let planner = RoutePlanner::from_config(config).unwrap();
        let locations = locations();
        let bookings = vec![
            Appointment::new("a", "A", at(9, 0), at(9, 30)),
            Appointment::new("b", "B", at(10, 0), at(10, 30)),
        ];
        let request = RouteRequest::new(Coordinate::new(0.0, 0.0), &bookings, &locations);

        let run = planner.prepare(&request, &CancellationToken::new()).await.unwrap();
        let minutes = run
            .matrix
            .travel_minutes(&LocationId::new("A"), &LocationId::new("B"))
            .unwrap();
        // 0.1 degrees on the equator is about 11.12 km
        assert!((minutes - 11.119).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_departure_defaults_to_earliest_start() {
        let planner = RoutePlanner::from_config(PlannerConfig::default()).unwrap();
        let locations = locations();
        let bookings = vec![
            Appointment::new("a", "A", at(10, 0), at(10, 30)),
            Appointment::new("b", "B", at(9, 0), at(9, 30)),
        ];
        let request = RouteRequest::new(Coordinate::new(0.0, 0.0), &bookings, &locations);

        let run = planner.prepare(&request, &CancellationToken::new()).await.unwrap();
        assert_eq!(run.origin.time, at(9, 0));
        assert_eq!(run.matrix.estimated_pairs(), 3);
    }
}
