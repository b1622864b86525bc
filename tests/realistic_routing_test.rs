//! Realistic routing tests using real Las Vegas locations.
//!
//! These run the full pipeline on real-world coordinates with estimated
//! travel times; no routing server is needed.

mod fixtures;

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use itinerary_planner::cache::TravelTimeCache;
use itinerary_planner::error::PlannerError;
use itinerary_planner::model::{Appointment, Coordinate};
use itinerary_planner::planner::{RoutePlanner, RouteRequest};
use itinerary_planner::supersede::RunRegistry;
use itinerary_planner::PlannerConfig;

use fixtures::las_vegas_locations::{
    all_locations, appointments_at, day_at, Venue, HENDERSON_VENUES, HOTELS, SOUTH_VENUES,
    STRIP_VENUES,
};

// ============================================================================
// Test Infrastructure
// ============================================================================

fn planner() -> RoutePlanner {
    RoutePlanner::from_config(PlannerConfig::default()).unwrap()
}

fn start_at(venue: &Venue) -> Coordinate {
    Coordinate::new(venue.lat, venue.lng)
}

/// Strip venues booked alternately from the north and south ends.
fn zigzag_strip() -> Vec<Venue> {
    let mut order = Vec::with_capacity(STRIP_VENUES.len());
    let (mut lo, mut hi) = (0, STRIP_VENUES.len() - 1);
    while lo <= hi {
        order.push(STRIP_VENUES[lo]);
        if lo != hi {
            order.push(STRIP_VENUES[hi]);
        }
        lo += 1;
        hi -= 1;
    }
    order
}

/// A day across the metro area: strip, Henderson and the south end mixed.
fn metro_day() -> Vec<Venue> {
    vec![
        STRIP_VENUES[0],
        HENDERSON_VENUES[0],
        STRIP_VENUES[6],
        SOUTH_VENUES[0],
        HENDERSON_VENUES[3],
        STRIP_VENUES[9],
        SOUTH_VENUES[2],
        HENDERSON_VENUES[1],
    ]
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn zigzag_along_the_strip_is_straightened() {
    let venues = zigzag_strip();
    let bookings = appointments_at(&venues, 0, 30);
    let locations = all_locations();
    let request = RouteRequest::new(start_at(&HOTELS[0]), &bookings, &locations);

    let outcome = planner().optimize(&request, &CancellationToken::new()).await.unwrap();
    let route = outcome.route().expect("zigzag should be improved");

    assert_eq!(route.nodes.len(), venues.len());
    let unique: HashSet<_> = route.ids().into_iter().collect();
    assert_eq!(unique.len(), venues.len());

    let comparison = route.comparison;
    assert!(
        comparison.improvement.efficiency > 0.3,
        "expected a large saving, got {:.3}",
        comparison.improvement.efficiency
    );
    assert!(comparison.optimized.distance_km < comparison.original.distance_km);
}

#[tokio::test]
async fn flexible_slots_are_never_started_early() {
    let venues = metro_day();
    let bookings = appointments_at(&venues, 60, 30);
    let locations = all_locations();
    let request = RouteRequest::new(start_at(&HOTELS[2]), &bookings, &locations)
        .departing_at(day_at(-30));

    let outcome = planner().optimize(&request, &CancellationToken::new()).await.unwrap();
    let comparison = outcome.comparison();
    assert_eq!(comparison.original.stops, venues.len());

    if let Some(route) = outcome.route() {
        for node in &route.nodes {
            assert!(node.start >= node.booking.start);
            assert!(node.start >= node.arrival);
        }
    }
}

#[tokio::test]
async fn metro_day_rescheduling_stays_within_booked_travel() {
    let venues = metro_day();
    let bookings = appointments_at(&venues, 45, 30);
    let locations = all_locations();
    let request = RouteRequest::new(start_at(&HOTELS[1]), &bookings, &locations);

    let outcome = planner()
        .optimize_with_rescheduling(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert!(
        outcome.comparison.optimized.travel_minutes
            <= outcome.comparison.original.travel_minutes + 1e-9
    );
    assert!(outcome.improvements.distance_reduction_percentage <= 100.0);

    let applied = outcome.apply();
    assert_eq!(applied.len(), bookings.len());
    for moved in &outcome.rescheduled {
        assert!(moved.new_start > moved.original_start);
        assert_eq!(moved.new_end - moved.new_start, chrono::Duration::minutes(30));
        let record = applied.iter().find(|a| a.id == moved.id).unwrap();
        assert_eq!(record.start, moved.new_start);
    }
}

#[tokio::test]
async fn fixed_slots_across_town_conflict() {
    let wynn = HOTELS[0];
    let henderson = HENDERSON_VENUES[0];
    let locations = all_locations();
    let bookings: Vec<Appointment> = appointments_at(&[wynn, henderson], 0, 30)
        .into_iter()
        .map(Appointment::fixed)
        .collect();
    let request = RouteRequest::new(start_at(&wynn), &bookings, &locations);

    let err = planner()
        .optimize(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        PlannerError::RouteConflict(conflict) => {
            assert_eq!(conflict.placed, vec!["apt-1".to_string()]);
            assert_eq!(conflict.blocked, vec!["apt-2".to_string()]);
        }
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn shared_cache_serves_repeat_runs() {
    let cache = Arc::new(TravelTimeCache::default());
    let planner = RoutePlanner::new(PlannerConfig::default(), Arc::clone(&cache), None);
    let venues = zigzag_strip();
    let bookings = appointments_at(&venues, 0, 30);
    let locations = all_locations();
    let request = RouteRequest::new(start_at(&HOTELS[0]), &bookings, &locations);
    let cancel = CancellationToken::new();

    let first = planner.optimize(&request, &cancel).await.unwrap();
    let pairs = (venues.len() + 1) * venues.len() / 2;
    assert_eq!(cache.len(), pairs);

    let second = planner.optimize(&request, &cancel).await.unwrap();
    assert_eq!(cache.len(), pairs);
    assert_eq!(
        first.route().map(|r| r.ids()),
        second.route().map(|r| r.ids())
    );
}

#[tokio::test]
async fn superseded_run_is_cancelled() {
    let registry = RunRegistry::new();
    let venues = metro_day();
    let bookings = appointments_at(&venues, 45, 30);
    let locations = all_locations();
    let request = RouteRequest::new(start_at(&HOTELS[3]), &bookings, &locations);
    let planner = planner();

    let stale = registry.begin("traveler-7");
    let current = registry.begin("traveler-7");

    let err = planner.optimize(&request, stale.token()).await.unwrap_err();
    assert!(matches!(err, PlannerError::Cancelled));

    let outcome = planner
        .optimize_with_rescheduling(&request, current.token())
        .await
        .unwrap();
    assert_eq!(outcome.nodes.len(), venues.len());
}
