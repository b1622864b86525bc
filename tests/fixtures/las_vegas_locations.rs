//! Real Las Vegas / Henderson venues for realistic itineraries.
//!
//! Coordinates sourced from OpenStreetMap via Overpass API.

use chrono::{NaiveDate, NaiveDateTime};
use itinerary_planner::{Appointment, Location};

/// A named venue with coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Venue {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Venue {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    /// Planner location keyed by a slug of the venue name.
    pub fn location(&self) -> Location {
        Location::new(slug(self.name), (self.lat, self.lng)).named(self.name)
    }
}

fn slug(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase()),
            ' ' | '-' => Some('-'),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Hotels (good for start locations)
// ============================================================================

pub const HOTELS: &[Venue] = &[
    Venue::new("Wynn Las Vegas", 36.1263781, -115.1658180),
    Venue::new("MGM Grand", 36.1023654, -115.1688720),
    Venue::new("Bellagio", 36.1126, -115.1767),
    Venue::new("Caesars Palace", 36.1162, -115.1745),
    Venue::new("Longhorn Casino", 36.1070664, -115.0591256),
];

// ============================================================================
// Strip salons and spas, north to south
// ============================================================================

pub const STRIP_VENUES: &[Venue] = &[
    Venue::new("Sinatra", 36.1300035, -115.1654850),
    Venue::new("Carnevino", 36.1249521, -115.1687357),
    Venue::new("Public House", 36.1219193, -115.1689317),
    Venue::new("Ruth's Chris", 36.1193113, -115.1722630),
    Venue::new("Brooklyn Bowl", 36.1175388, -115.1695094),
    Venue::new("Mr Chow", 36.1161158, -115.1761223),
    Venue::new("Spago", 36.1139368, -115.1741462),
    Venue::new("Gordon Ramsay BurGR", 36.1107195, -115.1720818),
    Venue::new("Hard Rock Cafe", 36.1041592, -115.1722166),
    Venue::new("Il Fornaio", 36.1024474, -115.1740110),
    Venue::new("Charlie Palmer Steak", 36.0910624, -115.1743364),
];

// ============================================================================
// Henderson / East
// ============================================================================

pub const HENDERSON_VENUES: &[Venue] = &[
    Venue::new("I Love Sushi Henderson", 35.9916660, -115.1028343),
    Venue::new("Islander's Grill", 36.0335058, -114.9856162),
    Venue::new("Naga", 36.0137634, -114.9928676),
    Venue::new("Green Valley Ranch", 36.0308, -115.0825),
    Venue::new("Sunset Station", 36.0614, -115.0631),
];

// ============================================================================
// South Strip / Airport
// ============================================================================

pub const SOUTH_VENUES: &[Venue] = &[
    Venue::new("Bootlegger Bistro", 36.0492047, -115.1715744),
    Venue::new("Mikos Izakaya", 36.0429503, -115.1527627),
    Venue::new("Budget Suites South", 36.0366259, -115.1713361),
    Venue::new("Kabuki Japanese", 36.0675472, -115.1779391),
];

/// Every venue as a planner location.
pub fn all_locations() -> Vec<Location> {
    HOTELS
        .iter()
        .chain(STRIP_VENUES)
        .chain(HENDERSON_VENUES)
        .chain(SOUTH_VENUES)
        .map(Venue::location)
        .collect()
}

/// 9:00 on the fixture day plus `minutes`.
pub fn day_at(minutes: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 12)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .map(|start| start + chrono::Duration::minutes(minutes))
        .unwrap()
}

/// One appointment per venue in the given order, `slot` minutes apart.
pub fn appointments_at(venues: &[Venue], slot: i64, duration: i64) -> Vec<Appointment> {
    venues
        .iter()
        .enumerate()
        .map(|(i, venue)| {
            let start = day_at(i as i64 * slot);
            Appointment::new(
                format!("apt-{}", i + 1),
                slug(venue.name),
                start,
                start + chrono::Duration::minutes(duration),
            )
            .service(venue.name)
        })
        .collect()
}
