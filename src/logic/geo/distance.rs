//! Great-circle distance and travel feasibility

use super::types::Location;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed average flight speed
pub const FLIGHT_SPEED_KMH: f64 = 800.0;

/// Fixed airport and transit overhead added to every trip
pub const TRANSIT_OVERHEAD_HOURS: f64 = 2.0;

/// Elapsed time below this share of the minimum travel time is impossible travel
pub const IMPOSSIBLE_TRAVEL_TOLERANCE: f64 = 0.8;

/// Haversine distance in kilometres
pub fn haversine_km(a: &Location, b: &Location) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Minimum hours to get from `a` to `b`, unrounded
pub fn min_travel_hours(a: &Location, b: &Location) -> f64 {
    haversine_km(a, b) / FLIGHT_SPEED_KMH + TRANSIT_OVERHEAD_HOURS
}

pub fn is_impossible_travel(hours_between: f64, min_travel_hours: f64) -> bool {
    min_travel_hours > 0.0 && hours_between < min_travel_hours * IMPOSSIBLE_TRAVEL_TOLERANCE
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
