//! Geo Types
//!
//! Locations, login points and the analyzer's anomaly result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::risk::{AnomalyType, RiskAssessment};

/// Sentinel country/city for unresolvable IPs
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub city: String,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(country: &str, city: &str, lat: f64, lon: f64) -> Self {
        Self {
            country: country.to_string(),
            city: city.to_string(),
            lat,
            lon,
        }
    }

    /// Returned when the resolver fails, never cached
    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN, 0.0, 0.0)
    }

    pub fn is_unknown(&self) -> bool {
        self.country == UNKNOWN && self.city == UNKNOWN
    }

    /// Same city and country
    pub fn same_place(&self, other: &Location) -> bool {
        self.country == other.country && self.city == other.city
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

/// One side of a geo comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginPoint {
    pub ip: String,
    pub timestamp: DateTime<Utc>,
}

impl LoginPoint {
    pub fn new(ip: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            ip: ip.to_string(),
            timestamp,
        }
    }
}

/// Classified difference between two logins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub current_location: Location,
    pub previous_location: Location,
    /// Elapsed hours between the logins, one decimal
    pub hours_between: f64,
    /// Shortest plausible travel time, one decimal
    pub min_travel_hours: f64,
    pub anomaly_type: AnomalyType,
    pub risk: RiskAssessment,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned status {0}")]
    Server(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Lookup failed for {ip}: {message}")]
    Lookup { ip: String, message: String },
}
