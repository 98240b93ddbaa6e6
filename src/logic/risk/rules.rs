//! Risk Rules & Thresholds
//!
//! Constants of the rule tables plus the runtime-configurable `RiskRules`.
//! No scoring logic here.

use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// LEVEL BREAKPOINTS
// ============================================================================

pub const MEDIUM_MIN_SCORE: u32 = 25;
pub const HIGH_MIN_SCORE: u32 = 50;
pub const CRITICAL_MIN_SCORE: u32 = 75;

// ============================================================================
// THREAT CREATION THRESHOLDS
// ============================================================================

/// Login and geo events at or above this score open a threat
pub const THREAT_MIN_SCORE: u32 = 25;

/// Bulk download signals need a higher score to open a threat
pub const BULK_THREAT_MIN_SCORE: u32 = 30;

// ============================================================================
// LOGIN TIERS
// ============================================================================

pub const FAILED_CRITICAL_ABOVE: u32 = 10;
pub const FAILED_HIGH_MIN: u32 = 6;
pub const FAILED_MEDIUM_MIN: u32 = 3;

pub const FAILED_CRITICAL_POINTS: u32 = 50;
pub const FAILED_HIGH_POINTS: u32 = 35;
pub const FAILED_MEDIUM_POINTS: u32 = 25;

pub const FAILED_THEN_SUCCESS_POINTS: u32 = 40;
pub const CRITICAL_HOURS_POINTS: u32 = 30;
pub const ODD_HOURS_POINTS: u32 = 20;

// ============================================================================
// BULK DOWNLOAD TIERS
// ============================================================================

pub const FILES_CRITICAL_MIN: usize = 100;
pub const FILES_HIGH_MIN: usize = 50;
pub const FILES_MEDIUM_MIN: usize = 30;

pub const FILES_CRITICAL_POINTS: u32 = 40;
pub const FILES_HIGH_POINTS: u32 = 30;
pub const FILES_MEDIUM_POINTS: u32 = 20;

pub const SIZE_CRITICAL_MIN_MB: f64 = 1000.0;
pub const SIZE_HIGH_MIN_MB: f64 = 500.0;
pub const SIZE_MEDIUM_MIN_MB: f64 = 200.0;

pub const SIZE_CRITICAL_POINTS: u32 = 40;
pub const SIZE_HIGH_POINTS: u32 = 30;
pub const SIZE_MEDIUM_POINTS: u32 = 25;

pub const BULK_ODD_HOURS_POINTS: u32 = 20;

// ============================================================================
// GEO TIERS
// ============================================================================

pub const IMPOSSIBLE_TRAVEL_POINTS: u32 = 60;
pub const RISK_COUNTRY_POINTS: u32 = 50;
pub const NEW_COUNTRY_POINTS: u32 = 30;
pub const SAME_COUNTRY_POINTS: u32 = 15;

/// New or risky country seen during odd hours
pub const GEO_ODD_HOURS_POINTS: u32 = 25;

// ============================================================================
// TIME BANDS
// ============================================================================

/// Odd hours: [22:00, 06:00)
pub const ODD_HOURS_START: u32 = 22;
pub const ODD_HOURS_END: u32 = 6;

/// Critical hours: [01:00, 03:00)
pub const CRITICAL_HOURS_START: u32 = 1;
pub const CRITICAL_HOURS_END: u32 = 3;

pub const DEFAULT_HIGH_RISK_COUNTRIES: &[&str] = &[
    "Russia",
    "North Korea",
    "Iran",
    "China",
    "Pakistan",
];

// ============================================================================
// CONFIGURABLE RULES
// ============================================================================

/// Runtime knobs of the rule engine. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRules {
    /// Offset applied to timestamps before reading the hour of day
    pub utc_offset_minutes: i32,
    pub high_risk_countries: Vec<String>,
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            high_risk_countries: DEFAULT_HIGH_RISK_COUNTRIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

impl RiskRules {
    /// Hour of day (0-23) in the configured offset
    pub fn local_hour(&self, ts: DateTime<Utc>) -> u32 {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());
        ts.with_timezone(&offset).hour()
    }

    pub fn is_odd_hour(hour: u32) -> bool {
        hour >= ODD_HOURS_START || hour < ODD_HOURS_END
    }

    pub fn is_critical_hour(hour: u32) -> bool {
        (CRITICAL_HOURS_START..CRITICAL_HOURS_END).contains(&hour)
    }

    pub fn is_high_risk_country(&self, country: &str) -> bool {
        self.high_risk_countries.iter().any(|c| c == country)
    }
}
