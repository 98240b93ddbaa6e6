//! Persistence Module
//!
//! Append-only records (logins, download alerts, geo alerts) and the
//! mutable threat table behind one `ThreatStore` trait.
//!
//! # Backends
//! - `memory.rs`: in-process store (default, tests)
//! - `sqlite.rs`: SQLite file or in-memory database

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::logic::geo::{AnomalyResult, EmployeeProfile};
use crate::logic::risk::{AnomalyType, LoginOutcome, RiskLevel};
use crate::logic::threat::{ActiveThreat, ThreatCategory};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid data in database: {0}")]
    InvalidData(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// RECORDS
// ============================================================================

/// One login attempt. Only `logout_at` changes after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginEvent {
    pub id: Uuid,
    pub employee_id: String,
    pub timestamp: DateTime<Utc>,
    pub logout_at: Option<DateTime<Utc>>,
    pub ip_address: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub outcome: LoginOutcome,
    /// Failures in the trailing hour, this attempt included when it failed
    pub failed_attempts: u32,
    pub risk_level: RiskLevel,
}

/// Summary of a bulk download burst
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadAlert {
    pub id: Uuid,
    pub employee_id: String,
    pub timestamp: DateTime<Utc>,
    pub total_files: usize,
    pub total_size_mb: f64,
    pub risk_level: RiskLevel,
    /// Folder holding the most touches of the burst
    pub folder_path: String,
    pub auto_triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoAlert {
    pub id: Uuid,
    pub employee_id: String,
    pub timestamp: DateTime<Utc>,
    pub current_country: String,
    pub current_city: String,
    pub previous_country: String,
    pub previous_city: String,
    pub hours_between: f64,
    pub min_travel_hours: f64,
    pub anomaly_type: AnomalyType,
    pub risk_level: RiskLevel,
}

impl GeoAlert {
    pub fn from_anomaly(employee_id: &str, anomaly: &AnomalyResult, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_id: employee_id.to_string(),
            timestamp: at,
            current_country: anomaly.current_location.country.clone(),
            current_city: anomaly.current_location.city.clone(),
            previous_country: anomaly.previous_location.country.clone(),
            previous_city: anomaly.previous_location.city.clone(),
            hours_between: anomaly.hours_between,
            min_travel_hours: anomaly.min_travel_hours,
            anomaly_type: anomaly.anomaly_type,
            risk_level: anomaly.risk.level,
        }
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Storage backend for detection records
pub trait ThreatStore: Send + Sync {
    // =====================
    // Login events
    // =====================

    fn insert_login(&self, event: &LoginEvent) -> StoreResult<()>;

    /// Set the logout timestamp. Returns false when the login is unknown.
    fn close_login(&self, login_ref: Uuid, logout_at: DateTime<Utc>) -> StoreResult<bool>;

    fn count_failed_logins_since(&self, employee_id: &str, since: DateTime<Utc>)
        -> StoreResult<usize>;

    /// Failed logins at or after `since` that no successful login has followed yet
    fn count_unanswered_failures_since(
        &self,
        employee_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<usize>;

    /// Most recent successful login that has been logged out
    fn last_completed_login(&self, employee_id: &str) -> StoreResult<Option<LoginEvent>>;

    fn login(&self, login_ref: Uuid) -> StoreResult<Option<LoginEvent>>;

    // =====================
    // Alerts
    // =====================

    fn insert_download_alert(&self, alert: &DownloadAlert) -> StoreResult<()>;

    fn insert_geo_alert(&self, alert: &GeoAlert) -> StoreResult<()>;

    fn download_alerts(&self, employee_id: &str) -> StoreResult<Vec<DownloadAlert>>;

    fn geo_alerts(&self, employee_id: &str) -> StoreResult<Vec<GeoAlert>>;

    // =====================
    // Threats
    // =====================

    fn insert_threat(&self, threat: &ActiveThreat) -> StoreResult<()>;

    fn update_threat(&self, threat: &ActiveThreat) -> StoreResult<()>;

    /// Newest unsolved threat of the category opened at or after `opened_since`
    fn find_open_threat(
        &self,
        employee_id: &str,
        category: ThreatCategory,
        opened_since: DateTime<Utc>,
    ) -> StoreResult<Option<ActiveThreat>>;

    fn mark_threat_solved(&self, id: Uuid) -> StoreResult<bool>;

    /// Unsolved threats, newest first
    fn open_threats(&self, employee_id: Option<&str>) -> StoreResult<Vec<ActiveThreat>>;

    // =====================
    // Employee profiles
    // =====================

    fn employee_profile(&self, employee_id: &str) -> StoreResult<Option<EmployeeProfile>>;

    fn upsert_employee_profile(&self, profile: &EmployeeProfile) -> StoreResult<()>;
}
