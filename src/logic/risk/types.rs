//! Risk Types
//!
//! Core types for risk scoring.
//! Data structures only - the scoring itself lives in `engine`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rules::{CRITICAL_MIN_SCORE, HIGH_MIN_SCORE, MEDIUM_MIN_SCORE};

// ============================================================================
// RISK LEVEL
// ============================================================================

/// Four-tier level derived from an additive score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Fixed breakpoints: <25 Low, 25-49 Medium, 50-74 High, >=75 Critical
    pub fn from_score(score: u32) -> Self {
        if score >= CRITICAL_MIN_SCORE {
            RiskLevel::Critical
        } else if score >= HIGH_MIN_SCORE {
            RiskLevel::High
        } else if score >= MEDIUM_MIN_SCORE {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Low" => Some(RiskLevel::Low),
            "Medium" => Some(RiskLevel::Medium),
            "High" => Some(RiskLevel::High),
            "Critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RISK ASSESSMENT (engine output)
// ============================================================================

/// Score, level and the reasons of every rule tier that fired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Additive score. Not clamped: rule sums may exceed 100.
    pub score: u32,
    pub level: RiskLevel,
    pub reasons: Vec<String>,
}

impl RiskAssessment {
    pub fn new(score: u32, reasons: Vec<String>) -> Self {
        Self {
            score,
            level: RiskLevel::from_score(score),
            reasons,
        }
    }
}

impl Default for RiskAssessment {
    fn default() -> Self {
        Self::new(0, vec![])
    }
}

// ============================================================================
// ENGINE INPUTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoginOutcome {
    Success,
    Failed,
}

impl LoginOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginOutcome::Success => "Success",
            LoginOutcome::Failed => "Failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Success" => Some(LoginOutcome::Success),
            "Failed" => Some(LoginOutcome::Failed),
            _ => None,
        }
    }
}

/// Login rule input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRiskInput {
    /// Failed attempts in the trailing window, including this one when it failed
    pub failed_attempts: u32,
    pub timestamp: DateTime<Utc>,
    pub outcome: LoginOutcome,
    /// A success that follows failed attempts (credential stuffing pattern)
    pub previous_failed_then_success: bool,
}

/// Bulk download rule input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDownloadRiskInput {
    pub total_files: usize,
    pub total_size_mb: f64,
    pub timestamp: DateTime<Utc>,
}

/// Geographic anomaly classes, mutually exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyType {
    ImpossibleTravel,
    RiskCountry,
    NewCountry,
    SameCountry,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::ImpossibleTravel => "ImpossibleTravel",
            AnomalyType::RiskCountry => "RiskCountry",
            AnomalyType::NewCountry => "NewCountry",
            AnomalyType::SameCountry => "SameCountry",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ImpossibleTravel" => Some(AnomalyType::ImpossibleTravel),
            "RiskCountry" => Some(AnomalyType::RiskCountry),
            "NewCountry" => Some(AnomalyType::NewCountry),
            "SameCountry" => Some(AnomalyType::SameCountry),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Geographic rule input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoRiskInput {
    pub anomaly_type: AnomalyType,
    pub current_country: String,
    pub hours_between: f64,
    pub min_travel_hours: f64,
    /// Alert timestamp, used for the odd-hours bonus
    pub timestamp: DateTime<Utc>,
}
