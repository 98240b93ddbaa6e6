use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::risk::{AnomalyType, RiskAssessment, BULK_THREAT_MIN_SCORE, THREAT_MIN_SCORE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatCategory {
    Login,
    Bulk,
    Geo,
}

impl ThreatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::Login => "login",
            ThreatCategory::Bulk => "bulk",
            ThreatCategory::Geo => "geo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "login" => Some(ThreatCategory::Login),
            "bulk" => Some(ThreatCategory::Bulk),
            "geo" => Some(ThreatCategory::Geo),
            _ => None,
        }
    }

    /// Minimum score for an event of this category to open a threat
    pub fn creation_threshold(&self) -> u32 {
        match self {
            ThreatCategory::Login | ThreatCategory::Geo => THREAT_MIN_SCORE,
            ThreatCategory::Bulk => BULK_THREAT_MIN_SCORE,
        }
    }
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-category payload attached to a threat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThreatDetails {
    /// Failed attempts or a suspicious login time
    Login {
        failed_attempts: u32,
        login_time: DateTime<Utc>,
    },
    /// Burst of new files inside the aggregation window
    Bulk {
        total_files: usize,
        total_size_mb: f64,
        folder_path: String,
    },
    /// Location changed between two logins
    GeoAnomaly {
        anomaly_type: AnomalyType,
        current_location: String,
        previous_location: String,
    },
    /// Login location checked against the employee's verified locations
    LocationCheck {
        ip_address: String,
        location: String,
        reason: String,
        blocked: bool,
        matched_location: Option<String>,
    },
}

impl ThreatDetails {
    pub fn category(&self) -> ThreatCategory {
        match self {
            ThreatDetails::Login { .. } => ThreatCategory::Login,
            ThreatDetails::Bulk { .. } => ThreatCategory::Bulk,
            ThreatDetails::GeoAnomaly { .. } | ThreatDetails::LocationCheck { .. } => {
                ThreatCategory::Geo
            }
        }
    }
}

/// Deduplicated alert entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveThreat {
    pub id: Uuid,
    pub employee_id: String,
    pub category: ThreatCategory,
    pub risk: RiskAssessment,
    pub details: ThreatDetails,
    /// Record that triggered the latest update (login event, download alert, geo alert)
    pub source_ref: Uuid,
    pub opened_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub solved: bool,
    /// How many qualifying events were folded into this threat
    pub occurrences: u32,
}

impl ActiveThreat {
    pub fn new(
        employee_id: &str,
        risk: RiskAssessment,
        details: ThreatDetails,
        source_ref: Uuid,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_id: employee_id.to_string(),
            category: details.category(),
            risk,
            details,
            source_ref,
            opened_at: at,
            last_updated_at: at,
            solved: false,
            occurrences: 1,
        }
    }

    /// Fold a repeat event into this open threat.
    /// Score and details follow the latest event; reasons accumulate without duplicates.
    pub fn refresh(
        &mut self,
        risk: RiskAssessment,
        details: ThreatDetails,
        source_ref: Uuid,
        at: DateTime<Utc>,
    ) {
        if at > self.last_updated_at {
            self.last_updated_at = at;
        }

        let mut reasons = std::mem::take(&mut self.risk.reasons);
        for reason in risk.reasons {
            if !reasons.contains(&reason) {
                reasons.push(reason);
            }
        }

        self.risk = RiskAssessment {
            score: risk.score,
            level: risk.level,
            reasons,
        };
        self.details = details;
        self.source_ref = source_ref;
        self.occurrences += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Created,
    Updated,
}

/// Snapshot handed to the alert broadcaster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatAlert {
    pub kind: AlertKind,
    pub category: ThreatCategory,
    pub threat: ActiveThreat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_refresh_keeps_opened_at_and_merges_reasons() {
        let t0 = Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap();
        let details = ThreatDetails::Login { failed_attempts: 3, login_time: t0 };
        let mut threat = ActiveThreat::new(
            "EMP001",
            RiskAssessment::new(25, vec!["Multiple failed login attempts (3-5)".into()]),
            details,
            Uuid::new_v4(),
            t0,
        );

        let t1 = t0 + Duration::minutes(5);
        threat.refresh(
            RiskAssessment::new(
                45,
                vec![
                    "Multiple failed login attempts (3-5)".into(),
                    "Login during odd hours (10 PM - 6 AM)".into(),
                ],
            ),
            ThreatDetails::Login { failed_attempts: 4, login_time: t1 },
            Uuid::new_v4(),
            t1,
        );

        assert_eq!(threat.opened_at, t0);
        assert_eq!(threat.last_updated_at, t1);
        assert_eq!(threat.risk.score, 45);
        assert_eq!(threat.risk.reasons.len(), 2);
        assert_eq!(threat.occurrences, 2);
    }

    #[test]
    fn test_category_thresholds() {
        assert_eq!(ThreatCategory::Login.creation_threshold(), 25);
        assert_eq!(ThreatCategory::Geo.creation_threshold(), 25);
        assert_eq!(ThreatCategory::Bulk.creation_threshold(), 30);
    }
}
