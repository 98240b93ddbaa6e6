//! Risk Rule Engine
//!
//! Scoring logic only - no state, no I/O.
//! Input: one of the `*RiskInput` shapes
//! Output: RiskAssessment
//!
//! Every tier that fires adds its points and appends a reason, in the order
//! the tiers are evaluated below.

use super::rules::*;
use super::types::{
    AnomalyType, BulkDownloadRiskInput, GeoRiskInput, LoginOutcome, LoginRiskInput, RiskAssessment,
};

// ============================================================================
// LOGIN
// ============================================================================

/// Score a login attempt with the default rules
pub fn score_login(input: &LoginRiskInput) -> RiskAssessment {
    score_login_with(input, &RiskRules::default())
}

/// Score a login attempt with custom rules
pub fn score_login_with(input: &LoginRiskInput, rules: &RiskRules) -> RiskAssessment {
    let mut score = 0;
    let mut reasons = Vec::new();

    // Failed attempts: highest qualifying tier only
    if input.failed_attempts > FAILED_CRITICAL_ABOVE {
        score += FAILED_CRITICAL_POINTS;
        reasons.push("Critical failed login attempts (10+)".to_string());
    } else if input.failed_attempts >= FAILED_HIGH_MIN {
        score += FAILED_HIGH_POINTS;
        reasons.push("High failed login attempts (6-10)".to_string());
    } else if input.failed_attempts >= FAILED_MEDIUM_MIN {
        score += FAILED_MEDIUM_POINTS;
        reasons.push("Multiple failed login attempts (3-5)".to_string());
    }

    if input.previous_failed_then_success && input.outcome == LoginOutcome::Success {
        score += FAILED_THEN_SUCCESS_POINTS;
        reasons.push("Successful login after failed attempts".to_string());
    }

    // Critical hours take precedence over odd hours
    let hour = rules.local_hour(input.timestamp);
    if RiskRules::is_critical_hour(hour) {
        score += CRITICAL_HOURS_POINTS;
        reasons.push("Login during critical hours (1-3 AM)".to_string());
    } else if RiskRules::is_odd_hour(hour) {
        score += ODD_HOURS_POINTS;
        reasons.push("Login during odd hours (10 PM - 6 AM)".to_string());
    }

    RiskAssessment::new(score, reasons)
}

// ============================================================================
// BULK DOWNLOAD
// ============================================================================

/// Score a bulk download window with the default rules
pub fn score_bulk_download(input: &BulkDownloadRiskInput) -> RiskAssessment {
    score_bulk_download_with(input, &RiskRules::default())
}

/// Score a bulk download window with custom rules
pub fn score_bulk_download_with(input: &BulkDownloadRiskInput, rules: &RiskRules) -> RiskAssessment {
    let mut score = 0;
    let mut reasons = Vec::new();

    if input.total_files >= FILES_CRITICAL_MIN {
        score += FILES_CRITICAL_POINTS;
        reasons.push("Critical file count (100+ files)".to_string());
    } else if input.total_files >= FILES_HIGH_MIN {
        score += FILES_HIGH_POINTS;
        reasons.push("High file count (50+ files)".to_string());
    } else if input.total_files >= FILES_MEDIUM_MIN {
        score += FILES_MEDIUM_POINTS;
        reasons.push("Medium file count (30+ files)".to_string());
    }

    if input.total_size_mb >= SIZE_CRITICAL_MIN_MB {
        score += SIZE_CRITICAL_POINTS;
        reasons.push("Critical download size (1GB+)".to_string());
    } else if input.total_size_mb >= SIZE_HIGH_MIN_MB {
        score += SIZE_HIGH_POINTS;
        reasons.push("High download size (500MB+)".to_string());
    } else if input.total_size_mb >= SIZE_MEDIUM_MIN_MB {
        score += SIZE_MEDIUM_POINTS;
        reasons.push("Medium download size (200MB+)".to_string());
    }

    if RiskRules::is_odd_hour(rules.local_hour(input.timestamp)) {
        score += BULK_ODD_HOURS_POINTS;
        reasons.push("Activity during odd hours".to_string());
    }

    RiskAssessment::new(score, reasons)
}

// ============================================================================
// GEOGRAPHIC
// ============================================================================

/// Score a geographic anomaly with the default rules
pub fn score_geo(input: &GeoRiskInput) -> RiskAssessment {
    score_geo_with(input, &RiskRules::default())
}

/// Score a geographic anomaly with custom rules
pub fn score_geo_with(input: &GeoRiskInput, rules: &RiskRules) -> RiskAssessment {
    let mut score = 0;
    let mut reasons = Vec::new();

    match input.anomaly_type {
        AnomalyType::ImpossibleTravel => {
            score += IMPOSSIBLE_TRAVEL_POINTS;
            reasons.push(format!(
                "Impossible travel detected ({}h between logins, {}h minimum travel time)",
                input.hours_between, input.min_travel_hours
            ));
        }
        AnomalyType::RiskCountry => {
            score += RISK_COUNTRY_POINTS;
            reasons.push(format!("Login from high-risk country: {}", input.current_country));
        }
        AnomalyType::NewCountry => {
            score += NEW_COUNTRY_POINTS;
            reasons.push(format!("Login from new country: {}", input.current_country));
        }
        AnomalyType::SameCountry => {
            score += SAME_COUNTRY_POINTS;
            reasons.push("Unusual city in same country".to_string());
        }
    }

    let new_location = matches!(
        input.anomaly_type,
        AnomalyType::NewCountry | AnomalyType::RiskCountry
    );
    if new_location && RiskRules::is_odd_hour(rules.local_hour(input.timestamp)) {
        score += GEO_ODD_HOURS_POINTS;
        reasons.push("New location during odd hours".to_string());
    }

    RiskAssessment::new(score, reasons)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::risk::RiskLevel;
    use chrono::{DateTime, TimeZone, Utc};

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, hour, 15, 0).unwrap()
    }

    fn login(failed: u32, outcome: LoginOutcome, combo: bool, hour: u32) -> LoginRiskInput {
        LoginRiskInput {
            failed_attempts: failed,
            timestamp: at_hour(hour),
            outcome,
            previous_failed_then_success: combo,
        }
    }

    #[test]
    fn test_level_breakpoints() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(24), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(25), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(49), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(74), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(75), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(140), RiskLevel::Critical);
    }

    #[test]
    fn test_many_failures_daytime() {
        let result = score_login(&login(11, LoginOutcome::Failed, false, 14));
        assert_eq!(result.score, 50);
        assert_eq!(result.level, RiskLevel::High);
        assert_eq!(result.reasons, vec!["Critical failed login attempts (10+)"]);
    }

    #[test]
    fn test_credential_stuffing_at_night() {
        let result = score_login(&login(4, LoginOutcome::Success, true, 2));
        assert_eq!(result.score, 25 + 40 + 30);
        assert_eq!(result.level, RiskLevel::Critical);
        assert_eq!(
            result.reasons,
            vec![
                "Multiple failed login attempts (3-5)",
                "Successful login after failed attempts",
                "Login during critical hours (1-3 AM)",
            ]
        );
    }

    #[test]
    fn test_failed_tiers_pick_highest_only() {
        assert_eq!(score_login(&login(2, LoginOutcome::Failed, false, 12)).score, 0);
        assert_eq!(score_login(&login(3, LoginOutcome::Failed, false, 12)).score, 25);
        assert_eq!(score_login(&login(6, LoginOutcome::Failed, false, 12)).score, 35);
        assert_eq!(score_login(&login(10, LoginOutcome::Failed, false, 12)).score, 35);
        assert_eq!(score_login(&login(11, LoginOutcome::Failed, false, 12)).score, 50);
    }

    #[test]
    fn test_combo_bonus_needs_success() {
        let failed = score_login(&login(0, LoginOutcome::Failed, true, 12));
        assert_eq!(failed.score, 0);
        assert!(failed.reasons.is_empty());
    }

    #[test]
    fn test_critical_hours_beat_odd_hours() {
        assert_eq!(score_login(&login(0, LoginOutcome::Success, false, 1)).score, 30);
        assert_eq!(score_login(&login(0, LoginOutcome::Success, false, 3)).score, 20);
        assert_eq!(score_login(&login(0, LoginOutcome::Success, false, 23)).score, 20);
        assert_eq!(score_login(&login(0, LoginOutcome::Success, false, 6)).score, 0);
    }

    #[test]
    fn test_bulk_file_tier_only() {
        let result = score_bulk_download(&BulkDownloadRiskInput {
            total_files: 40,
            total_size_mb: 50.0,
            timestamp: at_hour(11),
        });
        assert_eq!(result.score, 20);
        assert_eq!(result.level, RiskLevel::Low);
    }

    #[test]
    fn test_bulk_everything_at_night() {
        let result = score_bulk_download(&BulkDownloadRiskInput {
            total_files: 150,
            total_size_mb: 1200.0,
            timestamp: at_hour(23),
        });
        assert_eq!(result.score, 100);
        assert_eq!(result.level, RiskLevel::Critical);
        assert_eq!(result.reasons.len(), 3);
        assert_eq!(result.reasons[2], "Activity during odd hours");
    }

    #[test]
    fn test_bulk_size_tiers() {
        let size = |mb: f64| {
            score_bulk_download(&BulkDownloadRiskInput {
                total_files: 0,
                total_size_mb: mb,
                timestamp: at_hour(10),
            })
            .score
        };
        assert_eq!(size(199.99), 0);
        assert_eq!(size(200.0), 25);
        assert_eq!(size(500.0), 30);
        assert_eq!(size(1000.0), 40);
    }

    #[test]
    fn test_geo_base_scores() {
        let geo = |anomaly_type: AnomalyType, hour: u32| {
            score_geo(&GeoRiskInput {
                anomaly_type,
                current_country: "Iran".to_string(),
                hours_between: 0.5,
                min_travel_hours: 15.7,
                timestamp: at_hour(hour),
            })
        };
        assert_eq!(geo(AnomalyType::ImpossibleTravel, 12).score, 60);
        assert_eq!(geo(AnomalyType::RiskCountry, 12).score, 50);
        assert_eq!(geo(AnomalyType::NewCountry, 12).score, 30);
        assert_eq!(geo(AnomalyType::SameCountry, 12).score, 15);

        // Odd-hours bonus only for new or risky countries
        assert_eq!(geo(AnomalyType::RiskCountry, 23).score, 75);
        assert_eq!(geo(AnomalyType::NewCountry, 4).score, 55);
        assert_eq!(geo(AnomalyType::ImpossibleTravel, 23).score, 60);
        assert_eq!(geo(AnomalyType::SameCountry, 2).score, 15);
    }

    #[test]
    fn test_geo_reason_mentions_hours() {
        let result = score_geo(&GeoRiskInput {
            anomaly_type: AnomalyType::ImpossibleTravel,
            current_country: "China".to_string(),
            hours_between: 0.5,
            min_travel_hours: 15.7,
            timestamp: at_hour(9),
        });
        assert!(result.reasons[0].contains("0.5h between logins"));
        assert!(result.reasons[0].contains("15.7h minimum travel time"));
    }
}
