//! Login location verification
//!
//! Checks a resolved login location against the places an employee has
//! registered. Verified locations are tried in order; for each one the IP
//! ranges are checked before the city.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use super::types::Location;
use crate::logic::risk::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationKind {
    Office,
    Home,
    Remote,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationKind::Office => "office",
            LocationKind::Home => "home",
            LocationKind::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedLocation {
    pub kind: LocationKind,
    pub country: String,
    pub city: String,
    /// CIDR blocks or single addresses
    #[serde(default)]
    pub ip_ranges: Vec<String>,
    pub verified: bool,
}

impl VerifiedLocation {
    fn label(&self) -> String {
        format!("{} ({}, {})", self.kind.as_str(), self.city, self.country)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub employee_id: String,
    pub name: String,
    pub verification_enabled: bool,
    #[serde(default)]
    pub verified_locations: Vec<VerifiedLocation>,
    #[serde(default)]
    pub allowed_countries: Vec<String>,
    #[serde(default)]
    pub strict_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationVerdict {
    pub allowed: bool,
    pub risk_level: RiskLevel,
    pub reason: String,
    pub matched_location: Option<String>,
}

impl LocationVerdict {
    fn low(reason: String, matched: Option<String>) -> Self {
        Self {
            allowed: true,
            risk_level: RiskLevel::Low,
            reason,
            matched_location: matched,
        }
    }

    /// Score of the geo threat raised for this verdict, if any
    pub fn threat_score(&self) -> Option<u32> {
        match self.risk_level {
            RiskLevel::Low => None,
            RiskLevel::Medium => Some(50),
            RiskLevel::High => Some(75),
            RiskLevel::Critical => Some(100),
        }
    }
}

/// True when `ip` falls inside `range` (CIDR or a bare address)
pub fn ip_in_range(ip: &IpAddr, range: &str) -> bool {
    match range.trim().parse::<IpNetwork>() {
        Ok(network) => network.contains(*ip),
        Err(_) => {
            tracing::warn!("Invalid IP range in employee profile: {}", range);
            false
        }
    }
}

/// Verdict for a login from `ip` resolved to `location`.
/// A missing profile means verification is disabled.
pub fn verify_login_location(
    ip: &str,
    location: &Location,
    profile: Option<&EmployeeProfile>,
) -> LocationVerdict {
    let profile = match profile {
        Some(p) if p.verification_enabled => p,
        _ => return LocationVerdict::low("Location verification disabled".to_string(), None),
    };

    let parsed_ip = ip.parse::<IpAddr>().ok();

    for verified in profile.verified_locations.iter().filter(|l| l.verified) {
        if let Some(addr) = parsed_ip.as_ref() {
            if verified.ip_ranges.iter().any(|r| ip_in_range(addr, r)) {
                return LocationVerdict::low(
                    format!("IP matched verified {} location", verified.kind.as_str()),
                    Some(verified.label()),
                );
            }
        }

        if verified.country.eq_ignore_ascii_case(&location.country)
            && verified.city.eq_ignore_ascii_case(&location.city)
        {
            return LocationVerdict::low(
                format!("Location matched verified {}", verified.kind.as_str()),
                Some(verified.label()),
            );
        }
    }

    if profile
        .allowed_countries
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&location.country))
    {
        return LocationVerdict {
            allowed: true,
            risk_level: RiskLevel::Medium,
            reason: format!(
                "Country {} is in allowed list, but city {} is new",
                location.country, location.city
            ),
            matched_location: None,
        };
    }

    if profile.strict_mode {
        return LocationVerdict {
            allowed: false,
            risk_level: RiskLevel::Critical,
            reason: format!(
                "Strict mode enabled: Unverified location {}, {}",
                location.city, location.country
            ),
            matched_location: None,
        };
    }

    LocationVerdict {
        allowed: true,
        risk_level: RiskLevel::High,
        reason: format!("Unknown location {}, {}", location.city, location.country),
        matched_location: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> EmployeeProfile {
        EmployeeProfile {
            employee_id: "EMP001".into(),
            name: "Dana".into(),
            verification_enabled: true,
            verified_locations: vec![
                VerifiedLocation {
                    kind: LocationKind::Office,
                    country: "United States".into(),
                    city: "Austin".into(),
                    ip_ranges: vec!["198.51.100.0/24".into()],
                    verified: true,
                },
                VerifiedLocation {
                    kind: LocationKind::Home,
                    country: "Mexico".into(),
                    city: "Monterrey".into(),
                    ip_ranges: vec![],
                    verified: false,
                },
            ],
            allowed_countries: vec!["Canada".into()],
            strict_mode: false,
        }
    }

    fn somewhere(country: &str, city: &str) -> Location {
        Location::new(country, city, 0.0, 0.0)
    }

    #[test]
    fn test_no_profile_or_disabled_is_low() {
        let verdict = verify_login_location("1.2.3.4", &somewhere("Iran", "Tehran"), None);
        assert!(verdict.allowed);
        assert_eq!(verdict.risk_level, RiskLevel::Low);

        let mut disabled = profile();
        disabled.verification_enabled = false;
        disabled.strict_mode = true;
        let verdict = verify_login_location("1.2.3.4", &somewhere("Iran", "Tehran"), Some(&disabled));
        assert!(verdict.allowed);
    }

    #[test]
    fn test_ip_range_match_wins_over_location() {
        let verdict = verify_login_location("198.51.100.77", &somewhere("Germany", "Berlin"), Some(&profile()));
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        assert_eq!(verdict.reason, "IP matched verified office location");
        assert!(verdict.threat_score().is_none());
    }

    #[test]
    fn test_city_match_is_case_insensitive() {
        let verdict = verify_login_location("10.1.1.1", &somewhere("united states", "AUSTIN"), Some(&profile()));
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        assert!(verdict.matched_location.is_some());
    }

    #[test]
    fn test_unverified_entries_are_skipped() {
        let verdict = verify_login_location("10.1.1.1", &somewhere("Mexico", "Monterrey"), Some(&profile()));
        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert_eq!(verdict.threat_score(), Some(75));
    }

    #[test]
    fn test_allowed_country_then_strict_mode() {
        let verdict = verify_login_location("10.1.1.1", &somewhere("Canada", "Toronto"), Some(&profile()));
        assert!(verdict.allowed);
        assert_eq!(verdict.risk_level, RiskLevel::Medium);

        let mut strict = profile();
        strict.strict_mode = true;
        let verdict = verify_login_location("10.1.1.1", &somewhere("France", "Paris"), Some(&strict));
        assert!(!verdict.allowed);
        assert_eq!(verdict.risk_level, RiskLevel::Critical);
        assert_eq!(verdict.threat_score(), Some(100));
    }

    #[test]
    fn test_ip_in_range() {
        let ip: IpAddr = "192.168.1.20".parse().unwrap();
        assert!(ip_in_range(&ip, "192.168.1.0/24"));
        assert!(ip_in_range(&ip, "192.168.1.20"));
        assert!(!ip_in_range(&ip, "10.0.0.0/8"));
        assert!(!ip_in_range(&ip, "not-a-range"));
    }
}
