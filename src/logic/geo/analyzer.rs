//! Geographic Anomaly Analyzer
//!
//! Resolves login IPs to locations (cached per IP), compares the current
//! login against the previous completed one and classifies the difference.
//!
//! Resolver failures never reach the caller: `resolve` falls back to the
//! `Unknown` location and the failure is not cached.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::distance::{is_impossible_travel, min_travel_hours, round1};
use super::resolver::LocationResolver;
use super::types::{AnomalyResult, Location, LoginPoint};
use crate::logic::clock::Clock;
use crate::logic::risk::{score_geo_with, AnomalyType, GeoRiskInput, RiskRules};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoConfig {
    pub api_url: String,
    pub timeout_seconds: u64,
    pub cache_ttl_seconds: i64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            api_url: "http://ip-api.com/json".to_string(),
            timeout_seconds: 5,
            cache_ttl_seconds: 3600,
        }
    }
}

struct CacheEntry {
    location: Location,
    expires_at: DateTime<Utc>,
}

pub struct GeoAnalyzer<R> {
    resolver: R,
    clock: Arc<dyn Clock>,
    rules: Arc<RiskRules>,
    cache_ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl<R: LocationResolver> GeoAnalyzer<R> {
    pub fn new(resolver: R, clock: Arc<dyn Clock>, rules: Arc<RiskRules>, config: &GeoConfig) -> Self {
        Self {
            resolver,
            clock,
            rules,
            cache_ttl: Duration::seconds(config.cache_ttl_seconds),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Location for an IP. Never fails.
    pub async fn resolve(&self, ip: &str) -> Location {
        let now = self.clock.now();

        let cached = self
            .cache
            .read()
            .get(ip)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.location.clone());
        if let Some(location) = cached {
            return location;
        }

        match self.resolver.lookup(ip).await {
            Ok(location) => {
                tracing::debug!("Resolved {} to {}", ip, location);
                // Concurrent misses may both insert; last writer wins
                self.cache.write().insert(
                    ip.to_string(),
                    CacheEntry {
                        location: location.clone(),
                        expires_at: now + self.cache_ttl,
                    },
                );
                location
            }
            Err(e) => {
                tracing::warn!("Location lookup failed for {}: {}", ip, e);
                Location::unknown()
            }
        }
    }

    /// Compare the current login with the previous one.
    /// `None` when there is no previous login or both resolve to the same place.
    pub async fn analyze(
        &self,
        current: &LoginPoint,
        previous: Option<&LoginPoint>,
    ) -> Option<AnomalyResult> {
        let previous = previous?;

        let current_location = self.resolve(&current.ip).await;
        let previous_location = self.resolve(&previous.ip).await;

        if current_location.same_place(&previous_location) {
            return None;
        }

        let elapsed_ms = (current.timestamp - previous.timestamp).num_milliseconds().abs();
        let hours_between = round1(elapsed_ms as f64 / 3_600_000.0);
        let min_travel = round1(min_travel_hours(&previous_location, &current_location));

        let anomaly_type = classify_anomaly(
            hours_between,
            min_travel,
            &current_location,
            &previous_location,
            &self.rules,
        );

        let risk = score_geo_with(
            &GeoRiskInput {
                anomaly_type,
                current_country: current_location.country.clone(),
                hours_between,
                min_travel_hours: min_travel,
                timestamp: current.timestamp,
            },
            &self.rules,
        );

        Some(AnomalyResult {
            current_location,
            previous_location,
            hours_between,
            min_travel_hours: min_travel,
            anomaly_type,
            risk,
        })
    }

    /// Drop expired cache entries
    pub fn prune_cache(&self) -> usize {
        let now = self.clock.now();
        let mut cache = self.cache.write();
        let before = cache.len();
        cache.retain(|_, entry| entry.expires_at > now);
        before - cache.len()
    }
}

/// Anomaly class by precedence: impossible travel, risk country, new country, same country
pub fn classify_anomaly(
    hours_between: f64,
    min_travel_hours: f64,
    current: &Location,
    previous: &Location,
    rules: &RiskRules,
) -> AnomalyType {
    if is_impossible_travel(hours_between, min_travel_hours) {
        AnomalyType::ImpossibleTravel
    } else if rules.is_high_risk_country(&current.country) {
        AnomalyType::RiskCountry
    } else if current.country != previous.country {
        AnomalyType::NewCountry
    } else {
        AnomalyType::SameCountry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::clock::ManualClock;
    use crate::logic::geo::resolver::StaticResolver;
    use crate::logic::geo::types::GeoError;
    use crate::logic::risk::RiskLevel;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn new_york() -> Location {
        Location::new("United States", "New York", 40.7128, -74.006)
    }

    fn beijing() -> Location {
        Location::new("China", "Beijing", 39.9042, 116.4074)
    }

    fn boston() -> Location {
        Location::new("United States", "Boston", 42.3601, -71.0589)
    }

    fn paris() -> Location {
        Location::new("France", "Paris", 48.8566, 2.3522)
    }

    fn resolver() -> StaticResolver {
        StaticResolver::new()
            .with("1.0.0.1", new_york())
            .with("1.0.0.2", beijing())
            .with("1.0.0.3", boston())
            .with("1.0.0.4", paris())
            .with("1.0.0.5", new_york())
    }

    fn analyzer_at(start: DateTime<Utc>) -> (GeoAnalyzer<StaticResolver>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let analyzer = GeoAnalyzer::new(
            resolver(),
            clock.clone(),
            Arc::new(RiskRules::default()),
            &GeoConfig::default(),
        );
        (analyzer, clock)
    }

    #[tokio::test]
    async fn test_impossible_travel() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let (analyzer, _) = analyzer_at(t0);

        let previous = LoginPoint::new("1.0.0.1", t0);
        let current = LoginPoint::new("1.0.0.2", t0 + Duration::minutes(30));
        let result = analyzer.analyze(&current, Some(&previous)).await.unwrap();

        assert_eq!(result.anomaly_type, AnomalyType::ImpossibleTravel);
        assert_eq!(result.hours_between, 0.5);
        assert!(result.min_travel_hours > 15.0);
        assert_eq!(result.risk.score, 60);
        assert_eq!(result.risk.level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_same_city_is_not_an_anomaly() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let (analyzer, _) = analyzer_at(t0);

        // Different IPs, same city
        let previous = LoginPoint::new("1.0.0.1", t0 - Duration::days(30));
        let current = LoginPoint::new("1.0.0.5", t0);
        assert!(analyzer.analyze(&current, Some(&previous)).await.is_none());
        assert!(analyzer.analyze(&current, None).await.is_none());
    }

    #[tokio::test]
    async fn test_precedence_after_feasible_travel() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let (analyzer, _) = analyzer_at(t0);
        let day_later = t0 + Duration::hours(24);

        let from_ny = LoginPoint::new("1.0.0.1", t0);

        let to_beijing = analyzer
            .analyze(&LoginPoint::new("1.0.0.2", day_later), Some(&from_ny))
            .await
            .unwrap();
        assert_eq!(to_beijing.anomaly_type, AnomalyType::RiskCountry);

        let to_paris = analyzer
            .analyze(&LoginPoint::new("1.0.0.4", day_later), Some(&from_ny))
            .await
            .unwrap();
        assert_eq!(to_paris.anomaly_type, AnomalyType::NewCountry);
        assert_eq!(to_paris.risk.score, 30);

        let to_boston = analyzer
            .analyze(&LoginPoint::new("1.0.0.3", day_later), Some(&from_ny))
            .await
            .unwrap();
        assert_eq!(to_boston.anomaly_type, AnomalyType::SameCountry);
        assert_eq!(to_boston.risk.score, 15);
    }

    #[tokio::test]
    async fn test_unresolvable_ip_falls_back_to_unknown() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let (analyzer, _) = analyzer_at(t0);

        let location = analyzer.resolve("203.0.113.9").await;
        assert!(location.is_unknown());
        assert_eq!(location.lat, 0.0);
    }

    struct CountingResolver {
        calls: AtomicUsize,
        fail: bool,
    }

    impl LocationResolver for CountingResolver {
        async fn lookup(&self, ip: &str) -> Result<Location, GeoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GeoError::Network(format!("timeout for {}", ip)))
            } else {
                Ok(paris())
            }
        }
    }

    #[tokio::test]
    async fn test_cache_ttl() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let analyzer = GeoAnalyzer::new(
            CountingResolver { calls: AtomicUsize::new(0), fail: false },
            clock.clone(),
            Arc::new(RiskRules::default()),
            &GeoConfig::default(),
        );

        analyzer.resolve("5.5.5.5").await;
        clock.advance(Duration::minutes(59));
        analyzer.resolve("5.5.5.5").await;
        assert_eq!(analyzer.resolver.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::minutes(2));
        assert_eq!(analyzer.prune_cache(), 1);
        analyzer.resolve("5.5.5.5").await;
        assert_eq!(analyzer.resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let analyzer = GeoAnalyzer::new(
            CountingResolver { calls: AtomicUsize::new(0), fail: true },
            Arc::new(ManualClock::new(t0)),
            Arc::new(RiskRules::default()),
            &GeoConfig::default(),
        );

        assert!(analyzer.resolve("5.5.5.5").await.is_unknown());
        assert!(analyzer.resolve("5.5.5.5").await.is_unknown());
        assert_eq!(analyzer.resolver.calls.load(Ordering::SeqCst), 2);
    }
}
