//! Detection Service
//!
//! Wires the rule engine, geo analyzer, activity aggregator, threat manager
//! and session manager together and exposes the operations callers use:
//! scoring, login/logout orchestration, download touches and threat queries.


use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::logic::activity::{ActivityAggregator, DownloadTouch, MonitoringStatus};
use crate::logic::clock::Clock;
use crate::logic::events::AlertSink;
use crate::logic::geo::{
    verify_login_location, AnomalyResult, EmployeeProfile, GeoAnalyzer, Location, LocationResolver,
    LocationVerdict, LoginPoint,
};
use crate::logic::risk::{
    score_bulk_download_with, score_geo_with, score_login_with, BulkDownloadRiskInput, GeoRiskInput,
    LoginOutcome, LoginRiskInput, RiskAssessment, RiskLevel, RiskRules, THREAT_MIN_SCORE,
};
use crate::logic::session::{Session, SessionManager};
use crate::logic::store::{GeoAlert, LoginEvent, ThreatStore};
use crate::logic::threat::{ActiveThreat, ThreatAlert, ThreatDetails, ThreatManager};
use crate::logic::validate;

/// Trailing window for counting failed logins
const FAILED_LOGIN_WINDOW_MINUTES: i64 = 60;

/// Score of the threat raised for a login refused by location verification
const BLOCKED_LOGIN_SCORE: u32 = 100;

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginGrant {
    pub employee_id: String,
    pub login_ref: Uuid,
    pub location: Location,
    pub risk: RiskAssessment,
    pub verdict: LocationVerdict,
    pub anomaly: Option<AnomalyResult>,
    /// Threats created or updated by this login
    pub threats: Vec<ThreatAlert>,
}

/// Result of a recorded failed login
#[derive(Debug, Clone, Serialize)]
pub struct FailedLogin {
    pub employee_id: String,
    pub login_ref: Uuid,
    pub failed_attempts: u32,
    pub risk: RiskAssessment,
    pub threat: Option<ThreatAlert>,
}

pub struct DetectionService<R> {
    store: Arc<dyn ThreatStore>,
    clock: Arc<dyn Clock>,
    rules: Arc<RiskRules>,
    geo: GeoAnalyzer<R>,
    threats: Arc<ThreatManager>,
    aggregator: ActivityAggregator,
    sessions: SessionManager,
}

impl<R: LocationResolver> DetectionService<R> {
    pub fn new(
        store: Arc<dyn ThreatStore>,
        sink: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        resolver: R,
        config: &Config,
    ) -> Self {
        let rules = Arc::new(config.rules.clone());
        let threats = Arc::new(ThreatManager::new(
            store.clone(),
            sink,
            clock.clone(),
            config.dedup.clone(),
        ));
        let geo = GeoAnalyzer::new(resolver, clock.clone(), rules.clone(), &config.geo);
        let aggregator = ActivityAggregator::new(
            store.clone(),
            threats.clone(),
            clock.clone(),
            rules.clone(),
            config.aggregator.clone(),
            config.watch.clone(),
        );
        let sessions = SessionManager::new(
            store.clone(),
            aggregator.clone(),
            clock.clone(),
            config.session.clone(),
        );

        Self {
            store,
            clock,
            rules,
            geo,
            threats,
            aggregator,
            sessions,
        }
    }

    // ========================================================================
    // SCORING
    // ========================================================================

    pub fn score_login(&self, input: &LoginRiskInput) -> RiskAssessment {
        score_login_with(input, &self.rules)
    }

    pub fn score_bulk_download(&self, input: &BulkDownloadRiskInput) -> RiskAssessment {
        score_bulk_download_with(input, &self.rules)
    }

    pub fn score_geo(&self, input: &GeoRiskInput) -> RiskAssessment {
        score_geo_with(input, &self.rules)
    }

    // ========================================================================
    // LOGIN
    // ========================================================================

    /// Record a failed login attempt and raise a login threat when warranted
    pub fn record_failed_login(&self, employee_id: &str, ip: &str) -> EngineResult<FailedLogin> {
        validate::employee_id(employee_id)?;
        validate::ip_address(ip)?;

        let now = self.clock.now();
        let failed_attempts = self.recent_failures(employee_id, now)? + 1;

        let risk = self.score_login(&LoginRiskInput {
            failed_attempts,
            timestamp: now,
            outcome: LoginOutcome::Failed,
            previous_failed_then_success: false,
        });

        let event = LoginEvent {
            id: Uuid::new_v4(),
            employee_id: employee_id.to_string(),
            timestamp: now,
            logout_at: None,
            ip_address: ip.to_string(),
            city: None,
            country: None,
            outcome: LoginOutcome::Failed,
            failed_attempts,
            risk_level: risk.level,
        };
        self.store.insert_login(&event)?;

        let threat = self.threats.raise(
            employee_id,
            risk.clone(),
            ThreatDetails::Login {
                failed_attempts,
                login_time: now,
            },
            event.id,
        )?;

        tracing::info!(
            "Failed login for {} ({} in the last hour, score={})",
            employee_id,
            failed_attempts,
            risk.score
        );

        Ok(FailedLogin {
            employee_id: employee_id.to_string(),
            login_ref: event.id,
            failed_attempts,
            risk,
            threat,
        })
    }

    /// Full successful-login flow: location verification, login scoring,
    /// geographic analysis, threat raising, session and monitoring start.
    pub async fn login(&self, employee_id: &str, ip: &str) -> EngineResult<LoginGrant> {
        validate::employee_id(employee_id)?;
        validate::ip_address(ip)?;

        let now = self.clock.now();
        let location = self.geo.resolve(ip).await;

        let profile = self.store.employee_profile(employee_id)?;
        let verdict = verify_login_location(ip, &location, profile.as_ref());

        if !verdict.allowed {
            return Err(self.block_login(employee_id, ip, &location, &verdict, now)?);
        }

        let previous = self.store.last_completed_login(employee_id)?;

        let failures = self.failures_since_last_success(employee_id, now)?;
        let risk = self.score_login(&LoginRiskInput {
            failed_attempts: failures,
            timestamp: now,
            outcome: LoginOutcome::Success,
            previous_failed_then_success: failures > 0,
        });

        let risk_level = if risk.score >= THREAT_MIN_SCORE {
            risk.level
        } else {
            verdict.risk_level
        };

        let event = LoginEvent {
            id: Uuid::new_v4(),
            employee_id: employee_id.to_string(),
            timestamp: now,
            logout_at: None,
            ip_address: ip.to_string(),
            city: Some(location.city.clone()),
            country: Some(location.country.clone()),
            outcome: LoginOutcome::Success,
            failed_attempts: failures,
            risk_level,
        };
        self.store.insert_login(&event)?;

        let mut threats = Vec::new();

        // Allowed but from an unverified place
        if let Some(score) = verdict.threat_score() {
            let alert = self.threats.raise(
                employee_id,
                RiskAssessment::new(score, vec![verdict.reason.clone()]),
                ThreatDetails::LocationCheck {
                    ip_address: ip.to_string(),
                    location: location.to_string(),
                    reason: verdict.reason.clone(),
                    blocked: false,
                    matched_location: verdict.matched_location.clone(),
                },
                event.id,
            )?;
            threats.extend(alert);
        }

        let previous_point = previous.map(|p| LoginPoint::new(&p.ip_address, p.timestamp));
        let current_point = LoginPoint::new(ip, now);
        let (anomaly, geo_threat) = self
            .analyze_and_record(employee_id, &current_point, previous_point.as_ref())
            .await?;
        threats.extend(geo_threat);

        let login_threat = self.threats.raise(
            employee_id,
            risk.clone(),
            ThreatDetails::Login {
                failed_attempts: failures,
                login_time: now,
            },
            event.id,
        )?;
        threats.extend(login_threat);

        self.sessions.start_session(employee_id, event.id)?;

        tracing::info!(
            "Login granted for {} from {} (score={}, location risk={})",
            employee_id,
            location,
            risk.score,
            verdict.risk_level
        );

        Ok(LoginGrant {
            employee_id: employee_id.to_string(),
            login_ref: event.id,
            location,
            risk,
            verdict,
            anomaly,
            threats,
        })
    }

    fn block_login(
        &self,
        employee_id: &str,
        ip: &str,
        location: &Location,
        verdict: &LocationVerdict,
        now: DateTime<Utc>,
    ) -> EngineResult<EngineError> {
        let event = LoginEvent {
            id: Uuid::new_v4(),
            employee_id: employee_id.to_string(),
            timestamp: now,
            logout_at: None,
            ip_address: ip.to_string(),
            city: Some(location.city.clone()),
            country: Some(location.country.clone()),
            outcome: LoginOutcome::Failed,
            failed_attempts: 0,
            risk_level: verdict.risk_level,
        };
        self.store.insert_login(&event)?;

        let alert = self.threats.raise(
            employee_id,
            RiskAssessment::new(BLOCKED_LOGIN_SCORE, vec![verdict.reason.clone()]),
            ThreatDetails::LocationCheck {
                ip_address: ip.to_string(),
                location: location.to_string(),
                reason: verdict.reason.clone(),
                blocked: true,
                matched_location: None,
            },
            event.id,
        )?;

        tracing::warn!("Login blocked for {}: {}", employee_id, verdict.reason);

        Ok(EngineError::LoginBlocked {
            employee_id: employee_id.to_string(),
            reason: verdict.reason.clone(),
            threat_id: alert.map(|a| a.threat.id),
        })
    }

    pub fn logout(&self, employee_id: &str) -> EngineResult<Session> {
        validate::employee_id(employee_id)?;
        self.sessions
            .end_session(employee_id)?
            .ok_or_else(|| EngineError::NotFound(format!("no active session for {}", employee_id)))
    }

    pub fn touch_activity(&self, employee_id: &str) -> bool {
        self.sessions.touch_activity(employee_id)
    }

    fn recent_failures(&self, employee_id: &str, now: DateTime<Utc>) -> EngineResult<u32> {
        let since = now - Duration::minutes(FAILED_LOGIN_WINDOW_MINUTES);
        let count = self.store.count_failed_logins_since(employee_id, since)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Failures in the trailing window not already followed by a successful login
    fn failures_since_last_success(&self, employee_id: &str, now: DateTime<Utc>) -> EngineResult<u32> {
        let since = now - Duration::minutes(FAILED_LOGIN_WINDOW_MINUTES);
        let count = self.store.count_unanswered_failures_since(employee_id, since)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    // ========================================================================
    // GEO
    // ========================================================================

    /// Compare a login at `ip` with the employee's last completed login.
    /// Anomalies scoring 25 or more are persisted and raised as geo threats.
    pub async fn resolve_and_analyze_geo(
        &self,
        employee_id: &str,
        ip: &str,
        timestamp: DateTime<Utc>,
    ) -> EngineResult<Option<AnomalyResult>> {
        validate::employee_id(employee_id)?;
        validate::ip_address(ip)?;
        validate::timestamp(timestamp)?;

        let previous = self
            .store
            .last_completed_login(employee_id)?
            .map(|p| LoginPoint::new(&p.ip_address, p.timestamp));

        let (anomaly, _) = self
            .analyze_and_record(employee_id, &LoginPoint::new(ip, timestamp), previous.as_ref())
            .await?;
        Ok(anomaly)
    }

    async fn analyze_and_record(
        &self,
        employee_id: &str,
        current: &LoginPoint,
        previous: Option<&LoginPoint>,
    ) -> EngineResult<(Option<AnomalyResult>, Option<ThreatAlert>)> {
        let anomaly = match self.geo.analyze(current, previous).await {
            Some(anomaly) => anomaly,
            None => return Ok((None, None)),
        };

        if anomaly.risk.score < THREAT_MIN_SCORE {
            tracing::debug!(
                "Geo change for {} below alert threshold: {} ({})",
                employee_id,
                anomaly.anomaly_type,
                anomaly.risk.score
            );
            return Ok((Some(anomaly), None));
        }

        let alert = GeoAlert::from_anomaly(employee_id, &anomaly, self.clock.now());
        self.store.insert_geo_alert(&alert)?;

        let threat = self.threats.raise(
            employee_id,
            anomaly.risk.clone(),
            ThreatDetails::GeoAnomaly {
                anomaly_type: anomaly.anomaly_type,
                current_location: anomaly.current_location.to_string(),
                previous_location: anomaly.previous_location.to_string(),
            },
            alert.id,
        )?;

        tracing::warn!(
            "Geographic alert for {}: {} ({} -> {})",
            employee_id,
            anomaly.anomaly_type,
            anomaly.previous_location,
            anomaly.current_location
        );

        Ok((Some(anomaly), threat))
    }

    // ========================================================================
    // FILE ACTIVITY
    // ========================================================================

    /// Feed one settled file into the employee's bulk window.
    /// `Ok(false)` when the employee is not monitored.
    pub fn record_download_touch(
        &self,
        employee_id: &str,
        path: &str,
        size: i64,
        timestamp: DateTime<Utc>,
    ) -> EngineResult<bool> {
        validate::employee_id(employee_id)?;
        validate::path(path)?;
        validate::timestamp(timestamp)?;
        let size_bytes = validate::size_bytes(size)?;

        Ok(self
            .aggregator
            .record_touch(DownloadTouch::new(employee_id, path, size_bytes, timestamp)))
    }

    pub fn monitoring_status(&self) -> MonitoringStatus {
        self.aggregator.monitoring_status()
    }

    pub fn aggregator(&self) -> &ActivityAggregator {
        &self.aggregator
    }

    // ========================================================================
    // THREATS, SESSIONS, PROFILES
    // ========================================================================

    pub fn resolve_threat(&self, threat_id: Uuid) -> EngineResult<bool> {
        Ok(self.threats.resolve(threat_id)?)
    }

    pub fn open_threats(&self, employee_id: Option<&str>) -> EngineResult<Vec<ActiveThreat>> {
        Ok(self.threats.open_threats(employee_id)?)
    }

    pub fn active_sessions(&self) -> Vec<Session> {
        self.sessions.active_sessions()
    }

    pub fn upsert_employee_profile(&self, profile: &EmployeeProfile) -> EngineResult<()> {
        validate::employee_id(&profile.employee_id)?;
        self.store.upsert_employee_profile(profile)?;
        tracing::info!("Employee profile saved for {}", profile.employee_id);
        Ok(())
    }

    /// Highest level among the employee's open threats
    pub fn employee_risk_level(&self, employee_id: &str) -> EngineResult<RiskLevel> {
        Ok(self
            .open_threats(Some(employee_id))?
            .iter()
            .map(|t| t.risk.level)
            .max()
            .unwrap_or(RiskLevel::Low))
    }

    /// Stop every timer and watcher
    pub fn shutdown(&self) {
        self.sessions.shutdown();
        self.aggregator.shutdown();
        let pruned = self.geo.prune_cache();
        tracing::info!("Detection service stopped ({} cached locations pruned)", pruned);
    }
}
