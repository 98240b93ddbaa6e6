//! In-memory store

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{DownloadAlert, GeoAlert, LoginEvent, StoreResult, ThreatStore};
use crate::logic::geo::EmployeeProfile;
use crate::logic::risk::LoginOutcome;
use crate::logic::threat::{ActiveThreat, ThreatCategory};

#[derive(Default)]
struct Tables {
    logins: Vec<LoginEvent>,
    download_alerts: Vec<DownloadAlert>,
    geo_alerts: Vec<GeoAlert>,
    threats: Vec<ActiveThreat>,
    profiles: HashMap<String, EmployeeProfile>,
}

/// Store kept in process memory. Lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All threats, solved ones included
    pub fn all_threats(&self) -> Vec<ActiveThreat> {
        self.tables.read().threats.clone()
    }
}

impl ThreatStore for MemoryStore {
    fn insert_login(&self, event: &LoginEvent) -> StoreResult<()> {
        self.tables.write().logins.push(event.clone());
        Ok(())
    }

    fn close_login(&self, login_ref: Uuid, logout_at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.logins.iter_mut().find(|l| l.id == login_ref) {
            Some(login) => {
                login.logout_at = Some(logout_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn count_failed_logins_since(
        &self,
        employee_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<usize> {
        Ok(self
            .tables
            .read()
            .logins
            .iter()
            .filter(|l| {
                l.employee_id == employee_id
                    && l.outcome == LoginOutcome::Failed
                    && l.timestamp >= since
            })
            .count())
    }

    fn count_unanswered_failures_since(
        &self,
        employee_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let tables = self.tables.read();
        let mine: Vec<&LoginEvent> = tables
            .logins
            .iter()
            .filter(|l| l.employee_id == employee_id)
            .collect();

        let last_success = mine
            .iter()
            .filter(|l| l.outcome == LoginOutcome::Success)
            .map(|l| l.timestamp)
            .max();

        Ok(mine
            .iter()
            .filter(|l| {
                l.outcome == LoginOutcome::Failed
                    && l.timestamp >= since
                    && last_success.map_or(true, |s| l.timestamp > s)
            })
            .count())
    }

    fn last_completed_login(&self, employee_id: &str) -> StoreResult<Option<LoginEvent>> {
        Ok(self
            .tables
            .read()
            .logins
            .iter()
            .filter(|l| {
                l.employee_id == employee_id
                    && l.outcome == LoginOutcome::Success
                    && l.logout_at.is_some()
            })
            .max_by_key(|l| l.timestamp)
            .cloned())
    }

    fn login(&self, login_ref: Uuid) -> StoreResult<Option<LoginEvent>> {
        Ok(self
            .tables
            .read()
            .logins
            .iter()
            .find(|l| l.id == login_ref)
            .cloned())
    }

    fn insert_download_alert(&self, alert: &DownloadAlert) -> StoreResult<()> {
        self.tables.write().download_alerts.push(alert.clone());
        Ok(())
    }

    fn insert_geo_alert(&self, alert: &GeoAlert) -> StoreResult<()> {
        self.tables.write().geo_alerts.push(alert.clone());
        Ok(())
    }

    fn download_alerts(&self, employee_id: &str) -> StoreResult<Vec<DownloadAlert>> {
        Ok(self
            .tables
            .read()
            .download_alerts
            .iter()
            .filter(|a| a.employee_id == employee_id)
            .cloned()
            .collect())
    }

    fn geo_alerts(&self, employee_id: &str) -> StoreResult<Vec<GeoAlert>> {
        Ok(self
            .tables
            .read()
            .geo_alerts
            .iter()
            .filter(|a| a.employee_id == employee_id)
            .cloned()
            .collect())
    }

    fn insert_threat(&self, threat: &ActiveThreat) -> StoreResult<()> {
        self.tables.write().threats.push(threat.clone());
        Ok(())
    }

    fn update_threat(&self, threat: &ActiveThreat) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.threats.iter_mut().find(|t| t.id == threat.id) {
            *existing = threat.clone();
        } else {
            tables.threats.push(threat.clone());
        }
        Ok(())
    }

    fn find_open_threat(
        &self,
        employee_id: &str,
        category: ThreatCategory,
        opened_since: DateTime<Utc>,
    ) -> StoreResult<Option<ActiveThreat>> {
        Ok(self
            .tables
            .read()
            .threats
            .iter()
            .filter(|t| {
                t.employee_id == employee_id
                    && t.category == category
                    && !t.solved
                    && t.opened_at >= opened_since
            })
            .max_by_key(|t| t.opened_at)
            .cloned())
    }

    fn mark_threat_solved(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.threats.iter_mut().find(|t| t.id == id) {
            Some(threat) => {
                threat.solved = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn open_threats(&self, employee_id: Option<&str>) -> StoreResult<Vec<ActiveThreat>> {
        let mut list: Vec<ActiveThreat> = self
            .tables
            .read()
            .threats
            .iter()
            .filter(|t| !t.solved && employee_id.map_or(true, |e| t.employee_id == e))
            .cloned()
            .collect();
        // Newest first
        list.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        Ok(list)
    }

    fn employee_profile(&self, employee_id: &str) -> StoreResult<Option<EmployeeProfile>> {
        Ok(self.tables.read().profiles.get(employee_id).cloned())
    }

    fn upsert_employee_profile(&self, profile: &EmployeeProfile) -> StoreResult<()> {
        self.tables
            .write()
            .profiles
            .insert(profile.employee_id.clone(), profile.clone());
        Ok(())
    }
}
