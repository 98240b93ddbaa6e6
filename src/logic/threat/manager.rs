//! Threat Manager
//!
//! Owns the dedup policy: a qualifying event either opens a new threat or
//! folds into the open threat of the same employee and category that was
//! opened inside the dedup window. Every create/update is broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{ActiveThreat, AlertKind, ThreatAlert, ThreatCategory, ThreatDetails};
use crate::logic::clock::Clock;
use crate::logic::events::AlertSink;
use crate::logic::risk::RiskAssessment;
use crate::logic::store::{StoreResult, ThreatStore};

/// Dedup window per category, in minutes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupPolicy {
    pub login_minutes: i64,
    pub bulk_minutes: i64,
    pub geo_minutes: i64,
}

impl DedupPolicy {
    pub fn uniform(minutes: i64) -> Self {
        Self {
            login_minutes: minutes,
            bulk_minutes: minutes,
            geo_minutes: minutes,
        }
    }

    pub fn window(&self, category: ThreatCategory) -> Duration {
        let minutes = match category {
            ThreatCategory::Login => self.login_minutes,
            ThreatCategory::Bulk => self.bulk_minutes,
            ThreatCategory::Geo => self.geo_minutes,
        };
        Duration::minutes(minutes)
    }
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self::uniform(30)
    }
}

type DedupKey = (String, ThreatCategory);

pub struct ThreatManager {
    store: Arc<dyn ThreatStore>,
    sink: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    policy: DedupPolicy,
    /// Serializes find-then-write per employee and category
    locks: Mutex<HashMap<DedupKey, Arc<Mutex<()>>>>,
}

impl ThreatManager {
    pub fn new(
        store: Arc<dyn ThreatStore>,
        sink: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        policy: DedupPolicy,
    ) -> Self {
        Self {
            store,
            sink,
            clock,
            policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn key_lock(&self, employee_id: &str, category: ThreatCategory) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry((employee_id.to_string(), category))
            .or_default()
            .clone()
    }

    /// Open or refresh a threat for a scored event.
    /// Returns `None` when the score is under the category's creation threshold.
    pub fn raise(
        &self,
        employee_id: &str,
        risk: RiskAssessment,
        details: ThreatDetails,
        source_ref: Uuid,
    ) -> StoreResult<Option<ThreatAlert>> {
        let category = details.category();
        if risk.score < category.creation_threshold() {
            return Ok(None);
        }

        let lock = self.key_lock(employee_id, category);
        let _guard = lock.lock();

        let now = self.clock.now();
        let since = now - self.policy.window(category);

        let (kind, threat) = match self.store.find_open_threat(employee_id, category, since)? {
            Some(mut existing) => {
                existing.refresh(risk, details, source_ref, now);
                self.store.update_threat(&existing)?;
                tracing::warn!(
                    "Threat updated: {} {} score={} occurrences={}",
                    employee_id,
                    category,
                    existing.risk.score,
                    existing.occurrences
                );
                (AlertKind::Updated, existing)
            }
            None => {
                let threat = ActiveThreat::new(employee_id, risk, details, source_ref, now);
                self.store.insert_threat(&threat)?;
                tracing::warn!(
                    "New threat: {} {} score={} level={}",
                    employee_id,
                    category,
                    threat.risk.score,
                    threat.risk.level
                );
                (AlertKind::Created, threat)
            }
        };

        let alert = ThreatAlert { kind, category, threat };
        self.sink.publish(&alert);
        Ok(Some(alert))
    }

    /// Operator action. Returns false for unknown ids.
    pub fn resolve(&self, threat_id: Uuid) -> StoreResult<bool> {
        let solved = self.store.mark_threat_solved(threat_id)?;
        if solved {
            tracing::info!("Threat {} marked solved", threat_id);
        } else {
            tracing::debug!("Resolve requested for unknown threat {}", threat_id);
        }
        Ok(solved)
    }

    pub fn open_threats(&self, employee_id: Option<&str>) -> StoreResult<Vec<ActiveThreat>> {
        self.store.open_threats(employee_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::clock::ManualClock;
    use crate::logic::events::EventEmitter;
    use crate::logic::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        manager: ThreatManager,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        emitter: Arc<EventEmitter>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 11, 0, 0).unwrap()));
        let emitter = Arc::new(EventEmitter::default());
        let manager = ThreatManager::new(store.clone(), emitter.clone(), clock.clone(), DedupPolicy::default());
        Fixture { manager, store, clock, emitter }
    }

    fn login_details(failed: u32, f: &Fixture) -> ThreatDetails {
        ThreatDetails::Login { failed_attempts: failed, login_time: f.clock.now() }
    }

    #[test]
    fn test_repeat_within_window_updates_single_threat() {
        let f = fixture();
        let mut rx = f.emitter.subscribe();

        let first = f
            .manager
            .raise("EMP001", RiskAssessment::new(25, vec!["a".into()]), login_details(3, &f), Uuid::new_v4())
            .unwrap()
            .unwrap();
        assert_eq!(first.kind, AlertKind::Created);

        f.clock.advance(Duration::minutes(5));
        let second = f
            .manager
            .raise("EMP001", RiskAssessment::new(35, vec!["b".into()]), login_details(6, &f), Uuid::new_v4())
            .unwrap()
            .unwrap();
        assert_eq!(second.kind, AlertKind::Updated);

        let threats = f.store.all_threats();
        assert_eq!(threats.len(), 1);
        assert_eq!(threats[0].id, first.threat.id);
        assert_eq!(threats[0].risk.score, 35);
        assert_eq!(threats[0].risk.reasons, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(threats[0].last_updated_at, f.clock.now());

        assert_eq!(rx.try_recv().unwrap().name, "new_threat");
        assert_eq!(rx.try_recv().unwrap().name, "threat_updated");
    }

    #[test]
    fn test_outside_window_opens_new_threat() {
        let f = fixture();
        f.manager
            .raise("EMP001", RiskAssessment::new(30, vec![]), login_details(3, &f), Uuid::new_v4())
            .unwrap();

        f.clock.advance(Duration::minutes(31));
        let again = f
            .manager
            .raise("EMP001", RiskAssessment::new(30, vec![]), login_details(3, &f), Uuid::new_v4())
            .unwrap()
            .unwrap();
        assert_eq!(again.kind, AlertKind::Created);
        assert_eq!(f.store.all_threats().len(), 2);
    }

    #[test]
    fn test_categories_and_employees_are_independent() {
        let f = fixture();
        f.manager
            .raise("EMP001", RiskAssessment::new(30, vec![]), login_details(3, &f), Uuid::new_v4())
            .unwrap();
        f.manager
            .raise("EMP002", RiskAssessment::new(30, vec![]), login_details(3, &f), Uuid::new_v4())
            .unwrap();
        f.manager
            .raise(
                "EMP001",
                RiskAssessment::new(60, vec![]),
                ThreatDetails::GeoAnomaly {
                    anomaly_type: crate::logic::risk::AnomalyType::ImpossibleTravel,
                    current_location: "Beijing, China".into(),
                    previous_location: "New York, United States".into(),
                },
                Uuid::new_v4(),
            )
            .unwrap();
        assert_eq!(f.store.all_threats().len(), 3);
    }

    #[test]
    fn test_bulk_threshold_is_thirty() {
        let f = fixture();
        let bulk = |score: u32| {
            f.manager.raise(
                "EMP001",
                RiskAssessment::new(score, vec![]),
                ThreatDetails::Bulk { total_files: 30, total_size_mb: 1.0, folder_path: "/d".into() },
                Uuid::new_v4(),
            )
        };

        assert!(bulk(25).unwrap().is_none());
        assert!(bulk(29).unwrap().is_none());
        assert!(f.store.all_threats().is_empty());
        assert!(bulk(30).unwrap().is_some());

        // Login threshold stays at 25
        assert!(f
            .manager
            .raise("EMP001", RiskAssessment::new(24, vec![]), login_details(2, &f), Uuid::new_v4())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_solved_threat_is_not_reused() {
        let f = fixture();
        let first = f
            .manager
            .raise("EMP001", RiskAssessment::new(30, vec![]), login_details(3, &f), Uuid::new_v4())
            .unwrap()
            .unwrap();
        assert!(f.manager.resolve(first.threat.id).unwrap());
        assert!(!f.manager.resolve(Uuid::new_v4()).unwrap());

        let second = f
            .manager
            .raise("EMP001", RiskAssessment::new(30, vec![]), login_details(3, &f), Uuid::new_v4())
            .unwrap()
            .unwrap();
        assert_eq!(second.kind, AlertKind::Created);
        assert_eq!(f.manager.open_threats(Some("EMP001")).unwrap().len(), 1);
    }
}
