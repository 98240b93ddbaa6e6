//! Session Manager
//!
//! One active session per employee. Each session owns an idle-check timer;
//! when the employee has been idle for the timeout the logout procedure runs
//! (close the login record, stop file monitoring, drop the session) and the
//! timer ends with it.
//!
//! Start, end and expiry for one employee run under that employee's lock,
//! so concurrent logins replace each other one at a time.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::logic::activity::ActivityAggregator;
use crate::logic::clock::Clock;
use crate::logic::store::{StoreResult, ThreatStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub timeout_minutes: i64,
    pub check_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 30,
            check_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub employee_id: String,
    pub login_ref: Uuid,
    pub login_time: DateTime<Utc>,
    pub last_activity_time: DateTime<Utc>,
}

struct SessionEntry {
    session: Session,
    timer: Option<JoinHandle<()>>,
}

impl SessionEntry {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

type SharedEntry = Arc<Mutex<SessionEntry>>;

struct SessionInner {
    store: Arc<dyn ThreatStore>,
    aggregator: ActivityAggregator,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    sessions: RwLock<HashMap<String, SharedEntry>>,
    /// Serializes start/end/expiry per employee
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn ThreatStore>,
        aggregator: ActivityAggregator,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store,
                aggregator,
                clock,
                config,
                sessions: RwLock::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Install a session for a fresh login, start its idle timer and start
    /// file monitoring for the employee.
    ///
    /// A session already held by the employee is logged out first and
    /// returned. Must be called inside a tokio runtime.
    pub fn start_session(&self, employee_id: &str, login_ref: Uuid) -> StoreResult<Option<Session>> {
        let lock = self.inner.employee_lock(employee_id);
        let _guard = lock.lock();

        let previous = match self.inner.remove_entry(employee_id, None) {
            Some(entry) => {
                tracing::info!("Replacing active session of {}", employee_id);
                Some(self.inner.logout(entry)?)
            }
            None => None,
        };

        let now = self.inner.clock.now();
        let session = Session {
            employee_id: employee_id.to_string(),
            login_ref,
            login_time: now,
            last_activity_time: now,
        };

        let entry = Arc::new(Mutex::new(SessionEntry { session, timer: None }));
        let timer = spawn_idle_check(
            Arc::downgrade(&self.inner),
            Arc::downgrade(&entry),
            employee_id.to_string(),
            StdDuration::from_secs(self.inner.config.check_interval_seconds.max(1)),
        );
        entry.lock().timer = Some(timer);

        self.inner.sessions.write().insert(employee_id.to_string(), entry);
        self.inner.aggregator.start_monitoring(employee_id);

        tracing::info!("Session started for {} ({})", employee_id, login_ref);
        Ok(previous)
    }

    /// Reset the idle clock. False when the employee has no session.
    pub fn touch_activity(&self, employee_id: &str) -> bool {
        match self.inner.entry(employee_id) {
            Some(entry) => {
                entry.lock().session.last_activity_time = self.inner.clock.now();
                true
            }
            None => false,
        }
    }

    /// Logout procedure. `None` when the employee has no session.
    pub fn end_session(&self, employee_id: &str) -> StoreResult<Option<Session>> {
        let lock = self.inner.employee_lock(employee_id);
        let _guard = lock.lock();

        match self.inner.remove_entry(employee_id, None) {
            Some(entry) => self.inner.logout(entry).map(Some),
            None => Ok(None),
        }
    }

    /// Log the employee out when idle for the timeout. True when it did.
    pub fn check_idle(&self, employee_id: &str) -> StoreResult<bool> {
        match self.inner.entry(employee_id) {
            Some(entry) => self.inner.expire_if_idle(employee_id, &entry),
            None => Ok(false),
        }
    }

    pub fn session(&self, employee_id: &str) -> Option<Session> {
        let entry = self.inner.entry(employee_id)?;
        let session = entry.lock().session.clone();
        Some(session)
    }

    pub fn active_sessions(&self) -> Vec<Session> {
        let entries: Vec<SharedEntry> = self.inner.sessions.read().values().cloned().collect();
        let mut sessions: Vec<Session> = entries.iter().map(|e| e.lock().session.clone()).collect();
        sessions.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        sessions
    }

    /// Cancel every timer and forget all sessions. Login records stay open.
    pub fn shutdown(&self) {
        let entries: Vec<SharedEntry> = self.inner.sessions.write().drain().map(|(_, e)| e).collect();
        for entry in &entries {
            entry.lock().cancel_timer();
        }
        tracing::info!("Session manager stopped ({} sessions)", entries.len());
    }
}

impl SessionInner {
    fn employee_lock(&self, employee_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(employee_id.to_string())
            .or_default()
            .clone()
    }

    fn entry(&self, employee_id: &str) -> Option<SharedEntry> {
        self.sessions.read().get(employee_id).cloned()
    }

    /// Remove the employee's entry, only if it is still `expected` when given
    fn remove_entry(&self, employee_id: &str, expected: Option<&SharedEntry>) -> Option<SharedEntry> {
        let mut sessions = self.sessions.write();
        let current = sessions.get(employee_id)?;
        if let Some(expected) = expected {
            if !Arc::ptr_eq(current, expected) {
                return None;
            }
        }
        sessions.remove(employee_id)
    }

    fn logout(&self, entry: SharedEntry) -> StoreResult<Session> {
        let session = {
            let mut entry = entry.lock();
            entry.cancel_timer();
            entry.session.clone()
        };

        self.aggregator.stop_monitoring(&session.employee_id);

        let closed = self.store.close_login(session.login_ref, self.clock.now())?;
        if !closed {
            tracing::debug!("No login record {} to close", session.login_ref);
        }

        tracing::info!("Session ended for {}", session.employee_id);
        Ok(session)
    }

    fn expire_if_idle(&self, employee_id: &str, entry: &SharedEntry) -> StoreResult<bool> {
        let lock = self.employee_lock(employee_id);
        let _guard = lock.lock();

        let now = self.clock.now();
        let idle_for = {
            let entry = entry.lock();
            now - entry.session.last_activity_time
        };

        if idle_for < Duration::minutes(self.config.timeout_minutes) {
            return Ok(false);
        }

        match self.remove_entry(employee_id, Some(entry)) {
            Some(removed) => {
                tracing::info!(
                    "Session timeout for {} after {} minutes idle",
                    employee_id,
                    idle_for.num_minutes()
                );
                self.logout(removed)?;
                Ok(true)
            }
            // Logged out elsewhere in the meantime
            None => Ok(false),
        }
    }
}

fn spawn_idle_check(
    inner: Weak<SessionInner>,
    entry: Weak<Mutex<SessionEntry>>,
    employee_id: String,
    period: StdDuration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        loop {
            ticker.tick().await;
            let (Some(inner), Some(entry)) = (inner.upgrade(), entry.upgrade()) else {
                break;
            };
            match inner.expire_if_idle(&employee_id, &entry) {
                Ok(true) => break,
                Ok(false) => {}
                // Keep checking; the session is still there
                Err(e) => tracing::error!("Idle check failed for {}: {}", employee_id, e),
            }
        }
    })
}
