//! SQLite store - schema and queries
//!
//! Timestamps are stored as Unix milliseconds, ids as text, reason lists and
//! threat details as JSON.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{DownloadAlert, GeoAlert, LoginEvent, StoreError, StoreResult, ThreatStore};
use crate::logic::geo::EmployeeProfile;
use crate::logic::risk::{AnomalyType, LoginOutcome, RiskAssessment, RiskLevel};
use crate::logic::threat::{ActiveThreat, ThreatCategory, ThreatDetails};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        tracing::info!("Database schema applied successfully");
        Ok(Self { conn: Mutex::new(conn) })
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp out of range: {}", ms)))
}

fn parse_uuid(value: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| StoreError::InvalidData(format!("bad uuid {}: {}", value, e)))
}

fn parse_level(value: &str) -> StoreResult<RiskLevel> {
    RiskLevel::parse(value).ok_or_else(|| StoreError::InvalidData(format!("bad risk level: {}", value)))
}

// Raw rows are read with rusqlite's own error type, then converted.

struct LoginRow {
    id: String,
    employee_id: String,
    timestamp: i64,
    logout_at: Option<i64>,
    ip_address: String,
    city: Option<String>,
    country: Option<String>,
    outcome: String,
    failed_attempts: i64,
    risk_level: String,
}

impl LoginRow {
    const COLUMNS: &'static str = "id, employee_id, login_at, logout_at, ip_address, city, country, outcome, failed_attempts, risk_level";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            timestamp: row.get(2)?,
            logout_at: row.get(3)?,
            ip_address: row.get(4)?,
            city: row.get(5)?,
            country: row.get(6)?,
            outcome: row.get(7)?,
            failed_attempts: row.get(8)?,
            risk_level: row.get(9)?,
        })
    }

    fn into_event(self) -> StoreResult<LoginEvent> {
        Ok(LoginEvent {
            id: parse_uuid(&self.id)?,
            employee_id: self.employee_id,
            timestamp: from_millis(self.timestamp)?,
            logout_at: self.logout_at.map(from_millis).transpose()?,
            ip_address: self.ip_address,
            city: self.city,
            country: self.country,
            outcome: LoginOutcome::parse(&self.outcome)
                .ok_or_else(|| StoreError::InvalidData(format!("bad outcome: {}", self.outcome)))?,
            failed_attempts: self.failed_attempts as u32,
            risk_level: parse_level(&self.risk_level)?,
        })
    }
}

struct ThreatRow {
    id: String,
    employee_id: String,
    category: String,
    risk_score: i64,
    risk_level: String,
    reasons: String,
    details: String,
    source_ref: String,
    opened_at: i64,
    last_updated_at: i64,
    solved: bool,
    occurrences: i64,
}

impl ThreatRow {
    const COLUMNS: &'static str = "id, employee_id, category, risk_score, risk_level, reasons, details, source_ref, opened_at, last_updated_at, solved, occurrences";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            category: row.get(2)?,
            risk_score: row.get(3)?,
            risk_level: row.get(4)?,
            reasons: row.get(5)?,
            details: row.get(6)?,
            source_ref: row.get(7)?,
            opened_at: row.get(8)?,
            last_updated_at: row.get(9)?,
            solved: row.get(10)?,
            occurrences: row.get(11)?,
        })
    }

    fn into_threat(self) -> StoreResult<ActiveThreat> {
        let reasons: Vec<String> = serde_json::from_str(&self.reasons)?;
        let details: ThreatDetails = serde_json::from_str(&self.details)?;
        Ok(ActiveThreat {
            id: parse_uuid(&self.id)?,
            employee_id: self.employee_id,
            category: ThreatCategory::parse(&self.category)
                .ok_or_else(|| StoreError::InvalidData(format!("bad category: {}", self.category)))?,
            risk: RiskAssessment {
                score: self.risk_score as u32,
                level: parse_level(&self.risk_level)?,
                reasons,
            },
            details,
            source_ref: parse_uuid(&self.source_ref)?,
            opened_at: from_millis(self.opened_at)?,
            last_updated_at: from_millis(self.last_updated_at)?,
            solved: self.solved,
            occurrences: self.occurrences as u32,
        })
    }
}

// ============================================================================
// STORE IMPLEMENTATION
// ============================================================================

impl ThreatStore for SqliteStore {
    fn insert_login(&self, event: &LoginEvent) -> StoreResult<()> {
        self.conn.lock().execute(
            r#"
            INSERT INTO login_events (id, employee_id, login_at, logout_at, ip_address, city, country, outcome, failed_attempts, risk_level)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                event.id.to_string(),
                event.employee_id,
                to_millis(event.timestamp),
                event.logout_at.map(to_millis),
                event.ip_address,
                event.city,
                event.country,
                event.outcome.as_str(),
                event.failed_attempts as i64,
                event.risk_level.as_str(),
            ],
        )?;
        Ok(())
    }

    fn close_login(&self, login_ref: Uuid, logout_at: DateTime<Utc>) -> StoreResult<bool> {
        let changed = self.conn.lock().execute(
            "UPDATE login_events SET logout_at = ?2 WHERE id = ?1",
            params![login_ref.to_string(), to_millis(logout_at)],
        )?;
        Ok(changed > 0)
    }

    fn count_failed_logins_since(
        &self,
        employee_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM login_events WHERE employee_id = ?1 AND outcome = 'Failed' AND login_at >= ?2",
            params![employee_id, to_millis(since)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_unanswered_failures_since(
        &self,
        employee_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let count: i64 = self.conn.lock().query_row(
            r#"
            SELECT COUNT(*) FROM login_events
            WHERE employee_id = ?1 AND outcome = 'Failed' AND login_at >= ?2
              AND login_at > COALESCE(
                  (SELECT MAX(login_at) FROM login_events WHERE employee_id = ?1 AND outcome = 'Success'),
                  -9223372036854775808)
            "#,
            params![employee_id, to_millis(since)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn last_completed_login(&self, employee_id: &str) -> StoreResult<Option<LoginEvent>> {
        let sql = format!(
            "SELECT {} FROM login_events WHERE employee_id = ?1 AND outcome = 'Success' AND logout_at IS NOT NULL ORDER BY login_at DESC LIMIT 1",
            LoginRow::COLUMNS
        );
        let row = self
            .conn
            .lock()
            .query_row(&sql, params![employee_id], LoginRow::read)
            .optional()?;
        row.map(LoginRow::into_event).transpose()
    }

    fn login(&self, login_ref: Uuid) -> StoreResult<Option<LoginEvent>> {
        let sql = format!("SELECT {} FROM login_events WHERE id = ?1", LoginRow::COLUMNS);
        let row = self
            .conn
            .lock()
            .query_row(&sql, params![login_ref.to_string()], LoginRow::read)
            .optional()?;
        row.map(LoginRow::into_event).transpose()
    }

    fn insert_download_alert(&self, alert: &DownloadAlert) -> StoreResult<()> {
        self.conn.lock().execute(
            r#"
            INSERT INTO download_alerts (id, employee_id, alert_at, total_files, total_size_mb, risk_level, folder_path, auto_triggered)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                alert.id.to_string(),
                alert.employee_id,
                to_millis(alert.timestamp),
                alert.total_files as i64,
                alert.total_size_mb,
                alert.risk_level.as_str(),
                alert.folder_path,
                alert.auto_triggered,
            ],
        )?;
        Ok(())
    }

    fn insert_geo_alert(&self, alert: &GeoAlert) -> StoreResult<()> {
        self.conn.lock().execute(
            r#"
            INSERT INTO geo_alerts (id, employee_id, alert_at, current_country, current_city, previous_country, previous_city,
                                    hours_between, min_travel_hours, anomaly_type, risk_level)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                alert.id.to_string(),
                alert.employee_id,
                to_millis(alert.timestamp),
                alert.current_country,
                alert.current_city,
                alert.previous_country,
                alert.previous_city,
                alert.hours_between,
                alert.min_travel_hours,
                alert.anomaly_type.as_str(),
                alert.risk_level.as_str(),
            ],
        )?;
        Ok(())
    }

    fn download_alerts(&self, employee_id: &str) -> StoreResult<Vec<DownloadAlert>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, employee_id, alert_at, total_files, total_size_mb, risk_level, folder_path, auto_triggered
            FROM download_alerts WHERE employee_id = ?1 ORDER BY alert_at DESC
            "#,
        )?;
        let rows = stmt
            .query_map(params![employee_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, bool>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, employee_id, at, files, size, level, folder, auto)| {
                Ok(DownloadAlert {
                    id: parse_uuid(&id)?,
                    employee_id,
                    timestamp: from_millis(at)?,
                    total_files: files as usize,
                    total_size_mb: size,
                    risk_level: parse_level(&level)?,
                    folder_path: folder,
                    auto_triggered: auto,
                })
            })
            .collect()
    }

    fn geo_alerts(&self, employee_id: &str) -> StoreResult<Vec<GeoAlert>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, employee_id, alert_at, current_country, current_city, previous_country, previous_city,
                   hours_between, min_travel_hours, anomaly_type, risk_level
            FROM geo_alerts WHERE employee_id = ?1 ORDER BY alert_at DESC
            "#,
        )?;
        let rows = stmt
            .query_map(params![employee_id], |row| {
                Ok((
                    (
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ),
                    (
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ),
                    (
                        row.get::<_, f64>(7)?,
                        row.get::<_, f64>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, String>(10)?,
                    ),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|((id, employee_id, at), (cc, ccity, pc, pcity), (hours, travel, kind, level))| {
                Ok(GeoAlert {
                    id: parse_uuid(&id)?,
                    employee_id,
                    timestamp: from_millis(at)?,
                    current_country: cc,
                    current_city: ccity,
                    previous_country: pc,
                    previous_city: pcity,
                    hours_between: hours,
                    min_travel_hours: travel,
                    anomaly_type: AnomalyType::parse(&kind)
                        .ok_or_else(|| StoreError::InvalidData(format!("bad anomaly type: {}", kind)))?,
                    risk_level: parse_level(&level)?,
                })
            })
            .collect()
    }

    fn insert_threat(&self, threat: &ActiveThreat) -> StoreResult<()> {
        let reasons = serde_json::to_string(&threat.risk.reasons)?;
        let details = serde_json::to_string(&threat.details)?;
        self.conn.lock().execute(
            r#"
            INSERT INTO active_threats (id, employee_id, category, risk_score, risk_level, reasons, details, source_ref,
                                        opened_at, last_updated_at, solved, occurrences)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                threat.id.to_string(),
                threat.employee_id,
                threat.category.as_str(),
                threat.risk.score as i64,
                threat.risk.level.as_str(),
                reasons,
                details,
                threat.source_ref.to_string(),
                to_millis(threat.opened_at),
                to_millis(threat.last_updated_at),
                threat.solved,
                threat.occurrences as i64,
            ],
        )?;
        Ok(())
    }

    fn update_threat(&self, threat: &ActiveThreat) -> StoreResult<()> {
        let reasons = serde_json::to_string(&threat.risk.reasons)?;
        let details = serde_json::to_string(&threat.details)?;
        let changed = self.conn.lock().execute(
            r#"
            UPDATE active_threats
            SET risk_score = ?2, risk_level = ?3, reasons = ?4, details = ?5, source_ref = ?6,
                last_updated_at = ?7, solved = ?8, occurrences = ?9
            WHERE id = ?1
            "#,
            params![
                threat.id.to_string(),
                threat.risk.score as i64,
                threat.risk.level.as_str(),
                reasons,
                details,
                threat.source_ref.to_string(),
                to_millis(threat.last_updated_at),
                threat.solved,
                threat.occurrences as i64,
            ],
        )?;

        if changed == 0 {
            return self.insert_threat(threat);
        }
        Ok(())
    }

    fn find_open_threat(
        &self,
        employee_id: &str,
        category: ThreatCategory,
        opened_since: DateTime<Utc>,
    ) -> StoreResult<Option<ActiveThreat>> {
        let sql = format!(
            "SELECT {} FROM active_threats WHERE employee_id = ?1 AND category = ?2 AND solved = 0 AND opened_at >= ?3 ORDER BY opened_at DESC LIMIT 1",
            ThreatRow::COLUMNS
        );
        let row = self
            .conn
            .lock()
            .query_row(
                &sql,
                params![employee_id, category.as_str(), to_millis(opened_since)],
                ThreatRow::read,
            )
            .optional()?;
        row.map(ThreatRow::into_threat).transpose()
    }

    fn mark_threat_solved(&self, id: Uuid) -> StoreResult<bool> {
        let changed = self.conn.lock().execute(
            "UPDATE active_threats SET solved = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn open_threats(&self, employee_id: Option<&str>) -> StoreResult<Vec<ActiveThreat>> {
        let sql = format!(
            "SELECT {} FROM active_threats WHERE solved = 0 AND (?1 IS NULL OR employee_id = ?1) ORDER BY opened_at DESC",
            ThreatRow::COLUMNS
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![employee_id], ThreatRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ThreatRow::into_threat).collect()
    }

    fn employee_profile(&self, employee_id: &str) -> StoreResult<Option<EmployeeProfile>> {
        let body: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT body FROM employee_profiles WHERE employee_id = ?1",
                params![employee_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }

    fn upsert_employee_profile(&self, profile: &EmployeeProfile) -> StoreResult<()> {
        let body = serde_json::to_string(profile)?;
        self.conn.lock().execute(
            r#"
            INSERT INTO employee_profiles (employee_id, body) VALUES (?1, ?2)
            ON CONFLICT (employee_id) DO UPDATE SET body = excluded.body
            "#,
            params![profile.employee_id, body],
        )?;
        Ok(())
    }
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Login attempts (append-only, logout_at set once)
CREATE TABLE IF NOT EXISTS login_events (
    id TEXT PRIMARY KEY,
    employee_id TEXT NOT NULL,
    login_at INTEGER NOT NULL,
    logout_at INTEGER,
    ip_address TEXT NOT NULL DEFAULT '',
    city TEXT,
    country TEXT,
    outcome TEXT NOT NULL,
    failed_attempts INTEGER NOT NULL DEFAULT 0,
    risk_level TEXT NOT NULL DEFAULT 'Low'
);

-- Bulk download bursts
CREATE TABLE IF NOT EXISTS download_alerts (
    id TEXT PRIMARY KEY,
    employee_id TEXT NOT NULL,
    alert_at INTEGER NOT NULL,
    total_files INTEGER NOT NULL,
    total_size_mb REAL NOT NULL,
    risk_level TEXT NOT NULL,
    folder_path TEXT NOT NULL DEFAULT '',
    auto_triggered INTEGER NOT NULL DEFAULT 1
);

-- Geographic anomalies
CREATE TABLE IF NOT EXISTS geo_alerts (
    id TEXT PRIMARY KEY,
    employee_id TEXT NOT NULL,
    alert_at INTEGER NOT NULL,
    current_country TEXT NOT NULL,
    current_city TEXT NOT NULL,
    previous_country TEXT NOT NULL DEFAULT '',
    previous_city TEXT NOT NULL DEFAULT '',
    hours_between REAL NOT NULL DEFAULT 0,
    min_travel_hours REAL NOT NULL DEFAULT 0,
    anomaly_type TEXT NOT NULL,
    risk_level TEXT NOT NULL
);

-- Deduplicated threats
CREATE TABLE IF NOT EXISTS active_threats (
    id TEXT PRIMARY KEY,
    employee_id TEXT NOT NULL,
    category TEXT NOT NULL,
    risk_score INTEGER NOT NULL,
    risk_level TEXT NOT NULL,
    reasons TEXT NOT NULL,
    details TEXT NOT NULL,
    source_ref TEXT NOT NULL,
    opened_at INTEGER NOT NULL,
    last_updated_at INTEGER NOT NULL,
    solved INTEGER NOT NULL DEFAULT 0,
    occurrences INTEGER NOT NULL DEFAULT 1
);

-- Location verification settings
CREATE TABLE IF NOT EXISTS employee_profiles (
    employee_id TEXT PRIMARY KEY,
    body TEXT NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_logins_employee ON login_events(employee_id, login_at);
CREATE INDEX IF NOT EXISTS idx_download_alerts_employee ON download_alerts(employee_id, alert_at);
CREATE INDEX IF NOT EXISTS idx_geo_alerts_employee ON geo_alerts(employee_id, alert_at);
CREATE INDEX IF NOT EXISTS idx_threats_open ON active_threats(employee_id, category, solved, opened_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn login(employee: &str, outcome: LoginOutcome, at: DateTime<Utc>) -> LoginEvent {
        LoginEvent {
            id: Uuid::new_v4(),
            employee_id: employee.to_string(),
            timestamp: at,
            logout_at: None,
            ip_address: "10.0.0.1".to_string(),
            city: Some("Austin".to_string()),
            country: Some("United States".to_string()),
            outcome,
            failed_attempts: 0,
            risk_level: RiskLevel::Low,
        }
    }

    #[test]
    fn test_login_lifecycle() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

        let first = login("EMP001", LoginOutcome::Success, t0);
        let second = login("EMP001", LoginOutcome::Success, t0 + Duration::hours(3));
        store.insert_login(&first).unwrap();
        store.insert_login(&second).unwrap();
        store.insert_login(&login("EMP001", LoginOutcome::Failed, t0 + Duration::hours(4))).unwrap();

        // Nothing logged out yet
        assert!(store.last_completed_login("EMP001").unwrap().is_none());

        assert!(store.close_login(first.id, t0 + Duration::hours(1)).unwrap());
        let last = store.last_completed_login("EMP001").unwrap().unwrap();
        assert_eq!(last.id, first.id);
        assert_eq!(last.logout_at, Some(t0 + Duration::hours(1)));

        assert_eq!(store.count_failed_logins_since("EMP001", t0).unwrap(), 1);
        assert_eq!(
            store.count_failed_logins_since("EMP001", t0 + Duration::hours(5)).unwrap(),
            0
        );
        assert!(!store.close_login(Uuid::new_v4(), t0).unwrap());
    }

    #[test]
    fn test_failures_answered_by_success_are_not_counted() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

        store.insert_login(&login("EMP001", LoginOutcome::Failed, t0)).unwrap();
        store.insert_login(&login("EMP001", LoginOutcome::Failed, t0 + Duration::minutes(1))).unwrap();
        assert_eq!(store.count_unanswered_failures_since("EMP001", t0).unwrap(), 2);

        store.insert_login(&login("EMP001", LoginOutcome::Success, t0 + Duration::minutes(2))).unwrap();
        assert_eq!(store.count_unanswered_failures_since("EMP001", t0).unwrap(), 0);

        store.insert_login(&login("EMP001", LoginOutcome::Failed, t0 + Duration::minutes(3))).unwrap();
        store.insert_login(&login("EMP002", LoginOutcome::Failed, t0 + Duration::minutes(3))).unwrap();
        assert_eq!(store.count_unanswered_failures_since("EMP001", t0).unwrap(), 1);
        assert_eq!(store.count_unanswered_failures_since("EMP002", t0).unwrap(), 1);
        assert_eq!(store.count_failed_logins_since("EMP001", t0).unwrap(), 3);
    }

    #[test]
    fn test_threat_roundtrip_and_open_lookup() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 23, 0, 0).unwrap();

        let mut threat = ActiveThreat::new(
            "EMP002",
            RiskAssessment::new(70, vec!["Critical file count (100+ files)".into()]),
            ThreatDetails::Bulk {
                total_files: 120,
                total_size_mb: 80.5,
                folder_path: "/home/emp/Downloads".into(),
            },
            Uuid::new_v4(),
            t0,
        );
        store.insert_threat(&threat).unwrap();

        let found = store
            .find_open_threat("EMP002", ThreatCategory::Bulk, t0 - Duration::minutes(30))
            .unwrap()
            .unwrap();
        assert_eq!(found, threat);

        // Outside the window
        assert!(store
            .find_open_threat("EMP002", ThreatCategory::Bulk, t0 + Duration::minutes(1))
            .unwrap()
            .is_none());

        threat.risk.score = 90;
        threat.occurrences = 2;
        store.update_threat(&threat).unwrap();
        assert_eq!(store.open_threats(Some("EMP002")).unwrap()[0].risk.score, 90);

        assert!(store.mark_threat_solved(threat.id).unwrap());
        assert!(store.open_threats(None).unwrap().is_empty());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.db");
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert_download_alert(&DownloadAlert {
                    id: Uuid::new_v4(),
                    employee_id: "EMP003".into(),
                    timestamp: t0,
                    total_files: 31,
                    total_size_mb: 12.25,
                    risk_level: RiskLevel::Low,
                    folder_path: "/tmp/x".into(),
                    auto_triggered: true,
                })
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let alerts = reopened.download_alerts("EMP003").unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].total_files, 31);
        assert_eq!(alerts[0].timestamp, t0);
    }
}
