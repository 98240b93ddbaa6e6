//! Activity Aggregator - bulk download detection
//!
//! Keeps a rolling window of file touches per monitored employee. A
//! background tick evaluates the window; when it crosses the file-count or
//! size threshold a download alert is persisted, a bulk threat is raised
//! through the threat manager and the window is cleared so the burst is
//! reported once.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::types::{BulkSignal, DownloadTouch, MonitoringStatus};
use super::watcher::{FolderWatcher, WatchConfig};
use crate::logic::clock::Clock;
use crate::logic::geo::distance::round2;
use crate::logic::risk::{score_bulk_download_with, BulkDownloadRiskInput, RiskRules};
use crate::logic::store::{DownloadAlert, StoreResult, ThreatStore};
use crate::logic::threat::{ThreatDetails, ThreatManager};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub scan_interval_seconds: u64,
    pub window_minutes: i64,
    pub min_files: usize,
    pub min_size_mb: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            scan_interval_seconds: 30,
            window_minutes: 60,
            min_files: 30,
            min_size_mb: 200.0,
        }
    }
}

#[derive(Default)]
struct ActivityWindow {
    touches: Vec<DownloadTouch>,
    last_check: Option<DateTime<Utc>>,
}

struct Monitor {
    tick: JoinHandle<()>,
    _watcher: Option<FolderWatcher>,
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.tick.abort();
    }
}

struct Inner {
    store: Arc<dyn ThreatStore>,
    threats: Arc<ThreatManager>,
    clock: Arc<dyn Clock>,
    rules: Arc<RiskRules>,
    config: AggregatorConfig,
    watch: WatchConfig,
    /// One lock per employee window
    windows: RwLock<HashMap<String, Arc<Mutex<ActivityWindow>>>>,
    monitors: Mutex<HashMap<String, Monitor>>,
}

/// Cheap to clone; clones share state
#[derive(Clone)]
pub struct ActivityAggregator {
    inner: Arc<Inner>,
}

impl ActivityAggregator {
    pub fn new(
        store: Arc<dyn ThreatStore>,
        threats: Arc<ThreatManager>,
        clock: Arc<dyn Clock>,
        rules: Arc<RiskRules>,
        config: AggregatorConfig,
        watch: WatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                threats,
                clock,
                rules,
                config,
                watch,
                windows: RwLock::new(HashMap::new()),
                monitors: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Add a touch to the employee's window. Dropped when not monitored.
    pub fn record_touch(&self, touch: DownloadTouch) -> bool {
        self.inner.record_touch(touch)
    }

    /// Run one evaluation pass for an employee
    pub fn evaluate(&self, employee_id: &str) -> StoreResult<Option<BulkSignal>> {
        self.inner.evaluate(employee_id)
    }

    /// Start the evaluation timer (and the folder watcher when enabled).
    /// Returns false when the employee is already monitored.
    /// Must be called inside a tokio runtime.
    pub fn start_monitoring(&self, employee_id: &str) -> bool {
        let mut monitors = self.inner.monitors.lock();
        if monitors.contains_key(employee_id) {
            tracing::debug!("Already monitoring {}", employee_id);
            return false;
        }

        self.inner
            .windows
            .write()
            .entry(employee_id.to_string())
            .or_default();

        let tick = spawn_tick(
            Arc::downgrade(&self.inner),
            employee_id.to_string(),
            StdDuration::from_secs(self.inner.config.scan_interval_seconds.max(1)),
        );

        let watcher = if self.inner.watch.enabled {
            self.attach_watcher(employee_id)
        } else {
            None
        };

        monitors.insert(
            employee_id.to_string(),
            Monitor {
                tick,
                _watcher: watcher,
            },
        );
        tracing::info!("Started file monitoring for {}", employee_id);
        true
    }

    fn attach_watcher(&self, employee_id: &str) -> Option<FolderWatcher> {
        let weak = Arc::downgrade(&self.inner);
        let employee = employee_id.to_string();

        let result = FolderWatcher::start(&self.inner.watch, self.inner.clock.clone(), move |file| {
            if let Some(inner) = weak.upgrade() {
                let path = file.path.to_string_lossy().to_string();
                inner.record_touch(DownloadTouch::new(&employee, &path, file.size_bytes, file.timestamp));
            }
        });

        match result {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!("File watcher unavailable for {}: {}", employee_id, e);
                None
            }
        }
    }

    /// Cancel the timer, drop the watcher and discard the window
    pub fn stop_monitoring(&self, employee_id: &str) -> bool {
        let removed = self.inner.monitors.lock().remove(employee_id);
        self.inner.windows.write().remove(employee_id);

        match removed {
            Some(monitor) => {
                drop(monitor);
                tracing::info!("Stopped monitoring for {}", employee_id);
                true
            }
            None => false,
        }
    }

    pub fn is_monitoring(&self, employee_id: &str) -> bool {
        self.inner.monitors.lock().contains_key(employee_id)
    }

    pub fn monitoring_status(&self) -> MonitoringStatus {
        let mut employees: Vec<String> = self.inner.monitors.lock().keys().cloned().collect();
        employees.sort();
        MonitoringStatus {
            active_monitors: employees.len(),
            employees,
        }
    }

    /// Touches currently held for an employee
    pub fn pending_touches(&self, employee_id: &str) -> usize {
        match self.inner.window(employee_id) {
            Some(window) => {
                let len = window.lock().touches.len();
                len
            }
            None => 0,
        }
    }

    pub fn last_check(&self, employee_id: &str) -> Option<DateTime<Utc>> {
        let window = self.inner.window(employee_id)?;
        let last_check = window.lock().last_check;
        last_check
    }

    pub fn shutdown(&self) {
        let monitors: Vec<(String, Monitor)> = self.inner.monitors.lock().drain().collect();
        self.inner.windows.write().clear();
        tracing::info!("Activity aggregator stopped ({} monitors)", monitors.len());
    }
}

fn spawn_tick(inner: Weak<Inner>, employee_id: String, period: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            // A failed pass is logged; the timer keeps running
            if let Err(e) = inner.evaluate(&employee_id) {
                tracing::error!("Bulk download check failed for {}: {}", employee_id, e);
            }
        }
    })
}

impl Inner {
    fn window(&self, employee_id: &str) -> Option<Arc<Mutex<ActivityWindow>>> {
        self.windows.read().get(employee_id).cloned()
    }

    fn record_touch(&self, touch: DownloadTouch) -> bool {
        match self.window(&touch.employee_id) {
            Some(window) => {
                window.lock().touches.push(touch);
                true
            }
            None => {
                tracing::debug!("Touch for unmonitored employee {} dropped", touch.employee_id);
                false
            }
        }
    }

    fn evaluate(&self, employee_id: &str) -> StoreResult<Option<BulkSignal>> {
        let window = match self.window(employee_id) {
            Some(w) => w,
            None => return Ok(None),
        };
        let mut window = window.lock();

        let now = self.clock.now();
        let cutoff = now - Duration::minutes(self.config.window_minutes);

        // Expired touches can never count again
        window.touches.retain(|t| t.timestamp > cutoff);

        if window.touches.is_empty() {
            window.last_check = Some(now);
            return Ok(None);
        }

        let total_files = window.touches.len();
        let total_bytes: u64 = window.touches.iter().map(|t| t.size_bytes).sum();
        let total_size_mb = round2(total_bytes as f64 / BYTES_PER_MB);

        if total_files < self.config.min_files && total_size_mb < self.config.min_size_mb {
            window.last_check = Some(now);
            return Ok(None);
        }

        let folder_path = busiest_folder(&window.touches);
        let risk = score_bulk_download_with(
            &BulkDownloadRiskInput {
                total_files,
                total_size_mb,
                timestamp: now,
            },
            &self.rules,
        );

        let alert = DownloadAlert {
            id: Uuid::new_v4(),
            employee_id: employee_id.to_string(),
            timestamp: now,
            total_files,
            total_size_mb,
            risk_level: risk.level,
            folder_path: folder_path.clone(),
            auto_triggered: true,
        };
        self.store.insert_download_alert(&alert)?;

        let threat = self.threats.raise(
            employee_id,
            risk.clone(),
            ThreatDetails::Bulk {
                total_files,
                total_size_mb,
                folder_path: folder_path.clone(),
            },
            alert.id,
        )?;

        tracing::warn!(
            "Bulk download alert for {}: {} files, {}MB ({})",
            employee_id,
            total_files,
            total_size_mb,
            risk.level
        );

        window.touches.clear();
        window.last_check = Some(now);

        Ok(Some(BulkSignal {
            employee_id: employee_id.to_string(),
            alert_id: alert.id,
            total_files,
            total_size_mb,
            folder_path,
            risk,
            threat,
        }))
    }
}

/// Folder holding the most touches; the first seen wins ties
fn busiest_folder(touches: &[DownloadTouch]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for touch in touches {
        let count = counts.entry(touch.folder.as_str()).or_insert(0);
        if *count == 0 {
            order.push(touch.folder.as_str());
        }
        *count += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for folder in order {
        let count = counts.get(folder).copied().unwrap_or(0);
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((folder, count));
        }
    }

    best.map(|(f, _)| f.to_string()).unwrap_or_default()
}
