//! Activity Types

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::risk::RiskAssessment;
use crate::logic::threat::ThreatAlert;

/// One settled new file. Lives only in the aggregator window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTouch {
    pub employee_id: String,
    pub path: String,
    pub size_bytes: u64,
    pub timestamp: DateTime<Utc>,
    /// Containing folder of `path`
    pub folder: String,
}

impl DownloadTouch {
    pub fn new(employee_id: &str, path: &str, size_bytes: u64, timestamp: DateTime<Utc>) -> Self {
        let folder = Path::new(path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            employee_id: employee_id.to_string(),
            path: path.to_string(),
            size_bytes,
            timestamp,
            folder,
        }
    }
}

/// Emitted when a window crosses the bulk thresholds
#[derive(Debug, Clone, Serialize)]
pub struct BulkSignal {
    pub employee_id: String,
    pub alert_id: Uuid,
    pub total_files: usize,
    pub total_size_mb: f64,
    pub folder_path: String,
    pub risk: RiskAssessment,
    /// Present when the score reached the bulk threat threshold
    pub threat: Option<ThreatAlert>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringStatus {
    pub active_monitors: usize,
    pub employees: Vec<String>,
}
