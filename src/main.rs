//! Insider Sentinel daemon
//!
//! Reads newline-delimited JSON commands on stdin and answers one JSON line
//! per command on stdout. Threat alerts are logged as they are emitted.
//!
//! ```text
//! {"command":"login","employee_id":"EMP001","ip":"203.0.113.7"}
//! {"command":"touch","employee_id":"EMP001","path":"/home/a/Downloads/x.zip","size":1024}
//! {"command":"logout","employee_id":"EMP001"}
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use insider_sentinel::logic::clock::{Clock, SystemClock};
use insider_sentinel::logic::events::EventEmitter;
use insider_sentinel::logic::geo::{EmployeeProfile, IpApiResolver};
use insider_sentinel::logic::store::{MemoryStore, SqliteStore, ThreatStore};
use insider_sentinel::{Config, DetectionService, EngineResult};

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Command {
    Login {
        employee_id: String,
        ip: String,
    },
    FailedLogin {
        employee_id: String,
        ip: String,
    },
    Logout {
        employee_id: String,
    },
    Activity {
        employee_id: String,
    },
    Touch {
        employee_id: String,
        path: String,
        size: i64,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    Resolve {
        threat_id: Uuid,
    },
    Profile {
        profile: EmployeeProfile,
    },
    Threats {
        #[serde(default)]
        employee_id: Option<String>,
    },
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries responses, logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "insider_sentinel=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    tracing::info!("Insider Sentinel starting...");

    let store: Arc<dyn ThreatStore> = match &config.database_path {
        Some(path) => {
            tracing::info!("Database: {}", path.display());
            Arc::new(SqliteStore::open(path).context("Failed to open database")?)
        }
        None => {
            tracing::info!("Database: in-memory");
            Arc::new(MemoryStore::new())
        }
    };

    let emitter = Arc::new(EventEmitter::default());
    spawn_alert_logger(&emitter);

    let resolver = IpApiResolver::new(
        &config.geo.api_url,
        Duration::from_secs(config.geo.timeout_seconds),
    )
    .context("Failed to build geolocation client")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = DetectionService::new(store, emitter, clock.clone(), resolver, &config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Command>(line) {
            Ok(command) => match dispatch(&service, clock.as_ref(), command).await {
                Ok(result) => json!({ "ok": true, "result": result }),
                Err(e) => json!({ "ok": false, "error": e.to_string() }),
            },
            Err(e) => json!({ "ok": false, "error": format!("Invalid command: {}", e) }),
        };

        stdout.write_all(format!("{}\n", response).as_bytes()).await?;
        stdout.flush().await?;
    }

    service.shutdown();
    tracing::info!("Insider Sentinel stopped");
    Ok(())
}

async fn dispatch(
    service: &DetectionService<IpApiResolver>,
    clock: &dyn Clock,
    command: Command,
) -> EngineResult<Value> {
    let value = match command {
        Command::Login { employee_id, ip } => to_value(service.login(&employee_id, &ip).await?),
        Command::FailedLogin { employee_id, ip } => {
            to_value(service.record_failed_login(&employee_id, &ip)?)
        }
        Command::Logout { employee_id } => to_value(service.logout(&employee_id)?),
        Command::Activity { employee_id } => json!({ "active": service.touch_activity(&employee_id) }),
        Command::Touch { employee_id, path, size, timestamp } => {
            let at = timestamp.unwrap_or_else(|| clock.now());
            json!({ "accepted": service.record_download_touch(&employee_id, &path, size, at)? })
        }
        Command::Resolve { threat_id } => json!({ "resolved": service.resolve_threat(threat_id)? }),
        Command::Profile { profile } => {
            service.upsert_employee_profile(&profile)?;
            json!({ "employee_id": profile.employee_id })
        }
        Command::Threats { employee_id } => to_value(service.open_threats(employee_id.as_deref())?),
        Command::Status => json!({
            "monitoring": service.monitoring_status(),
            "sessions": service.active_sessions(),
        }),
    };
    Ok(value)
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| json!({ "serialization_error": e.to_string() }))
}

fn spawn_alert_logger(emitter: &EventEmitter) {
    let mut rx = emitter.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::warn!(
                    "[{}] {} threat for {} (score={}, level={})",
                    event.name,
                    event.alert.category,
                    event.alert.threat.employee_id,
                    event.alert.threat.risk.score,
                    event.alert.threat.risk.level
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Alert logger lagged, {} alerts skipped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
