use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use super::*;
use crate::logic::clock::{Clock, ManualClock};
use crate::logic::events::EventEmitter;
use crate::logic::risk::{RiskLevel, RiskRules};
use crate::logic::store::{MemoryStore, ThreatStore};
use crate::logic::threat::{DedupPolicy, ThreatManager};

const MB: u64 = 1024 * 1024;

struct Fixture {
    aggregator: ActivityAggregator,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()));
    let threats = Arc::new(ThreatManager::new(
        store.clone(),
        Arc::new(EventEmitter::default()),
        clock.clone(),
        DedupPolicy::default(),
    ));
    let aggregator = ActivityAggregator::new(
        store.clone(),
        threats,
        clock.clone(),
        Arc::new(RiskRules::default()),
        AggregatorConfig::default(),
        WatchConfig {
            enabled: false,
            paths: vec![],
            stability_ms: 2000,
            poll_ms: 100,
        },
    );
    Fixture { aggregator, store, clock }
}

fn touch_many(f: &Fixture, count: usize, size: u64, age: Duration) {
    let at = f.clock.now() - age;
    for i in 0..count {
        let path = format!("/home/emp/Downloads/file_{}.pdf", i);
        assert!(f.aggregator.record_touch(DownloadTouch::new("EMP001", &path, size, at)));
    }
}

#[test]
fn test_touch_for_unmonitored_employee_is_dropped() {
    let f = fixture();
    let touch = DownloadTouch::new("EMP009", "/tmp/a.txt", 10, f.clock.now());
    assert!(!f.aggregator.record_touch(touch));
    assert_eq!(f.aggregator.pending_touches("EMP009"), 0);
    assert!(f.aggregator.evaluate("EMP009").unwrap().is_none());
}

#[tokio::test]
async fn test_window_resets_after_signal() {
    let f = fixture();
    assert!(f.aggregator.start_monitoring("EMP001"));
    assert!(!f.aggregator.start_monitoring("EMP001"));

    touch_many(&f, 40, MB, Duration::minutes(5));

    let signal = f.aggregator.evaluate("EMP001").unwrap().unwrap();
    assert_eq!(signal.total_files, 40);
    assert_eq!(signal.total_size_mb, 40.0);
    assert_eq!(signal.folder_path, "/home/emp/Downloads");
    // 40 files at noon: file tier only
    assert_eq!(signal.risk.score, 20);
    assert_eq!(signal.risk.level, RiskLevel::Low);
    assert!(signal.threat.is_none());
    assert_eq!(f.aggregator.pending_touches("EMP001"), 0);

    // Immediate second pass sees an empty window
    assert!(f.aggregator.evaluate("EMP001").unwrap().is_none());
    assert_eq!(f.store.download_alerts("EMP001").unwrap().len(), 1);
    assert!(f.store.open_threats(None).unwrap().is_empty());

    f.aggregator.stop_monitoring("EMP001");
}

#[tokio::test]
async fn test_below_threshold_keeps_touches() {
    let f = fixture();
    f.aggregator.start_monitoring("EMP001");

    touch_many(&f, 10, MB, Duration::minutes(10));
    assert!(f.aggregator.evaluate("EMP001").unwrap().is_none());
    assert_eq!(f.aggregator.pending_touches("EMP001"), 10);
    assert_eq!(f.aggregator.last_check("EMP001"), Some(f.clock.now()));

    touch_many(&f, 25, MB, Duration::minutes(1));
    let signal = f.aggregator.evaluate("EMP001").unwrap().unwrap();
    assert_eq!(signal.total_files, 35);

    f.aggregator.stop_monitoring("EMP001");
}

#[tokio::test]
async fn test_only_last_hour_counts() {
    let f = fixture();
    f.aggregator.start_monitoring("EMP001");

    touch_many(&f, 5, MB, Duration::minutes(61));
    // Exactly at the window edge is outside
    touch_many(&f, 1, MB, Duration::minutes(60));
    touch_many(&f, 29, MB, Duration::minutes(30));

    assert!(f.aggregator.evaluate("EMP001").unwrap().is_none());
    assert_eq!(f.aggregator.pending_touches("EMP001"), 29);

    // Everything ages out
    f.clock.advance(Duration::minutes(31));
    assert!(f.aggregator.evaluate("EMP001").unwrap().is_none());
    assert_eq!(f.aggregator.pending_touches("EMP001"), 0);

    f.aggregator.stop_monitoring("EMP001");
}

#[tokio::test]
async fn test_large_burst_raises_bulk_threat() {
    let f = fixture();
    f.aggregator.start_monitoring("EMP001");

    // 60 files, 300 MB: 30 + 25
    touch_many(&f, 60, 5 * MB, Duration::minutes(2));
    let signal = f.aggregator.evaluate("EMP001").unwrap().unwrap();
    assert_eq!(signal.risk.score, 55);
    assert_eq!(signal.risk.level, RiskLevel::High);

    let threat = signal.threat.unwrap();
    assert_eq!(threat.threat.source_ref, signal.alert_id);
    assert_eq!(f.store.open_threats(Some("EMP001")).unwrap().len(), 1);

    f.aggregator.stop_monitoring("EMP001");
}

#[tokio::test]
async fn test_size_threshold_alone_fires() {
    let f = fixture();
    f.aggregator.start_monitoring("EMP001");

    touch_many(&f, 2, 150 * MB, Duration::minutes(2));
    let signal = f.aggregator.evaluate("EMP001").unwrap().unwrap();
    assert_eq!(signal.total_size_mb, 300.0);
    // Size tier only, under the bulk threat threshold
    assert_eq!(signal.risk.score, 25);
    assert!(signal.threat.is_none());

    f.aggregator.stop_monitoring("EMP001");
}

#[tokio::test]
async fn test_stop_monitoring_discards_window() {
    let f = fixture();
    f.aggregator.start_monitoring("EMP001");
    f.aggregator.start_monitoring("EMP002");
    touch_many(&f, 3, MB, Duration::minutes(1));

    let status = f.aggregator.monitoring_status();
    assert_eq!(status.active_monitors, 2);
    assert_eq!(status.employees, vec!["EMP001".to_string(), "EMP002".to_string()]);

    assert!(f.aggregator.stop_monitoring("EMP001"));
    assert!(!f.aggregator.stop_monitoring("EMP001"));
    assert_eq!(f.aggregator.pending_touches("EMP001"), 0);
    assert!(!f
        .aggregator
        .record_touch(DownloadTouch::new("EMP001", "/tmp/x", 1, f.clock.now())));

    f.aggregator.shutdown();
    assert_eq!(f.aggregator.monitoring_status().active_monitors, 0);
}

#[tokio::test(start_paused = true)]
async fn test_timer_evaluates_window() {
    let f = fixture();
    f.aggregator.start_monitoring("EMP001");
    touch_many(&f, 30, MB, Duration::minutes(1));

    // Nothing before the first tick
    tokio::time::sleep(std::time::Duration::from_secs(29)).await;
    assert!(f.store.download_alerts("EMP001").unwrap().is_empty());

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    assert_eq!(f.store.download_alerts("EMP001").unwrap().len(), 1);

    // Later ticks see an empty window
    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    assert_eq!(f.store.download_alerts("EMP001").unwrap().len(), 1);

    // A cancelled timer never fires again
    f.aggregator.stop_monitoring("EMP001");
    f.aggregator.start_monitoring("EMP002");
    tokio::time::sleep(std::time::Duration::from_secs(120)).await;
    assert_eq!(f.aggregator.monitoring_status().employees, vec!["EMP002".to_string()]);
}
