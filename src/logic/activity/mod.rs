//! Activity Module - file activity monitoring
//!
//! Turns a stream of settled new files into bulk download signals.
//!
//! # Architecture
//! - `types.rs`: `DownloadTouch`, `BulkSignal`, `MonitoringStatus`
//! - `aggregator.rs`: per-employee rolling window and evaluation timer
//! - `watcher.rs`: `notify` based folder watcher feeding the aggregator
//!
//! # Failure Strategy
//! A failed evaluation pass is logged and the timer keeps running.
//! A watcher that cannot start leaves the employee monitored by timer only.

pub mod types;
pub mod aggregator;
pub mod watcher;
#[cfg(test)]
mod tests;

pub use types::{BulkSignal, DownloadTouch, MonitoringStatus};
pub use aggregator::{ActivityAggregator, AggregatorConfig};
pub use watcher::{default_watch_paths, FolderWatcher, SettledFile, WatchConfig, WatchError};
