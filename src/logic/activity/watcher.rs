//! Folder Watcher
//!
//! Watches download folders with `notify` and hands every newly created file
//! to a callback once its size has stopped changing. Dotfiles are ignored.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::logic::clock::Clock;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("No existing folders to watch")]
    NoPaths,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub enabled: bool,
    pub paths: Vec<PathBuf>,
    /// Unchanged size for this long marks a file as settled
    pub stability_ms: u64,
    pub poll_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            paths: default_watch_paths(),
            stability_ms: 2000,
            poll_ms: 100,
        }
    }
}

/// Downloads, Desktop and Documents of the current user, when they exist
pub fn default_watch_paths() -> Vec<PathBuf> {
    [dirs::download_dir(), dirs::desktop_dir(), dirs::document_dir()]
        .into_iter()
        .flatten()
        .filter(|p| p.exists())
        .collect()
}

/// True when any component below the watched root starts with a dot
pub fn is_hidden(path: &Path, roots: &[PathBuf]) -> bool {
    let relative = roots
        .iter()
        .find_map(|root| path.strip_prefix(root).ok())
        .unwrap_or(path);

    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Settled file as delivered to the callback
#[derive(Debug, Clone, PartialEq)]
pub struct SettledFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// WRITE STABILITY
// ============================================================================

struct PendingFile {
    size: Option<u64>,
    stable_since: Instant,
}

/// Tracks new files until their size holds still
pub struct SettleTracker {
    stability: Duration,
    pending: HashMap<PathBuf, PendingFile>,
}

impl SettleTracker {
    pub fn new(stability: Duration) -> Self {
        Self {
            stability,
            pending: HashMap::new(),
        }
    }

    pub fn observe(&mut self, path: PathBuf, now: Instant) {
        self.pending.entry(path).or_insert(PendingFile {
            size: None,
            stable_since: now,
        });
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Check every pending file. `stat` returns the size of a regular file,
    /// `None` when it vanished or is not a file.
    pub fn poll<F>(&mut self, now: Instant, stat: F) -> Vec<(PathBuf, u64)>
    where
        F: Fn(&Path) -> Option<u64>,
    {
        let mut settled = Vec::new();
        let stability = self.stability;

        self.pending.retain(|path, entry| match stat(path) {
            None => false,
            Some(size) if entry.size != Some(size) => {
                entry.size = Some(size);
                entry.stable_since = now;
                true
            }
            Some(size) => {
                if now.duration_since(entry.stable_since) >= stability {
                    settled.push((path.clone(), size));
                    false
                } else {
                    true
                }
            }
        });

        settled
    }
}

fn regular_file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}

// ============================================================================
// WATCHER
// ============================================================================

/// Live watch over a set of folders. Dropping it stops delivery.
pub struct FolderWatcher {
    _watcher: RecommendedWatcher,
    poller: JoinHandle<()>,
    paths: Vec<PathBuf>,
}

impl FolderWatcher {
    /// Must be called inside a tokio runtime
    pub fn start<F>(config: &WatchConfig, clock: Arc<dyn Clock>, on_settled: F) -> Result<Self, WatchError>
    where
        F: Fn(SettledFile) + Send + Sync + 'static,
    {
        let paths: Vec<PathBuf> = config.paths.iter().filter(|p| p.exists()).cloned().collect();
        if paths.is_empty() {
            return Err(WatchError::NoPaths);
        }

        let tracker = Arc::new(Mutex::new(SettleTracker::new(Duration::from_millis(
            config.stability_ms,
        ))));

        let roots = paths.clone();
        let events_tracker = tracker.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!("Watcher error: {}", e);
                    return;
                }
            };

            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))) {
                return;
            }

            let now = Instant::now();
            let mut tracker = events_tracker.lock();
            for path in event.paths {
                if is_hidden(&path, &roots) {
                    continue;
                }
                tracker.observe(path, now);
            }
        })?;

        for path in &paths {
            watcher.watch(path, RecursiveMode::Recursive)?;
        }
        tracing::info!("Watching folders: {:?}", paths);

        let poll_every = Duration::from_millis(config.poll_ms.max(1));
        let poller = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_every);
            loop {
                ticker.tick().await;
                let settled = tracker.lock().poll(Instant::now(), regular_file_size);
                for (path, size_bytes) in settled {
                    on_settled(SettledFile {
                        path,
                        size_bytes,
                        timestamp: clock.now(),
                    });
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            poller,
            paths,
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.poller.abort();
    }
}
