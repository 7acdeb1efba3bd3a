//! Store-file change watcher
//!
//! Control subcommands run in their own process and write settings straight
//! to the store file. A running daemon subscribes here and turns writes to
//! that file into change ticks it can react to.

use auralift_core::domain::store::{Result, StoreError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::info;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Watches one store file for writes by other processes
pub struct StoreWatcher {
    _watcher: notify::RecommendedWatcher,
    changes: broadcast::Sender<()>,
}

impl StoreWatcher {
    /// Create a new store watcher. The file's directory is created if it
    /// does not exist; the file itself may appear later.
    pub async fn new(store_path: &Path) -> Result<Self> {
        use notify::Watcher;

        let dir = parent_dir(store_path);
        fs::create_dir_all(&dir).await?;
        // Watcher events carry canonical paths; match against the same form
        let dir = fs::canonicalize(&dir).await?;
        let file_name = store_path.file_name().ok_or_else(|| {
            StoreError::Backend(format!(
                "Store path has no file name: {}",
                store_path.display()
            ))
        })?;
        let target: PathBuf = dir.join(file_name);

        let (changes, _changes_rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        let tx_clone = changes.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) && event.paths.iter().any(|p| p == &target)
                {
                    let _ = tx_clone.send(());
                }
            }
        })
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        watcher
            .watch(&dir, notify::RecursiveMode::NonRecursive)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        info!(path = %store_path.display(), "Store watcher started");

        Ok(Self {
            _watcher: watcher,
            changes,
        })
    }

    /// Subscribe to change ticks
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
