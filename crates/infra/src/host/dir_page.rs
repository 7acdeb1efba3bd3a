//! Watched-directory page host
//!
//! [`DirectoryPage`] maps a filesystem directory onto the core page model:
//! every media file under the directory is a media element, file creation
//! and deletion are mutation events, and file size stands in for readiness
//! (a zero-length file is still being written and becomes ready once data
//! lands). Deleting and re-creating a file under the same name yields a new
//! element with a fresh claim history.

use auralift_core::domain::media::{
    ClaimedSource, ElementId, MediaElement, MediaKind, NetworkState, PageError, PageEvent,
    PageView, ReadyState, Result,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// File extensions treated as qualifying media
const MEDIA_EXTENSIONS: [&str; 9] = [
    "mp3", "mp4", "m4a", "aac", "ogg", "opus", "webm", "flac", "wav",
];

#[derive(Default)]
struct DirState {
    elements: HashMap<ElementId, MediaElement>,
    claimed: HashSet<ElementId>,
}

/// Page implementation backed by a watched media directory
pub struct DirectoryPage {
    root: PathBuf,
    state: Arc<Mutex<DirState>>,
    events: broadcast::Sender<PageEvent>,
    // Kept alive for the page's lifetime; the Mutex makes the page Sync on
    // platforms whose watcher is not
    _watcher: Mutex<notify::RecommendedWatcher>,
}

impl DirectoryPage {
    /// Open a directory as a page: scan what is already there, then watch
    /// for changes. The directory is created if it does not exist.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        use notify::Watcher;

        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| PageError::Adapter(e.to_string()))?;
        // Watcher events carry absolute paths; element ids are derived by
        // stripping the root, so the root must be canonical
        let root = fs::canonicalize(&root)
            .await
            .map_err(|e| PageError::Adapter(e.to_string()))?;

        let state = Arc::new(Mutex::new(DirState::default()));
        let (events, _events_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        // Initial population; the manager takes its own startup snapshot,
        // so no events are emitted for files that were already present
        let mut found = 0usize;
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| PageError::Adapter(e.to_string()))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| PageError::Adapter(e.to_string()))?
            {
                let path = entry.path();
                let meta = match entry.metadata().await {
                    Ok(meta) => meta,
                    Err(e) => {
                        warn!(path = %path.display(), "Could not stat entry: {}", e);
                        continue;
                    }
                };
                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                if let Some(element) = describe(&root, &path, meta.len()) {
                    lock(&state).elements.insert(element.id.clone(), element);
                    found += 1;
                }
            }
        }

        let watcher_state = Arc::clone(&state);
        let watcher_events = events.clone();
        let watcher_root = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => match event.kind {
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_) => {
                        for path in &event.paths {
                            upsert_path(&watcher_state, &watcher_events, &watcher_root, path);
                        }
                    }
                    notify::EventKind::Remove(_) => {
                        for path in &event.paths {
                            remove_path(&watcher_state, &watcher_events, &watcher_root, path);
                        }
                    }
                    _ => {}
                },
                Err(e) => warn!("Directory watch error: {}", e),
            }
        })
        .map_err(|e| PageError::Adapter(e.to_string()))?;

        watcher
            .watch(&root, notify::RecursiveMode::Recursive)
            .map_err(|e| PageError::Adapter(e.to_string()))?;

        info!(
            path = %root.display(),
            elements = found,
            "Directory page opened"
        );

        Ok(Self {
            root,
            state,
            events,
            _watcher: Mutex::new(watcher),
        })
    }

    /// Directory this page serves
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PageView for DirectoryPage {
    fn media_elements(&self) -> Result<Vec<MediaElement>> {
        Ok(lock(&self.state).elements.values().cloned().collect())
    }

    fn element(&self, id: &ElementId) -> Result<MediaElement> {
        lock(&self.state)
            .elements
            .get(id)
            .cloned()
            .ok_or_else(|| PageError::ElementNotFound(id.as_str().to_string()))
    }

    fn contains(&self, id: &ElementId) -> bool {
        lock(&self.state).elements.contains_key(id)
    }

    fn claim(&self, id: &ElementId) -> Result<ClaimedSource> {
        let mut state = lock(&self.state);
        let element = state
            .elements
            .get(id)
            .ok_or_else(|| PageError::ElementNotFound(id.as_str().to_string()))?;
        if state.claimed.contains(id) {
            return Err(PageError::AlreadyClaimed(id.as_str().to_string()));
        }
        let source = ClaimedSource {
            id: id.clone(),
            channel_count: element.channel_count,
        };
        state.claimed.insert(id.clone());
        Ok(source)
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }
}

fn lock(state: &Mutex<DirState>) -> MutexGuard<'_, DirState> {
    // Held only for map access; poisoning would mean a panic mid-access,
    // which the page treats as unrecoverable anyway
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Derive the element id from the path relative to the page root
fn element_id(root: &Path, path: &Path) -> Option<ElementId> {
    let relative = path.strip_prefix(root).ok()?;
    let id = relative.to_str()?;
    Some(ElementId::new(id.to_string()))
}

fn media_kind_for(extension: &str) -> Option<MediaKind> {
    if !MEDIA_EXTENSIONS.contains(&extension) {
        return None;
    }
    match extension {
        "mp4" | "webm" => Some(MediaKind::Video),
        _ => Some(MediaKind::Audio),
    }
}

/// Build an element descriptor for a media file, or `None` for files the
/// page does not consider media
fn describe(root: &Path, path: &Path, len: u64) -> Option<MediaElement> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let kind = media_kind_for(&extension)?;
    let id = element_id(root, path)?;

    // A zero-length file is mid-copy: present, but with nothing to decode
    let populated = len > 0;

    Some(MediaElement {
        id,
        kind,
        src: path.display().to_string(),
        mime_hint: None,
        ready: if populated {
            ReadyState::HaveEnoughData
        } else {
            ReadyState::HaveNothing
        },
        network: if populated {
            NetworkState::Idle
        } else {
            NetworkState::Loading
        },
        // Stereo unless a host with real channel knowledge says otherwise;
        // no demuxing happens here
        channel_count: 2,
        duration_secs: None,
        buffered: populated,
    })
}

/// Refresh one path from disk, emitting the matching page event. A path
/// that no longer resolves is treated as removed.
fn upsert_path(
    state: &Mutex<DirState>,
    events: &broadcast::Sender<PageEvent>,
    root: &Path,
    path: &Path,
) {
    let meta = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return,
        // Covers files renamed away, whose last event carries the old path
        Err(_) => {
            remove_path(state, events, root, path);
            return;
        }
    };

    let element = match describe(root, path, meta.len()) {
        Some(element) => element,
        None => return,
    };

    let id = element.id.clone();
    let event = {
        let mut state = lock(state);
        match state.elements.get(&id) {
            None => {
                state.elements.insert(id.clone(), element);
                Some(PageEvent::ElementAdded(id))
            }
            Some(existing) => {
                let was_ready = existing.ready.has_current_data();
                let now_ready = element.ready.has_current_data();
                state.elements.insert(id.clone(), element);
                if !was_ready && now_ready {
                    Some(PageEvent::ElementReady(id))
                } else {
                    None
                }
            }
        }
    };

    if let Some(event) = event {
        debug!(?event, "Directory page event");
        let _ = events.send(event);
    }
}

/// Drop one path's element. Claim records die with the element, so a later
/// file under the same name is a new element.
fn remove_path(
    state: &Mutex<DirState>,
    events: &broadcast::Sender<PageEvent>,
    root: &Path,
    path: &Path,
) {
    let id = match element_id(root, path) {
        Some(id) => id,
        None => return,
    };

    let removed = {
        let mut state = lock(state);
        let removed = state.elements.remove(&id).is_some();
        if removed {
            state.claimed.remove(&id);
        }
        removed
    };

    if removed {
        debug!(id = id.as_str(), "Directory page element removed");
        let _ = events.send(PageEvent::ElementRemoved(id));
    }
}
