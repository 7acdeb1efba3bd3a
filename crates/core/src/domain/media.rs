//! Host page media abstractions and domain models
//!
//! This module defines the interface between the enhancer and whatever hosts
//! the media it processes. The host is modelled as a "page": a mutable set of
//! media elements that appear, become ready, and disappear over time.
//! Concrete hosts (a watched media directory, an embedding application) live
//! in the `infra` crate; [`MemoryPage`] here is the in-process host used by
//! tests and embedders.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur when inspecting or capturing host media
#[derive(Debug, Error)]
pub enum PageError {
    /// Referenced element is not (or no longer) part of the page
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Element output is already routed into a different processing graph.
    /// Irrecoverable for the lifetime of the element.
    #[error("Element already claimed: {0}")]
    AlreadyClaimed(String),

    /// Element carries media the host refuses to expose for processing
    /// (cross-origin without consent headers)
    #[error("Element source is tainted: {0}")]
    Tainted(String),

    /// Failure in the underlying host adapter
    #[error("Page adapter error: {0}")]
    Adapter(String),
}

pub type Result<T> = std::result::Result<T, PageError>;

/// Unique identifier for a media element within one page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Kind of media element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// Readiness of a media element's decoded data, ordered from nothing
/// decoded to fully buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    pub fn level(&self) -> u8 {
        match self {
            ReadyState::HaveNothing => 0,
            ReadyState::HaveMetadata => 1,
            ReadyState::HaveCurrentData => 2,
            ReadyState::HaveFutureData => 3,
            ReadyState::HaveEnoughData => 4,
        }
    }

    pub fn from_level(level: u8) -> Self {
        match level {
            0 => ReadyState::HaveNothing,
            1 => ReadyState::HaveMetadata,
            2 => ReadyState::HaveCurrentData,
            3 => ReadyState::HaveFutureData,
            _ => ReadyState::HaveEnoughData,
        }
    }

    /// Whether enough data has been decoded to wire the element into a
    /// processing graph
    pub fn has_current_data(&self) -> bool {
        *self >= ReadyState::HaveCurrentData
    }
}

/// Network activity of a media element's source fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    Empty,
    Idle,
    Loading,
    NoSource,
}

impl NetworkState {
    pub fn level(&self) -> u8 {
        match self {
            NetworkState::Empty => 0,
            NetworkState::Idle => 1,
            NetworkState::Loading => 2,
            NetworkState::NoSource => 3,
        }
    }
}

/// Snapshot of one media element as reported by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaElement {
    pub id: ElementId,
    pub kind: MediaKind,
    /// Resolved source location; empty when the element has no source yet
    pub src: String,
    /// Host-reported content type, when known
    pub mime_hint: Option<String>,
    pub ready: ReadyState,
    pub network: NetworkState,
    pub channel_count: u16,
    /// `None` for live or unbounded media
    pub duration_secs: Option<f64>,
    /// Whether any data range has been buffered
    pub buffered: bool,
}

/// Handle returned by a successful claim: the element's output now feeds
/// the caller's graph and can never be re-claimed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedSource {
    pub id: ElementId,
    pub channel_count: u16,
}

/// Change notifications emitted by a page as its element set evolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A qualifying element appeared (initial scan or later mutation)
    ElementAdded(ElementId),
    /// A previously observed element can now render audio
    ElementReady(ElementId),
    /// An element left the page
    ElementRemoved(ElementId),
}

/// Trait for host-agnostic page access
///
/// Implementations must tolerate concurrent readers; all methods take `&self`.
pub trait PageView: Send + Sync {
    /// Snapshot every qualifying media element currently in the page
    fn media_elements(&self) -> Result<Vec<MediaElement>>;

    /// Fresh descriptor for a single element
    fn element(&self, id: &ElementId) -> Result<MediaElement>;

    /// Whether the element is still part of the page
    fn contains(&self, id: &ElementId) -> bool;

    /// Route the element's output into the caller's processing graph.
    ///
    /// Succeeds at most once per element for the lifetime of the page;
    /// later attempts fail with [`PageError::AlreadyClaimed`].
    fn claim(&self, id: &ElementId) -> Result<ClaimedSource>;

    /// Subscribe to element change notifications
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;
}

// ============================================================================
// AUDIO INFO
// ============================================================================

/// Best-effort descriptive metadata about the first qualifying element.
///
/// Every field is a heuristic, not a measurement; absent data stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInfo {
    pub sample_rate: Option<u32>,
    pub channels: Option<String>,
    pub bit_depth: Option<String>,
    pub codec: Option<String>,
    pub bitrate: Option<String>,
    pub duration: Option<String>,
}

impl AudioInfo {
    /// Assemble the record from the shared context rate, the first element's
    /// descriptor, and the channel count of its captured source (when the
    /// element is attached).
    pub fn probe(
        sample_rate: Option<u32>,
        first: Option<&MediaElement>,
        source_channels: Option<u16>,
    ) -> Self {
        let mut info = AudioInfo {
            sample_rate,
            ..AudioInfo::default()
        };

        let element = match first {
            Some(element) => element,
            None => return info,
        };

        info.channels = source_channels.map(|count| {
            if count == 2 {
                "Stereo".to_string()
            } else {
                "Mono".to_string()
            }
        });

        if let Some(duration) = element.duration_secs {
            if duration.is_finite() && duration > 0.0 {
                info.duration = Some(format_duration(duration));
            }
        }

        if !element.src.is_empty() {
            let codec = detect_codec(&element.src, element.mime_hint.as_deref());
            info.bit_depth = Some(estimate_bit_depth(Some(codec)).to_string());
            info.codec = Some(codec.to_string());
        }

        if element.buffered {
            info.bitrate = Some(
                match element.network {
                    NetworkState::Loading => "Streaming",
                    NetworkState::NoSource => "No Source",
                    _ => "Buffered",
                }
                .to_string(),
            );
        }

        info
    }
}

/// Guess the codec from the source's file extension, falling back to the
/// host-reported content type. Returns `"Unknown"` when neither matches.
pub fn detect_codec(src: &str, mime_hint: Option<&str>) -> &'static str {
    let path = src.split('?').next().unwrap_or(src);
    let extension = path
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "mp3" => return "MP3",
        "mp4" => return "AAC/MP4",
        "m4a" | "aac" => return "AAC",
        "ogg" => return "Vorbis",
        "opus" => return "Opus",
        "webm" => return "Opus/Vorbis",
        "flac" => return "FLAC",
        "wav" => return "PCM/WAV",
        _ => {}
    }

    if let Some(hint) = mime_hint {
        let base = hint.split(';').next().unwrap_or(hint).trim();
        match base {
            "audio/mp4" => return "AAC",
            "audio/mpeg" => return "MP3",
            "audio/ogg" => return "Vorbis",
            "audio/webm" => return "Opus",
            "audio/flac" => return "FLAC",
            _ => {}
        }
    }

    "Unknown"
}

/// Guess the bit depth from the codec family: lossless container formats
/// report 24-bit, every other detected codec 16-bit
pub fn estimate_bit_depth(codec: Option<&str>) -> &'static str {
    match codec {
        None => "-",
        Some("FLAC") | Some("PCM/WAV") => "24-bit",
        Some(_) => "16-bit",
    }
}

/// Format a finite duration as `M:SS`
pub fn format_duration(secs: f64) -> String {
    let minutes = (secs / 60.0).floor() as u64;
    let seconds = (secs % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, seconds)
}

// ============================================================================
// MEMORY PAGE
// ============================================================================

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Default)]
struct MemoryPageState {
    elements: HashMap<ElementId, MediaElement>,
    claimed: HashSet<ElementId>,
    tainted: HashSet<ElementId>,
}

/// In-process page implementation backed by a plain map.
///
/// Used by tests and by embedders that feed the enhancer programmatically.
/// Mutations broadcast [`PageEvent`]s to all subscribers.
pub struct MemoryPage {
    state: Arc<Mutex<MemoryPageState>>,
    events: broadcast::Sender<PageEvent>,
}

impl MemoryPage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(MemoryPageState::default())),
            events,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryPageState> {
        // Held only for map access; poisoning would mean a panic mid-access,
        // which the page treats as unrecoverable anyway
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add or replace an element and notify subscribers
    pub fn insert(&self, element: MediaElement) {
        let id = element.id.clone();
        self.lock().elements.insert(id.clone(), element);
        let _ = self.events.send(PageEvent::ElementAdded(id));
    }

    /// Remove an element and notify subscribers. Claim and taint records die
    /// with the element: a later insert under the same id is a new element.
    pub fn remove(&self, id: &ElementId) {
        let removed = {
            let mut state = self.lock();
            let removed = state.elements.remove(id).is_some();
            if removed {
                state.claimed.remove(id);
                state.tainted.remove(id);
            }
            removed
        };
        if removed {
            let _ = self.events.send(PageEvent::ElementRemoved(id.clone()));
        }
    }

    /// Advance an element's readiness; notifies subscribers when it crosses
    /// into renderable territory
    pub fn set_ready(&self, id: &ElementId, ready: ReadyState) {
        let notify = {
            let mut state = self.lock();
            match state.elements.get_mut(id) {
                Some(element) => {
                    let was_ready = element.ready.has_current_data();
                    element.ready = ready;
                    !was_ready && ready.has_current_data()
                }
                None => false,
            }
        };
        if notify {
            let _ = self.events.send(PageEvent::ElementReady(id.clone()));
        }
    }

    /// Mark an element's source as tainted; claims will fail
    pub fn set_tainted(&self, id: &ElementId) {
        self.lock().tainted.insert(id.clone());
    }

    /// Record a claim made by some other agent; claims will fail
    pub fn claim_externally(&self, id: &ElementId) {
        self.lock().claimed.insert(id.clone());
    }
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl PageView for MemoryPage {
    fn media_elements(&self) -> Result<Vec<MediaElement>> {
        Ok(self.lock().elements.values().cloned().collect())
    }

    fn element(&self, id: &ElementId) -> Result<MediaElement> {
        self.lock()
            .elements
            .get(id)
            .cloned()
            .ok_or_else(|| PageError::ElementNotFound(id.as_str().to_string()))
    }

    fn contains(&self, id: &ElementId) -> bool {
        self.lock().elements.contains_key(id)
    }

    fn claim(&self, id: &ElementId) -> Result<ClaimedSource> {
        let mut state = self.lock();
        let element = state
            .elements
            .get(id)
            .ok_or_else(|| PageError::ElementNotFound(id.as_str().to_string()))?;
        if state.tainted.contains(id) {
            return Err(PageError::Tainted(id.as_str().to_string()));
        }
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
