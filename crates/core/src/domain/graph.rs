//! Media attachment management
//!
//! [`AttachmentManager`] owns the mapping from discovered media elements to
//! their processing chains:
//! - at most one attachment attempt per element, ever, even under
//!   concurrent discovery
//! - wiring deferred until the element can render audio
//! - settings changes re-projected over every live chain
//! - bookkeeping pruned for elements that left the page
//!
//! The manager is single-threaded: the session task owns it and feeds it
//! page events and control messages in arrival order.

use crate::domain::chain::{ContextState, EnhancerChain, PageContext};
use crate::domain::media::{
    AudioInfo, ClaimedSource, ElementId, MediaElement, PageError, PageEvent, PageView, Result,
};
use crate::domain::projector;
use crate::domain::settings::{EnhancerSettings, SettingsPatch};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Lifecycle of one media element as seen by the manager.
///
/// `Processing` is entered exactly once and recorded before any fallible
/// step; `Attached` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    Processing,
    Attached,
    Rejected,
}

struct Attachment {
    chain: EnhancerChain,
    source: ClaimedSource,
}

/// Per-page engine tying discovered media elements to processing chains
pub struct AttachmentManager {
    page: Arc<dyn PageView>,
    sample_rate: u32,
    settings: EnhancerSettings,
    /// Shared processing context, created on the first successful attach
    context: Option<PageContext>,
    /// Every element that ever entered `Processing`
    states: HashMap<ElementId, AttachmentState>,
    attachments: HashMap<ElementId, Attachment>,
}

impl AttachmentManager {
    pub fn new(page: Arc<dyn PageView>, sample_rate: u32) -> Self {
        Self {
            page,
            sample_rate,
            settings: EnhancerSettings::default(),
            context: None,
            states: HashMap::new(),
            attachments: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &EnhancerSettings {
        &self.settings
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn attached_count(&self) -> usize {
        self.attachments.len()
    }

    pub fn state(&self, id: &ElementId) -> Option<AttachmentState> {
        self.states.get(id).copied()
    }

    pub fn chain(&self, id: &ElementId) -> Option<&EnhancerChain> {
        self.attachments.get(id).map(|attachment| &attachment.chain)
    }

    pub fn context_state(&self) -> Option<ContextState> {
        self.context.as_ref().map(|context| context.state())
    }

    /// Feed every element currently in the page through the attachment
    /// pipeline. Elements already in or past `Processing` are skipped.
    pub fn scan(&mut self) -> Result<()> {
        let elements = self.page.media_elements()?;
        let mut ids: Vec<ElementId> = elements.into_iter().map(|element| element.id).collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        for id in ids {
            self.process_element(&id);
        }
        Ok(())
    }

    /// React to a page change notification
    pub fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::ElementAdded(id) => self.process_element(&id),
            PageEvent::ElementReady(id) => match self.states.get(&id) {
                Some(AttachmentState::Processing) => self.try_attach(&id),
                Some(_) => {}
                // Readiness can be the first we hear of an element when the
                // subscription started after it appeared
                None => self.process_element(&id),
            },
            PageEvent::ElementRemoved(id) => self.forget(&id),
        }
    }

    /// Run one element through the attachment pipeline, at most once ever
    pub fn process_element(&mut self, id: &ElementId) {
        if self.states.contains_key(id) {
            trace!("Element already processed, skipping: {}", id.as_str());
            return;
        }
        // Recorded before any fallible step so a concurrent second discovery
        // of the same element is a no-op
        self.states.insert(id.clone(), AttachmentState::Processing);
        self.try_attach(id);
    }

    fn try_attach(&mut self, id: &ElementId) {
        if !self.page.contains(id) {
            self.reject(id, "left the page before attachment");
            return;
        }

        let element = match self.page.element(id) {
            Ok(element) => element,
            Err(_) => {
                self.reject(id, "left the page before attachment");
                return;
            }
        };

        if !element.ready.has_current_data() {
            debug!("Element not ready yet, deferring: {}", id.as_str());
            return;
        }

        let source = match self.page.claim(id) {
            Ok(source) => source,
            Err(PageError::AlreadyClaimed(_)) => {
                self.reject(id, "already feeds another graph");
                return;
            }
            Err(e) => {
                warn!("Cannot capture element {}: {}", id.as_str(), e);
                self.states.insert(id.clone(), AttachmentState::Rejected);
                return;
            }
        };

        let sample_rate = self.sample_rate;
        let context = self
            .context
            .get_or_insert_with(|| PageContext::new(sample_rate));
        let mut chain = context.build_chain();
        projector::apply(&mut chain, &self.settings);

        info!(
            "Attached element {} ({} channel source)",
            id.as_str(),
            source.channel_count
        );
        self.attachments.insert(id.clone(), Attachment { chain, source });
        self.states.insert(id.clone(), AttachmentState::Attached);

        self.resume_if_enabled();
    }

    fn reject(&mut self, id: &ElementId, reason: &str) {
        debug!("Skipping element {}: {}", id.as_str(), reason);
        self.states.insert(id.clone(), AttachmentState::Rejected);
    }

    fn forget(&mut self, id: &ElementId) {
        if self.states.remove(id).is_some() {
            self.attachments.remove(id);
            debug!("Dropped bookkeeping for removed element: {}", id.as_str());
        }
    }

    /// Merge a partial update into the live settings and propagate
    pub fn apply_patch(&mut self, patch: &SettingsPatch) -> Result<()> {
        self.settings.apply_patch(patch);
        self.refresh()
    }

    /// Replace the live settings wholesale and propagate
    pub fn set_settings(&mut self, settings: EnhancerSettings) -> Result<()> {
        self.settings = settings;
        self.refresh()
    }

    /// Catch elements that appeared since the last pass, then prune and
    /// re-project every surviving chain
    fn refresh(&mut self) -> Result<()> {
        self.scan()?;
        self.propagate();
        Ok(())
    }

    fn propagate(&mut self) {
        // Explicit liveness pass stands in for host-side weak references
        let dead: Vec<ElementId> = self
            .states
            .keys()
            .filter(|id| !self.page.contains(id))
            .cloned()
            .collect();
        for id in &dead {
            self.states.remove(id);
            self.attachments.remove(id);
        }
        if !dead.is_empty() {
            debug!("Pruned {} detached element(s)", dead.len());
        }

        for attachment in self.attachments.values_mut() {
            projector::apply(&mut attachment.chain, &self.settings);
        }

        self.resume_if_enabled();
    }

    fn resume_if_enabled(&mut self) {
        if self.settings.enabled {
            if let Some(context) = self.context.as_mut() {
                context.resume();
            }
        }
    }

    /// Best-effort metadata about the first element in the page, by id order
    pub fn audio_info(&self) -> AudioInfo {
        let sample_rate = self.context.as_ref().map(|context| context.sample_rate());
        let mut elements = match self.page.media_elements() {
            Ok(elements) => elements,
            Err(e) => {
                debug!("Page scan failed during info probe: {}", e);
                Vec::new()
            }
        };
        elements.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        let first: Option<&MediaElement> = elements.first();
        let source_channels = first.and_then(|element| {
            self.attachments
                .get(&element.id)
                .map(|attachment| attachment.source.channel_count)
        });
        AudioInfo::probe(sample_rate, first, source_channels)
    }

    /// Latest frequency-magnitude frame, or `None` before any chain exists
    pub fn spectrum(&self) -> Option<Vec<u8>> {
        self.context
            .as_ref()
            .map(|context| context.analyser().snapshot())
    }

    /// Feed a frequency-magnitude frame into the shared analyser tap
    pub fn ingest_spectrum(&mut self, frame: &[u8]) {
        if let Some(context) = self.context.as_mut() {
            context.analyser_mut().ingest_frame(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::{MediaKind, MemoryPage, NetworkState, ReadyState};

    fn element(id: &str) -> MediaElement {
        MediaElement {
            id: ElementId::new(id.to_string()),
            kind: MediaKind::Audio,
            src: format!("{}.mp3", id),
            mime_hint: None,
            ready: ReadyState::HaveEnoughData,
            network: NetworkState::Idle,
            channel_count: 2,
            duration_secs: Some(180.0),
            buffered: true,
        }
    }

    fn not_ready(id: &str) -> MediaElement {
        let mut element = element(id);
        element.ready = ReadyState::HaveMetadata;
        element
    }

    fn manager_with(elements: Vec<MediaElement>) -> (Arc<MemoryPage>, AttachmentManager) {
        let page = Arc::new(MemoryPage::new());
        for element in elements {
            page.insert(element);
        }
        let manager = AttachmentManager::new(page.clone(), 48000);
        (page, manager)
    }

    #[test]
    fn test_scan_attaches_ready_elements() {
        let (_page, mut manager) = manager_with(vec![element("a"), element("b")]);

        manager.scan().unwrap();

        assert_eq!(manager.attached_count(), 2);
        let id = ElementId::new("a".to_string());
        assert_eq!(manager.state(&id), Some(AttachmentState::Attached));
        assert!(manager.chain(&id).is_some());
    }

    #[test]
    fn test_attachment_is_at_most_once() {
        let (page, mut manager) = manager_with(vec![element("a")]);

        manager.scan().unwrap();
        manager.scan().unwrap();
        // Concurrent discovery paths report the same element again
        manager.handle_event(PageEvent::ElementAdded(ElementId::new("a".to_string())));
        manager.handle_event(PageEvent::ElementReady(ElementId::new("a".to_string())));

        assert_eq!(manager.attached_count(), 1);
        assert_eq!(
            manager.state(&ElementId::new("a".to_string())),
            Some(AttachmentState::Attached)
        );
        // A second claim on the page side would have failed; the manager
        // never issued one
        assert!(page.claim(&ElementId::new("a".to_string())).is_err());
    }

    #[test]
    fn test_deferred_attachment_on_readiness() {
        let (page, mut manager) = manager_with(vec![not_ready("a")]);
        let id = ElementId::new("a".to_string());

        manager.scan().unwrap();
        assert_eq!(manager.state(&id), Some(AttachmentState::Processing));
        assert_eq!(manager.attached_count(), 0);

        page.set_ready(&id, ReadyState::HaveCurrentData);
        manager.handle_event(PageEvent::ElementReady(id.clone()));

        assert_eq!(manager.state(&id), Some(AttachmentState::Attached));
        assert_eq!(manager.attached_count(), 1);
    }

    #[test]
    fn test_removed_before_ready_is_rejected() {
        let (page, mut manager) = manager_with(vec![not_ready("a")]);
        let id = ElementId::new("a".to_string());

        manager.scan().unwrap();
        page.remove(&id);
        // Stale readiness signal arrives after removal
        manager.handle_event(PageEvent::ElementReady(id.clone()));

        assert_eq!(manager.state(&id), Some(AttachmentState::Rejected));
        assert_eq!(manager.attached_count(), 0);
    }

    #[test]
    fn test_foreign_claim_is_rejected_silently() {
        let (page, mut manager) = manager_with(vec![element("a")]);
        let id = ElementId::new("a".to_string());
        page.claim_externally(&id);

        manager.scan().unwrap();

        assert_eq!(manager.state(&id), Some(AttachmentState::Rejected));
        assert_eq!(manager.attached_count(), 0);
    }

    #[test]
    fn test_tainted_element_is_rejected() {
        let (page, mut manager) = manager_with(vec![element("a"), element("b")]);
        page.set_tainted(&ElementId::new("a".to_string()));

        manager.scan().unwrap();

        assert_eq!(
            manager.state(&ElementId::new("a".to_string())),
            Some(AttachmentState::Rejected)
        );
        assert_eq!(
            manager.state(&ElementId::new("b".to_string())),
            Some(AttachmentState::Attached)
        );
        assert_eq!(manager.attached_count(), 1);
    }

    #[test]
    fn test_patch_propagates_to_every_chain() {
        let (_page, mut manager) = manager_with(vec![element("a"), element("b")]);
        manager.scan().unwrap();

        manager
            .apply_patch(&SettingsPatch {
                eq1k: Some(3.0),
                ..SettingsPatch::empty()
            })
            .unwrap();

        for id in ["a", "b"] {
            let chain = manager.chain(&ElementId::new(id.to_string())).unwrap();
            assert_eq!(chain.bands[5].gain_db, 3.0);
        }
    }

    #[test]
    fn test_propagation_prunes_departed_elements() {
        let (page, mut manager) = manager_with(vec![element("a"), element("b")]);
        manager.scan().unwrap();
        assert_eq!(manager.attached_count(), 2);

        let id = ElementId::new("a".to_string());
        page.remove(&id);
        manager
            .apply_patch(&SettingsPatch {
                preamp: Some(2.0),
                ..SettingsPatch::empty()
            })
            .unwrap();

        assert_eq!(manager.attached_count(), 1);
        assert_eq!(manager.state(&id), None);
        assert!(manager
            .chain(&ElementId::new("b".to_string()))
            .is_some());
    }

    #[test]
    fn test_patch_catches_new_elements() {
        let (page, mut manager) = manager_with(vec![element("a")]);
        manager.scan().unwrap();

        page.insert(element("b"));
        manager
            .apply_patch(&SettingsPatch {
                eq32: Some(6.0),
                ..SettingsPatch::empty()
            })
            .unwrap();

        assert_eq!(manager.attached_count(), 2);
        let chain = manager.chain(&ElementId::new("b".to_string())).unwrap();
        assert_eq!(chain.bands[0].gain_db, 6.0);
    }

    #[test]
    fn test_context_is_lazy_and_resumes_when_enabled() {
        let (_page, mut manager) = manager_with(vec![element("a")]);
        assert_eq!(manager.context_state(), None);

        manager.scan().unwrap();
        // Default settings are enabled, so attach resumes the context
        assert_eq!(manager.context_state(), Some(ContextState::Running));
    }

    #[test]
    fn test_context_stays_suspended_while_disabled() {
        let (_page, mut manager) = manager_with(vec![element("a")]);
        manager
            .set_settings(EnhancerSettings {
                enabled: false,
                ..EnhancerSettings::default()
            })
            .unwrap();

        assert_eq!(manager.context_state(), Some(ContextState::Suspended));

        manager
            .apply_patch(&SettingsPatch::enabled(true))
            .unwrap();
        assert_eq!(manager.context_state(), Some(ContextState::Running));
    }

    #[test]
    fn test_audio_info_reads_first_element_by_id() {
        let (_page, mut manager) = manager_with(vec![element("b"), element("a")]);
        manager.scan().unwrap();

        let info = manager.audio_info();
        assert_eq!(info.sample_rate, Some(48000));
        assert_eq!(info.channels.as_deref(), Some("Stereo"));
        assert_eq!(info.codec.as_deref(), Some("MP3"));
        assert_eq!(info.duration.as_deref(), Some("3:00"));
    }

    #[test]
    fn test_audio_info_degrades_before_any_attachment() {
        let (_page, manager) = manager_with(vec![]);
        let info = manager.audio_info();
        assert_eq!(info, AudioInfo::default());
    }

    #[test]
    fn test_spectrum_roundtrip() {
        let (_page, mut manager) = manager_with(vec![element("a")]);
        assert_eq!(manager.spectrum(), None);

        manager.scan().unwrap();
        let frame: Vec<u8> = (0..=255).collect();
        manager.ingest_spectrum(&frame);

        let snapshot = manager.spectrum().unwrap();
        assert_eq!(snapshot.len(), 256);
        assert_eq!(snapshot, frame);
    }
}
