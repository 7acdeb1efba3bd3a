//! Background coordination
//!
//! [`EnhancerWorker`] is the storage-owning side of the system: it seeds
//! defaults on first run, executes the global toggle shortcut, applies
//! presets, and persists control-surface edits. Domain records are the only
//! persisted override scope; tab overrides stay volatile.
//!
//! State changes are announced on a broadcast channel so live sessions and
//! status indicators can follow along without polling.

use crate::domain::presets;
use crate::domain::settings::{EnhancerSettings, SettingsPatch};
use crate::domain::store::{Result as StoreResult, SettingsService, SettingsStore, StoreError};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Errors that can occur during background coordination
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Requested preset does not exist
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// Underlying storage failure
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, WorkerError>;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// State changes announced to sessions and indicators
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// The master switch for a domain flipped
    EnabledChanged { domain: String, enabled: bool },
    /// A domain's settings record changed
    SettingsChanged { domain: String },
    /// A preset was applied to a domain
    PresetApplied { domain: String, preset: String },
}

/// Storage-owning coordinator for toggles, presets and edits
pub struct EnhancerWorker<S> {
    service: SettingsService<S>,
    events: broadcast::Sender<WorkerEvent>,
}

impl<S: SettingsStore> EnhancerWorker<S> {
    pub fn new(service: SettingsService<S>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { service, events }
    }

    pub fn service(&self) -> &SettingsService<S> {
        &self.service
    }

    /// Follow state changes made through this worker
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    /// First-run initializer: seed the global record with defaults.
    /// Returns whether seeding happened.
    pub async fn install(&self) -> StoreResult<bool> {
        self.service.seed_defaults().await
    }

    /// Flip the master switch for a domain's effective settings and persist
    /// the flipped record as the domain override. Returns the new state.
    #[instrument(skip(self))]
    pub async fn toggle(&self, domain: &str) -> Result<bool> {
        let mut settings = self.service.resolve(Some(domain), None).await?;
        settings.enabled = !settings.enabled;
        self.service.save_domain(domain, &settings).await?;

        info!(
            "Toggled {} for domain {}",
            if settings.enabled { "on" } else { "off" },
            domain
        );
        self.emit(WorkerEvent::EnabledChanged {
            domain: domain.to_string(),
            enabled: settings.enabled,
        });
        Ok(settings.enabled)
    }

    /// Merge a control-surface edit into a domain's effective settings and
    /// persist the merged record. Returns the persisted settings.
    #[instrument(skip(self, patch))]
    pub async fn update_domain(
        &self,
        domain: &str,
        patch: &SettingsPatch,
    ) -> Result<EnhancerSettings> {
        let mut settings = self.service.resolve(Some(domain), None).await?;
        settings.apply_patch(patch);
        self.service.save_domain(domain, &settings).await?;

        self.emit(WorkerEvent::SettingsChanged {
            domain: domain.to_string(),
        });
        Ok(settings)
    }

    /// Apply a named preset to a domain: pin its values over the effective
    /// settings, persist, and record the preset as active for that domain
    #[instrument(skip(self))]
    pub async fn apply_preset(&self, domain: &str, id: &str) -> Result<EnhancerSettings> {
        let preset = presets::find(id)
            .ok_or_else(|| WorkerError::UnknownPreset(id.to_string()))?;

        self.service
            .set_active_preset(domain, Some(preset.id))
            .await?;
        let settings = self.update_domain(domain, &preset.patch).await?;

        info!("Applied preset {} to domain {}", preset.id, domain);
        self.emit(WorkerEvent::PresetApplied {
            domain: domain.to_string(),
            preset: preset.id.to_string(),
        });
        Ok(settings)
    }

    /// Drop a domain's overrides and active preset
    #[instrument(skip(self))]
    pub async fn reset_domain(&self, domain: &str) -> Result<()> {
        self.service.reset_domain(domain).await?;
        self.emit(WorkerEvent::SettingsChanged {
            domain: domain.to_string(),
        });
        Ok(())
    }

    fn emit(&self, event: WorkerEvent) {
        // Nobody listening is fine; sessions subscribe when they start
        let _ = self.events.send(event);
    }
}
