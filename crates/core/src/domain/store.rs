//! Persisted settings storage
//!
//! An asynchronous key-value abstraction over whatever holds settings between
//! runs, plus [`SettingsService`], the layer that gives keys their meaning:
//! - `globalSettings`: the baseline record, seeded with defaults on first run
//! - `domainSettings_<domain>`: per-domain overrides
//! - `tabSettings_<tab>`: per-tab overrides, highest precedence
//! - `domainPreset_<domain>`: name of the preset last applied to a domain
//!
//! Reads may fetch several keys at once; writes always replace whole records.
//! Malformed records are never fatal: they resolve as "no overrides".

use crate::domain::settings::{EnhancerSettings, SettingsPatch};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors that can occur in the storage subsystem
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure in a storage backend
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Key of the baseline settings record
pub const GLOBAL_KEY: &str = "globalSettings";

/// Key of a domain's settings record
pub fn domain_key(domain: &str) -> String {
    format!("domainSettings_{}", domain)
}

/// Key of a tab's settings record
pub fn tab_key(tab_id: u32) -> String {
    format!("tabSettings_{}", tab_id)
}

/// Key of a domain's active-preset record
pub fn preset_key(domain: &str) -> String {
    format!("domainPreset_{}", domain)
}

/// Trait for asynchronous key-value settings storage
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch several records at once; absent keys are simply not in the map
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>>;

    /// Replace one record wholesale
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete one record; deleting an absent key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// SETTINGS SERVICE
// ============================================================================

/// Storage semantics over a [`SettingsStore`]: seeding, layered resolution,
/// whole-record saves, and active-preset bookkeeping
pub struct SettingsService<S> {
    store: S,
}

impl<S: SettingsStore> SettingsService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Seed the global record with documented defaults if it does not exist
    /// yet. Returns whether seeding happened.
    #[instrument(skip(self))]
    pub async fn seed_defaults(&self) -> Result<bool> {
        let existing = self.store.get(&[GLOBAL_KEY.to_string()]).await?;
        if existing.contains_key(GLOBAL_KEY) {
            debug!("Global settings already present, not seeding");
            return Ok(false);
        }
        let defaults = serde_json::to_value(EnhancerSettings::default())?;
        self.store.set(GLOBAL_KEY, defaults).await?;
        info!("Seeded global settings with defaults");
        Ok(true)
    }

    /// Resolve the effective settings for a domain and tab by layering
    /// stored records over the defaults
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        domain: Option<&str>,
        tab_id: Option<u32>,
    ) -> Result<EnhancerSettings> {
        let mut keys = vec![GLOBAL_KEY.to_string()];
        if let Some(domain) = domain {
            keys.push(domain_key(domain));
        }
        if let Some(tab_id) = tab_id {
            keys.push(tab_key(tab_id));
        }
        let records = self.store.get(&keys).await?;

        let global = records.get(GLOBAL_KEY).map(parse_patch);
        let domain_patch = domain
            .and_then(|domain| records.get(&domain_key(domain)))
            .map(parse_patch);
        let tab_patch = tab_id
            .and_then(|tab_id| records.get(&tab_key(tab_id)))
            .map(parse_patch);

        Ok(EnhancerSettings::resolve(
            global.as_ref(),
            domain_patch.as_ref(),
            tab_patch.as_ref(),
        ))
    }

    /// Stored global overrides, or an empty patch when absent
    pub async fn load_global(&self) -> Result<SettingsPatch> {
        let records = self.store.get(&[GLOBAL_KEY.to_string()]).await?;
        Ok(records.get(GLOBAL_KEY).map(parse_patch).unwrap_or_default())
    }

    /// Stored overrides for one domain, or an empty patch when absent
    pub async fn load_domain(&self, domain: &str) -> Result<SettingsPatch> {
        let key = domain_key(domain);
        let records = self.store.get(&[key.clone()]).await?;
        Ok(records.get(&key).map(parse_patch).unwrap_or_default())
    }

    /// Replace the global record with a full settings snapshot
    #[instrument(skip(self, settings))]
    pub async fn save_global(&self, settings: &EnhancerSettings) -> Result<()> {
        self.store
            .set(GLOBAL_KEY, serde_json::to_value(settings)?)
            .await?;
        debug!("Saved global settings");
        Ok(())
    }

    /// Replace a domain's record with a full settings snapshot
    #[instrument(skip(self, settings))]
    pub async fn save_domain(&self, domain: &str, settings: &EnhancerSettings) -> Result<()> {
        self.store
            .set(&domain_key(domain), serde_json::to_value(settings)?)
            .await?;
        debug!("Saved settings for domain {}", domain);
        Ok(())
    }

    /// Drop a domain's overrides and active preset, falling back to global
    #[instrument(skip(self))]
    pub async fn reset_domain(&self, domain: &str) -> Result<()> {
        self.store.remove(&domain_key(domain)).await?;
        self.store.remove(&preset_key(domain)).await?;
        info!("Reset domain {} to global settings", domain);
        Ok(())
    }

    /// Name of the preset last applied to a domain
    pub async fn active_preset(&self, domain: &str) -> Result<Option<String>> {
        let key = preset_key(domain);
        let records = self.store.get(&[key.clone()]).await?;
        Ok(records
            .get(&key)
            .and_then(|value| value.as_str().map(|name| name.to_string())))
    }

    /// Record (or clear) the preset last applied to a domain
    pub async fn set_active_preset(&self, domain: &str, preset: Option<&str>) -> Result<()> {
        let key = preset_key(domain);
        match preset {
            Some(name) => self.store.set(&key, Value::String(name.to_string())).await,
            None => self.store.remove(&key).await,
        }
    }
}

/// Decode a stored record into a patch; malformed records resolve as empty
fn parse_patch(value: &Value) -> SettingsPatch {
    match serde_json::from_value(value.clone()) {
        Ok(patch) => patch,
        Err(e) => {
            warn!("Ignoring malformed settings record: {}", e);
            SettingsPatch::empty()
        }
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-process store backed by a plain map, for tests and embedders
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let records = self.lock();
        Ok(keys
            .iter()
            .filter_map(|key| {
                records
                    .get(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> SettingsService<MemoryStore> {
        SettingsService::new(MemoryStore::new())
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(GLOBAL_KEY, "globalSettings");
        assert_eq!(domain_key("music.example.com"), "domainSettings_music.example.com");
        assert_eq!(tab_key(41), "tabSettings_41");
        assert_eq!(preset_key("music.example.com"), "domainPreset_music.example.com");
    }

    #[tokio::test]
    async fn test_seed_defaults_once() {
        let service = service();

        assert!(service.seed_defaults().await.unwrap());
        assert!(!service.seed_defaults().await.unwrap());

        let records = service
            .store()
            .get(&[GLOBAL_KEY.to_string()])
            .await
            .unwrap();
        let record = &records[GLOBAL_KEY];
        assert_eq!(record["enabled"], json!(true));
        assert_eq!(record["preamp"], json!(0.0));
        assert_eq!(record["compressionThreshold"], json!(-24.0));
        assert_eq!(record["compressionRatio"], json!(3.0));
        assert_eq!(record["smartVolume"], json!(false));
    }

    #[tokio::test]
    async fn test_seeding_preserves_existing_record() {
        let service = service();
        service
            .store()
            .set(GLOBAL_KEY, json!({"preamp": 5.0}))
            .await
            .unwrap();

        assert!(!service.seed_defaults().await.unwrap());
        let patch = service.load_global().await.unwrap();
        assert_eq!(patch.preamp, Some(5.0));
    }

    #[tokio::test]
    async fn test_resolution_precedence() {
        let service = service();
        service
            .store()
            .set(GLOBAL_KEY, json!({"preamp": 1.0, "eq32": 2.0}))
            .await
            .unwrap();
        service
            .store()
            .set(&domain_key("a.example"), json!({"preamp": 2.0}))
            .await
            .unwrap();
        service
            .store()
            .set(&tab_key(7), json!({"preamp": 3.0}))
            .await
            .unwrap();

        let global_only = service.resolve(None, None).await.unwrap();
        assert_eq!(global_only.preamp, 1.0);
        assert_eq!(global_only.eq32, 2.0);

        let with_domain = service.resolve(Some("a.example"), None).await.unwrap();
        assert_eq!(with_domain.preamp, 2.0);
        assert_eq!(with_domain.eq32, 2.0);

        let with_tab = service.resolve(Some("a.example"), Some(7)).await.unwrap();
        assert_eq!(with_tab.preamp, 3.0);
    }

    #[tokio::test]
    async fn test_unknown_domain_resolves_to_global() {
        let service = service();
        service.seed_defaults().await.unwrap();

        let settings = service.resolve(Some("never-seen.example"), None).await.unwrap();
        assert_eq!(settings, EnhancerSettings::default());
    }

    #[tokio::test]
    async fn test_malformed_record_is_ignored() {
        let service = service();
        service
            .store()
            .set(GLOBAL_KEY, json!("not an object"))
            .await
            .unwrap();
        service
            .store()
            .set(&domain_key("a.example"), json!({"preamp": 4.0}))
            .await
            .unwrap();

        let settings = service.resolve(Some("a.example"), None).await.unwrap();
        assert_eq!(settings.preamp, 4.0);
        assert_eq!(settings.compression_ratio, 3.0);
    }

    #[tokio::test]
    async fn test_save_domain_writes_whole_record() {
        let service = service();
        let mut settings = EnhancerSettings::default();
        settings.eq1k = 4.0;
        settings.mono = true;

        service.save_domain("a.example", &settings).await.unwrap();

        let key = domain_key("a.example");
        let records = service.store().get(&[key.clone()]).await.unwrap();
        let record = &records[&key];
        assert_eq!(record["eq1k"], json!(4.0));
        assert_eq!(record["mono"], json!(true));
        // Untouched fields are stored too: writes are full replacements
        assert_eq!(record["compressionKnee"], json!(30.0));
    }

    #[tokio::test]
    async fn test_active_preset_bookkeeping() {
        let service = service();
        assert_eq!(service.active_preset("a.example").await.unwrap(), None);

        service
            .set_active_preset("a.example", Some("movie"))
            .await
            .unwrap();
        assert_eq!(
            service.active_preset("a.example").await.unwrap().as_deref(),
            Some("movie")
        );

        service.set_active_preset("a.example", None).await.unwrap();
        assert_eq!(service.active_preset("a.example").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_domain_clears_overrides_and_preset() {
        let service = service();
        let settings = EnhancerSettings::default();
        service.save_domain("a.example", &settings).await.unwrap();
        service
            .set_active_preset("a.example", Some("rock"))
            .await
            .unwrap();

        service.reset_domain("a.example").await.unwrap();

        assert!(service.load_domain("a.example").await.unwrap().is_empty());
        assert_eq!(service.active_preset("a.example").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multi_get_skips_absent_keys() {
        let store = MemoryStore::new();
        store.set("present", json!(1)).await.unwrap();

        let records = store
            .get(&["present".to_string(), "absent".to_string()])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.contains_key("present"));
    }
}
