//! JSON-file settings store
//!
//! One flat JSON object holds every settings record keyed by name, matching
//! the engine's key hierarchy (`globalSettings`, `domainSettings_<domain>`,
//! ...). Reads load the whole map; writes replace the file through a
//! temp-file rename. A corrupt store file is moved aside to a `.corrupt`
//! backup and treated as empty rather than crashing.

use async_trait::async_trait;
use auralift_core::domain::store::{Result, SettingsStore, StoreError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Settings store backed by a single JSON file
pub struct FileStore {
    path: PathBuf,
    // Serializes load-modify-write cycles within this process
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            guard: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_map(&self) -> Result<Map<String, Value>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        match serde_json::from_str::<Map<String, Value>>(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "Store file is corrupt, starting from an empty map"
                );

                // Backup the corrupt store
                let backup_path = self.path.with_extension("json.corrupt");
                if let Err(copy_err) = fs::copy(&self.path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt store"
                    );
                }

                Ok(Map::new())
            }
        }
    }

    async fn save_map(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(map)?;

        // Rename over the final path so watchers never see a partial file
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &self.path).await?;

        debug!(
            path = %self.path.display(),
            records = map.len(),
            "Store file written"
        );
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileStore {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let _guard = self.guard.lock().await;
        let map = self.load_map().await?;
        Ok(keys
            .iter()
            .filter_map(|key| map.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut map = self.load_map().await?;
        map.insert(key.to_string(), value);
        self.save_map(&map).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut map = self.load_map().await?;
        if map.remove(key).is_some() {
            self.save_map(&map).await?;
        }
        Ok(())
    }
}
