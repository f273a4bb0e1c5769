// # File Device Store
//
// File-based implementation of DeviceStore with crash recovery.
//
// ## Purpose
//
// Persists device records, including their registration handles, across
// process restarts. Without the handle a restarted agent would lose track of
// which broker registrations it owns.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Corruption detection: JSON validation on load
// - Automatic backup: keeps .backup of the last known good file
// - Recovery: falls back to the backup when the main file is corrupted
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "devices": [
//     {
//       "id": "light1",
//       "type": "Light",
//       "service": "smartGondor",
//       "subservice": "gardens",
//       "registrationId": "6319a7f5254b05844321de17"
//     }
//   ]
// }
// ```
//
// Devices are stored as a list because the composite key does not make a
// usable JSON object key.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::device::{Device, DeviceKey};
use crate::error::{Error, Result};
use crate::traits::device_store::DeviceStore;

/// Store file format version, for future migration if the format changes
const STORE_FILE_VERSION: &str = "1.0";

/// File-based device store with crash recovery
///
/// Persists records to a JSON file with atomic writes and automatic
/// corruption recovery. Every mutation is written through immediately.
#[derive(Debug)]
pub struct FileDeviceStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    devices: HashMap<DeviceKey, Device>,
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    devices: Vec<Device>,
}

impl FileDeviceStore {
    /// Create or load a file device store
    ///
    /// Loads the existing file if present, recovering from the backup when
    /// the main file is corrupted, and creates parent directories as needed.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let devices = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                devices,
                dirty: false,
            })),
        })
    }

    /// Load the store file, falling back to the backup on corruption
    async fn load_with_recovery(path: &Path) -> Result<HashMap<DeviceKey, Device>> {
        match Self::load(path).await {
            Ok(devices) => {
                tracing::debug!(count = devices.len(), "loaded device store file");
                Ok(devices)
            }
            Err(Error::Store(detail)) => {
                tracing::warn!(
                    "device store file appears corrupted: {detail}. Attempting recovery from backup"
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("no backup file found, starting with an empty store");
                    return Ok(HashMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(devices) => {
                        tracing::info!(count = devices.len(), "recovered device store from backup");
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "failed to restore store file from backup: {restore_err}"
                            );
                        }
                        Ok(devices)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "backup also corrupted: {backup_err}. Starting with an empty store"
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn load(path: &Path) -> Result<HashMap<DeviceKey, Device>> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "device store file does not exist");
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!(
                "failed to read store file {}: {}",
                path.display(),
                e
            ))
        })?;

        let store_file: StoreFileFormat = serde_json::from_str(&content).map_err(|e| {
            Error::store(format!(
                "failed to parse store file {}: {}",
                path.display(),
                e
            ))
        })?;

        if store_file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "store file version mismatch: expected {STORE_FILE_VERSION}, got {}. \
                Attempting to load anyway",
                store_file.version
            );
        }

        Ok(store_file
            .devices
            .into_iter()
            .map(|device| (device.key(), device))
            .collect())
    }

    /// Write the store to disk atomically
    async fn write_state(&self) -> Result<()> {
        let state_guard = self.state.read().await;

        let mut devices: Vec<Device> = state_guard.devices.values().cloned().collect();
        // Stable on-disk order keeps rewrites diffable
        devices.sort_by(|a, b| a.key().to_string().cmp(&b.key().to_string()));

        let store_file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            devices,
        };

        let json = serde_json::to_string_pretty(&store_file)
            .map_err(|e| Error::store(format!("failed to serialize device store: {e}")))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::store(format!(
                    "failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Keep the previous good file around before replacing it
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("failed to create store backup: {e}");
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        drop(state_guard);
        {
            let mut state_guard = self.state.write().await;
            state_guard.dirty = false;
        }

        tracing::trace!(path = %self.path.display(), "device store written");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl DeviceStore for FileDeviceStore {
    async fn get(&self, key: &DeviceKey) -> Result<Option<Device>> {
        let state_guard = self.state.read().await;
        Ok(state_guard.devices.get(key).cloned())
    }

    async fn put(&self, key: &DeviceKey, device: &Device) -> Result<()> {
        {
            let mut state_guard = self.state.write().await;
            state_guard.devices.insert(key.clone(), device.clone());
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write_state().await
    }

    async fn remove(&self, key: &DeviceKey) -> Result<()> {
        {
            let mut state_guard = self.state.write().await;
            state_guard.devices.remove(key);
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write_state().await
    }

    async fn list(&self, service: &str, subservice: &str) -> Result<Vec<Device>> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .devices
            .values()
            .filter(|device| device.service == service && device.subservice == subservice)
            .cloned()
            .collect())
    }

    async fn flush(&self) -> Result<()> {
        let state_guard = self.state.read().await;
        if state_guard.dirty {
            drop(state_guard);
            self.write_state().await
        } else {
            Ok(())
        }
    }
}
