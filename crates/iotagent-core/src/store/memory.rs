// # Memory Device Store
//
// In-memory implementation of DeviceStore.
//
// ## Purpose
//
// Fast device storage with no persistence across restarts. Useful for
// testing and for deployments where devices re-register on startup anyway.
//
// ## Crash Behavior
//
// - All records are lost on restart/crash
// - Devices must be registered again before updates can target them

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::device::{Device, DeviceKey};
use crate::error::Result;
use crate::traits::device_store::DeviceStore;

/// In-memory device store implementation
///
/// Records live in a HashMap behind a RwLock. Cloning the store shares the
/// same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryDeviceStore {
    inner: Arc<RwLock<HashMap<DeviceKey, Device>>>,
}

impl MemoryDeviceStore {
    /// Create a new empty memory device store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Clear all records from the store
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn get(&self, key: &DeviceKey) -> Result<Option<Device>> {
        let guard = self.inner.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &DeviceKey, device: &Device) -> Result<()> {
        let mut guard = self.inner.write().await;
        guard.insert(key.clone(), device.clone());
        Ok(())
    }

    async fn remove(&self, key: &DeviceKey) -> Result<()> {
        let mut guard = self.inner.write().await;
        guard.remove(key);
        Ok(())
    }

    async fn list(&self, service: &str, subservice: &str) -> Result<Vec<Device>> {
        let guard = self.inner.read().await;
        Ok(guard
            .values()
            .filter(|device| device.service == service && device.subservice == subservice)
            .cloned()
            .collect())
    }

    async fn flush(&self) -> Result<()> {
        // No-op for memory store
        Ok(())
    }
}
