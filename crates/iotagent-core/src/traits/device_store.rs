//! Device store abstraction

use async_trait::async_trait;

use crate::device::{Device, DeviceKey};
use crate::error::Result;

/// Persistence of device records, keyed by `(id, service, subservice)`
///
/// The synchronizer serializes writes per key; implementations only need to
/// be internally consistent, not transactional across keys.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Fetch the record for a key, if present
    async fn get(&self, key: &DeviceKey) -> Result<Option<Device>>;

    /// Insert or replace the record for a key
    async fn put(&self, key: &DeviceKey, device: &Device) -> Result<()>;

    /// Remove the record for a key; removing an absent key is not an error
    async fn remove(&self, key: &DeviceKey) -> Result<()>;

    /// List all records within a service and subservice
    async fn list(&self, service: &str, subservice: &str) -> Result<Vec<Device>>;

    /// Flush buffered state to the backing medium, if any
    async fn flush(&self) -> Result<()>;
}
