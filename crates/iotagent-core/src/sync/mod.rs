// # Registration Synchronizer
//
// Orchestrates device registration lifecycle against the broker:
// create, update, and cancel, while keeping the local device store
// consistent with broker-confirmed state.
//
// ## Consistency model
//
// - Per-key serialization: operations on the same device run one at a time;
//   operations on different devices proceed concurrently.
// - Commit after confirmation: the store is written strictly after a success
//   outcome from the broker. On any failure the stored record is unchanged.
// - Reactive only: no background refresh loop; every broker call is caused
//   by a caller invoking an operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use crate::classify::{classify_failed_outcome, classify_transport_error};
use crate::config::{AgentConfig, MissingRegistrationPolicy};
use crate::device::{Device, DeviceKey, DeviceRegistration, DeviceUpdate};
use crate::error::{Error, Result};
use crate::policy::ExpiryPolicy;
use crate::protocol::{
    LogicalCode, RegistrationOutcome, RegistrationRequest, build_cancellation_request,
    build_registration_request, parse_registration_response,
};
use crate::traits::clock::Clock;
use crate::traits::device_store::DeviceStore;
use crate::traits::transport::{RegistrationScope, RegistrationTransport};
use crate::traits::types::TypeConfiguration;

/// Per-device-key mutexes, created on demand
///
/// The outer map lock is held only to fetch or create the per-key mutex,
/// never across an await point. Entries are dropped again once the last
/// holder releases its guard, so the map tracks in-flight keys rather than
/// every key ever seen.
#[derive(Debug, Default)]
struct KeyLocks {
    inner: Mutex<HashMap<DeviceKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &DeviceKey) -> KeyLockGuard<'_> {
        let lock = {
            let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(guard.entry(key.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        KeyLockGuard {
            locks: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }
}

/// Holds the per-key mutex and cleans up its map entry on release
struct KeyLockGuard<'a> {
    locks: &'a KeyLocks,
    key: DeviceKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLockGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex before inspecting the map, so our own guard no
        // longer counts as a holder
        self.guard.take();

        let mut map = self.locks.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = map.get(&self.key) {
            // Waiters clone the Arc under the map lock before awaiting, so a
            // count of one means the map holds the only reference left
            if Arc::strong_count(lock) == 1 {
                map.remove(&self.key);
            }
        }
    }
}

/// Synchronizes the local device registry with broker-side registrations
///
/// All collaborators are injected as trait objects; see the crate docs for
/// the overall architecture.
pub struct RegistrationSynchronizer {
    config: AgentConfig,
    policy: ExpiryPolicy,
    store: Arc<dyn DeviceStore>,
    transport: Arc<dyn RegistrationTransport>,
    types: Arc<dyn TypeConfiguration>,
    clock: Arc<dyn Clock>,
    locks: KeyLocks,
}

impl RegistrationSynchronizer {
    /// Create a synchronizer, validating the configuration up front
    pub fn new(
        config: AgentConfig,
        store: Arc<dyn DeviceStore>,
        transport: Arc<dyn RegistrationTransport>,
        types: Arc<dyn TypeConfiguration>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let policy = ExpiryPolicy::from_config(&config)?;

        Ok(Self {
            config,
            policy,
            store,
            transport,
            types,
            clock,
            locks: KeyLocks::default(),
        })
    }

    /// Register a device with the broker and persist the confirmed record
    ///
    /// Registering a key that already holds a confirmed registration is
    /// idempotent: the stored record is returned without a broker call.
    pub async fn register(&self, input: DeviceRegistration) -> Result<Device> {
        let device = self.resolve_registration(input);
        device.validate()?;

        let key = device.key();
        let _guard = self.locks.acquire(&key).await;

        if let Some(existing) = self.store.get(&key).await? {
            if existing.registration_id.is_some() {
                tracing::debug!(device = %key, "device already registered, returning stored record");
                return Ok(existing);
            }
        }

        tracing::info!(device = %key, device_type = %device.device_type, "registering device");
        let request = build_registration_request(
            &device,
            &self.config.provider_url,
            &self.config.registration_duration,
        );

        match self.send(&key, &request).await? {
            RegistrationOutcome::Success { registration_id } => {
                self.commit(&key, device, registration_id).await
            }
            failed => Err(classify_failed_outcome(&failed)),
        }
    }

    /// Apply a partial update to a registered device and refresh its
    /// registration with the broker
    ///
    /// Targets an existing record; an absent key is a local error and no
    /// broker call is made. When a throttle interval is configured and the
    /// previous successful registration is still within it, the update is
    /// suppressed and the stored record returned unchanged.
    pub async fn update_register(&self, update: DeviceUpdate) -> Result<Device> {
        let key = DeviceKey::new(
            update.id.clone(),
            update
                .service
                .clone()
                .unwrap_or_else(|| self.config.service.clone()),
            update
                .subservice
                .clone()
                .unwrap_or_else(|| self.config.subservice.clone()),
        );
        let _guard = self.locks.acquire(&key).await;

        let stored = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| Error::device_not_found(key.to_string()))?;

        if self
            .policy
            .should_throttle(self.clock.now(), stored.last_registered)
        {
            tracing::debug!(device = %key, "update suppressed by throttle window");
            return Ok(stored);
        }

        let merged = stored.apply_update(&update);
        merged.validate()?;

        tracing::info!(device = %key, "updating device registration");
        let request = build_registration_request(
            &merged,
            &self.config.provider_url,
            &self.config.registration_duration,
        );

        match self.send(&key, &request).await? {
            RegistrationOutcome::Success { registration_id } => {
                self.commit(&key, merged, registration_id).await
            }
            RegistrationOutcome::LogicalFailure {
                code: LogicalCode::NotFound,
                detail,
            } => match self.config.on_missing_registration {
                MissingRegistrationPolicy::Recreate => {
                    tracing::warn!(
                        device = %key,
                        "registration unknown to broker, re-creating it"
                    );
                    self.recreate(&key, merged).await
                }
                MissingRegistrationPolicy::Propagate => {
                    Err(classify_failed_outcome(&RegistrationOutcome::LogicalFailure {
                        code: LogicalCode::NotFound,
                        detail,
                    }))
                }
            },
            failed => Err(classify_failed_outcome(&failed)),
        }
    }

    /// Cancel a device's registration and remove it from the store
    ///
    /// Local removal is unconditional once the record exists: a broker that
    /// cannot be reached, or that no longer knows the registration, does not
    /// keep the local record alive. Cancellation failures are logged, not
    /// surfaced.
    pub async fn deregister(&self, key: &DeviceKey) -> Result<()> {
        let _guard = self.locks.acquire(key).await;

        let stored = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| Error::device_not_found(key.to_string()))?;

        if stored.registration_id.is_some() {
            let request = build_cancellation_request(&stored, &self.config.provider_url);
            match self.send(key, &request).await {
                Ok(RegistrationOutcome::Success { .. }) => {
                    tracing::debug!(device = %key, "broker confirmed cancellation");
                }
                Ok(other) => {
                    tracing::warn!(
                        device = %key,
                        error = %classify_failed_outcome(&other),
                        "broker rejected cancellation, removing local record anyway"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        device = %key,
                        error = %e,
                        "cancellation call failed, removing local record anyway"
                    );
                }
            }
        }

        self.store.remove(key).await?;
        tracing::info!(device = %key, "device deregistered");
        Ok(())
    }

    /// Fetch the stored record for a device
    pub async fn get_device(&self, key: &DeviceKey) -> Result<Option<Device>> {
        self.store.get(key).await
    }

    /// List stored devices within a service and subservice
    pub async fn list_devices(&self, service: &str, subservice: &str) -> Result<Vec<Device>> {
        self.store.list(service, subservice).await
    }

    /// Resolve a registration input into a full device record, filling
    /// omitted fields from configuration defaults and the type template
    fn resolve_registration(&self, input: DeviceRegistration) -> Device {
        let defaults = self
            .types
            .resolve_defaults(&input.device_type)
            .unwrap_or_default();

        Device {
            name: input.name.unwrap_or_else(|| input.id.clone()),
            id: input.id,
            device_type: input.device_type,
            service: input.service.unwrap_or_else(|| self.config.service.clone()),
            subservice: input
                .subservice
                .unwrap_or_else(|| self.config.subservice.clone()),
            internal_id: input.internal_id,
            lazy: input.lazy.unwrap_or(defaults.lazy),
            active: input.active.unwrap_or(defaults.active),
            registration_id: None,
            registration_expires: None,
            last_registered: None,
        }
    }

    /// Re-register from scratch after the broker reported the referenced
    /// registration missing
    async fn recreate(&self, key: &DeviceKey, mut device: Device) -> Result<Device> {
        device.registration_id = None;
        let request = build_registration_request(
            &device,
            &self.config.provider_url,
            &self.config.registration_duration,
        );

        match self.send(key, &request).await? {
            RegistrationOutcome::Success { registration_id } => {
                self.commit(key, device, registration_id).await
            }
            failed => Err(classify_failed_outcome(&failed)),
        }
    }

    /// Deliver one request and interpret the reply
    async fn send(&self, key: &DeviceKey, request: &RegistrationRequest) -> Result<RegistrationOutcome> {
        let scope = RegistrationScope {
            service: key.service.clone(),
            subservice: key.subservice.clone(),
        };
        let response = self
            .transport
            .send(&scope, request)
            .await
            .map_err(|e| classify_transport_error(&e))?;
        Ok(parse_registration_response(&response))
    }

    /// Persist a broker-confirmed record with fresh registration metadata
    async fn commit(
        &self,
        key: &DeviceKey,
        mut device: Device,
        registration_id: String,
    ) -> Result<Device> {
        let now = self.clock.now();
        device.registration_id = Some(registration_id);
        device.registration_expires = Some(self.policy.expires_at(now));
        device.last_registered = Some(now);

        self.store.put(key, &device).await?;
        tracing::debug!(
            device = %key,
            registration_id = device.registration_id.as_deref().unwrap_or_default(),
            "registration committed"
        );
        Ok(device)
    }
}
