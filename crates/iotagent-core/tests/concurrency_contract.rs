//! Contract Test: Per-Key Serialization
//!
//! Verifies the concurrency model of the synchronizer:
//! - Operations on the same device key run one at a time
//! - Operations on distinct keys proceed concurrently
//! - Interleaved operations never commit a partial record

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use iotagent_core::device::{Attribute, DeviceRegistration, DeviceUpdate};
use iotagent_core::protocol::RegistrationRequest;
use iotagent_core::store::MemoryDeviceStore;
use iotagent_core::sync::RegistrationSynchronizer;
use iotagent_core::traits::transport::{
    RawResponse, RegistrationScope, RegistrationTransport, TransportError,
};
use iotagent_core::traits::types::StaticTypeConfiguration;

/// A transport that blocks every request on a gate the test opens explicitly
struct GatedTransport {
    entered: AtomicUsize,
    gate: tokio::sync::Semaphore,
}

impl GatedTransport {
    fn new() -> Self {
        Self {
            entered: AtomicUsize::new(0),
            gate: tokio::sync::Semaphore::new(0),
        }
    }

    /// Number of requests that have reached the transport
    fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    /// Let `n` blocked requests complete
    fn allow(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait::async_trait]
impl RegistrationTransport for GatedTransport {
    async fn send(
        &self,
        _scope: &RegistrationScope,
        _request: &RegistrationRequest,
    ) -> Result<RawResponse, TransportError> {
        let count = self.entered.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await.expect("gate never closes").forget();

        Ok(RawResponse {
            status: 200,
            body: Some(serde_json::json!({
                "duration": "P1M",
                "registrationId": format!("gated-registration-{count}")
            })),
        })
    }
}

struct GatedHarness {
    synchronizer: Arc<RegistrationSynchronizer>,
    store: Arc<MemoryDeviceStore>,
    transport: Arc<GatedTransport>,
}

fn gated_harness() -> GatedHarness {
    let config = agent_config();
    let store = Arc::new(MemoryDeviceStore::new());
    let transport = Arc::new(GatedTransport::new());
    let types = Arc::new(StaticTypeConfiguration::from_config(&config));
    let clock = Arc::new(ManualClock::new());

    let synchronizer = Arc::new(
        RegistrationSynchronizer::new(config, store.clone(), transport.clone(), types, clock)
            .expect("synchronizer construction succeeds"),
    );

    GatedHarness {
        synchronizer,
        store,
        transport,
    }
}

fn registration(id: &str) -> DeviceRegistration {
    DeviceRegistration {
        id: id.to_string(),
        device_type: "Light".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn concurrent_registrations_of_one_device_make_one_broker_call() {
    let h = gated_harness();

    let first = {
        let synchronizer = h.synchronizer.clone();
        tokio::spawn(async move { synchronizer.register(registration("light1")).await })
    };
    let second = {
        let synchronizer = h.synchronizer.clone();
        tokio::spawn(async move { synchronizer.register(registration("light1")).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    // Only one request is in flight; the other task waits on the key lock
    assert_eq!(h.transport.entered(), 1);

    h.transport.allow(1);
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    // The second registration observed the committed record and returned it
    assert_eq!(h.transport.entered(), 1);
    assert_eq!(first, second);
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn distinct_devices_register_concurrently() {
    let h = gated_harness();

    let first = {
        let synchronizer = h.synchronizer.clone();
        tokio::spawn(async move { synchronizer.register(registration("light1")).await })
    };
    let second = {
        let synchronizer = h.synchronizer.clone();
        tokio::spawn(async move { synchronizer.register(registration("light2")).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    // Both requests reached the transport without waiting on each other
    assert_eq!(h.transport.entered(), 2);

    h.transport.allow(2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(h.store.len().await, 2);
}

#[tokio::test]
async fn updates_on_one_device_are_applied_sequentially() {
    let h = gated_harness();

    let register = {
        let synchronizer = h.synchronizer.clone();
        tokio::spawn(async move { synchronizer.register(registration("light1")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.transport.allow(1);
    register.await.unwrap().unwrap();

    let rename = {
        let synchronizer = h.synchronizer.clone();
        tokio::spawn(async move {
            synchronizer
                .update_register(DeviceUpdate {
                    id: "light1".to_string(),
                    name: Some("theLight1".to_string()),
                    ..Default::default()
                })
                .await
        })
    };
    let retype = {
        let synchronizer = h.synchronizer.clone();
        tokio::spawn(async move {
            synchronizer
                .update_register(DeviceUpdate {
                    id: "light1".to_string(),
                    lazy: Some(vec![Attribute::new("luminance", "lumens")]),
                    ..Default::default()
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    // One update in flight, the other waiting on the key lock
    assert_eq!(h.transport.entered(), 2);

    h.transport.allow(1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.transport.entered(), 3);
    h.transport.allow(1);

    rename.await.unwrap().unwrap();
    retype.await.unwrap().unwrap();

    // Both merges landed; neither overwrote the other's field
    let stored = h
        .synchronizer
        .get_device(&iotagent_core::device::DeviceKey::new(
            "light1",
            "smartGondor",
            "gardens",
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "theLight1");
    assert_eq!(stored.lazy, vec![Attribute::new("luminance", "lumens")]);
}
