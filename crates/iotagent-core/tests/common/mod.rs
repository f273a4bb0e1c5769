//! Test doubles and common utilities for registration contract tests
//!
//! Provides a scripted broker transport, a manually advanced clock, and a
//! harness wiring them to a synchronizer over an in-memory store.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use iotagent_core::config::{AgentConfig, MissingRegistrationPolicy, TypeTemplate};
use iotagent_core::device::{Attribute, DeviceRegistration};
use iotagent_core::protocol::RegistrationRequest;
use iotagent_core::store::MemoryDeviceStore;
use iotagent_core::sync::RegistrationSynchronizer;
use iotagent_core::traits::clock::Clock;
use iotagent_core::traits::transport::{
    RawResponse, RegistrationScope, RegistrationTransport, TransportError,
};
use iotagent_core::traits::types::StaticTypeConfiguration;

/// A broker transport that replays scripted replies and records every
/// request it delivered
///
/// When the script is exhausted it keeps answering success with generated
/// registration ids, so tests only script the interesting replies.
pub struct MockTransport {
    replies: std::sync::Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    sent: std::sync::Mutex<Vec<(RegistrationScope, RegistrationRequest)>>,
    call_count: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: std::sync::Mutex::new(VecDeque::new()),
            sent: std::sync::Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Script a success reply carrying the given registration id
    pub fn enqueue_success(&self, registration_id: &str) {
        self.replies.lock().unwrap().push_back(Ok(RawResponse {
            status: 200,
            body: Some(json!({ "duration": "P1M", "registrationId": registration_id })),
        }));
    }

    /// Script a structured "registration not found" reply
    pub fn enqueue_not_found(&self) {
        self.replies.lock().unwrap().push_back(Ok(RawResponse {
            status: 200,
            body: Some(json!({
                "errorCode": { "code": "404", "reasonPhrase": "No context element found" }
            })),
        }));
    }

    /// Script a structured rejection reply
    pub fn enqueue_rejection(&self, reason: &str) {
        self.replies.lock().unwrap().push_back(Ok(RawResponse {
            status: 200,
            body: Some(json!({
                "errorCode": { "code": "400", "reasonPhrase": reason }
            })),
        }));
    }

    /// Script a server error with no usable body
    pub fn enqueue_server_error(&self) {
        self.replies.lock().unwrap().push_back(Ok(RawResponse {
            status: 500,
            body: None,
        }));
    }

    /// Script a connection failure
    pub fn enqueue_connect_error(&self) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Connect("connection refused".to_string())));
    }

    /// Number of requests delivered so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All delivered requests, oldest first
    pub fn sent(&self) -> Vec<(RegistrationScope, RegistrationRequest)> {
        self.sent.lock().unwrap().clone()
    }

    /// The most recently delivered request
    pub fn last_request(&self) -> RegistrationRequest {
        self.sent
            .lock()
            .unwrap()
            .last()
            .expect("at least one request was sent")
            .1
            .clone()
    }
}

#[async_trait::async_trait]
impl RegistrationTransport for MockTransport {
    async fn send(
        &self,
        scope: &RegistrationScope,
        request: &RegistrationRequest,
    ) -> Result<RawResponse, TransportError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.sent
            .lock()
            .unwrap()
            .push((scope.clone(), request.clone()));

        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => Ok(RawResponse {
                status: 200,
                body: Some(json!({
                    "duration": "P1M",
                    "registrationId": format!("mock-registration-{count}")
                })),
            }),
        }
    }
}

/// A clock advanced explicitly by the test
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Agent configuration mirroring a small two-type deployment
pub fn agent_config() -> AgentConfig {
    let mut types = HashMap::new();
    types.insert(
        "Light".to_string(),
        TypeTemplate {
            lazy: vec![Attribute::new("temperature", "centigrades")],
            active: vec![Attribute::new("pressure", "Hgmm")],
            commands: Vec::new(),
        },
    );
    types.insert(
        "Termometer".to_string(),
        TypeTemplate {
            lazy: vec![Attribute::new("temp", "kelvin")],
            active: Vec::new(),
            commands: Vec::new(),
        },
    );

    AgentConfig {
        provider_url: "http://smartgondor.com".to_string(),
        service: "smartGondor".to_string(),
        subservice: "gardens".to_string(),
        registration_duration: "P1M".to_string(),
        throttling: None,
        on_missing_registration: MissingRegistrationPolicy::Recreate,
        types,
    }
}

/// A synchronizer wired to shared test doubles
pub struct Harness {
    pub synchronizer: RegistrationSynchronizer,
    pub store: Arc<MemoryDeviceStore>,
    pub transport: Arc<MockTransport>,
    pub clock: Arc<ManualClock>,
}

pub fn harness() -> Harness {
    harness_with(agent_config())
}

pub fn harness_with(config: AgentConfig) -> Harness {
    let store = Arc::new(MemoryDeviceStore::new());
    let transport = Arc::new(MockTransport::new());
    let clock = Arc::new(ManualClock::new());
    let types = Arc::new(StaticTypeConfiguration::from_config(&config));

    let synchronizer = RegistrationSynchronizer::new(
        config,
        store.clone(),
        transport.clone(),
        types,
        clock.clone(),
    )
    .expect("synchronizer construction succeeds");

    Harness {
        synchronizer,
        store,
        transport,
        clock,
    }
}

/// Registration input for the stock test device
pub fn light1() -> DeviceRegistration {
    DeviceRegistration {
        id: "light1".to_string(),
        device_type: "Light".to_string(),
        ..Default::default()
    }
}
