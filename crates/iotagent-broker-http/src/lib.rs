// # HTTP Broker Transport
//
// HTTP binding of the RegistrationTransport trait for NGSI9-style context
// brokers.
//
// ## Scope
//
// - Makes one HTTP request per synchronizer operation
// - Full error propagation to the synchronizer (which owns retry policy)
// - HTTP timeout configured (30 seconds by default)
// - NO retry logic (intentionally omitted - owned by the caller)
// - NO caching (intentionally omitted - state owned by the DeviceStore)
// - NO background tasks
//
// ## Protocol
//
// Registrations, updates, and cancellations all use the same endpoint:
//
// ```http
// POST /NGSI9/registerContext
// fiware-service: <service>
// fiware-servicepath: <subservice>
// Content-Type: application/json
// ```
//
// An error reply that arrives intact is a successful exchange at this
// layer; outcome interpretation belongs to the protocol module.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use iotagent_core::protocol::RegistrationRequest;
use iotagent_core::traits::transport::{
    RawResponse, RegistrationScope, RegistrationTransport, TransportError,
};
use iotagent_core::{Error, Result};

/// Registration endpoint path on the broker
const REGISTER_CONTEXT_PATH: &str = "/NGSI9/registerContext";

/// Default HTTP timeout for broker requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport delivering registration envelopes to a context broker
///
/// Tenant scope travels as the `fiware-service` and `fiware-servicepath`
/// headers; the payload is the registration envelope unchanged.
#[derive(Debug, Clone)]
pub struct HttpBrokerTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBrokerTransport {
    /// Create a transport for the broker at `base_url`, with the default
    /// request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a transport with an explicit request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.is_empty() {
            return Err(Error::config("broker base URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn register_url(&self) -> String {
        format!("{}{}", self.base_url, REGISTER_CONTEXT_PATH)
    }
}

#[async_trait]
impl RegistrationTransport for HttpBrokerTransport {
    async fn send(
        &self,
        scope: &RegistrationScope,
        request: &RegistrationRequest,
    ) -> std::result::Result<RawResponse, TransportError> {
        let url = self.register_url();
        tracing::debug!(%url, service = %scope.service, "sending registration request");

        let response = self
            .client
            .post(&url)
            .header("fiware-service", &scope.service)
            .header("fiware-servicepath", &scope.subservice)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::InvalidResponse(format!("failed to read body: {e}")))?;

        let body = if bytes.is_empty() {
            None
        } else {
            let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
                TransportError::InvalidResponse(format!("body is not valid JSON: {e}"))
            })?;
            Some(value)
        };

        tracing::trace!(status, "broker replied");
        Ok(RawResponse { status, body })
    }
}
