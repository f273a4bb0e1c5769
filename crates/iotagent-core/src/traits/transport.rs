//! Transport abstraction for broker registration calls

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::RegistrationRequest;

/// Tenant scope a request is sent under
///
/// Carried as request-level metadata (headers, in the HTTP transport) rather
/// than inside the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationScope {
    /// Tenant service
    pub service: String,
    /// Subservice path
    pub subservice: String,
}

/// Raw reply from the broker, before outcome interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP-style status code
    pub status: u16,
    /// Parsed body, when the broker sent one
    pub body: Option<Value>,
}

impl RawResponse {
    /// Whether the status code is in the success range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to complete the exchange at all
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The broker could not be reached
    #[error("connection failed: {0}")]
    Connect(String),

    /// The exchange exceeded the transport's deadline
    #[error("request timed out")]
    Timeout,

    /// The reply could not be read or decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Delivery of registration requests to a broker
///
/// Implementations perform exactly one exchange per call: bounded by a
/// timeout, no retries. An error reply that arrives intact is a successful
/// exchange; it is returned as a [`RawResponse`] for outcome interpretation,
/// not as a [`TransportError`].
#[async_trait]
pub trait RegistrationTransport: Send + Sync {
    /// Deliver one registration request under the given scope
    async fn send(
        &self,
        scope: &RegistrationScope,
        request: &RegistrationRequest,
    ) -> std::result::Result<RawResponse, TransportError>;
}
