//! Error types for registration operations
//!
//! The taxonomy is closed: every public operation resolves to either a value
//! or exactly one of these variants, and callers are expected to match
//! exhaustively rather than inspect message strings.

use thiserror::Error;

/// Result type alias for registration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the registration engine
#[derive(Error, Debug)]
pub enum Error {
    /// An update or deregistration targeted a key absent from the device
    /// store. Raised locally, before any network call.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The broker call failed at the transport level (connection refused,
    /// timeout, server error) or returned an unparseable response. Not
    /// retried automatically; the caller owns retry policy.
    #[error("registration failed: {0}")]
    Registration(String),

    /// The supplied device record failed local validation before any network
    /// call was attempted.
    #[error("invalid device: {0}")]
    InvalidDevice(String),

    /// The broker explicitly rejected the request for a structural reason
    /// other than "not found", with the broker-supplied detail where
    /// available.
    #[error("registration rejected by broker: {0}")]
    LogicalRejection(String),

    /// Device store-related errors
    #[error("device store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a "device not found" error
    pub fn device_not_found(msg: impl Into<String>) -> Self {
        Self::DeviceNotFound(msg.into())
    }

    /// Create a registration (transport-level) error
    pub fn registration(msg: impl Into<String>) -> Self {
        Self::Registration(msg.into())
    }

    /// Create an invalid device error
    pub fn invalid_device(msg: impl Into<String>) -> Self {
        Self::InvalidDevice(msg.into())
    }

    /// Create a logical rejection error
    pub fn logical_rejection(msg: impl Into<String>) -> Self {
        Self::LogicalRejection(msg.into())
    }

    /// Create a device store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Escape hatch for device store backends built on anyhow
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err.to_string())
    }
}
