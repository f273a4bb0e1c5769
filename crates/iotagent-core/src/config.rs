//! Configuration types for the registration engine
//!
//! This module defines the configuration structures used throughout the
//! crate. Configuration is plain data; loading it from a file or the
//! environment is owned by the embedding process.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::device::Attribute;
use crate::error::{Error, Result};
use crate::policy::IsoDuration;

/// Main agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Callback endpoint the broker uses to query lazy attributes
    pub provider_url: String,

    /// Default service for devices that do not carry one
    pub service: String,

    /// Default subservice path for devices that do not carry one
    pub subservice: String,

    /// Validity window embedded in registrations (ISO-8601 duration)
    #[serde(default = "default_registration_duration")]
    pub registration_duration: String,

    /// Minimum interval between registrations for the same device
    /// (ISO-8601 duration); absent disables throttling
    #[serde(default)]
    pub throttling: Option<String>,

    /// Behavior when the broker reports the referenced registration missing
    /// during an update
    #[serde(default)]
    pub on_missing_registration: MissingRegistrationPolicy,

    /// Per-type attribute templates, applied when a device is registered
    /// without explicit attribute sets
    #[serde(default)]
    pub types: HashMap<String, TypeTemplate>,
}

impl AgentConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.provider_url.is_empty() {
            return Err(Error::config("provider URL cannot be empty"));
        }
        if self.service.is_empty() {
            return Err(Error::config("default service cannot be empty"));
        }
        if self.subservice.is_empty() {
            return Err(Error::config("default subservice cannot be empty"));
        }

        let _ = self
            .registration_duration
            .parse::<IsoDuration>()
            .map_err(|e| Error::config(format!("registration duration: {e}")))?;

        if let Some(throttling) = &self.throttling {
            let _ = throttling
                .parse::<IsoDuration>()
                .map_err(|e| Error::config(format!("throttling interval: {e}")))?;
        }

        Ok(())
    }
}

fn default_registration_duration() -> String {
    "P1M".to_string()
}

/// Policy for an update whose registration the broker no longer knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRegistrationPolicy {
    /// Re-create the registration with a fresh request; the local record
    /// legitimately exists even though the remote one expired or was purged
    #[default]
    Recreate,

    /// Surface the failure to the caller
    Propagate,
}

/// Type-level attribute template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeTemplate {
    /// Default lazy attributes for devices of this type
    #[serde(default)]
    pub lazy: Vec<Attribute>,

    /// Default active attributes for devices of this type
    #[serde(default)]
    pub active: Vec<Attribute>,

    /// Default command attributes for devices of this type; advertised to
    /// command dispatch, not to the registration protocol
    #[serde(default)]
    pub commands: Vec<Attribute>,
}
