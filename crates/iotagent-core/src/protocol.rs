//! Wire-level registration protocol
//!
//! Pure translation between device records and the broker's registration
//! protocol. Building a request is deterministic: identical inputs serialize
//! byte-identically, with attribute order preserved from the input (never
//! re-sorted), so update diffs stay meaningful and tests can compare
//! payloads directly.
//!
//! No network behavior lives here; delivery is the transport's concern.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device::Device;
use crate::traits::transport::RawResponse;

/// Validity window expressing cancellation of an existing registration
pub const CANCELLATION_DURATION: &str = "PT0S";

/// How the broker may obtain an advertised attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeAccess {
    /// Fetched on demand through the providing application
    Queryable,
    /// Reported proactively by the device
    Reportable,
}

/// Entity addressed by a context registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    /// Entity identifier
    pub id: String,
    /// Entity type
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Whether `id` is a pattern; registrations always address one entity
    pub is_pattern: bool,
}

/// Attribute advertised by a context registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredAttribute {
    /// Attribute name
    pub name: String,
    /// Attribute type
    #[serde(rename = "type")]
    pub attribute_type: String,
    /// How the broker obtains the attribute's value
    pub access: AttributeAccess,
}

/// One context-registration entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRegistration {
    /// Entities the registration covers
    pub entities: Vec<EntityReference>,
    /// Advertised attributes, in input order
    pub attributes: Vec<RegisteredAttribute>,
    /// Callback endpoint for queryable attributes
    pub providing_application: String,
}

/// Registration envelope addressed to the broker
///
/// Service scoping travels as request-level metadata
/// ([`RegistrationScope`](crate::traits::transport::RegistrationScope)),
/// not as payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// One entry per device
    pub context_registrations: Vec<ContextRegistration>,
    /// Validity window, as the original ISO-8601 string
    pub duration: String,
    /// Existing registration handle; present on updates and cancellations,
    /// absent on fresh creates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,
}

/// Structured outcome of one registration call
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    /// The broker confirmed the registration
    Success {
        /// Broker-assigned registration handle
        registration_id: String,
    },
    /// The broker rejected the request for a structural reason
    LogicalFailure {
        /// Rejection category
        code: LogicalCode,
        /// Broker-supplied reason, when present
        detail: Option<String>,
    },
    /// The reply was unusable: no structured body, or no registration id
    TransportFailure,
}

/// Category of a structured broker rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalCode {
    /// The registration the request referenced does not exist on the broker
    NotFound,
    /// Any other structural rejection
    Rejected,
}

fn entity_reference(device: &Device) -> EntityReference {
    EntityReference {
        id: device.name.clone(),
        entity_type: device.device_type.clone(),
        is_pattern: false,
    }
}

/// Build the registration envelope for a device
///
/// Lazy attributes are advertised as queryable, active attributes as
/// reportable, both in input order. The stored registration id, when
/// present, turns the request into an update of the existing registration.
pub fn build_registration_request(
    device: &Device,
    provider_url: &str,
    duration: &str,
) -> RegistrationRequest {
    let attributes = device
        .lazy
        .iter()
        .map(|attribute| RegisteredAttribute {
            name: attribute.name.clone(),
            attribute_type: attribute.attribute_type.clone(),
            access: AttributeAccess::Queryable,
        })
        .chain(device.active.iter().map(|attribute| RegisteredAttribute {
            name: attribute.name.clone(),
            attribute_type: attribute.attribute_type.clone(),
            access: AttributeAccess::Reportable,
        }))
        .collect();

    RegistrationRequest {
        context_registrations: vec![ContextRegistration {
            entities: vec![entity_reference(device)],
            attributes,
            providing_application: provider_url.to_string(),
        }],
        duration: duration.to_string(),
        registration_id: device.registration_id.clone(),
    }
}

/// Build the envelope cancelling a device's existing registration
///
/// Cancellation is expressed as a registration with a zero validity window
/// referencing the stored registration id.
pub fn build_cancellation_request(device: &Device, provider_url: &str) -> RegistrationRequest {
    RegistrationRequest {
        context_registrations: vec![ContextRegistration {
            entities: vec![entity_reference(device)],
            attributes: Vec::new(),
            providing_application: provider_url.to_string(),
        }],
        duration: CANCELLATION_DURATION.to_string(),
        registration_id: device.registration_id.clone(),
    }
}

/// Interpret a raw broker reply as a registration outcome
///
/// A structured error body wins even on a 2xx status, as the broker reports
/// logical failures that way. A reply with neither a structured error nor an
/// extractable registration id is a transport failure.
pub fn parse_registration_response(response: &RawResponse) -> RegistrationOutcome {
    let Some(body) = &response.body else {
        return RegistrationOutcome::TransportFailure;
    };

    if let Some(error) = body.get("errorCode") {
        let code = error.get("code").and_then(Value::as_str).unwrap_or_default();
        let detail = error
            .get("reasonPhrase")
            .and_then(Value::as_str)
            .map(str::to_string);
        let code = if code == "404" {
            LogicalCode::NotFound
        } else {
            LogicalCode::Rejected
        };
        return RegistrationOutcome::LogicalFailure { code, detail };
    }

    if response.is_success() {
        if let Some(id) = body.get("registrationId").and_then(Value::as_str) {
            if !id.is_empty() {
                return RegistrationOutcome::Success {
                    registration_id: id.to_string(),
                };
            }
        }
    }

    RegistrationOutcome::TransportFailure
}
