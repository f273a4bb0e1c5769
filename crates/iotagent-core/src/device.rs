//! Device records and partial updates
//!
//! A device is unique per `(id, service, subservice)`. Partial updates are
//! expressed as an explicit [`DeviceUpdate`] record with optional fields and
//! an explicit merge, rather than shallow property-presence checks.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Unique identity of a device within the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceKey {
    /// Device identifier
    pub id: String,
    /// Tenant service the device belongs to
    pub service: String,
    /// Subservice path within the service
    pub subservice: String,
}

impl DeviceKey {
    /// Create a new device key
    pub fn new(
        id: impl Into<String>,
        service: impl Into<String>,
        subservice: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            subservice: subservice.into(),
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.id, self.service, self.subservice)
    }
}

/// Attribute descriptor: a name and a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Attribute type
    #[serde(rename = "type")]
    pub attribute_type: String,
}

impl Attribute {
    /// Create a new attribute descriptor
    pub fn new(name: impl Into<String>, attribute_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: attribute_type.into(),
        }
    }
}

/// Canonical per-device record held by the device store
///
/// `registration_id` is non-null if and only if at least one registration
/// call has succeeded and no subsequent failure has invalidated it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Device identifier
    pub id: String,
    /// Device type name, resolves to a type-level attribute template
    #[serde(rename = "type")]
    pub device_type: String,
    /// Display identifier; defaults to `id` when not supplied
    pub name: String,
    /// Tenant service
    pub service: String,
    /// Subservice path
    pub subservice: String,
    /// Opaque device-side linkage token, distinct from the registration id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    /// Attributes the device exposes for on-demand query (order preserved)
    #[serde(default)]
    pub lazy: Vec<Attribute>,
    /// Attributes the device actively reports (order preserved)
    #[serde(default)]
    pub active: Vec<Attribute>,
    /// Broker-assigned registration handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,
    /// Expiry of the current registration's validity window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_expires: Option<DateTime<Utc>>,
    /// Timestamp of the last successful registration, used by the throttle
    /// policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_registered: Option<DateTime<Utc>>,
}

impl Device {
    /// The unique key of this device
    pub fn key(&self) -> DeviceKey {
        DeviceKey {
            id: self.id.clone(),
            service: self.service.clone(),
            subservice: self.subservice.clone(),
        }
    }

    /// Local validation, performed before any network call
    ///
    /// Checks required identity fields and that no attribute name appears in
    /// `lazy` and `active` with conflicting types.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::invalid_device("device id cannot be empty"));
        }
        if self.device_type.is_empty() {
            return Err(Error::invalid_device("device type cannot be empty"));
        }
        if self.service.is_empty() {
            return Err(Error::invalid_device("device service cannot be empty"));
        }
        if self.subservice.is_empty() {
            return Err(Error::invalid_device("device subservice cannot be empty"));
        }

        let mut seen: HashMap<&str, &str> = HashMap::new();
        for attribute in self.lazy.iter().chain(self.active.iter()) {
            match seen.get(attribute.name.as_str()) {
                Some(existing) if *existing != attribute.attribute_type => {
                    return Err(Error::invalid_device(format!(
                        "attribute '{}' declared with conflicting types '{}' and '{}'",
                        attribute.name, existing, attribute.attribute_type
                    )));
                }
                _ => {
                    let _ = seen.insert(&attribute.name, &attribute.attribute_type);
                }
            }
        }

        Ok(())
    }

    /// Merge a partial update onto this record
    ///
    /// Supplied fields replace stored fields per-field; fields omitted from
    /// the update retain the stored values. Registration metadata is never
    /// touched by a merge; only a broker confirmation changes it.
    pub fn apply_update(&self, update: &DeviceUpdate) -> Device {
        let mut merged = self.clone();
        if let Some(device_type) = &update.device_type {
            merged.device_type = device_type.clone();
        }
        if let Some(name) = &update.name {
            merged.name = name.clone();
        }
        if let Some(internal_id) = &update.internal_id {
            merged.internal_id = Some(internal_id.clone());
        }
        if let Some(lazy) = &update.lazy {
            merged.lazy = lazy.clone();
        }
        if let Some(active) = &update.active {
            merged.active = active.clone();
        }
        merged
    }
}

/// Input for a first-time registration
///
/// Optional fields fall back to configuration defaults (`service`,
/// `subservice`) or to the type-level attribute template (`lazy`, `active`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    /// Device identifier
    pub id: String,
    /// Device type name
    #[serde(rename = "type")]
    pub device_type: String,
    /// Display identifier; defaults to `id`
    #[serde(default)]
    pub name: Option<String>,
    /// Tenant service; defaults from configuration
    #[serde(default)]
    pub service: Option<String>,
    /// Subservice path; defaults from configuration
    #[serde(default)]
    pub subservice: Option<String>,
    /// Opaque device-side linkage token
    #[serde(default)]
    pub internal_id: Option<String>,
    /// Lazy attributes; defaults from the type template when absent
    #[serde(default)]
    pub lazy: Option<Vec<Attribute>>,
    /// Active attributes; defaults from the type template when absent
    #[serde(default)]
    pub active: Option<Vec<Attribute>>,
}

/// Partial update of an already-registered device
///
/// Only the key fields are required; everything else is an optional override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    /// Device identifier
    pub id: String,
    /// Tenant service; defaults from configuration
    #[serde(default)]
    pub service: Option<String>,
    /// Subservice path; defaults from configuration
    #[serde(default)]
    pub subservice: Option<String>,
    /// New device type
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    /// New display identifier
    #[serde(default)]
    pub name: Option<String>,
    /// New internal id
    #[serde(default)]
    pub internal_id: Option<String>,
    /// Replacement lazy attribute set
    #[serde(default)]
    pub lazy: Option<Vec<Attribute>>,
    /// Replacement active attribute set
    #[serde(default)]
    pub active: Option<Vec<Attribute>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> Device {
        Device {
            id: "light1".to_string(),
            device_type: "Light".to_string(),
            name: "light1".to_string(),
            service: "smartGondor".to_string(),
            subservice: "gardens".to_string(),
            internal_id: None,
            lazy: vec![Attribute::new("temperature", "centigrades")],
            active: vec![Attribute::new("pressure", "Hgmm")],
            registration_id: Some("r1".to_string()),
            registration_expires: None,
            last_registered: None,
        }
    }

    #[test]
    fn validate_accepts_well_formed_device() {
        assert!(light().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_identity_fields() {
        let mut device = light();
        device.id.clear();
        assert!(matches!(
            device.validate(),
            Err(Error::InvalidDevice(_))
        ));
    }

    #[test]
    fn validate_rejects_conflicting_attribute_types() {
        let mut device = light();
        device.active.push(Attribute::new("temperature", "kelvin"));
        let err = device.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidDevice(_)));
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn validate_allows_repeated_name_with_same_type() {
        // Harmless duplication; the broker deduplicates on its side.
        let mut device = light();
        device.active.push(Attribute::new("temperature", "centigrades"));
        assert!(device.validate().is_ok());
    }

    #[test]
    fn apply_update_replaces_supplied_fields_only() {
        let stored = light();
        let update = DeviceUpdate {
            id: "light1".to_string(),
            internal_id: Some("newInternalId".to_string()),
            lazy: Some(vec![Attribute::new("pressure", "Hgmm")]),
            ..Default::default()
        };

        let merged = stored.apply_update(&update);

        assert_eq!(merged.internal_id.as_deref(), Some("newInternalId"));
        assert_eq!(merged.lazy, vec![Attribute::new("pressure", "Hgmm")]);
        // Omitted fields retain stored values.
        assert_eq!(merged.active, stored.active);
        assert_eq!(merged.name, stored.name);
        assert_eq!(merged.device_type, stored.device_type);
        // Merging never touches registration metadata.
        assert_eq!(merged.registration_id, stored.registration_id);
    }

    #[test]
    fn key_round_trips_identity() {
        let device = light();
        let key = device.key();
        assert_eq!(key, DeviceKey::new("light1", "smartGondor", "gardens"));
        assert_eq!(key.to_string(), "light1@smartGondor/gardens");
    }

    #[test]
    fn device_serialization_uses_wire_field_names() {
        let json = serde_json::to_value(light()).unwrap();
        assert_eq!(json["type"], "Light");
        assert_eq!(json["lazy"][0]["type"], "centigrades");
        assert!(json.get("internalId").is_none());
    }
}
