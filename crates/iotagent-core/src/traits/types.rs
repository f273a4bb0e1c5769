//! Type catalog abstraction
//!
//! Devices registered without explicit attribute sets inherit them from a
//! type-level template. The catalog is usually static configuration, but the
//! trait leaves room for a backing service.

use std::collections::HashMap;

use crate::config::{AgentConfig, TypeTemplate};
use crate::device::Attribute;

/// Attribute defaults resolved for a device type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeDefaults {
    /// Default lazy attributes
    pub lazy: Vec<Attribute>,
    /// Default active attributes
    pub active: Vec<Attribute>,
    /// Default command attributes
    pub commands: Vec<Attribute>,
}

/// Resolution of type names to attribute defaults
pub trait TypeConfiguration: Send + Sync {
    /// Defaults for a type, or `None` when the type is unknown
    fn resolve_defaults(&self, device_type: &str) -> Option<TypeDefaults>;
}

/// Type catalog backed by a fixed template map
#[derive(Debug, Clone, Default)]
pub struct StaticTypeConfiguration {
    types: HashMap<String, TypeTemplate>,
}

impl StaticTypeConfiguration {
    /// Create a catalog from a template map
    pub fn new(types: HashMap<String, TypeTemplate>) -> Self {
        Self { types }
    }

    /// Create a catalog from the agent configuration's `types` section
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            types: config.types.clone(),
        }
    }
}

impl TypeConfiguration for StaticTypeConfiguration {
    fn resolve_defaults(&self, device_type: &str) -> Option<TypeDefaults> {
        self.types.get(device_type).map(|template| TypeDefaults {
            lazy: template.lazy.clone(),
            active: template.active.clone(),
            commands: template.commands.clone(),
        })
    }
}
