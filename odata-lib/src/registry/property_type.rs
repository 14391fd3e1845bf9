//! EDM type name to property kind registry

use std::sync::LazyLock;

use dashmap::DashMap;

use crate::error::SchemaError;
use crate::model::types::EdmType;
use crate::model::types::PropertyKind;
use crate::model::types::collection_element_type;

static GLOBAL: LazyLock<PropertyTypeRegistry> = LazyLock::new(PropertyTypeRegistry::new);

/// Maps EDM type names to property kinds.
///
/// Built-in primitives always resolve; schema parsing adds the enum and
/// complex types it discovers. A registration under an existing name
/// replaces the earlier one.
///
/// # Example
///
/// ```
/// use odata_lib::registry::PropertyTypeRegistry;
///
/// let registry = PropertyTypeRegistry::new();
/// let kind = registry.resolve("Collection(Edm.Int32)").unwrap();
/// assert_eq!(kind.type_name(), "Collection(Edm.Int32)");
/// assert!(registry.resolve("Shop.Unknown").is_err());
/// ```
#[derive(Debug, Default)]
pub struct PropertyTypeRegistry {
    custom: DashMap<String, PropertyKind>,
}

impl PropertyTypeRegistry {
    /// Creates a registry holding only the built-in primitives.
    pub fn new() -> Self {
        Self {
            custom: DashMap::new(),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static PropertyTypeRegistry {
        &GLOBAL
    }

    /// Registers a kind under a qualified type name.
    pub fn register(&self, type_name: impl Into<String>, kind: PropertyKind) {
        let type_name = type_name.into();
        log::debug!("Registering property type {}", type_name);
        self.custom.insert(type_name, kind);
    }

    /// Looks up a type name, built-in or registered.
    pub fn get(&self, type_name: &str) -> Option<PropertyKind> {
        if let Some(kind) = self.custom.get(type_name) {
            return Some(kind.value().clone());
        }
        EdmType::from_name(type_name).map(PropertyKind::Primitive)
    }

    /// Resolves a type name, unwrapping `Collection(...)`.
    pub fn resolve(&self, type_name: &str) -> Result<PropertyKind, SchemaError> {
        if let Some(element) = collection_element_type(type_name) {
            return Ok(PropertyKind::Collection(Box::new(self.resolve(element)?)));
        }
        self.get(type_name)
            .ok_or_else(|| SchemaError::unknown_property_type(type_name))
    }

    /// Returns `true` if the name resolves.
    pub fn contains(&self, type_name: &str) -> bool {
        self.get(type_name).is_some()
    }

    /// Returns the number of registered (non built-in) types.
    pub fn len(&self) -> usize {
        self.custom.len()
    }

    /// Returns `true` if no custom types are registered.
    pub fn is_empty(&self) -> bool {
        self.custom.is_empty()
    }

    /// Drops every registered type, keeping the built-ins.
    pub fn reset(&self) {
        self.custom.clear();
    }
}
