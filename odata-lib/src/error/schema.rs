//! Schema and registry lookup errors

/// Errors raised when metadata or registry lookups miss.
///
/// Callers rely on the embedded names to diagnose a bad query or payload,
/// so every variant carries the name that failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The EDM type name is neither built-in nor registered by a schema.
    #[error("Unknown property type: {type_name}")]
    UnknownPropertyType { type_name: String },

    /// No `EntityType` with this name exists in the schema.
    #[error("Unknown entity type: {name}")]
    UnknownEntityType { name: String },

    /// The entity type declares neither a property nor a navigation property with this name.
    #[error("Unknown property '{property}' for entity type {entity_type}")]
    UnknownProperty {
        entity_type: String,
        property: String,
    },

    /// The entity type declares no navigation property with this name.
    #[error("Unknown navigation property '{property}' for entity type {entity_type}")]
    UnknownNavigationProperty {
        entity_type: String,
        property: String,
    },

    /// The entity container has no entity set with this name.
    #[error("Unknown entity set: {name}")]
    UnknownEntitySet { name: String },

    /// No service is registered under this name or URL.
    #[error("Unknown service: {name}")]
    UnknownService { name: String },

    /// No namespace of the service defines the requested type.
    #[error("Unknown namespace for type: {type_name}")]
    UnknownNamespace { type_name: String },

    /// The entity type (and its ancestors) declare no `<Key>`.
    #[error("No primary key defined for entity type {entity_type}")]
    MissingKey { entity_type: String },

    /// The metadata document could not be interpreted.
    #[error("Invalid metadata: {message}")]
    InvalidMetadata { message: String },
}

impl SchemaError {
    /// Creates an unknown property type error.
    pub fn unknown_property_type(type_name: impl Into<String>) -> Self {
        Self::UnknownPropertyType {
            type_name: type_name.into(),
        }
    }

    /// Creates an unknown entity type error.
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        Self::UnknownEntityType { name: name.into() }
    }

    /// Creates an unknown property error.
    pub fn unknown_property(entity_type: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            entity_type: entity_type.into(),
            property: property.into(),
        }
    }

    /// Creates an invalid metadata error.
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            message: message.into(),
        }
    }
}
