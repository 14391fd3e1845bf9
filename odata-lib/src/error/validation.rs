//! Validation error types

/// Errors raised when a property value is assigned or read back.
///
/// Every variant names the property and the offending value so a failure
/// deep inside entity parsing can be traced back to the payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The coerced value falls outside the range of the EDM type.
    #[error("Value is outside accepted range for {property} ({type_name}): {value}, min: {min} max: {max}")]
    OutOfRange {
        property: String,
        type_name: String,
        value: String,
        min: String,
        max: String,
    },

    /// A null value was assigned to (or read from) a non-nullable property.
    #[error("Property '{property}' ({type_name}) does not allow null values")]
    NilNotAllowed { property: String, type_name: String },

    /// The raw value cannot be parsed or coerced into the EDM type.
    #[error("Invalid value for {property} ({type_name}): {value} ({reason})")]
    InvalidValue {
        property: String,
        type_name: String,
        value: String,
        reason: String,
    },

    /// An enum token matched neither a member name nor a member value.
    #[error("Property '{property}': value '{value}' is not a member of {enum_type}")]
    UnknownMember {
        property: String,
        enum_type: String,
        value: String,
    },

    /// Several enum tokens were given for an enum type without `IsFlags`.
    #[error("Property '{property}': multiple values '{value}' given for non-flags enum {enum_type}")]
    MultipleMembers {
        property: String,
        enum_type: String,
        value: String,
    },

    /// A complex value carried a key the complex type does not declare.
    #[error("Property '{property}': '{field}' is not a property of {complex_type}")]
    UnknownField {
        property: String,
        complex_type: String,
        field: String,
    },

    /// A geography literal named a different geometry than the property's type.
    #[error("Property '{property}': invalid geography type '{found}', expected {expected}")]
    GeographyMismatch {
        property: String,
        expected: String,
        found: String,
    },
}

impl ValidationError {
    /// Creates an invalid value error.
    pub fn invalid(
        property: impl Into<String>,
        type_name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            property: property.into(),
            type_name: type_name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a null-not-allowed error.
    pub fn nil_not_allowed(property: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::NilNotAllowed {
            property: property.into(),
            type_name: type_name.into(),
        }
    }

    /// Creates an out-of-range error.
    pub fn out_of_range(
        property: impl Into<String>,
        type_name: impl Into<String>,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        Self::OutOfRange {
            property: property.into(),
            type_name: type_name.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Returns the name of the property that failed validation.
    pub fn property(&self) -> &str {
        match self {
            Self::OutOfRange { property, .. }
            | Self::NilNotAllowed { property, .. }
            | Self::InvalidValue { property, .. }
            | Self::UnknownMember { property, .. }
            | Self::MultipleMembers { property, .. }
            | Self::UnknownField { property, .. }
            | Self::GeographyMismatch { property, .. } => property,
        }
    }
}
