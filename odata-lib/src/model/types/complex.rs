//! Schema-declared complex types

use std::collections::BTreeMap;

use super::Ctx;
use crate::error::ValidationError;
use crate::model::Property;
use crate::model::Value;

/// A `<ComplexType>` definition: a named list of field templates.
///
/// Shared by every property of this type through `PropertyKind::Complex`.
#[derive(Debug, Clone)]
pub struct ComplexType {
    /// Unqualified type name.
    pub name: String,
    /// Schema namespace.
    pub namespace: String,
    /// Field templates in declaration order.
    pub properties: Vec<Property>,
}

impl ComplexType {
    /// Creates a complex type without fields.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            properties: Vec::new(),
        }
    }

    /// Adds a field template.
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Returns the qualified name, e.g. `NS.Address`.
    pub fn type_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns the declared field names.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name())
    }

    /// Returns the template of a declared field.
    pub fn field(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Fans a map value out over the field properties.
    ///
    /// Keys must name declared fields; annotation keys (`@odata.type`,
    /// `Field@odata.type`) are ignored. Fields missing from the map are set
    /// to null.
    pub(crate) fn assign(&self, ctx: &Ctx<'_>, fields: &mut [Property], value: &Value) -> Result<(), ValidationError> {
        let map: BTreeMap<String, Value> = match value {
            Value::Complex(map) => map.clone(),
            Value::Json(serde_json::Value::Object(object)) => object
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v.clone())))
                .collect(),
            other => {
                return Err(ValidationError::invalid(
                    ctx.property,
                    self.type_name(),
                    other.to_string(),
                    "expected a map of field values",
                ));
            }
        };

        if let Some(unknown) = map
            .keys()
            .filter(|k| !k.contains('@'))
            .find(|k| self.field(k).is_none())
        {
            return Err(ValidationError::UnknownField {
                property: ctx.property.to_string(),
                complex_type: self.type_name(),
                field: unknown.clone(),
            });
        }

        for field in fields.iter_mut() {
            let incoming = map.get(field.name()).cloned().unwrap_or(Value::Null);
            field.set_value(incoming)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyOptions;
    use crate::model::types::EdmType;

    const CTX: Ctx<'static> = Ctx {
        property: "Address",
        strict: true,
    };

    fn address() -> ComplexType {
        ComplexType::new("Shop", "Address")
            .property(Property::new("City", EdmType::String, PropertyOptions::default()))
            .property(Property::new(
                "Zip",
                EdmType::Int32,
                PropertyOptions::default().with_allows_nil(false),
            ))
    }

    #[test]
    fn test_type_name_and_fields() {
        let address = address();
        assert_eq!(address.type_name(), "Shop.Address");
        assert_eq!(address.property_names().collect::<Vec<_>>(), vec!["City", "Zip"]);
    }

    #[test]
    fn test_assign_tolerates_annotations() {
        let address = address();
        let mut fields = address.properties.clone();
        let json = serde_json::json!({"@odata.type": "#Shop.Address", "City": "Oslo", "Zip": 150});
        address.assign(&CTX, &mut fields, &Value::Json(json)).unwrap();
        assert_eq!(fields[1].value().unwrap(), Value::Int32(150));
    }

    #[test]
    fn test_assign_rejects_unknown_and_missing_required() {
        let address = address();
        let mut fields = address.properties.clone();

        let mut map = BTreeMap::new();
        map.insert("Country".to_string(), Value::from("NO"));
        let err = address.assign(&CTX, &mut fields, &Value::Complex(map)).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownField { ref field, .. } if field == "Country"));

        let mut map = BTreeMap::new();
        map.insert("City".to_string(), Value::from("Oslo"));
        let err = address.assign(&CTX, &mut fields, &Value::Complex(map)).unwrap_err();
        assert!(matches!(err, ValidationError::NilNotAllowed { .. }));
    }
}
