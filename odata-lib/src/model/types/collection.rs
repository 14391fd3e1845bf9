//! `Collection(T)` element handling

use super::PropertyKind;
use crate::error::ValidationError;
use crate::model::Property;
use crate::model::PropertyOptions;
use crate::model::Value;

/// Name of the element at `index` of the collection property `parent`.
pub(crate) fn element_name(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

/// Wraps each item of a list value into a fresh element property.
pub(crate) fn build_elements(
    parent: &str,
    element: &PropertyKind,
    options: PropertyOptions,
    value: &Value,
) -> Result<Vec<Property>, ValidationError> {
    let items: Vec<Value> = match value {
        Value::Collection(items) => items.clone(),
        Value::Json(serde_json::Value::Array(items)) => items.iter().cloned().map(Value::from_json).collect(),
        other => {
            return Err(ValidationError::invalid(
                parent,
                format!("Collection({})", element.type_name()),
                other.to_string(),
                "expected a list",
            ));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let mut property = Property::new(element_name(parent, i), element.clone(), options);
            property.set_value(item)?;
            Ok(property)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::EdmType;

    #[test]
    fn test_elements_are_named_by_index() {
        let kind = PropertyKind::Primitive(EdmType::String);
        let elements = build_elements(
            "Tags",
            &kind,
            PropertyOptions::default(),
            &Value::Collection(vec![Value::from("a"), Value::from("b")]),
        )
        .unwrap();
        let names: Vec<_> = elements.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Tags[0]", "Tags[1]"]);
    }

    #[test]
    fn test_scalar_is_rejected() {
        let kind = PropertyKind::Primitive(EdmType::Int32);
        let err = build_elements("Numbers", &kind, PropertyOptions::default(), &Value::Int32(1)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }
}
