//! Typed property values
//!
//! A [`Property`] keeps its value in wire form: the raw string for
//! primitives and enums, sub-properties for complex values, and element
//! properties for collections. The getter parses and validates on every
//! read; the setter validates, then stores the canonical raw form again.
//! An unset raw value is what distinguishes "null" from "empty string".

use std::collections::BTreeMap;

use super::Value;
use super::types::ComplexType;
use super::types::Ctx;
use super::types::EdmType;
use super::types::PropertyKind;
use super::types::build_elements;
use super::types::element_name;
use super::types::geography;
use crate::error::ValidationError;
use crate::xml::XmlElement;
use crate::xml::escape_xml;

/// Optimistic concurrency mode declared on a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyMode {
    /// Not used for concurrency checks.
    #[default]
    None,
    /// Participates in the entity's ETag.
    Fixed,
}

/// Per-property validation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyOptions {
    /// Whether null is an acceptable value (`Nullable`, default `true`).
    pub allows_nil: bool,
    /// Whether range checks apply (default `true`).
    pub strict: bool,
    /// Concurrency mode (default `None`).
    pub concurrency_mode: ConcurrencyMode,
}

impl Default for PropertyOptions {
    fn default() -> Self {
        Self {
            allows_nil: true,
            strict: true,
            concurrency_mode: ConcurrencyMode::None,
        }
    }
}

impl PropertyOptions {
    /// Sets whether null values are allowed.
    pub fn with_allows_nil(mut self, allows_nil: bool) -> Self {
        self.allows_nil = allows_nil;
        self
    }

    /// Sets whether range checks apply.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the concurrency mode.
    pub fn with_concurrency_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }
}

#[derive(Debug, Clone)]
enum State {
    /// Primitive and enum values.
    Raw(Option<String>),
    /// Complex values: one property per declared field.
    Complex(Vec<Property>),
    /// Collections: `None` when null.
    Collection(Option<Vec<Property>>),
}

/// A named, typed property value.
///
/// # Example
///
/// ```
/// use odata_lib::model::Property;
/// use odata_lib::model::PropertyOptions;
/// use odata_lib::model::Value;
/// use odata_lib::model::types::EdmType;
///
/// let mut quantity = Property::new("Quantity", EdmType::Int16, PropertyOptions::default());
/// quantity.set_value(12i64).unwrap();
/// assert_eq!(quantity.value().unwrap(), Value::Int16(12));
/// assert!(quantity.set_value(100_000i64).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    kind: PropertyKind,
    options: PropertyOptions,
    state: State,
}

impl Property {
    /// Creates an unset property, as used for schema templates.
    pub fn new(name: impl Into<String>, kind: impl Into<PropertyKind>, options: PropertyOptions) -> Self {
        let kind = kind.into();
        let state = match &kind {
            PropertyKind::Complex(complex) => State::Complex(complex.template_properties(options.strict)),
            PropertyKind::Collection(_) => State::Collection(None),
            _ => State::Raw(None),
        };
        Self {
            name: name.into(),
            kind,
            options,
            state,
        }
    }

    /// Creates a property bound to a raw wire value.
    ///
    /// Primitive and enum raw values are kept as-is and validated on read.
    /// Complex and collection raw values are JSON text.
    pub fn from_raw(
        name: impl Into<String>,
        kind: impl Into<PropertyKind>,
        raw: Option<&str>,
        options: PropertyOptions,
    ) -> Result<Self, ValidationError> {
        let mut property = Self::new(name, kind, options);
        let Some(raw) = raw else {
            return Ok(property);
        };
        if let State::Raw(slot) = &mut property.state {
            *slot = Some(raw.to_string());
            return Ok(property);
        }
        let json: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ValidationError::invalid(&property.name, property.type_name(), raw, e.to_string()))?;
        property.set_value(Value::Json(json))?;
        Ok(property)
    }

    /// Returns the property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the property kind.
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    /// Returns the EDM type name.
    pub fn type_name(&self) -> String {
        self.kind.type_name()
    }

    /// Returns the validation options.
    pub fn options(&self) -> &PropertyOptions {
        &self.options
    }

    /// Returns the raw wire string of a primitive or enum property.
    pub fn raw(&self) -> Option<&str> {
        match &self.state {
            State::Raw(raw) => raw.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if no value is set.
    ///
    /// An empty raw string counts as unset for every type but `Edm.String`.
    pub fn is_null(&self) -> bool {
        match &self.state {
            State::Raw(None) => true,
            State::Raw(Some(raw)) => raw.is_empty() && self.kind.primitive() != Some(EdmType::String),
            State::Complex(fields) => fields.iter().all(Property::is_null),
            State::Collection(items) => items.is_none(),
        }
    }

    /// Returns a copy under a different name.
    pub(crate) fn renamed(&self, name: impl Into<String>) -> Self {
        let mut property = self.clone();
        property.name = name.into();
        property
    }

    /// Returns a copy with a different strictness, applied to nested fields too.
    pub(crate) fn with_strict(&self, strict: bool) -> Self {
        let mut property = self.clone();
        property.options.strict = strict;
        if let State::Complex(fields) = &mut property.state {
            for field in fields.iter_mut() {
                *field = field.with_strict(strict);
            }
        }
        property
    }

    fn ctx(&self) -> Ctx<'_> {
        Ctx {
            property: &self.name,
            strict: self.options.strict,
        }
    }

    fn nil(&self) -> Result<Value, ValidationError> {
        if self.options.allows_nil {
            Ok(Value::Null)
        } else {
            Err(ValidationError::nil_not_allowed(&self.name, self.type_name()))
        }
    }

    fn clear(&mut self) {
        match &mut self.state {
            State::Raw(raw) => *raw = None,
            State::Complex(fields) => fields.iter_mut().for_each(Property::clear),
            State::Collection(items) => *items = None,
        }
    }

    // =========================================================================
    // Value access
    // =========================================================================

    /// Returns the typed value.
    ///
    /// Null is returned only when nothing is set and the property allows
    /// null; otherwise a null property fails with `NilNotAllowed`.
    pub fn value(&self) -> Result<Value, ValidationError> {
        if self.is_null() && !matches!(self.state, State::Complex(_)) {
            return self.nil();
        }
        match (&self.kind, &self.state) {
            (PropertyKind::Primitive(ty), State::Raw(Some(raw))) => ty.parse(&self.ctx(), raw),
            (PropertyKind::Enum(enum_type), State::Raw(Some(raw))) => {
                enum_type.coerce(&self.ctx(), &Value::String(raw.clone()))
            }
            (PropertyKind::Complex(_), State::Complex(fields)) => {
                if self.is_null() && self.options.allows_nil {
                    return Ok(Value::Null);
                }
                let map = fields
                    .iter()
                    .map(|f| Ok((f.name.clone(), f.value()?)))
                    .collect::<Result<BTreeMap<_, _>, ValidationError>>()?;
                Ok(Value::Complex(map))
            }
            (PropertyKind::Collection(_), State::Collection(Some(items))) => {
                let values = items.iter().map(Property::value).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Collection(values))
            }
            _ => self.nil(),
        }
    }

    /// Validates and assigns a value.
    ///
    /// Input is coerced into the property's type, so an `Edm.Int16`
    /// property accepts `Value::Int64(7)` or `"7"` as well as `Value::Int16(7)`.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), ValidationError> {
        let value = value.into();
        let blank = match &value {
            Value::String(s) => s.is_empty() && self.kind.primitive() != Some(EdmType::String),
            other => other.is_blank(),
        };
        if blank {
            self.nil()?;
            self.clear();
            return Ok(());
        }

        let ctx = Ctx {
            property: &self.name,
            strict: self.options.strict,
        };
        match (&self.kind, &mut self.state) {
            (PropertyKind::Primitive(ty), State::Raw(slot)) => {
                let typed = ty.coerce(&ctx, &value)?;
                *slot = Some(ty.format(&typed));
            }
            (PropertyKind::Enum(enum_type), State::Raw(slot)) => {
                let typed = enum_type.coerce(&ctx, &value)?;
                *slot = Some(typed.to_string());
            }
            (PropertyKind::Complex(complex), State::Complex(fields)) => {
                complex.assign(&ctx, fields, &value)?;
            }
            (PropertyKind::Collection(element), State::Collection(items)) => {
                *items = Some(build_elements(&self.name, element, self.options, &value)?);
            }
            _ => {
                return Err(ValidationError::invalid(
                    &self.name,
                    self.kind.type_name(),
                    value.to_string(),
                    "property state does not match its type",
                ));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Returns the OData URL literal, e.g. `'Bread'`, `guid'...'` or `[1,2]`.
    pub fn url_value(&self) -> Result<String, ValidationError> {
        let typed = self.value()?;
        if typed.is_null() {
            return Ok("null".to_string());
        }
        Ok(match &self.kind {
            PropertyKind::Primitive(ty) => ty.literal(&typed),
            PropertyKind::Enum(enum_type) => enum_type.literal(&typed),
            PropertyKind::Complex(_) => self.json_value()?.to_string(),
            PropertyKind::Collection(_) => {
                let literals = self
                    .items()
                    .iter()
                    .map(Property::url_value)
                    .collect::<Result<Vec<_>, _>>()?;
                format!("[{}]", literals.join(","))
            }
        })
    }

    /// Returns the JSON payload form.
    pub fn json_value(&self) -> Result<serde_json::Value, ValidationError> {
        let typed = self.value()?;
        if typed.is_null() {
            return Ok(serde_json::Value::Null);
        }
        Ok(match (&self.kind, &self.state) {
            (PropertyKind::Primitive(ty), _) => ty.json(&typed),
            (PropertyKind::Enum(_), _) => serde_json::Value::String(typed.to_string()),
            (PropertyKind::Complex(_), State::Complex(fields)) => {
                let mut object = serde_json::Map::new();
                for field in fields {
                    object.insert(field.name.clone(), field.json_value()?);
                }
                serde_json::Value::Object(object)
            }
            _ => serde_json::Value::Array(
                self.items()
                    .iter()
                    .map(Property::json_value)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        })
    }

    /// Returns the XML content of the property element.
    ///
    /// Primitives are escaped text, geography values are GML, complex
    /// values are `d:` field elements and collections are `m:element` items.
    pub fn xml_value(&self) -> Result<String, ValidationError> {
        let typed = self.value()?;
        if typed.is_null() {
            return Ok(String::new());
        }
        Ok(match (&self.kind, &self.state) {
            (PropertyKind::Primitive(ty), _) => match &typed {
                Value::Geography(g) => g.to_gml(),
                other => escape_xml(&ty.format(other)),
            },
            (PropertyKind::Enum(_), _) => escape_xml(&typed.to_string()),
            (PropertyKind::Complex(_), State::Complex(fields)) => fields
                .iter()
                .map(Property::to_xml)
                .collect::<Result<String, _>>()?,
            _ => self
                .items()
                .iter()
                .map(|item| Ok(format!("<m:element>{}</m:element>", item.xml_value()?)))
                .collect::<Result<String, ValidationError>>()?,
        })
    }

    /// Renders the `<d:Name m:type="...">` element for Atom/XML payloads.
    pub fn to_xml(&self) -> Result<String, ValidationError> {
        if self.is_null() {
            self.nil()?;
            return Ok(format!(
                "<d:{name} m:type=\"{ty}\" m:null=\"true\"/>",
                name = self.name,
                ty = self.type_name()
            ));
        }
        Ok(format!(
            "<d:{name} m:type=\"{ty}\">{content}</d:{name}>",
            name = self.name,
            ty = self.type_name(),
            content = self.xml_value()?
        ))
    }

    fn items(&self) -> &[Property] {
        match &self.state {
            State::Collection(Some(items)) => items,
            _ => &[],
        }
    }

    // =========================================================================
    // Binding wire fragments
    // =========================================================================

    /// Returns a copy of this template bound to an Atom/XML property element.
    ///
    /// Primitive text is stored without validation; it is checked on read.
    pub fn bind_xml(&self, element: &XmlElement) -> Result<Property, ValidationError> {
        let mut property = self.clone();
        property.clear();
        if element.is_null() {
            return Ok(property);
        }
        let ctx = Ctx {
            property: &self.name,
            strict: self.options.strict,
        };
        match (&self.kind, &mut property.state) {
            (PropertyKind::Primitive(ty), State::Raw(slot)) => {
                *slot = Some(match ty.geography_kind() {
                    Some(kind) if !element.children.is_empty() => {
                        geography::from_gml(kind, &ctx, element)?.to_wkt()
                    }
                    _ => element.text.clone(),
                });
            }
            (PropertyKind::Enum(_), State::Raw(slot)) => *slot = Some(element.text.trim().to_string()),
            (PropertyKind::Complex(_), State::Complex(fields)) => {
                for field in fields.iter_mut() {
                    if let Some(child) = element.child(&field.name) {
                        *field = field.bind_xml(child)?;
                    }
                }
            }
            (PropertyKind::Collection(element_kind), State::Collection(items)) => {
                let template = Property::new(String::new(), (**element_kind).clone(), self.options);
                let bound = element
                    .children_named("element")
                    .enumerate()
                    .map(|(i, child)| template.renamed(element_name(&self.name, i)).bind_xml(child))
                    .collect::<Result<Vec<_>, _>>()?;
                *items = Some(bound);
            }
            _ => {}
        }
        Ok(property)
    }

    /// Returns a copy of this template bound to a JSON payload value.
    pub fn bind_json(&self, json: &serde_json::Value) -> Result<Property, ValidationError> {
        let mut property = self.clone();
        property.clear();
        let bound = match (&self.kind, &mut property.state, json) {
            (_, _, serde_json::Value::Null) => true,
            (PropertyKind::Primitive(_) | PropertyKind::Enum(_), State::Raw(slot), serde_json::Value::String(s)) => {
                *slot = Some(s.clone());
                true
            }
            (PropertyKind::Primitive(_), State::Raw(slot), serde_json::Value::Number(n)) => {
                *slot = Some(n.to_string());
                true
            }
            (PropertyKind::Primitive(_), State::Raw(slot), serde_json::Value::Bool(b)) => {
                *slot = Some(b.to_string());
                true
            }
            (PropertyKind::Collection(element_kind), State::Collection(items), serde_json::Value::Array(values)) => {
                let template = Property::new(String::new(), (**element_kind).clone(), self.options);
                let elements = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| template.renamed(element_name(&self.name, i)).bind_json(v))
                    .collect::<Result<Vec<_>, _>>()?;
                *items = Some(elements);
                true
            }
            _ => false,
        };
        // objects and arrays for other kinds go through the validating setter
        if !bound {
            property.set_value(Value::Json(json.clone()))?;
        }
        Ok(property)
    }
}

impl ComplexType {
    pub(crate) fn template_properties(&self, strict: bool) -> Vec<Property> {
        self.properties.iter().map(|p| p.with_strict(strict)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::types::EnumType;
    use crate::model::types::Geography;

    fn options() -> PropertyOptions {
        PropertyOptions::default()
    }

    fn address() -> Arc<ComplexType> {
        Arc::new(
            ComplexType::new("Shop", "Address")
                .property(Property::new("Street", EdmType::String, options()))
                .property(Property::new("City", EdmType::String, options()))
                .property(Property::new("Zip", EdmType::Int32, options())),
        )
    }

    #[test]
    fn test_nil_handling() {
        let nullable = Property::new("Name", EdmType::Int32, options());
        assert_eq!(nullable.value().unwrap(), Value::Null);

        let required = Property::new("Name", EdmType::Int32, options().with_allows_nil(false));
        assert!(matches!(required.value(), Err(ValidationError::NilNotAllowed { .. })));

        let mut required = required;
        assert!(required.set_value(Value::Null).is_err());
        assert!(required.set_value("").is_err());
    }

    #[test]
    fn test_empty_string_is_a_string() {
        let empty = Property::from_raw("Name", EdmType::String, Some(""), options()).unwrap();
        assert_eq!(empty.value().unwrap(), Value::String(String::new()));

        let empty_number = Property::from_raw("Qty", EdmType::Int32, Some(""), options()).unwrap();
        assert_eq!(empty_number.value().unwrap(), Value::Null);
    }

    #[test]
    fn test_set_value_is_idempotent() {
        let mut price = Property::new("Price", EdmType::Decimal, options());
        price.set_value("2.50").unwrap();
        let first = price.value().unwrap();
        price.set_value("2.50").unwrap();
        assert_eq!(price.value().unwrap(), first);
        assert_eq!(price.raw(), Some("2.50"));
    }

    #[test]
    fn test_numeric_range_round_trip() {
        let mut p = Property::new("Small", EdmType::SByte, options());
        for x in [-128i64, -1, 0, 1, 127] {
            p.set_value(x).unwrap();
            assert_eq!(p.value().unwrap(), Value::SByte(x as i8));
        }
        assert!(matches!(p.set_value(128i64), Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_lenient_property_keeps_out_of_range_raw() {
        let p = Property::from_raw("Small", EdmType::Int16, Some("70000"), options().with_strict(false)).unwrap();
        assert_eq!(p.value().unwrap(), Value::Int64(70000));

        let strict = Property::from_raw("Small", EdmType::Int16, Some("70000"), options()).unwrap();
        assert!(strict.value().is_err());

        let garbage = Property::from_raw("Small", EdmType::Int16, Some("x"), options().with_strict(false)).unwrap();
        assert!(garbage.value().is_err());
    }

    #[test]
    fn test_url_values() {
        let name = Property::from_raw("Name", EdmType::String, Some("Bread"), options()).unwrap();
        assert_eq!(name.url_value().unwrap(), "'Bread'");

        let mut point = Property::new("Location", EdmType::GeographyPoint, options());
        point.set_value(Geography::point(142.1, 64.1)).unwrap();
        assert_eq!(point.url_value().unwrap(), "geography'SRID=4326;Point(142.1 64.1)'");

        let round_trip = Property::from_raw("Location", EdmType::GeographyPoint, point.raw(), options()).unwrap();
        assert_eq!(round_trip.value().unwrap(), Value::Geography(Geography::point(142.1, 64.1)));

        let null = Property::new("Name", EdmType::String, options());
        assert_eq!(null.url_value().unwrap(), "null");
    }

    #[test]
    fn test_enum_property() {
        let colors = Arc::new(EnumType::new("Shop", "Color").member("Red", 0).member("Blue", 1));
        let mut color = Property::new("Color", PropertyKind::Enum(colors), options());
        color.set_value("1").unwrap();
        assert_eq!(color.value().unwrap(), Value::Enum("Blue".into()));
        assert_eq!(color.url_value().unwrap(), "Shop.Color'Blue'");
        assert!(color.set_value("Green").is_err());
    }

    #[test]
    fn test_complex_property() {
        let mut addr = Property::new("Address", PropertyKind::Complex(address()), options());
        assert_eq!(addr.value().unwrap(), Value::Null);

        let mut map = BTreeMap::new();
        map.insert("City".to_string(), Value::from("Oslo"));
        map.insert("Zip".to_string(), Value::from("150"));
        addr.set_value(map).unwrap();

        let Value::Complex(read) = addr.value().unwrap() else {
            panic!("expected complex value");
        };
        assert_eq!(read["City"], Value::from("Oslo"));
        assert_eq!(read["Zip"], Value::Int32(150));
        assert_eq!(read["Street"], Value::Null);

        let mut bad = BTreeMap::new();
        bad.insert("Country".to_string(), Value::from("NO"));
        assert!(matches!(addr.set_value(bad), Err(ValidationError::UnknownField { .. })));
    }

    #[test]
    fn test_collection_property() {
        let kind = PropertyKind::Collection(Box::new(EdmType::Int32.into()));
        let mut numbers = Property::new("Numbers", kind, options());
        numbers
            .set_value(vec![Value::Int64(1), Value::from("2")])
            .unwrap();
        assert_eq!(
            numbers.value().unwrap(),
            Value::Collection(vec![Value::Int32(1), Value::Int32(2)])
        );
        assert_eq!(numbers.url_value().unwrap(), "[1,2]");
        assert_eq!(numbers.json_value().unwrap(), serde_json::json!([1, 2]));

        let err = numbers.set_value(vec![Value::from("x")]).unwrap_err();
        assert_eq!(err.property(), "Numbers[0]");
    }

    #[test]
    fn test_bind_xml() {
        let xml = r#"<m:properties xmlns:m="urn:m" xmlns:d="urn:d">
            <d:Name>Bread</d:Name>
            <d:Price m:null="true"/>
            <d:Address><d:City>Oslo</d:City><d:Zip>150</d:Zip></d:Address>
            <d:Tags><m:element>a</m:element><m:element>b</m:element></d:Tags>
        </m:properties>"#;
        let root = XmlElement::parse(xml).unwrap();

        let name = Property::new("Name", EdmType::String, options())
            .bind_xml(root.child("Name").unwrap())
            .unwrap();
        assert_eq!(name.value().unwrap(), Value::from("Bread"));

        let price = Property::new("Price", EdmType::Decimal, options())
            .bind_xml(root.child("Price").unwrap())
            .unwrap();
        assert!(price.is_null());

        let addr = Property::new("Address", PropertyKind::Complex(address()), options())
            .bind_xml(root.child("Address").unwrap())
            .unwrap();
        assert!(addr.to_xml().unwrap().contains("<d:City m:type=\"Edm.String\">Oslo</d:City>"));

        let tags = Property::new(
            "Tags",
            PropertyKind::Collection(Box::new(EdmType::String.into())),
            options(),
        )
        .bind_xml(root.child("Tags").unwrap())
        .unwrap();
        assert_eq!(
            tags.value().unwrap(),
            Value::Collection(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(
            tags.xml_value().unwrap(),
            "<m:element>a</m:element><m:element>b</m:element>"
        );
    }

    #[test]
    fn test_bind_json() {
        let qty = Property::new("Qty", EdmType::Int32, options())
            .bind_json(&serde_json::json!(5))
            .unwrap();
        assert_eq!(qty.value().unwrap(), Value::Int32(5));

        let addr = Property::new("Address", PropertyKind::Complex(address()), options())
            .bind_json(&serde_json::json!({"City": "Oslo", "@odata.type": "#Shop.Address"}))
            .unwrap();
        assert_eq!(addr.json_value().unwrap()["City"], "Oslo");

        let location = Property::new("Location", EdmType::GeographyPoint, options())
            .bind_json(&Geography::point(1.0, 2.0).to_geojson())
            .unwrap();
        assert_eq!(location.value().unwrap(), Value::Geography(Geography::point(1.0, 2.0)));
    }

    #[test]
    fn test_to_xml_escapes() {
        let name = Property::from_raw("Name", EdmType::String, Some("Salt & Pepper"), options()).unwrap();
        assert_eq!(
            name.to_xml().unwrap(),
            "<d:Name m:type=\"Edm.String\">Salt &amp; Pepper</d:Name>"
        );
    }
}
