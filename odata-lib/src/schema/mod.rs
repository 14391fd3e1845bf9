//! EDM schema model
//!
//! [`Schema`] holds one namespace of a metadata document. Enum and complex
//! types are resolved eagerly while parsing and registered with the
//! [`PropertyTypeRegistry`]; entity type properties are resolved on first
//! request and memoized.

mod parse;

pub use parse::EntitySetDef;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::Error;
use crate::error::SchemaError;
use crate::model::NavigationProperty;
use crate::model::Property;
use crate::model::PropertyOptions;
use crate::model::ReferentialConstraint;
use crate::model::ConcurrencyMode;
use crate::model::types::ComplexType;
use crate::model::types::EdmType;
use crate::model::types::EnumType;
use crate::model::types::PropertyKind;
use crate::model::types::collection_element_type;
use crate::registry::PropertyTypeRegistry;
use parse::PropertyDef;
use parse::SchemaDef;
use parse::StructuredDef;
use parse::strip_namespace;

/// One `<Schema>` namespace of a service's metadata.
///
/// # Example
///
/// ```
/// use odata_lib::schema::Schema;
///
/// let xml = r#"<Schema Namespace="Shop">
///     <EntityType Name="Product">
///         <Key><PropertyRef Name="ID"/></Key>
///         <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
///         <Property Name="Name" Type="Edm.String"/>
///     </EntityType>
/// </Schema>"#;
///
/// let schema = Schema::parse(xml, true).unwrap();
/// assert_eq!(schema.primary_key_for("Product").unwrap(), "ID");
/// assert_eq!(schema.get_property_type("Product", "Name").unwrap(), "Edm.String");
/// ```
#[derive(Debug)]
pub struct Schema {
    namespace: String,
    alias: Option<String>,
    strict: bool,
    entity_types: Vec<StructuredDef>,
    complex_types: Vec<Arc<ComplexType>>,
    enum_types: Vec<Arc<EnumType>>,
    entity_sets: Vec<EntitySetDef>,
    /// Enum and complex kinds of the whole document, by qualified name.
    kinds: Arc<HashMap<String, PropertyKind>>,
    properties: DashMap<String, Arc<Vec<Property>>>,
    navigation: DashMap<String, Arc<Vec<NavigationProperty>>>,
}

impl Schema {
    /// Parses a single `<Schema>` element (or the first one in a document).
    pub fn parse(xml: &str, strict: bool) -> Result<Self, Error> {
        let mut schemas = Self::parse_all(xml, strict, true)?;
        schemas
            .pop()
            .ok_or_else(|| SchemaError::invalid_metadata("no <Schema> element found").into())
    }

    /// Parses every `<Schema>` of an EDMX `$metadata` document.
    pub fn parse_metadata(xml: &str, strict: bool) -> Result<Vec<Self>, Error> {
        Self::parse_all(xml, strict, false)
    }

    fn parse_all(xml: &str, strict: bool, first_only: bool) -> Result<Vec<Self>, Error> {
        let doc = roxmltree::Document::parse(xml)?;
        let mut defs = Vec::new();
        for node in doc.descendants().filter(|n| n.has_tag_name("Schema")) {
            defs.push(SchemaDef::from_node(node)?);
            if first_only {
                break;
            }
        }
        if defs.is_empty() {
            return Err(SchemaError::invalid_metadata("no <Schema> element found").into());
        }
        Ok(build(defs, strict, PropertyTypeRegistry::global())?)
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the namespace alias, if declared.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns whether property templates are strict.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Returns the entity type names in declaration order.
    pub fn entity_types(&self) -> Vec<&str> {
        self.entity_types.iter().map(|t| t.name.as_str()).collect()
    }

    /// Returns the complex types declared by this schema.
    pub fn complex_types(&self) -> &[Arc<ComplexType>] {
        &self.complex_types
    }

    /// Returns the enum types declared by this schema.
    pub fn enum_types(&self) -> &[Arc<EnumType>] {
        &self.enum_types
    }

    /// Returns the entity sets of this schema's entity container.
    pub fn entity_sets(&self) -> &[EntitySetDef] {
        &self.entity_sets
    }

    /// Returns `true` if `type_name` (qualified or not) belongs to this namespace.
    pub fn owns(&self, type_name: &str) -> bool {
        match type_name.rsplit_once('.') {
            Some((prefix, _)) => prefix == self.namespace || Some(prefix) == self.alias.as_deref(),
            None => true,
        }
    }

    /// Returns `true` if the entity type exists.
    pub fn has_entity_type(&self, name: &str) -> bool {
        self.entity_def(name).is_ok()
    }

    /// Qualifies a local type name with the namespace.
    pub fn qualified(&self, name: &str) -> String {
        format!("{}.{}", self.namespace, strip_namespace(name))
    }

    fn entity_def(&self, name: &str) -> Result<&StructuredDef, SchemaError> {
        let local = strip_namespace(name);
        self.entity_types
            .iter()
            .find(|t| t.name == local && self.owns(name))
            .ok_or_else(|| SchemaError::unknown_entity_type(name))
    }

    /// Resolves a type name against this document's types, then the global registry.
    pub fn resolve_type(&self, type_name: &str) -> Result<PropertyKind, SchemaError> {
        if let Some(element) = collection_element_type(type_name) {
            return Ok(PropertyKind::Collection(Box::new(self.resolve_type(element)?)));
        }
        if let Some(kind) = self.kinds.get(type_name) {
            return Ok(kind.clone());
        }
        PropertyTypeRegistry::global().resolve(type_name)
    }

    fn template(&self, def: &PropertyDef) -> Result<Property, SchemaError> {
        let kind = self.resolve_type(&def.type_name)?;
        Ok(Property::new(def.name.clone(), kind, template_options(def, self.strict)))
    }

    // =========================================================================
    // Entity type accessors
    // =========================================================================

    /// Returns the property templates of an entity type, ancestors first.
    ///
    /// A property redeclared by a subtype replaces the inherited one.
    pub fn properties_for_entity(&self, entity_type: &str) -> Result<Arc<Vec<Property>>, SchemaError> {
        let def = self.entity_def(entity_type)?;
        if let Some(cached) = self.properties.get(&def.name) {
            return Ok(Arc::clone(cached.value()));
        }

        let mut merged: Vec<Property> = match &def.base_type {
            Some(base) => self.properties_for_entity(strip_namespace(base))?.as_ref().clone(),
            None => Vec::new(),
        };
        for property_def in &def.properties {
            let template = self.template(property_def)?;
            match merged.iter_mut().find(|p| p.name() == template.name()) {
                Some(existing) => *existing = template,
                None => merged.push(template),
            }
        }

        let merged = Arc::new(merged);
        self.properties.insert(def.name.clone(), Arc::clone(&merged));
        Ok(merged)
    }

    /// Returns the navigation properties of an entity type, ancestors first.
    pub fn navigation_properties_for_entity(
        &self,
        entity_type: &str,
    ) -> Result<Arc<Vec<NavigationProperty>>, SchemaError> {
        let def = self.entity_def(entity_type)?;
        if let Some(cached) = self.navigation.get(&def.name) {
            return Ok(Arc::clone(cached.value()));
        }

        let mut merged: Vec<NavigationProperty> = match &def.base_type {
            Some(base) => self
                .navigation_properties_for_entity(strip_namespace(base))?
                .as_ref()
                .clone(),
            None => Vec::new(),
        };
        for navigation in &def.navigation {
            match merged.iter_mut().find(|n| n.name == navigation.name) {
                Some(existing) => *existing = navigation.clone(),
                None => merged.push(navigation.clone()),
            }
        }

        let merged = Arc::new(merged);
        self.navigation.insert(def.name.clone(), Arc::clone(&merged));
        Ok(merged)
    }

    /// Returns the referential constraints of each navigation property.
    pub fn referential_constraints_for(
        &self,
        entity_type: &str,
    ) -> Result<HashMap<String, Vec<ReferentialConstraint>>, SchemaError> {
        let def = self.entity_def(entity_type)?;
        let mut constraints = match &def.base_type {
            Some(base) => self.referential_constraints_for(strip_namespace(base))?,
            None => HashMap::new(),
        };
        for navigation in &def.navigation {
            if !navigation.referential_constraints.is_empty() {
                constraints.insert(navigation.name.clone(), navigation.referential_constraints.clone());
            }
        }
        Ok(constraints)
    }

    /// Returns the template of one property, inherited or declared.
    pub fn property_template(&self, entity_type: &str, property: &str) -> Result<Property, SchemaError> {
        self.properties_for_entity(entity_type)?
            .iter()
            .find(|p| p.name() == property)
            .cloned()
            .ok_or_else(|| SchemaError::unknown_property(entity_type, property))
    }

    /// Returns the EDM type name of a property.
    pub fn get_property_type(&self, entity_type: &str, property: &str) -> Result<String, SchemaError> {
        Ok(self.property_template(entity_type, property)?.type_name())
    }

    /// Returns one navigation property.
    pub fn navigation_property(&self, entity_type: &str, name: &str) -> Result<NavigationProperty, SchemaError> {
        self.navigation_properties_for_entity(entity_type)?
            .iter()
            .find(|n| n.name == name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownNavigationProperty {
                entity_type: entity_type.to_string(),
                property: name.to_string(),
            })
    }

    /// Returns all key property names, looking through base types.
    pub fn primary_keys_for(&self, entity_type: &str) -> Result<Vec<String>, SchemaError> {
        let def = self.entity_def(entity_type)?;
        if !def.key.is_empty() {
            return Ok(def.key.clone());
        }
        match &def.base_type {
            Some(base) => self.primary_keys_for(strip_namespace(base)),
            None => Err(SchemaError::MissingKey {
                entity_type: entity_type.to_string(),
            }),
        }
    }

    /// Returns the first key property name.
    pub fn primary_key_for(&self, entity_type: &str) -> Result<String, SchemaError> {
        self.primary_keys_for(entity_type)?
            .into_iter()
            .next()
            .ok_or_else(|| SchemaError::MissingKey {
                entity_type: entity_type.to_string(),
            })
    }

    /// Returns an entity set by name.
    pub fn entity_set(&self, name: &str) -> Option<&EntitySetDef> {
        self.entity_sets.iter().find(|s| s.name == name)
    }
}

fn template_options(def: &PropertyDef, strict: bool) -> PropertyOptions {
    PropertyOptions::default()
        .with_allows_nil(def.nullable)
        .with_strict(strict)
        .with_concurrency_mode(if def.concurrency_fixed {
            ConcurrencyMode::Fixed
        } else {
            ConcurrencyMode::None
        })
}

// =============================================================================
// Document-level resolution
// =============================================================================

/// Resolves complex types across all schemas of a document.
struct Resolver<'a> {
    strict: bool,
    aliases: HashMap<String, String>,
    complex_defs: HashMap<String, (&'a str, &'a StructuredDef)>,
    kinds: HashMap<String, PropertyKind>,
    registry: &'a PropertyTypeRegistry,
}

impl Resolver<'_> {
    /// Rewrites `Alias.Name` to `Namespace.Name`.
    fn normalize(&self, type_name: &str) -> String {
        match type_name.rsplit_once('.') {
            Some((prefix, name)) => match self.aliases.get(prefix) {
                Some(namespace) => format!("{}.{}", namespace, name),
                None => type_name.to_string(),
            },
            None => type_name.to_string(),
        }
    }

    fn resolve_kind(&mut self, type_name: &str) -> Result<PropertyKind, SchemaError> {
        if let Some(element) = collection_element_type(type_name) {
            return Ok(PropertyKind::Collection(Box::new(self.resolve_kind(element)?)));
        }
        if let Some(ty) = EdmType::from_name(type_name) {
            return Ok(PropertyKind::Primitive(ty));
        }
        let qualified = self.normalize(type_name);
        if let Some(kind) = self.kinds.get(&qualified) {
            return Ok(kind.clone());
        }
        if self.complex_defs.contains_key(&qualified) {
            return Ok(PropertyKind::Complex(self.resolve_complex(&qualified)?));
        }
        self.registry.resolve(&qualified)
    }

    fn resolve_complex(&mut self, qualified: &str) -> Result<Arc<ComplexType>, SchemaError> {
        if let Some(PropertyKind::Complex(done)) = self.kinds.get(qualified) {
            return Ok(Arc::clone(done));
        }
        let (namespace, def) = *self
            .complex_defs
            .get(qualified)
            .ok_or_else(|| SchemaError::unknown_property_type(qualified))?;

        let mut complex = ComplexType::new(namespace, def.name.clone());
        if let Some(base) = &def.base_type {
            let base = self.resolve_complex(&self.normalize(base))?;
            complex.properties = base.properties.clone();
        }
        for property_def in &def.properties {
            let kind = self.resolve_kind(&property_def.type_name)?;
            let template = Property::new(
                property_def.name.clone(),
                kind,
                template_options(property_def, self.strict),
            );
            match complex.properties.iter_mut().find(|p| p.name() == template.name()) {
                Some(existing) => *existing = template,
                None => complex.properties.push(template),
            }
        }

        let complex = Arc::new(complex);
        self.kinds
            .insert(qualified.to_string(), PropertyKind::Complex(Arc::clone(&complex)));
        Ok(complex)
    }
}

fn build(defs: Vec<SchemaDef>, strict: bool, registry: &PropertyTypeRegistry) -> Result<Vec<Schema>, SchemaError> {
    let mut resolver = Resolver {
        strict,
        aliases: defs
            .iter()
            .filter_map(|d| Some((d.alias.clone()?, d.namespace.clone())))
            .collect(),
        complex_defs: HashMap::new(),
        kinds: HashMap::new(),
        registry,
    };

    // enums first: complex fields may refer to them
    for def in &defs {
        for enum_type in &def.enum_types {
            let kind = PropertyKind::Enum(Arc::new(enum_type.clone()));
            let qualified = enum_type.type_name();
            registry.register(qualified.clone(), kind.clone());
            resolver.kinds.insert(qualified, kind);
        }
        for complex in &def.complex_types {
            resolver.complex_defs.insert(
                format!("{}.{}", def.namespace, complex.name),
                (def.namespace.as_str(), complex),
            );
        }
    }

    let complex_names: Vec<String> = resolver.complex_defs.keys().cloned().collect();
    for qualified in complex_names {
        let complex = resolver.resolve_complex(&qualified)?;
        registry.register(qualified, PropertyKind::Complex(complex));
    }

    // alias-qualified names resolve to the same kinds
    let mut kinds = resolver.kinds.clone();
    for def in &defs {
        if let Some(alias) = &def.alias {
            let prefix = format!("{}.", def.namespace);
            let aliased: Vec<(String, PropertyKind)> = resolver
                .kinds
                .iter()
                .filter_map(|(name, kind)| {
                    name.strip_prefix(&prefix)
                        .map(|local| (format!("{}.{}", alias, local), kind.clone()))
                })
                .collect();
            kinds.extend(aliased);
        }
    }
    let kinds = Arc::new(kinds);

    Ok(defs
        .into_iter()
        .map(|def| {
            let prefix = format!("{}.", def.namespace);
            let complex_types = kinds
                .iter()
                .filter(|(name, _)| name.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('.')))
                .filter_map(|(_, kind)| match kind {
                    PropertyKind::Complex(c) => Some(Arc::clone(c)),
                    _ => None,
                })
                .collect();
            let enum_types = def
                .enum_types
                .into_iter()
                .map(Arc::new)
                .collect();
            Schema {
                namespace: def.namespace,
                alias: def.alias,
                strict,
                entity_types: def.entity_types,
                complex_types,
                enum_types,
                entity_sets: def.entity_sets,
                kinds: Arc::clone(&kinds),
                properties: DashMap::new(),
                navigation: DashMap::new(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    const SCHEMA: &str = r#"<Schema Namespace="SchemaTest" Alias="ST" xmlns="http://docs.oasis-open.org/odata/ns/edm">
        <EnumType Name="Color"><Member Name="Red" Value="0"/><Member Name="Blue" Value="1"/></EnumType>
        <ComplexType Name="Address">
            <Property Name="City" Type="Edm.String"/>
            <Property Name="Zip" Type="Edm.Int32"/>
        </ComplexType>
        <ComplexType Name="GeoAddress" BaseType="ST.Address">
            <Property Name="Location" Type="Edm.GeographyPoint"/>
        </ComplexType>
        <EntityType Name="Base" Abstract="true">
            <Key><PropertyRef Name="ID"/></Key>
            <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
            <Property Name="Name" Type="Edm.String"/>
            <NavigationProperty Name="Owner" Type="SchemaTest.Person">
                <ReferentialConstraint Property="OwnerID" ReferencedProperty="ID"/>
            </NavigationProperty>
        </EntityType>
        <EntityType Name="Product" BaseType="SchemaTest.Base">
            <Property Name="Name" Type="Edm.String" Nullable="false"/>
            <Property Name="Color" Type="SchemaTest.Color"/>
            <Property Name="Ship" Type="SchemaTest.GeoAddress"/>
            <Property Name="Tags" Type="Collection(Edm.String)"/>
            <Property Name="Version" Type="Edm.Int64" ConcurrencyMode="Fixed"/>
            <NavigationProperty Name="Orders" Type="Collection(SchemaTest.Order)" Partner="Product"/>
        </EntityType>
        <EntityType Name="Person">
            <Property Name="ID" Type="Edm.Int32"/>
            <Property Name="Mystery" Type="SchemaTest.Missing"/>
        </EntityType>
        <EntityContainer Name="Container">
            <EntitySet Name="Products" EntityType="SchemaTest.Product"/>
        </EntityContainer>
    </Schema>"#;

    fn schema() -> Schema {
        Schema::parse(SCHEMA, true).unwrap()
    }

    #[test]
    fn test_inheritance_merges_properties() {
        let schema = schema();
        let names: Vec<_> = schema
            .properties_for_entity("Product")
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["ID", "Name", "Color", "Ship", "Tags", "Version"]);

        // subtype redeclaration wins
        let name = schema.property_template("Product", "Name").unwrap();
        assert!(!name.options().allows_nil);
        let base_name = schema.property_template("Base", "Name").unwrap();
        assert!(base_name.options().allows_nil);
    }

    #[test]
    fn test_qualified_and_alias_names() {
        let schema = schema();
        assert!(schema.has_entity_type("SchemaTest.Product"));
        assert!(schema.has_entity_type("ST.Product"));
        assert!(!schema.has_entity_type("Other.Product"));
        assert_eq!(schema.qualified("Product"), "SchemaTest.Product");
    }

    #[test]
    fn test_property_types() {
        let schema = schema();
        assert_eq!(schema.get_property_type("Product", "Color").unwrap(), "SchemaTest.Color");
        assert_eq!(schema.get_property_type("Product", "Tags").unwrap(), "Collection(Edm.String)");
        assert_eq!(schema.get_property_type("Product", "ID").unwrap(), "Edm.Int32");

        let version = schema.property_template("Product", "Version").unwrap();
        assert_eq!(version.options().concurrency_mode, ConcurrencyMode::Fixed);
    }

    #[test]
    fn test_complex_base_type_and_registration() {
        let schema = schema();
        let mut ship = schema.property_template("Product", "Ship").unwrap();
        let PropertyKind::Complex(complex) = ship.kind().clone() else {
            panic!("expected complex kind");
        };
        assert_eq!(complex.property_names().collect::<Vec<_>>(), vec!["City", "Zip", "Location"]);
        assert!(PropertyTypeRegistry::global().contains("SchemaTest.GeoAddress"));
        assert!(PropertyTypeRegistry::global().contains("SchemaTest.Color"));
        assert_eq!(schema.complex_types().len(), 2);

        ship.set_value(serde_json::json!({"City": "Oslo"})).unwrap();
        let Value::Complex(map) = ship.value().unwrap() else {
            panic!("expected complex value");
        };
        assert_eq!(map["City"], Value::from("Oslo"));
    }

    #[test]
    fn test_navigation_and_constraints_are_inherited() {
        let schema = schema();
        let navs = schema.navigation_properties_for_entity("Product").unwrap();
        let names: Vec<_> = navs.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Owner", "Orders"]);
        assert_eq!(navs[1].partner.as_deref(), Some("Product"));

        let constraints = schema.referential_constraints_for("Product").unwrap();
        assert_eq!(constraints["Owner"][0].property, "OwnerID");
    }

    #[test]
    fn test_keys_are_inherited() {
        let schema = schema();
        assert_eq!(schema.primary_key_for("Product").unwrap(), "ID");
        let err = schema.primary_key_for("Person").unwrap_err();
        assert!(matches!(err, SchemaError::MissingKey { .. }));
    }

    #[test]
    fn test_errors_name_the_culprit() {
        let schema = schema();
        let err = schema.properties_for_entity("Nope").unwrap_err();
        assert_eq!(err.to_string(), "Unknown entity type: Nope");

        let err = schema.properties_for_entity("Person").unwrap_err();
        assert_eq!(err.to_string(), "Unknown property type: SchemaTest.Missing");

        let err = schema.get_property_type("Product", "Weight").unwrap_err();
        assert!(err.to_string().contains("Weight"));
        assert!(err.to_string().contains("Product"));

        assert!(schema.navigation_property("Product", "Nope").is_err());
    }

    #[test]
    fn test_entity_sets() {
        let schema = schema();
        let set = schema.entity_set("Products").unwrap();
        assert_eq!(set.entity_type, "SchemaTest.Product");
        assert!(schema.entity_set("Orders").is_none());
    }

    #[test]
    fn test_parse_metadata_document() {
        let edmx = format!(
            r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
                <edmx:DataServices>{}<Schema Namespace="SchemaTestTwo"><ComplexType Name="Tag"><Property Name="Label" Type="Edm.String"/></ComplexType></Schema></edmx:DataServices>
            </edmx:Edmx>"#,
            SCHEMA
        );
        let schemas = Schema::parse_metadata(&edmx, true).unwrap();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[1].namespace(), "SchemaTestTwo");
        assert!(schemas[1].owns("SchemaTestTwo.Tag"));
        assert!(!schemas[1].owns("SchemaTest.Product"));
    }
}
