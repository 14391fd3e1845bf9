//! Entities with lazily materialized properties
//!
//! Parsing a payload only records each property's raw fragment. A property
//! is bound to its schema template the first time it is read and the typed
//! result is kept, so untouched properties cost nothing beyond the copy of
//! their wire form.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::Link;
use super::NavType;
use super::NavigationProxy;
use super::Property;
use super::Value;
use crate::error::Error;
use crate::error::SchemaError;
use crate::schema::Schema;
use crate::xml::ATOM_NS;
use crate::xml::DATA_NS;
use crate::xml::METADATA_NS;
use crate::xml::XmlElement;
use crate::xml::escape_xml;

/// A raw property or entity fragment as it appeared on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// An Atom/XML element.
    Xml(XmlElement),
    /// A JSON value.
    Json(serde_json::Value),
}

/// Where an entity comes from: its schema, type and (optionally) entity
/// set and owning service.
#[derive(Debug, Clone)]
pub struct EntityOptions {
    schema: Arc<Schema>,
    entity_type: String,
    entity_set: Option<String>,
    service_name: Option<String>,
}

impl EntityOptions {
    /// Creates options for an entity type of `schema`.
    ///
    /// Fails with `UnknownEntityType` if the schema does not declare it.
    pub fn new(schema: Arc<Schema>, entity_type: impl AsRef<str>) -> Result<Self, SchemaError> {
        let entity_type = entity_type.as_ref();
        if !schema.has_entity_type(entity_type) {
            return Err(SchemaError::unknown_entity_type(entity_type));
        }
        let local = entity_type.rsplit('.').next().unwrap_or(entity_type).to_string();
        Ok(Self {
            schema,
            entity_type: local,
            entity_set: None,
            service_name: None,
        })
    }

    /// Sets the entity set the entity belongs to.
    pub fn with_entity_set(mut self, entity_set: impl Into<String>) -> Self {
        self.entity_set = Some(entity_set.into());
        self
    }

    /// Sets the name of the owning service, used to follow navigation links.
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Returns the schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the unqualified entity type name.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the entity set name.
    pub fn entity_set(&self) -> Option<&str> {
        self.entity_set.as_deref()
    }

    /// Returns the owning service name.
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Switches to a derived type named by the payload, if the schema knows it.
    fn retyped(mut self, type_name: &str) -> Self {
        let type_name = type_name.trim_start_matches('#');
        if self.schema.owns(type_name) && self.schema.has_entity_type(type_name) {
            self.entity_type = type_name.rsplit('.').next().unwrap_or(type_name).to_string();
        }
        self
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Unparsed(Fragment),
    Materialized(Property),
}

/// A property or navigation member of an entity.
#[derive(Debug)]
pub enum Member<'a> {
    /// A structural property.
    Property(&'a Property),
    /// A navigation property, resolved lazily.
    Navigation(NavigationProxy),
}

/// An instance of a schema entity type.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use odata_lib::model::Entity;
/// use odata_lib::model::EntityOptions;
/// use odata_lib::model::Value;
/// use odata_lib::schema::Schema;
///
/// let schema = Arc::new(Schema::parse(r#"<Schema Namespace="Doc">
///     <EntityType Name="Product">
///         <Key><PropertyRef Name="ID"/></Key>
///         <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
///         <Property Name="Name" Type="Edm.String"/>
///     </EntityType>
/// </Schema>"#, true).unwrap());
///
/// let options = EntityOptions::new(schema, "Product").unwrap().with_entity_set("Products");
/// let mut product = Entity::with_properties(options, [("ID", Value::from(7)), ("Name", Value::from("Bread"))]).unwrap();
/// assert_eq!(product.get("Name").unwrap(), Value::from("Bread"));
/// assert_eq!(product.id().unwrap().as_deref(), Some("Products(7)"));
/// ```
#[derive(Debug, Clone)]
pub struct Entity {
    options: EntityOptions,
    slots: Vec<(String, Slot)>,
    index: HashMap<String, usize>,
    links: HashMap<String, Link>,
    id: Option<String>,
    etag: Option<String>,
    annotations: BTreeMap<String, serde_json::Value>,
}

impl Entity {
    /// Creates an entity with no properties set.
    pub fn new(options: EntityOptions) -> Self {
        Self {
            options,
            slots: Vec::new(),
            index: HashMap::new(),
            links: HashMap::new(),
            id: None,
            etag: None,
            annotations: BTreeMap::new(),
        }
    }

    /// Builds an entity from a plain name/value map.
    ///
    /// Keys carrying an `@odata.` annotation are ignored. Values are
    /// validated immediately.
    pub fn with_properties<K, V>(options: EntityOptions, properties: impl IntoIterator<Item = (K, V)>) -> Result<Self, Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut entity = Self::new(options);
        for (name, value) in properties {
            let name = name.as_ref();
            if name.contains("@odata.") {
                continue;
            }
            entity.set(name, value)?;
        }
        Ok(entity)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the construction options.
    pub fn options(&self) -> &EntityOptions {
        &self.options
    }

    /// Returns the unqualified entity type name.
    pub fn entity_type(&self) -> &str {
        &self.options.entity_type
    }

    /// Returns the schema the entity type belongs to.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.options.schema
    }

    /// Returns the declared property names, inherited ones first.
    pub fn property_names(&self) -> Result<Vec<String>, Error> {
        Ok(self
            .schema()
            .properties_for_entity(self.entity_type())?
            .iter()
            .map(|p| p.name().to_string())
            .collect())
    }

    /// Returns `true` if the payload or a setter supplied this property.
    pub fn has_property(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the entity tag, if the payload carried one.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Returns annotations (`@odata.*` and the like) kept from the payload.
    pub fn annotations(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.annotations
    }

    /// Returns the link recorded for a navigation property.
    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.get(name)
    }

    /// Returns the property, materializing it on first access.
    ///
    /// Declared properties absent from the payload come back unset.
    /// Navigation properties are reached through [`navigation`](Self::navigation)
    /// or [`member`](Self::member).
    pub fn get_property(&mut self, name: &str) -> Result<&Property, Error> {
        Ok(&*self.materialize(name)?)
    }

    /// Returns the property mutably, materializing it on first access.
    pub fn get_property_mut(&mut self, name: &str) -> Result<&mut Property, Error> {
        self.materialize(name)
    }

    /// Returns a property or a navigation proxy by name.
    ///
    /// Fails with `UnknownProperty` if the name is neither.
    pub fn member(&mut self, name: &str) -> Result<Member<'_>, Error> {
        if self.schema().navigation_property(self.entity_type(), name).is_ok() {
            return Ok(Member::Navigation(self.navigation(name)?));
        }
        Ok(Member::Property(self.get_property(name)?))
    }

    /// Returns the typed value of a property.
    pub fn get(&mut self, name: &str) -> Result<Value, Error> {
        Ok(self.get_property(name)?.value()?)
    }

    /// Validates and assigns a property value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        let mut property = self.template(name)?;
        property.set_value(value)?;
        match self.index.get(name) {
            Some(&i) => self.slots[i].1 = Slot::Materialized(property),
            None => self.push(name.to_string(), Slot::Materialized(property)),
        }
        Ok(())
    }

    fn push(&mut self, name: String, slot: Slot) {
        match self.index.get(&name) {
            Some(&i) => self.slots[i].1 = slot,
            None => {
                self.index.insert(name.clone(), self.slots.len());
                self.slots.push((name, slot));
            }
        }
    }

    /// Stores a payload property; fields the schema does not declare are dropped.
    fn push_unparsed(&mut self, name: &str, fragment: Fragment) {
        if self.schema().property_template(self.entity_type(), name).is_err() {
            log::debug!("Ignoring undeclared property '{}' of {}", name, self.entity_type());
            return;
        }
        self.push(name.to_string(), Slot::Unparsed(fragment));
    }

    fn template(&self, name: &str) -> Result<Property, Error> {
        let schema = self.schema();
        match schema.property_template(self.entity_type(), name) {
            Ok(template) => Ok(template),
            Err(_) if schema.navigation_property(self.entity_type(), name).is_ok() => Err(Error::argument(format!(
                "'{}' is a navigation property of {}",
                name,
                self.entity_type()
            ))),
            Err(err) => Err(err.into()),
        }
    }

    fn materialize(&mut self, name: &str) -> Result<&mut Property, Error> {
        let index = match self.index.get(name) {
            Some(&i) => i,
            None => {
                let template = self.template(name)?;
                self.push(name.to_string(), Slot::Materialized(template));
                self.slots.len() - 1
            }
        };

        if let Slot::Unparsed(fragment) = &self.slots[index].1 {
            log::trace!("Materializing {}.{}", self.entity_type(), name);
            let property = bind(self.template(name)?, fragment)?;
            self.slots[index].1 = Slot::Materialized(property);
        }

        match &mut self.slots[index].1 {
            Slot::Materialized(property) => Ok(property),
            Slot::Unparsed(_) => Err(SchemaError::unknown_property(self.options.entity_type.clone(), name).into()),
        }
    }

    /// Binds a property without memoizing it.
    fn peek(&self, name: &str) -> Result<Property, Error> {
        match self.index.get(name).map(|&i| &self.slots[i].1) {
            Some(Slot::Materialized(property)) => Ok(property.clone()),
            Some(Slot::Unparsed(fragment)) => bind(self.template(name)?, fragment),
            None => self.template(name),
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Returns the name of the first key property.
    pub fn primary_key(&self) -> Result<String, Error> {
        Ok(self.schema().primary_key_for(self.entity_type())?)
    }

    /// Returns the key as used between the parentheses of an entity URL.
    ///
    /// Composite keys render as `A=1,B='x'`.
    pub fn key_literal(&self) -> Result<String, Error> {
        let keys = self.schema().primary_keys_for(self.entity_type())?;
        if let [key] = keys.as_slice() {
            return Ok(self.peek(key)?.url_value()?);
        }
        let parts = keys
            .iter()
            .map(|key| Ok(format!("{}={}", key, self.peek(key)?.url_value()?)))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(parts.join(","))
    }

    /// Returns `true` if the primary key is unset.
    pub fn is_new(&self) -> Result<bool, Error> {
        Ok(self.peek(&self.primary_key()?)?.is_null())
    }

    /// Returns the entity id.
    ///
    /// An id supplied by the payload wins; otherwise it is
    /// `{EntitySet}({key})` for persisted entities of a known entity set.
    pub fn id(&self) -> Result<Option<String>, Error> {
        if let Some(id) = &self.id {
            return Ok(Some(id.clone()));
        }
        match &self.options.entity_set {
            Some(set) if !self.is_new()? => Ok(Some(format!("{}({})", set, self.key_literal()?))),
            _ => Ok(None),
        }
    }

    /// Returns a lazy proxy for a navigation property.
    ///
    /// Without an explicit link the proxy follows `{id}/{name}`.
    pub fn navigation(&self, name: &str) -> Result<NavigationProxy, Error> {
        let property = self.schema().navigation_property(self.entity_type(), name)?;
        let link = self.links.get(name);
        let href = match link.and_then(|l| l.href.clone()) {
            Some(href) => Some(href),
            None => self.id()?.map(|id| format!("{}/{}", id, name)),
        };
        Ok(NavigationProxy::new(
            property,
            href,
            link.and_then(|l| l.inline.clone()),
            self.options.service_name.clone(),
            Arc::clone(self.schema()),
        ))
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    /// Builds an entity from an Atom `<entry>` or a bare `<properties>` element.
    ///
    /// Property elements are stored unparsed.
    pub fn from_xml(element: &XmlElement, options: EntityOptions) -> Result<Self, Error> {
        let properties = match element.name.as_str() {
            "entry" => element
                .child("content")
                .and_then(|content| content.child("properties"))
                .or_else(|| element.child("properties")),
            "properties" => Some(element),
            other => {
                return Err(Error::argument(format!(
                    "expected an <entry> or <properties> element, found <{}>",
                    other
                )));
            }
        };

        let options = match element.child("category").and_then(|c| c.attribute("term")) {
            Some(term) => options.retyped(term),
            None => options,
        };
        let mut entity = Self::new(options);

        if element.name == "entry" {
            entity.id = element
                .child("id")
                .map(|id| id.text.trim().to_string())
                .filter(|id| !id.is_empty());
            entity.etag = element.attribute("etag").map(String::from);
            entity.read_atom_links(element)?;
        }

        for child in properties.map(|p| p.children.as_slice()).unwrap_or_default() {
            entity.push_unparsed(&child.name, Fragment::Xml(child.clone()));
        }
        Ok(entity)
    }

    fn read_atom_links(&mut self, entry: &XmlElement) -> Result<(), Error> {
        let navigation = self.schema().navigation_properties_for_entity(self.entity_type())?;
        for link in entry.children_named("link") {
            let Some(nav_type) = link.attribute("type").and_then(NavType::from_atom_type) else {
                continue;
            };
            let name = link
                .attribute("title")
                .filter(|title| navigation.iter().any(|n| n.name == *title))
                .or_else(|| link.attribute("rel").and_then(|rel| rel.rsplit('/').next()));
            let Some(name) = name.filter(|name| navigation.iter().any(|n| n.name == *name)) else {
                continue;
            };
            let inline = link
                .child("inline")
                .and_then(|inline| inline.children.first())
                .map(|target| Fragment::Xml(target.clone()));
            self.links.insert(
                name.to_string(),
                Link {
                    nav_type,
                    href: link.attribute("href").map(String::from),
                    inline,
                },
            );
        }
        Ok(())
    }

    /// Builds an entity from an OData JSON object.
    ///
    /// `@odata.*` keys (and v2 `__metadata`) become metadata, navigation
    /// links and expanded navigation data become links, and everything
    /// else is stored unparsed.
    pub fn from_json(json: &serde_json::Value, options: EntityOptions) -> Result<Self, Error> {
        let object = json
            .as_object()
            .ok_or_else(|| Error::argument(format!("expected a JSON object for an entity, found {}", json)))?;

        let type_name = object
            .get("@odata.type")
            .or_else(|| object.get("odata.type"))
            .or_else(|| object.get("__metadata").and_then(|m| m.get("type")))
            .and_then(|t| t.as_str());
        let options = match type_name {
            Some(type_name) => options.retyped(type_name),
            None => options,
        };
        let mut entity = Self::new(options);
        let navigation = entity
            .schema()
            .navigation_properties_for_entity(entity.entity_type())?;
        let nav_type_of = |name: &str| navigation.iter().find(|n| n.name == name).map(|n| n.nav_type());

        for (key, value) in object {
            if key == "__metadata" {
                entity.read_v2_metadata(value);
                continue;
            }
            if let Some(annotation) = key.strip_prefix("@odata.").or_else(|| key.strip_prefix("odata.")) {
                match annotation {
                    "id" => entity.id = value.as_str().map(String::from),
                    "etag" => entity.etag = value.as_str().map(String::from),
                    _ => {}
                }
                entity.annotations.insert(key.clone(), value.clone());
                continue;
            }
            if let Some((name, annotation)) = key.split_once('@') {
                if annotation.ends_with("navigationLink") {
                    if let Some(nav_type) = nav_type_of(name) {
                        let link = entity.links.entry(name.to_string()).or_insert(Link {
                            nav_type,
                            href: None,
                            inline: None,
                        });
                        link.href = value.as_str().map(String::from);
                    }
                }
                entity.annotations.insert(key.clone(), value.clone());
                continue;
            }
            if let Some(nav_type) = nav_type_of(key) {
                let deferred = value
                    .get("__deferred")
                    .and_then(|d| d.get("uri"))
                    .and_then(|uri| uri.as_str());
                let link = entity.links.entry(key.clone()).or_insert(Link {
                    nav_type,
                    href: None,
                    inline: None,
                });
                match deferred {
                    Some(uri) => link.href = Some(uri.to_string()),
                    None if !value.is_null() => link.inline = Some(Fragment::Json(value.clone())),
                    None => {}
                }
                continue;
            }
            entity.push_unparsed(key, Fragment::Json(value.clone()));
        }
        Ok(entity)
    }

    fn read_v2_metadata(&mut self, metadata: &serde_json::Value) {
        if let Some(uri) = metadata.get("uri").and_then(|u| u.as_str()) {
            self.id = Some(uri.to_string());
        }
        if let Some(etag) = metadata.get("etag").and_then(|e| e.as_str()) {
            self.etag = Some(etag.to_string());
        }
        self.annotations.insert("__metadata".to_string(), metadata.clone());
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Properties to send: everything supplied, minus unset required ones
    /// (typically a key the service assigns).
    fn payload_properties(&self) -> Result<Vec<Property>, Error> {
        let mut properties = Vec::with_capacity(self.slots.len());
        for (name, _) in &self.slots {
            let property = self.peek(name)?;
            if property.is_null() && !property.options().allows_nil {
                continue;
            }
            properties.push(property);
        }
        Ok(properties)
    }

    /// Renders the supplied properties as an OData JSON object.
    pub fn to_json(&self) -> Result<serde_json::Value, Error> {
        let mut object = serde_json::Map::new();
        object.insert(
            "@odata.type".to_string(),
            serde_json::Value::String(format!("#{}", self.schema().qualified(self.entity_type()))),
        );
        for property in self.payload_properties()? {
            object.insert(property.name().to_string(), property.json_value()?);
        }
        Ok(serde_json::Value::Object(object))
    }

    /// Renders the supplied properties as an Atom `<entry>`.
    pub fn to_xml(&self) -> Result<String, Error> {
        let mut properties = String::new();
        for property in self.payload_properties()? {
            properties.push_str(&property.to_xml()?);
        }
        let id = match self.id()? {
            Some(id) => format!("<id>{}</id>", escape_xml(&id)),
            None => String::new(),
        };
        Ok(format!(
            "<entry xmlns=\"{atom}\" xmlns:d=\"{data}\" xmlns:m=\"{metadata}\">{id}\
             <category term=\"{term}\" scheme=\"http://docs.oasis-open.org/odata/ns/scheme\"/>\
             <content type=\"application/xml\"><m:properties>{properties}</m:properties></content></entry>",
            atom = ATOM_NS,
            data = DATA_NS,
            metadata = METADATA_NS,
            id = id,
            term = escape_xml(&self.schema().qualified(self.entity_type())),
            properties = properties,
        ))
    }
}

fn bind(template: Property, fragment: &Fragment) -> Result<Property, Error> {
    Ok(match fragment {
        Fragment::Xml(element) => template.bind_xml(element)?,
        Fragment::Json(json) => template.bind_json(json)?,
    })
}
