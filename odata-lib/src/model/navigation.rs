//! Navigation properties and their lazy resolution
//!
//! An entity records a [`Link`] for every navigation property the payload
//! mentioned. [`NavigationProxy`] turns a link into entities only when it
//! is dereferenced: expanded (inline) data is parsed in place, otherwise
//! the link is followed with a request through the owning service.

use std::sync::Arc;

use super::Entity;
use super::EntityOptions;
use super::Fragment;
use crate::client::RequestOptions;
use crate::client::Service;
use crate::error::Error;
use crate::model::types::collection_element_type;
use crate::registry::ServiceRegistry;
use crate::response::Body;
use crate::response::Format;
use crate::schema::Schema;

/// Whether a navigation property targets one entity or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavType {
    /// Single entity (`Type="NS.Category"`).
    Entity,
    /// Collection (`Type="Collection(NS.Product)"`).
    Collection,
}

impl NavType {
    /// Maps an Atom link type (`application/atom+xml;type=entry|feed`).
    pub fn from_atom_type(link_type: &str) -> Option<Self> {
        if link_type.contains("type=feed") {
            Some(NavType::Collection)
        } else if link_type.contains("type=entry") {
            Some(NavType::Entity)
        } else {
            None
        }
    }
}

/// A `(Property, ReferencedProperty)` pair from `<ReferentialConstraint>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferentialConstraint {
    /// The dependent property on this entity.
    pub property: String,
    /// The principal property on the target entity.
    pub referenced_property: String,
}

/// A `<NavigationProperty>` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationProperty {
    /// Property name.
    pub name: String,
    /// Target type, possibly `Collection(...)`.
    pub type_name: String,
    /// Whether the target may be absent.
    pub nullable: bool,
    /// Partner navigation property on the target type.
    pub partner: Option<String>,
    /// Referential constraints.
    pub referential_constraints: Vec<ReferentialConstraint>,
}

impl NavigationProperty {
    /// Creates a nullable navigation property without partner or constraints.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
            partner: None,
            referential_constraints: Vec::new(),
        }
    }

    /// Returns whether the target is a single entity or a collection.
    pub fn nav_type(&self) -> NavType {
        if collection_element_type(&self.type_name).is_some() {
            NavType::Collection
        } else {
            NavType::Entity
        }
    }

    /// Returns the target entity type without the collection wrapper.
    pub fn target_type(&self) -> &str {
        collection_element_type(&self.type_name).unwrap_or(&self.type_name)
    }
}

/// A navigation link recorded from a wire payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Single entity or collection.
    pub nav_type: NavType,
    /// Link target, absolute or relative to the service root.
    pub href: Option<String>,
    /// Expanded target data carried inline by the payload.
    pub inline: Option<Fragment>,
}

// =============================================================================
// Lazy proxy
// =============================================================================

/// Lazily resolves a navigation property of one entity.
///
/// Nothing is fetched until [`entities`](Self::entities) or
/// [`entity`](Self::entity) is called. A `404 Not Found` on the follow-up
/// request is treated as "no related entities".
#[derive(Debug, Clone)]
pub struct NavigationProxy {
    property: NavigationProperty,
    href: Option<String>,
    inline: Option<Fragment>,
    service_name: Option<String>,
    schema: Arc<Schema>,
}

impl NavigationProxy {
    pub(crate) fn new(
        property: NavigationProperty,
        href: Option<String>,
        inline: Option<Fragment>,
        service_name: Option<String>,
        schema: Arc<Schema>,
    ) -> Self {
        Self {
            property,
            href,
            inline,
            service_name,
            schema,
        }
    }

    /// Returns the navigation property name.
    pub fn name(&self) -> &str {
        &self.property.name
    }

    /// Returns the navigation property definition.
    pub fn property(&self) -> &NavigationProperty {
        &self.property
    }

    /// Returns whether the target is a single entity or a collection.
    pub fn nav_type(&self) -> NavType {
        self.property.nav_type()
    }

    /// Returns the link that will be followed, if any.
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    /// Returns `true` if the target data was expanded inline.
    pub fn is_expanded(&self) -> bool {
        self.inline.is_some()
    }

    /// Resolves the target as a list of entities.
    pub fn entities(&self) -> Result<Vec<Entity>, Error> {
        let service = match &self.service_name {
            Some(name) => ServiceRegistry::global().get(name),
            None => None,
        };
        let options = self.target_options(service.as_deref())?;

        if let Some(inline) = &self.inline {
            return inline_entities(inline, &options);
        }

        let href = self.href.as_deref().ok_or_else(|| {
            Error::argument(format!("navigation property '{}' has no link to follow", self.property.name))
        })?;
        let service = match service {
            Some(service) => service,
            None => ServiceRegistry::global().lookup(self.service_name.as_deref().unwrap_or_default())?,
        };
        fetch(&service, href, &options)
    }

    /// Resolves the target as a single entity: the first one, if any.
    pub fn entity(&self) -> Result<Option<Entity>, Error> {
        Ok(self.entities()?.into_iter().next())
    }

    fn target_options(&self, service: Option<&Service>) -> Result<EntityOptions, Error> {
        let target = self.property.target_type();
        if let Some(service) = service {
            return service.entity_options_for_type(target);
        }
        let options = EntityOptions::new(Arc::clone(&self.schema), target)?;
        Ok(match &self.service_name {
            Some(name) => options.with_service_name(name.clone()),
            None => options,
        })
    }
}

fn inline_entities(inline: &Fragment, options: &EntityOptions) -> Result<Vec<Entity>, Error> {
    let (format, body) = match inline {
        Fragment::Json(json) => (Format::Json, Body::Json(json.clone())),
        Fragment::Xml(element) => (Format::Atom, Body::Xml(element.clone())),
    };
    format
        .find_entities(&body)
        .iter()
        .map(|fragment| format.parse_one_entity(fragment, options.clone()))
        .collect()
}

fn fetch(service: &Service, href: &str, options: &EntityOptions) -> Result<Vec<Entity>, Error> {
    let mut entities = Vec::new();
    let mut next = Some(service.relative_chunk(href));
    while let Some(chunk) = next.take() {
        let response = match service.execute(&chunk, RequestOptions::default()) {
            Ok(response) => response,
            Err(err) if err.is_not_found() => {
                log::warn!("Navigation link {} not found, treating as empty", chunk);
                return Ok(entities);
            }
            Err(err) => return Err(err),
        };
        let page = response.page(options)?;
        next = page.next_link().map(|link| service.relative_chunk(link));
        entities.extend(page.into_entities());
    }
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_type() {
        let products = NavigationProperty::new("Products", "Collection(Shop.Product)");
        assert_eq!(products.nav_type(), NavType::Collection);
        assert_eq!(products.target_type(), "Shop.Product");

        let category = NavigationProperty::new("Category", "Shop.Category");
        assert_eq!(category.nav_type(), NavType::Entity);
        assert_eq!(category.target_type(), "Shop.Category");
    }

    #[test]
    fn test_atom_link_type() {
        assert_eq!(
            NavType::from_atom_type("application/atom+xml;type=feed"),
            Some(NavType::Collection)
        );
        assert_eq!(
            NavType::from_atom_type("application/atom+xml;type=entry"),
            Some(NavType::Entity)
        );
        assert_eq!(NavType::from_atom_type("text/html"), None);
    }

    const SCHEMA: &str = r#"<Schema Namespace="NavTest">
        <EntityType Name="Category">
            <Key><PropertyRef Name="ID"/></Key>
            <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
            <Property Name="Name" Type="Edm.String"/>
        </EntityType>
    </Schema>"#;

    fn proxy(inline: Option<Fragment>, href: Option<&str>) -> NavigationProxy {
        let schema = Arc::new(Schema::parse(SCHEMA, true).unwrap());
        NavigationProxy::new(
            NavigationProperty::new("Categories", "Collection(NavTest.Category)"),
            href.map(String::from),
            inline,
            None,
            schema,
        )
    }

    #[test]
    fn test_inline_json_needs_no_request() {
        let inline = Fragment::Json(serde_json::json!([
            {"ID": 1, "Name": "Food"},
            {"ID": 2, "Name": "Drink"}
        ]));
        let proxy = proxy(Some(inline), None);
        assert!(proxy.is_expanded());

        let mut categories = proxy.entities().unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[1].get("Name").unwrap(), crate::model::Value::from("Drink"));
    }

    #[test]
    fn test_missing_link_and_service() {
        let err = proxy(None, None).entities().unwrap_err();
        assert!(err.to_string().contains("Categories"));

        // a link without a registered service cannot be followed
        let err = proxy(None, Some("Categories")).entities().unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
