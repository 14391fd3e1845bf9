//! Entity set operations
//!
//! An [`EntitySet`] is the entry point for queries and for reading and
//! writing single entities of one set.
//!
//! # Example
//!
//! ```ignore
//! let products = service.entity_set("Products")?;
//!
//! let mut bread = products.get(1)?;
//! bread.set("Price", 2.75)?;
//! products.save(&mut bread)?;
//!
//! let mut milk = products.new_entity([("Name", "Milk")])?;
//! products.save(&mut milk)?;
//! ```

use std::sync::Arc;

use crate::api::query::Query;
use crate::client::RequestOptions;
use crate::client::Service;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::Entity;
use crate::model::EntityOptions;
use crate::model::Value;
use crate::response::Response;
use crate::transport::Method;

/// A named collection of entities exposed by a service.
#[derive(Debug, Clone)]
pub struct EntitySet {
    service: Arc<Service>,
    name: String,
    options: EntityOptions,
}

impl EntitySet {
    pub(crate) fn new(service: Arc<Service>, name: String, options: EntityOptions) -> Self {
        Self { service, name, options }
    }

    /// Returns the entity set name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning service.
    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    /// Returns the options given to entities of this set.
    pub fn options(&self) -> &EntityOptions {
        &self.options
    }

    /// Starts a query over this set.
    pub fn query(&self) -> Query {
        Query::new(Arc::clone(&self.service), self.name.clone(), self.options.clone())
    }

    /// Returns the first entity of the set.
    pub fn first(&self) -> Result<Option<Entity>, Error> {
        self.query().first()
    }

    /// Returns the number of entities in the set.
    pub fn count(&self) -> Result<usize, Error> {
        self.query().count()
    }

    /// Fetches one entity by primary key.
    ///
    /// The key is rendered through the key property's type, so
    /// `get(1)` requests `Products(1)` and `get("x")` requests `Items('x')`.
    pub fn get(&self, key: impl Into<Value>) -> Result<Entity, Error> {
        let schema = self.options.schema();
        let entity_type = self.options.entity_type();
        let mut template = schema.property_template(entity_type, &schema.primary_key_for(entity_type)?)?;
        template.set_value(key)?;
        let chunk = format!("{}({})", self.name, template.url_value()?);

        let response = self.service.execute(&chunk, RequestOptions::default())?;
        response.entities(&self.options)?.into_iter().next().ok_or_else(|| {
            ApiError::parse_with_body(format!("No entity in response for {}", chunk), response.text()).into()
        })
    }

    /// Creates an unsaved entity of this set.
    pub fn new_entity<K, V>(&self, properties: impl IntoIterator<Item = (K, V)>) -> Result<Entity, Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        Entity::with_properties(self.options.clone(), properties)
    }

    /// Saves an entity: `POST` for new entities, `PATCH` otherwise.
    ///
    /// When the service echoes the entity back, the local copy is replaced
    /// by the server's version (generated keys, new etag).
    pub fn save(&self, entity: &mut Entity) -> Result<(), Error> {
        let body = entity.to_json()?;
        let (method, chunk) = if entity.is_new()? {
            (Method::Post, self.name.clone())
        } else {
            (Method::Patch, self.entity_chunk(entity)?)
        };

        let mut options = RequestOptions::default().with_method(method).with_json(&body);
        if let (Method::Patch, Some(etag)) = (method, entity.etag()) {
            options = options.with_header("If-Match", etag);
        }

        let response = self.service.execute(&chunk, options)?;
        log::debug!("Saved {} via {} ({})", chunk, method, response.status());
        if let Some(saved) = self.echoed(&response)? {
            *entity = saved;
        }
        Ok(())
    }

    /// Deletes a persisted entity.
    pub fn delete(&self, entity: &Entity) -> Result<(), Error> {
        if entity.is_new()? {
            return Err(Error::argument(format!(
                "cannot delete an unsaved {} entity",
                entity.entity_type()
            )));
        }
        let chunk = self.entity_chunk(entity)?;
        let options = RequestOptions::default()
            .with_method(Method::Delete)
            .with_header("If-Match", entity.etag().unwrap_or("*"));
        self.service.execute(&chunk, options)?;
        log::debug!("Deleted {}", chunk);
        Ok(())
    }

    fn entity_chunk(&self, entity: &Entity) -> Result<String, Error> {
        match entity.id()? {
            Some(id) => Ok(self.service.relative_chunk(&id)),
            None => Ok(format!("{}({})", self.name, entity.key_literal()?)),
        }
    }

    fn echoed(&self, response: &Response) -> Result<Option<Entity>, Error> {
        if response.text().trim().is_empty() {
            return Ok(None);
        }
        Ok(response.entities(&self.options)?.into_iter().next())
    }
}
