//! OData service client

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::api::EntitySet;
use crate::error::ApiError;
use crate::error::Error;
use crate::error::RequestError;
use crate::error::SchemaError;
use crate::model::EntityOptions;
use crate::registry::ServiceRegistry;
use crate::response::Response;
use crate::schema::EntitySetDef;
use crate::schema::Schema;
use crate::transport::HttpTransport;
use crate::transport::Method;
use crate::transport::RawResponse;
use crate::transport::Request;
use crate::transport::Transport;

/// Payload format requested through the `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferredFormat {
    /// `application/json`
    #[default]
    Json,
    /// `application/atom+xml`
    Atom,
}

impl PreferredFormat {
    fn accept(&self) -> &'static str {
        match self {
            PreferredFormat::Json => "application/json",
            PreferredFormat::Atom => "application/atom+xml,application/xml;q=0.9",
        }
    }
}

/// Service-wide configuration.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use odata_lib::ServiceOptions;
///
/// let options = ServiceOptions::default()
///     .with_name("demo")
///     .with_strict(false)
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(options.name.as_deref(), Some("demo"));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Registry name. Defaults to the service URL.
    pub name: Option<String>,
    /// Whether property range checks apply.
    ///
    /// Default: `true`
    pub strict: bool,
    /// Timeout handed to the transport with every request.
    pub timeout: Option<Duration>,
    /// Headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Preferred payload format.
    ///
    /// Default: JSON
    pub format: PreferredFormat,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            name: None,
            strict: true,
            timeout: None,
            headers: Vec::new(),
            format: PreferredFormat::Json,
        }
    }
}

impl ServiceOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the registry name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets whether range checks apply.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the preferred payload format.
    pub fn with_format(mut self, format: PreferredFormat) -> Self {
        self.format = format;
        self
    }
}

/// Per-request options for [`Service::execute`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method (default `GET`).
    pub method: Method,
    /// Request body.
    pub body: Option<String>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Overrides the service's preferred format.
    pub format: Option<PreferredFormat>,
    /// Overrides the service's timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Sets the HTTP method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets a JSON body.
    pub fn with_json(mut self, body: &serde_json::Value) -> Self {
        self.body = Some(body.to_string());
        self.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the payload format for this request.
    pub fn with_format(mut self, format: PreferredFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets the timeout for this request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A connected OData service: its metadata and the transport to reach it.
///
/// Services are shared as `Arc<Service>` and registered in the
/// [`ServiceRegistry`] under both name and URL when built.
///
/// # Example
///
/// ```
/// use odata_lib::Service;
/// use odata_lib::transport::{RawResponse, Request, Transport};
/// use odata_lib::error::ApiError;
///
/// struct Offline;
///
/// impl Transport for Offline {
///     fn execute(&self, _request: &Request) -> Result<RawResponse, ApiError> {
///         Ok(RawResponse::new(200, "text/plain", "3"))
///     }
/// }
///
/// let service = Service::builder()
///     .url("http://localhost/shop.svc")
///     .metadata_xml(r#"<Schema Namespace="DocShop">
///         <EntityType Name="Product"><Key><PropertyRef Name="ID"/></Key>
///             <Property Name="ID" Type="Edm.Int32" Nullable="false"/></EntityType>
///         <EntityContainer Name="C"><EntitySet Name="Products" EntityType="DocShop.Product"/></EntityContainer>
///     </Schema>"#)
///     .transport(Offline)
///     .build()
///     .unwrap();
///
/// assert_eq!(service.entity_set("Products").unwrap().count().unwrap(), 3);
/// ```
pub struct Service {
    name: String,
    url: String,
    options: ServiceOptions,
    schemas: Vec<Arc<Schema>>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("options", &self.options)
            .field("schemas", &self.schemas.len())
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Creates a new builder for constructing a service.
    pub fn builder() -> ServiceBuilder<Missing> {
        ServiceBuilder::new()
    }

    /// Returns the registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the service root URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the service options.
    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Returns the schemas of the metadata document.
    pub fn schemas(&self) -> &[Arc<Schema>] {
        &self.schemas
    }

    /// Returns the schema with this namespace or alias.
    pub fn schema(&self, namespace: &str) -> Result<&Arc<Schema>, SchemaError> {
        self.schemas
            .iter()
            .find(|s| s.namespace() == namespace || s.alias() == Some(namespace))
            .ok_or_else(|| SchemaError::UnknownNamespace {
                type_name: namespace.to_string(),
            })
    }

    /// Returns the schema declaring an entity type (qualified or not).
    pub fn schema_for_type(&self, type_name: &str) -> Result<&Arc<Schema>, SchemaError> {
        if type_name.contains('.') && !self.schemas.iter().any(|s| s.owns(type_name)) {
            return Err(SchemaError::UnknownNamespace {
                type_name: type_name.to_string(),
            });
        }
        self.schemas
            .iter()
            .find(|s| s.owns(type_name) && s.has_entity_type(type_name))
            .ok_or_else(|| SchemaError::unknown_entity_type(type_name))
    }

    /// Returns every entity set of every schema.
    pub fn entity_sets(&self) -> impl Iterator<Item = &EntitySetDef> {
        self.schemas.iter().flat_map(|s| s.entity_sets().iter())
    }

    /// Returns an entity set by name.
    pub fn entity_set(self: &Arc<Self>, name: &str) -> Result<EntitySet, Error> {
        let def = self
            .entity_sets()
            .find(|s| s.name == name)
            .ok_or_else(|| SchemaError::UnknownEntitySet { name: name.to_string() })?;
        let options = self.entity_options_for_type(&def.entity_type)?.with_entity_set(def.name.clone());
        Ok(EntitySet::new(Arc::clone(self), def.name.clone(), options))
    }

    /// Returns entity options for a type, bound to this service and to the
    /// first entity set of that type.
    pub fn entity_options_for_type(&self, type_name: &str) -> Result<EntityOptions, Error> {
        let schema = self.schema_for_type(type_name)?;
        let qualified = schema.qualified(type_name);
        let mut options = EntityOptions::new(Arc::clone(schema), type_name)?.with_service_name(self.name.clone());
        if let Some(set) = self.entity_sets().find(|s| schema.qualified(&s.entity_type) == qualified) {
            options = options.with_entity_set(set.name.clone());
        }
        Ok(options)
    }

    /// Strips the service root from an absolute link.
    pub fn relative_chunk(&self, href: &str) -> String {
        let root = self.url.trim_end_matches('/');
        href.strip_prefix(root)
            .unwrap_or(href)
            .trim_start_matches('/')
            .to_string()
    }

    /// Performs a request against a URL chunk relative to the service root.
    ///
    /// Unsuccessful statuses fail with a [`RequestError`].
    pub fn execute(&self, url_chunk: &str, options: RequestOptions) -> Result<Response, Error> {
        let format = options.format.unwrap_or(self.options.format);
        let mut headers = vec![
            ("Accept".to_string(), format.accept().to_string()),
            ("OData-MaxVersion".to_string(), "4.0".to_string()),
        ];
        headers.extend(self.options.headers.iter().cloned());
        headers.extend(options.headers);

        let request = Request {
            method: options.method,
            url: join(&self.url, url_chunk),
            headers,
            body: options.body,
            timeout: options.timeout.or(self.options.timeout),
        };
        log::debug!("{} {}", request.method, url_chunk);
        let raw = send(self.transport.as_ref(), &request)?;
        let response = Response::new(raw)?;
        log::debug!("{} {} -> {} ({})", request.method, url_chunk, response.status(), response.format());
        Ok(response)
    }
}

fn join(root: &str, chunk: &str) -> String {
    if chunk.starts_with("http://") || chunk.starts_with("https://") {
        return chunk.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), chunk.trim_start_matches('/'))
}

fn send(transport: &dyn Transport, request: &Request) -> Result<RawResponse, Error> {
    let raw = transport.execute(request)?;
    if !raw.is_success() {
        return Err(RequestError::new(raw.status, raw.body).into());
    }
    Ok(raw)
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for constructing a [`Service`].
///
/// `url` is required at compile time. Without `metadata_xml`, `build()`
/// fetches `$metadata` through the transport; without `transport`, a
/// blocking HTTP transport is created.
pub struct ServiceBuilder<Url> {
    url: Url,
    metadata_xml: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    options: ServiceOptions,
}

impl ServiceBuilder<Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: Missing,
            metadata_xml: None,
            transport: None,
            options: ServiceOptions::default(),
        }
    }

    /// Sets the service root URL.
    pub fn url(self, url: impl Into<String>) -> ServiceBuilder<Set<String>> {
        ServiceBuilder {
            url: Set(url.into()),
            metadata_xml: self.metadata_xml,
            transport: self.transport,
            options: self.options,
        }
    }
}

impl Default for ServiceBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> ServiceBuilder<U> {
    /// Uses this metadata document instead of fetching `$metadata`.
    pub fn metadata_xml(mut self, xml: impl Into<String>) -> Self {
        self.metadata_xml = Some(xml.into());
        self
    }

    /// Sets the transport.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets a shared transport.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the service options.
    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }
}

impl ServiceBuilder<Set<String>> {
    /// Builds the service, parses its metadata and registers it.
    pub fn build(self) -> Result<Arc<Service>, Error> {
        let url = self.url.0.trim_end_matches('/').to_string();
        if url.trim().is_empty() {
            return Err(Error::argument("service url must not be empty"));
        }
        url::Url::parse(&url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", url, e)))?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        let options = self.options;

        let metadata = match self.metadata_xml {
            Some(xml) => xml,
            None => {
                let mut headers = vec![("Accept".to_string(), "application/xml".to_string())];
                headers.extend(options.headers.iter().cloned());
                let request = Request {
                    method: Method::Get,
                    url: join(&url, "$metadata"),
                    headers,
                    body: None,
                    timeout: options.timeout,
                };
                log::debug!("GET $metadata from {}", url);
                send(transport.as_ref(), &request)?.body
            }
        };

        let schemas = Schema::parse_metadata(&metadata, options.strict)?
            .into_iter()
            .map(Arc::new)
            .collect();
        let service = Arc::new(Service {
            name: options.name.clone().unwrap_or_else(|| url.clone()),
            url,
            options,
            schemas,
            transport,
        });

        log::info!(
            "Connected OData service {} at {} ({} schemas, {} entity sets)",
            service.name,
            service.url,
            service.schemas.len(),
            service.entity_sets().count()
        );
        ServiceRegistry::global().add(Arc::clone(&service));
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join("http://host/svc/", "/Products"), "http://host/svc/Products");
        assert_eq!(join("http://host/svc", "http://other/x"), "http://other/x");
    }

    #[test]
    fn test_options_defaults() {
        let options = ServiceOptions::default();
        assert!(options.strict);
        assert_eq!(options.format, PreferredFormat::Json);
        assert!(options.timeout.is_none());
    }

    #[test]
    fn test_invalid_url() {
        let err = Service::builder()
            .url("not a url")
            .metadata_xml("<Schema Namespace=\"X\"/>")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::InvalidUrl(_))));

        let err = Service::builder().url("").build().unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }
}
