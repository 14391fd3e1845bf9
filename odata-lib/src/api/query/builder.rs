//! Query builder for entity sets.

use std::fmt;
use std::sync::Arc;

use crate::api::query::Criteria;
use crate::api::query::OrderBy;
use crate::api::query::Page;
use crate::client::RequestOptions;
use crate::client::Service;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::Entity;
use crate::model::EntityOptions;

use super::pages::Batches;
use super::pages::Entities;
use super::pages::Pages;

/// Builder for queries against one entity set.
///
/// Use [`EntitySet::query`](crate::api::EntitySet::query) to create one.
///
/// # Example
///
/// ```ignore
/// let products = service.entity_set("Products")?;
/// let query = products.query();
/// let cheap = query.criteria("Price").lt(10);
///
/// for product in query.filter(cheap).order_by("Name").limit(20).iter() {
///     let mut product = product?;
///     println!("{}", product.get("Name")?);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    service: Arc<Service>,
    entity_set: String,
    options: EntityOptions,
    filters: Vec<Criteria>,
    search: Vec<String>,
    order_by: OrderBy,
    expand: Vec<String>,
    select: Vec<String>,
    include_count: bool,
    skip: usize,
    top: usize,
}

impl Query {
    /// Creates a query for an entity set.
    pub fn new(service: Arc<Service>, entity_set: impl Into<String>, options: EntityOptions) -> Self {
        Self {
            service,
            entity_set: entity_set.into(),
            options,
            filters: Vec::new(),
            search: Vec::new(),
            order_by: OrderBy::default(),
            expand: Vec::new(),
            select: Vec::new(),
            include_count: false,
            skip: 0,
            top: 0,
        }
    }

    /// Returns the entity set name.
    pub fn entity_set(&self) -> &str {
        &self.entity_set
    }

    /// Returns the options given to every entity built from results.
    pub fn options(&self) -> &EntityOptions {
        &self.options
    }

    /// Creates criteria on a property of the queried entity type.
    ///
    /// Declared properties bind their schema template so that literals are
    /// typed; other names (navigation properties, paths) stay unbound.
    pub fn criteria(&self, property: &str) -> Criteria {
        match self
            .options
            .schema()
            .property_template(self.options.entity_type(), property)
        {
            Ok(template) => Criteria::bound(template),
            Err(_) => Criteria::new(property),
        }
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Adds a filter. Filters are joined with `and`.
    pub fn filter(mut self, criteria: Criteria) -> Self {
        self.filters.push(criteria);
        self
    }

    /// Adds a search term. Terms are joined with `AND`.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search.push(term.into());
        self
    }

    /// Adds fields to `$select`.
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select.extend(fields.iter().map(|s| (*s).to_string()));
        self
    }

    /// Adds navigation properties to `$expand`.
    pub fn expand(mut self, navigation: &[&str]) -> Self {
        self.expand.extend(navigation.iter().map(|s| (*s).to_string()));
        self
    }

    /// Adds an ordering.
    pub fn order_by(mut self, order: impl Into<OrderBy>) -> Self {
        self.order_by = std::mem::take(&mut self.order_by).then(order.into());
        self
    }

    /// Skips the first `n` results.
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    /// Limits the number of results (`$top`). Zero means no limit.
    pub fn limit(mut self, n: usize) -> Self {
        self.top = n;
        self
    }

    /// Requests the inline total count (`$count=true`).
    pub fn include_count(mut self) -> Self {
        self.include_count = true;
        self
    }

    // =========================================================================
    // URL assembly
    // =========================================================================

    /// Returns the query options in wire order: `$filter`, `$search`,
    /// `$orderby`, `$expand`, `$select`, `$count`, `$skip`, `$top`.
    ///
    /// Options with nothing to say are left out.
    pub fn assemble_criteria(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if !self.filters.is_empty() {
            let filters: Vec<_> = self.filters.iter().map(|c| c.to_string()).collect();
            params.push(("$filter", filters.join(" and ")));
        }
        if !self.search.is_empty() {
            params.push(("$search", self.search.join(" AND ")));
        }
        if !self.order_by.is_empty() {
            params.push(("$orderby", self.order_by.to_string()));
        }
        if !self.expand.is_empty() {
            params.push(("$expand", self.expand.join(",")));
        }
        if !self.select.is_empty() {
            params.push(("$select", self.select.join(",")));
        }
        if self.include_count {
            params.push(("$count", "true".to_string()));
        }
        if self.skip > 0 {
            params.push(("$skip", self.skip.to_string()));
        }
        if self.top > 0 {
            params.push(("$top", self.top.to_string()));
        }

        params
    }

    /// Returns the percent-encoded URL chunk sent to the service.
    pub fn url_chunk(&self) -> String {
        let params: Vec<_> = self
            .assemble_criteria()
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(&value)))
            .collect();
        with_params(&self.entity_set, &params)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Executes the query and returns the first page.
    pub fn execute(&self) -> Result<Page, Error> {
        let chunk = self.url_chunk();
        log::debug!("Executing query {}", self);
        let response = self.service.execute(&chunk, RequestOptions::default())?;
        response.page(&self.options)
    }

    /// Returns a lazy iterator over every result, following next-page links.
    pub fn iter(&self) -> Entities {
        Entities::new(self.pages())
    }

    /// Returns a lazy iterator over result pages.
    pub fn pages(&self) -> Pages {
        Pages::new(Arc::clone(&self.service), self.options.clone(), self.url_chunk())
    }

    /// Returns the first result.
    pub fn first(&self) -> Result<Option<Entity>, Error> {
        let page = self.clone().limit(1).execute()?;
        Ok(page.into_entities().into_iter().next())
    }

    /// Returns the number of matching entities via `/$count`.
    ///
    /// Only the filters apply.
    pub fn count(&self) -> Result<usize, Error> {
        let mut params = Vec::new();
        if !self.filters.is_empty() {
            let filters: Vec<_> = self.filters.iter().map(|c| c.to_string()).collect();
            params.push(format!("$filter={}", urlencoding::encode(&filters.join(" and "))));
        }
        let chunk = with_params(&format!("{}/$count", self.entity_set), &params);
        let response = self.service.execute(&chunk, RequestOptions::default())?;
        response.count().ok_or_else(|| {
            ApiError::parse_with_body(
                format!("Invalid count response for {}", self.entity_set),
                response.text(),
            )
            .into()
        })
    }

    /// Walks the results in batches of `size`, issuing one request per batch
    /// with increasing `$skip`, until an empty batch comes back.
    pub fn in_batches<F>(&self, size: usize, mut callback: F) -> Result<(), Error>
    where
        F: FnMut(Vec<Entity>),
    {
        let mut batches = self.batch_pages(size)?;
        while let Some(batch) = batches.next_batch()? {
            callback(batch);
        }
        Ok(())
    }

    /// Returns the results of [`in_batches`](Self::in_batches) as one lazy
    /// sequence. The sequence is consumed once.
    pub fn batches(&self, size: usize) -> Result<Batches, Error> {
        self.batch_pages(size)
    }

    fn batch_pages(&self, size: usize) -> Result<Batches, Error> {
        if size == 0 {
            return Err(Error::argument("batch size must be greater than zero"));
        }
        Ok(Batches::new(self.clone(), size))
    }
}

fn with_params(path: &str, params: &[String]) -> String {
    if params.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, params.join("&"))
    }
}

impl fmt::Display for Query {
    /// Renders the unencoded URL chunk, e.g. `Products?$filter=Name eq 'Bread'&$top=10`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<_> = self
            .assemble_criteria()
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        f.write_str(&with_params(&self.entity_set, &params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RawResponse;
    use crate::transport::Request;
    use crate::transport::Transport;

    struct Unreachable;

    impl Transport for Unreachable {
        fn execute(&self, _request: &Request) -> Result<RawResponse, ApiError> {
            Ok(RawResponse::new(503, "text/plain", ""))
        }
    }

    const METADATA: &str = r#"<Schema Namespace="QueryTest">
        <EntityType Name="Product">
            <Key><PropertyRef Name="ID"/></Key>
            <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
            <Property Name="Name" Type="Edm.String"/>
            <Property Name="Price" Type="Edm.Decimal"/>
        </EntityType>
        <EntityContainer Name="C"><EntitySet Name="Products" EntityType="QueryTest.Product"/></EntityContainer>
    </Schema>"#;

    fn query() -> Query {
        let service = Service::builder()
            .url("http://localhost/query-test.svc")
            .metadata_xml(METADATA)
            .transport(Unreachable)
            .build()
            .unwrap();
        service.entity_set("Products").unwrap().query()
    }

    #[test]
    fn test_empty_query() {
        let query = query();
        assert_eq!(query.to_string(), "Products");
        assert!(query.assemble_criteria().is_empty());
    }

    #[test]
    fn test_parameter_order() {
        let base = query();
        let name = base.criteria("Name").eq("Bread");
        let query = base
            .limit(10)
            .skip(5)
            .order_by("Name")
            .filter(name)
            .include_count()
            .select(&["ID", "Name"])
            .expand(&["Category"])
            .search("blue");
        assert_eq!(
            query.to_string(),
            "Products?$filter=Name eq 'Bread'&$search=blue&$orderby=Name&$expand=Category&$select=ID,Name&$count=true&$skip=5&$top=10"
        );
    }

    #[test]
    fn test_filter_and_search_joins() {
        let base = query();
        let a = base.criteria("Price").gt(2);
        let b = base.criteria("Name").contains("read");
        let query = base.filter(a).filter(b).search("a").search("b");
        let params = query.assemble_criteria();
        assert_eq!(params[0], ("$filter", "Price gt 2 and contains(Name,'read')".to_string()));
        assert_eq!(params[1], ("$search", "a AND b".to_string()));
    }

    #[test]
    fn test_url_chunk_is_encoded() {
        let base = query();
        let name = base.criteria("Name").eq("Bread");
        assert_eq!(
            base.filter(name).url_chunk(),
            "Products?$filter=Name%20eq%20%27Bread%27"
        );
    }

    #[test]
    fn test_unbound_criteria_for_navigation() {
        let query = query();
        let criteria = query.criteria("Items").any("Quantity").gt(100);
        assert_eq!(criteria.to_string(), "Items/any(d:d/Quantity gt 100)");
    }

    #[test]
    fn test_zero_batch_size() {
        assert!(matches!(query().batches(0), Err(Error::Argument(_))));
    }

    #[test]
    fn test_request_errors_propagate() {
        let err = query().execute().unwrap_err();
        assert!(matches!(err, Error::Request(_)));
    }
}
