//! Shared fixtures for integration tests.
//!
//! [`FixtureTransport`] serves canned responses keyed by the decoded URL
//! chunk after the service root and records every request it sees.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use odata_lib::Service;
use odata_lib::ServiceOptions;
use odata_lib::error::ApiError;
use odata_lib::transport::RawResponse;
use odata_lib::transport::Request;
use odata_lib::transport::Transport;

pub const METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="Shop" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <EnumType Name="Color" IsFlags="true">
        <Member Name="Red" Value="1"/>
        <Member Name="Green" Value="2"/>
        <Member Name="Blue" Value="4"/>
      </EnumType>
      <ComplexType Name="Address">
        <Property Name="Street" Type="Edm.String"/>
        <Property Name="City" Type="Edm.String"/>
      </ComplexType>
      <EntityType Name="Product">
        <Key><PropertyRef Name="ID"/></Key>
        <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
        <Property Name="Name" Type="Edm.String"/>
        <Property Name="Price" Type="Edm.Decimal"/>
        <Property Name="Rating" Type="Edm.Byte"/>
        <Property Name="ReleaseDate" Type="Edm.DateTimeOffset"/>
        <Property Name="Colors" Type="Shop.Color"/>
        <Property Name="Location" Type="Edm.GeographyPoint"/>
        <NavigationProperty Name="Category" Type="Shop.Category" Partner="Products"/>
      </EntityType>
      <EntityType Name="FeaturedProduct" BaseType="Shop.Product">
        <Property Name="Headline" Type="Edm.String"/>
      </EntityType>
      <EntityType Name="Category">
        <Key><PropertyRef Name="ID"/></Key>
        <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
        <Property Name="Name" Type="Edm.String"/>
        <Property Name="Office" Type="Shop.Address"/>
        <NavigationProperty Name="Products" Type="Collection(Shop.Product)" Partner="Category"/>
      </EntityType>
      <EntityContainer Name="ShopContainer">
        <EntitySet Name="Products" EntityType="Shop.Product"/>
        <EntitySet Name="Categories" EntityType="Shop.Category"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

pub const PRODUCTS_PAGE_1: &str = r#"{
  "@odata.context": "http://localhost/shop.svc/$metadata#Products",
  "@odata.count": 3,
  "value": [
    {"ID": 1, "Name": "Bread", "Price": 2.5, "Rating": 4},
    {"ID": 2, "Name": "Milk", "Price": 3.5, "Rating": 3}
  ],
  "@odata.nextLink": "ROOT/Products?$skiptoken=2"
}"#;

pub const PRODUCTS_PAGE_2: &str = r#"{
  "@odata.context": "http://localhost/shop.svc/$metadata#Products",
  "value": [
    {"ID": 3, "Name": "Vint soda", "Price": 20.9, "Rating": 3}
  ]
}"#;

pub const PRODUCTS_FEED_1: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
      xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <id>ROOT/Products</id>
  <entry>
    <id>ROOT/Products(1)</id>
    <category term="Shop.Product" scheme="http://schemas.microsoft.com/ado/2007/08/dataservices/scheme"/>
    <link rel="http://schemas.microsoft.com/ado/2007/08/dataservices/related/Category" type="application/atom+xml;type=entry" title="Category" href="Products(1)/Category"/>
    <content type="application/xml">
      <m:properties>
        <d:ID m:type="Edm.Int32">1</d:ID>
        <d:Name>Bread</d:Name>
        <d:Price m:type="Edm.Decimal">2.5</d:Price>
      </m:properties>
    </content>
  </entry>
  <link rel="next" href="ROOT/Products?$skiptoken=1"/>
</feed>"#;

pub const PRODUCTS_FEED_2: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
      xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <id>ROOT/Products</id>
  <entry>
    <id>ROOT/Products(2)</id>
    <category term="Shop.FeaturedProduct" scheme="http://schemas.microsoft.com/ado/2007/08/dataservices/scheme"/>
    <content type="application/xml">
      <m:properties>
        <d:ID m:type="Edm.Int32">2</d:ID>
        <d:Name>Milk</d:Name>
        <d:Headline>Fresh today</d:Headline>
      </m:properties>
    </content>
  </entry>
</feed>"#;

/// Canned-response transport.
#[derive(Debug)]
pub struct FixtureTransport {
    root: String,
    responses: Mutex<HashMap<String, RawResponse>>,
    requests: Mutex<Vec<Request>>,
}

impl FixtureTransport {
    pub fn new(root: &str) -> Self {
        let transport = Self {
            root: root.trim_end_matches('/').to_string(),
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        };
        transport.on("$metadata", 200, "application/xml", METADATA);
        transport
    }

    /// Serves `body` for a chunk; `ROOT` in the body expands to the service root.
    pub fn on(&self, chunk: &str, status: u16, content_type: &str, body: &str) {
        let body = body.replace("ROOT", &self.root);
        self.responses
            .lock()
            .unwrap()
            .insert(chunk.to_string(), RawResponse::new(status, content_type, body));
    }

    pub fn json(&self, chunk: &str, body: &str) {
        self.on(chunk, 200, "application/json;odata.metadata=minimal", body);
    }

    pub fn atom(&self, chunk: &str, body: &str) {
        self.on(chunk, 200, "application/atom+xml;type=feed", body);
    }

    /// Returns the decoded chunks requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|r| self.chunk(&r.url)).collect()
    }

    /// Returns the requests seen so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn chunk(&self, url: &str) -> String {
        let relative = url.strip_prefix(&self.root).unwrap_or(url).trim_start_matches('/');
        urlencoding::decode(relative)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| relative.to_string())
    }
}

impl Transport for FixtureTransport {
    fn execute(&self, request: &Request) -> Result<RawResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let chunk = self.chunk(&request.url);
        let response = self.responses.lock().unwrap().get(&chunk).cloned();
        Ok(response.unwrap_or_else(|| {
            RawResponse::new(
                404,
                "application/json",
                format!(r#"{{"error":{{"code":"","message":"Resource not found for the segment '{}'."}}}}"#, chunk),
            )
        }))
    }
}

/// Builds a service named `name` backed by a fresh fixture transport.
pub fn service(name: &str) -> (Arc<Service>, Arc<FixtureTransport>) {
    service_with(name, ServiceOptions::default())
}

pub fn service_with(name: &str, options: ServiceOptions) -> (Arc<Service>, Arc<FixtureTransport>) {
    let url = format!("http://localhost/{}.svc", name);
    let transport = Arc::new(FixtureTransport::new(&url));
    let service = Service::builder()
        .url(url)
        .shared_transport(transport.clone())
        .options(options.with_name(name))
        .build()
        .unwrap();
    (service, transport)
}
