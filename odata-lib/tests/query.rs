//! Criteria rendering and query assembly against a parsed service.

mod common;

use chrono::DateTime;
use odata_lib::PreferredFormat;
use odata_lib::ServiceOptions;
use odata_lib::api::query::OrderBy;
use odata_lib::model::types::Geography;

#[test]
fn test_criteria_examples() {
    let (service, _) = common::service("query-criteria");
    let query = service.entity_set("Products").unwrap().query();

    assert_eq!(query.criteria("Name").eq("Bread").to_string(), "Name eq 'Bread'");
    assert_eq!(query.criteria("Name").contains("read").to_string(), "contains(Name,'read')");
    assert_eq!(
        query.criteria("Items").any("Quantity").gt(100).to_string(),
        "Items/any(d:d/Quantity gt 100)"
    );
}

#[test]
fn test_typed_literals() {
    let (service, _) = common::service("query-literals");
    let query = service.entity_set("Products").unwrap().query();

    let released = DateTime::parse_from_rfc3339("2024-03-01T12:00:00+00:00").unwrap();
    let rendered = query.criteria("ReleaseDate").ge(released).to_string();
    assert!(rendered.starts_with("ReleaseDate ge datetimeoffset'2024-03-01T12:00:00"));
    assert_eq!(
        query.criteria("Location").distance(Geography::point(142.1, 64.1)).lt(5).to_string(),
        "geo.distance(Location,geography'SRID=4326;Point(142.1 64.1)') lt 5"
    );
    assert_eq!(
        query.criteria("ReleaseDate").year().eq(2024).to_string(),
        "year(ReleaseDate) eq 2024"
    );
}

#[test]
fn test_query_assembly() {
    let (service, _) = common::service("query-assembly");
    let query = service.entity_set("Products").unwrap().query();
    let bread = query.criteria("Name").eq("Bread");

    let query = query.filter(bread).order_by("Name").skip(5).limit(10);
    assert_eq!(
        query.to_string(),
        "Products?$filter=Name eq 'Bread'&$orderby=Name&$skip=5&$top=10"
    );
}

#[test]
fn test_query_request() {
    let (service, transport) = common::service("query-request");
    transport.json(
        "Products?$filter=Price lt 3 and startswith(Name,'B')&$orderby=Price desc,Name&$select=ID,Name",
        r#"{"value": [{"ID": 1, "Name": "Bread"}]}"#,
    );

    let query = service.entity_set("Products").unwrap().query();
    let cheap = query.criteria("Price").lt(3);
    let b = query.criteria("Name").starts_with("B");
    let page = query
        .filter(cheap)
        .filter(b)
        .order_by(OrderBy::desc("Price"))
        .order_by("Name")
        .select(&["ID", "Name"])
        .execute()
        .unwrap();
    assert_eq!(page.len(), 1);

    let request = transport.requests().pop().unwrap();
    assert_eq!(request.header("Accept"), Some("application/json"));
    assert!(request.url.contains("$filter=Price%20lt%203%20and%20startswith"));
}

#[test]
fn test_preferred_format_and_headers() {
    let options = ServiceOptions::default()
        .with_format(PreferredFormat::Atom)
        .with_header("X-Api-Key", "secret");
    let (service, transport) = common::service_with("query-atom", options);
    transport.atom("Products", common::PRODUCTS_FEED_2);

    service.entity_set("Products").unwrap().query().execute().unwrap();

    let request = transport.requests().pop().unwrap();
    assert!(request.header("Accept").unwrap().starts_with("application/atom+xml"));
    assert_eq!(request.header("X-Api-Key"), Some("secret"));
}
