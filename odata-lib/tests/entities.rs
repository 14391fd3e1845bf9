//! Entity lookup, navigation and writes through a fixture service.

mod common;

use odata_lib::model::Member;
use odata_lib::model::Value;
use odata_lib::transport::Method;

const BREAD: &str = r#"{
  "@odata.context": "ROOT/$metadata#Products/$entity",
  "@odata.etag": "W/\"7\"",
  "ID": 1,
  "Name": "Bread",
  "Price": 2.5,
  "Colors": "Red,Blue",
  "Category@odata.navigationLink": "ROOT/Products(1)/Category"
}"#;

#[test]
fn test_get_by_key() {
    let (service, transport) = common::service("entities-get");
    transport.json("Products(1)", BREAD);

    let mut bread = service.entity_set("Products").unwrap().get(1).unwrap();
    assert_eq!(bread.get("Name").unwrap(), Value::from("Bread"));
    assert_eq!(
        bread.get("Colors").unwrap(),
        Value::Flags(vec!["Red".to_string(), "Blue".to_string()])
    );
    assert_eq!(bread.etag(), Some("W/\"7\""));
    assert!(!bread.is_new().unwrap());
    assert_eq!(bread.id().unwrap().as_deref(), Some("Products(1)"));
}

#[test]
fn test_get_missing_entity_propagates_not_found() {
    let (service, _) = common::service("entities-missing");
    let err = service.entity_set("Products").unwrap().get(99).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("Products(99)"));
}

#[test]
fn test_navigation_follows_link() {
    let (service, transport) = common::service("entities-nav");
    transport.json("Products(1)", BREAD);
    transport.json(
        "Products(1)/Category",
        r#"{"ID": 7, "Name": "Bakery", "Office": {"Street": "Main St 1", "City": "Oslo"}}"#,
    );

    let mut bread = service.entity_set("Products").unwrap().get(1).unwrap();
    let proxy = match bread.member("Category").unwrap() {
        Member::Navigation(proxy) => proxy,
        Member::Property(_) => panic!("expected a navigation member"),
    };
    assert!(!proxy.is_expanded());
    assert_eq!(transport.requested().len(), 2);

    let mut category = proxy.entity().unwrap().unwrap();
    assert_eq!(category.entity_type(), "Category");
    assert_eq!(category.get("Name").unwrap(), Value::from("Bakery"));
    let Value::Complex(office) = category.get("Office").unwrap() else {
        panic!("expected a complex value");
    };
    assert_eq!(office["City"], Value::from("Oslo"));
}

#[test]
fn test_navigation_not_found_is_empty() {
    let (service, transport) = common::service("entities-nav-missing");
    transport.json("Products(2)", r#"{"ID": 2, "Name": "Milk"}"#);

    let milk = service.entity_set("Products").unwrap().get(2).unwrap();
    let category = milk.navigation("Category").unwrap();
    assert_eq!(category.href(), Some("Products(2)/Category"));
    assert!(category.entity().unwrap().is_none());
}

#[test]
fn test_expanded_navigation_needs_no_request() {
    let (service, transport) = common::service("entities-expand");
    transport.json(
        "Categories(7)",
        r#"{"ID": 7, "Name": "Bakery", "Products": [{"ID": 1, "Name": "Bread"}, {"ID": 4, "Name": "Bagel"}]}"#,
    );

    let bakery = service.entity_set("Categories").unwrap().get(7).unwrap();
    let products = bakery.navigation("Products").unwrap();
    assert!(products.is_expanded());
    let before = transport.requested().len();

    let names: Vec<_> = products
        .entities()
        .unwrap()
        .into_iter()
        .map(|mut p| p.get("Name").unwrap())
        .collect();
    assert_eq!(names, vec![Value::from("Bread"), Value::from("Bagel")]);
    assert_eq!(transport.requested().len(), before);
}

#[test]
fn test_save_new_entity_posts() {
    let (service, transport) = common::service("entities-post");
    transport.on(
        "Products",
        201,
        "application/json",
        r#"{"@odata.etag": "W/\"1\"", "ID": 11, "Name": "Cake"}"#,
    );

    let products = service.entity_set("Products").unwrap();
    let mut cake = products.new_entity([("Name", "Cake")]).unwrap();
    assert!(cake.is_new().unwrap());
    assert!(cake.id().unwrap().is_none());

    products.save(&mut cake).unwrap();

    let request = transport.requests().pop().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.header("Content-Type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["Name"], "Cake");
    assert_eq!(body["@odata.type"], "#Shop.Product");
    assert!(body.get("ID").is_none());

    assert_eq!(cake.get("ID").unwrap(), Value::from(11));
    assert_eq!(cake.id().unwrap().as_deref(), Some("Products(11)"));
}

#[test]
fn test_save_existing_entity_patches_with_etag() {
    let (service, transport) = common::service("entities-patch");
    transport.json("Products(1)", BREAD);

    let products = service.entity_set("Products").unwrap();
    let mut bread = products.get(1).unwrap();
    bread.set("Price", 2.75).unwrap();
    products.save(&mut bread).unwrap();

    let request = transport.requests().pop().unwrap();
    assert_eq!(request.method, Method::Patch);
    assert_eq!(request.header("If-Match"), Some("W/\"7\""));
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["Price"], 2.75);
}

#[test]
fn test_delete() {
    let (service, transport) = common::service("entities-delete");
    transport.json("Products(1)", BREAD);

    let products = service.entity_set("Products").unwrap();
    let bread = products.get(1).unwrap();
    products.delete(&bread).unwrap();

    let request = transport.requests().pop().unwrap();
    assert_eq!(request.method, Method::Delete);
    assert_eq!(request.header("If-Match"), Some("W/\"7\""));

    let unsaved = products.new_entity([("Name", "Ghost")]).unwrap();
    assert!(products.delete(&unsaved).is_err());
}

#[test]
fn test_validation_errors_surface_on_set() {
    let (service, _) = common::service("entities-validation");
    let products = service.entity_set("Products").unwrap();

    let err = products.new_entity([("Rating", 300)]).unwrap_err();
    assert!(err.to_string().contains("Rating"));

    let err = products.new_entity([("Weight", 1)]).unwrap_err();
    assert!(err.to_string().contains("Weight"));
}

#[test]
fn test_unknown_entity_set() {
    let (service, _) = common::service("entities-unknown-set");
    let err = service.entity_set("Nope").unwrap_err();
    assert_eq!(err.to_string(), "Unknown entity set: Nope");
}
