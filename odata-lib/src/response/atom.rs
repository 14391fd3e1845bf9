//! Atom feeds and entries

use crate::model::Fragment;
use crate::xml::XmlElement;

pub(super) fn find_entities(root: &XmlElement) -> Vec<Fragment> {
    match root.name.as_str() {
        "feed" => root
            .children_named("entry")
            .map(|entry| Fragment::Xml(entry.clone()))
            .collect(),
        "entry" => vec![Fragment::Xml(root.clone())],
        _ => Vec::new(),
    }
}

pub(super) fn next_page_link(root: &XmlElement) -> Option<String> {
    root.children_named("link")
        .find(|link| link.attribute("rel") == Some("next"))
        .and_then(|link| link.attribute("href"))
        .map(String::from)
}

pub(super) fn count(root: &XmlElement) -> Option<usize> {
    root.child("count")?.text.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:m="http://docs.oasis-open.org/odata/ns/metadata">
        <m:count>12</m:count>
        <entry><id>Products(1)</id></entry>
        <entry><id>Products(2)</id></entry>
        <link rel="self" href="Products"/>
        <link rel="next" href="http://host/svc/Products?$skiptoken=2"/>
    </feed>"#;

    #[test]
    fn test_feed() {
        let root = XmlElement::parse(FEED).unwrap();
        assert_eq!(find_entities(&root).len(), 2);
        assert_eq!(
            next_page_link(&root).as_deref(),
            Some("http://host/svc/Products?$skiptoken=2")
        );
        assert_eq!(count(&root), Some(12));
    }

    #[test]
    fn test_single_entry() {
        let root = XmlElement::parse(r#"<entry xmlns="http://www.w3.org/2005/Atom"/>"#).unwrap();
        assert_eq!(find_entities(&root).len(), 1);
        assert!(next_page_link(&root).is_none());
        assert!(count(&root).is_none());
    }
}
