//! Bare XML payloads (a `<properties>` document, no Atom envelope)

use crate::model::Fragment;
use crate::xml::XmlElement;

pub(super) fn find_entities(root: &XmlElement) -> Vec<Fragment> {
    if root.name == "properties" {
        return vec![Fragment::Xml(root.clone())];
    }
    root.descendants_named("properties")
        .into_iter()
        .map(|properties| Fragment::Xml(properties.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_document() {
        let root = XmlElement::parse(
            r#"<m:properties xmlns:m="urn:m" xmlns:d="urn:d"><d:ID>1</d:ID></m:properties>"#,
        )
        .unwrap();
        assert_eq!(find_entities(&root).len(), 1);

        let wrapped = XmlElement::parse("<root><properties/><properties/></root>").unwrap();
        assert_eq!(find_entities(&wrapped).len(), 2);
    }
}
