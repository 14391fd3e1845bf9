//! Owned XML element tree and escaping helpers.
//!
//! `roxmltree` documents borrow their input, which does not fit an entity
//! that keeps raw property fragments around until first access. Fragments
//! are therefore copied into [`XmlElement`], a small owned tree keyed by
//! local names.

use crate::error::ApiError;

/// Namespace of OData v4 data elements (`d:` prefix).
pub const DATA_NS: &str = "http://docs.oasis-open.org/odata/ns/data";

/// Namespace of OData v4 metadata attributes (`m:` prefix).
pub const METADATA_NS: &str = "http://docs.oasis-open.org/odata/ns/metadata";

/// Namespace of Atom documents.
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Namespace of GML geometry elements (`gml:` prefix).
pub const GML_NS: &str = "http://www.opengis.net/gml";

/// Namespace of GeoRSS elements (`georss:` prefix).
pub const GEORSS_NS: &str = "http://www.georss.org/georss";

/// An owned XML element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    /// Local tag name (no prefix).
    pub name: String,
    /// Attributes keyed by local name.
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Creates an empty element with the given local name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses a document and returns its root element.
    pub fn parse(xml: &str) -> Result<Self, ApiError> {
        let doc = roxmltree::Document::parse(xml)?;
        Ok(Self::from_node(doc.root_element()))
    }

    /// Copies a `roxmltree` element (and its subtree) into an owned element.
    pub fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let attributes = node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();
        let mut text = String::new();
        let mut children = Vec::new();
        for child in node.children() {
            if child.is_element() {
                children.push(Self::from_node(child));
            } else if child.is_text() {
                text.push_str(child.text().unwrap_or_default());
            }
        }
        Self {
            name: node.tag_name().name().to_string(),
            attributes,
            text,
            children,
        }
    }

    /// Returns an attribute value by local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns all child elements with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Returns all descendant elements (depth first) with the given local name.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            found.extend(child.descendants_named(name));
        }
        found
    }

    /// Returns `true` if the element is marked `m:null="true"`.
    pub fn is_null(&self) -> bool {
        self.attribute("null") == Some("true")
    }
}

/// Escapes a string for use in XML text and attribute values.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
