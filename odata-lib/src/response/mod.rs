//! Response payloads and their wire formats
//!
//! The content type of a response picks one [`Format`] once. Each format
//! knows how to find entity fragments, the next-page link and the inline
//! count in its own document shape.

mod atom;
mod json;
mod xml;

use std::fmt;

use crate::api::query::Page;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::Entity;
use crate::model::EntityOptions;
use crate::model::Fragment;
use crate::transport::RawResponse;
use crate::xml::XmlElement;

/// A parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Atom or plain XML document (root element).
    Xml(XmlElement),
    /// JSON document.
    Json(serde_json::Value),
    /// Anything else, including empty bodies.
    Text(String),
}

/// Wire format of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Atom feeds and entries.
    Atom,
    /// OData JSON (v4 `value`/`@odata.*`, v2 `d`/`results`).
    Json,
    /// Bare XML, e.g. a `<properties>` document.
    Xml,
    /// Plain text such as `$count` results.
    Plain,
}

impl Format {
    /// Picks the format from the content type, sniffing the body when the
    /// header is missing or generic.
    pub fn detect(content_type: Option<&str>, body: &str) -> Self {
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
        let trimmed = body.trim_start();
        if content_type.contains("atom") {
            Format::Atom
        } else if content_type.contains("json") {
            Format::Json
        } else if content_type.contains("xml") || (content_type.is_empty() && trimmed.starts_with('<')) {
            if is_atom_document(trimmed) {
                Format::Atom
            } else {
                Format::Xml
            }
        } else if content_type.is_empty() && (trimmed.starts_with('{') || trimmed.starts_with('[')) {
            Format::Json
        } else {
            Format::Plain
        }
    }

    /// Parses a body in this format. Empty bodies parse as empty text.
    pub fn parse_body(&self, body: &str) -> Result<Body, Error> {
        if body.trim().is_empty() {
            return Ok(Body::Text(String::new()));
        }
        match self {
            Format::Atom | Format::Xml => XmlElement::parse(body)
                .map(Body::Xml)
                .map_err(|err| with_body(err, body).into()),
            Format::Json => serde_json::from_str(body)
                .map(Body::Json)
                .map_err(|err| with_body(ApiError::from(err), body).into()),
            Format::Plain => Ok(Body::Text(body.to_string())),
        }
    }

    /// Returns the raw entity fragments of a body.
    pub fn find_entities(&self, body: &Body) -> Vec<Fragment> {
        match (self, body) {
            (Format::Atom, Body::Xml(root)) => atom::find_entities(root),
            (Format::Xml, Body::Xml(root)) => xml::find_entities(root),
            (Format::Json, Body::Json(json)) => json::find_entities(json),
            _ => Vec::new(),
        }
    }

    /// Returns the link to the next page, if the body has one.
    pub fn next_page_link(&self, body: &Body) -> Option<String> {
        match (self, body) {
            (Format::Atom, Body::Xml(root)) => atom::next_page_link(root),
            (Format::Json, Body::Json(json)) => json::next_page_link(json),
            _ => None,
        }
    }

    /// Returns the inline (or plain `$count`) total, if present.
    pub fn count(&self, body: &Body) -> Option<usize> {
        match (self, body) {
            (Format::Atom, Body::Xml(root)) => atom::count(root),
            (Format::Json, Body::Json(json)) => json::count(json),
            (Format::Plain, Body::Text(text)) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Builds one entity from a fragment found by [`find_entities`](Self::find_entities).
    pub fn parse_one_entity(&self, fragment: &Fragment, options: EntityOptions) -> Result<Entity, Error> {
        match fragment {
            Fragment::Xml(element) => Entity::from_xml(element, options),
            Fragment::Json(json) => Entity::from_json(json, options),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Atom => "atom",
            Format::Json => "json",
            Format::Xml => "xml",
            Format::Plain => "plain",
        };
        f.write_str(name)
    }
}

fn is_atom_document(body: &str) -> bool {
    let head = body.get(..body.len().min(512)).unwrap_or(body);
    head.contains("<feed") || head.contains("<entry") || head.contains(":feed") || head.contains(":entry")
}

fn with_body(err: ApiError, body: &str) -> ApiError {
    match err {
        ApiError::Parse { message, .. } => ApiError::parse_with_body(message, body),
        other => other,
    }
}

// =============================================================================
// Response
// =============================================================================

/// A successful response with its body parsed according to its format.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    format: Format,
    text: String,
    body: Body,
}

impl Response {
    /// Detects the format of a raw response and parses its body.
    pub fn new(raw: RawResponse) -> Result<Self, Error> {
        let format = Format::detect(raw.header("Content-Type"), &raw.body);
        let body = format.parse_body(&raw.body)?;
        Ok(Self {
            status: raw.status,
            headers: raw.headers,
            format,
            text: raw.body,
            body,
        })
    }

    /// Returns the HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the first header with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the detected format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the parsed body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Returns the body as received.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Builds the entities of this response.
    pub fn entities(&self, options: &EntityOptions) -> Result<Vec<Entity>, Error> {
        self.format
            .find_entities(&self.body)
            .iter()
            .map(|fragment| self.format.parse_one_entity(fragment, options.clone()))
            .collect()
    }

    /// Returns the next-page link.
    pub fn next_page_link(&self) -> Option<String> {
        self.format.next_page_link(&self.body)
    }

    /// Returns the inline count.
    pub fn count(&self) -> Option<usize> {
        self.format.count(&self.body)
    }

    /// Builds a page: entities, next link and inline count.
    pub fn page(&self, options: &EntityOptions) -> Result<Page, Error> {
        Ok(Page::new(self.entities(options)?, self.next_page_link(), self.count()))
    }
}
