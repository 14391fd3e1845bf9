//! Server-supplied error details

use std::collections::HashMap;

/// Detailed error information from an OData error payload.
///
/// OData services report failures as `{"error": {"code", "message", "innererror"}}`
/// in JSON or `<error><code/><message/></error>` in XML. Either shape is
/// parsed into this structure so the server's explanation can be composed
/// into the [`RequestError`](super::RequestError) message.
#[derive(Debug, Clone, PartialEq)]
pub struct ODataErrorDetail {
    /// The service-specific error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Nested inner error, if any.
    pub inner_error: Option<Box<ODataErrorDetail>>,
    /// Additional error metadata.
    pub additional_info: HashMap<String, serde_json::Value>,
}

impl ODataErrorDetail {
    /// Creates a new error detail with the given code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            inner_error: None,
            additional_info: HashMap::new(),
        }
    }

    /// Extracts error details from a response body, if it has a recognizable shape.
    pub fn from_body(body: &str) -> Option<Self> {
        let trimmed = body.trim_start();
        if trimmed.starts_with('{') {
            let json: serde_json::Value = serde_json::from_str(trimmed).ok()?;
            Self::from_json(json.get("error").or(json.get("odata.error"))?)
        } else if trimmed.starts_with('<') {
            Self::from_xml(trimmed)
        } else {
            None
        }
    }

    fn from_json(error: &serde_json::Value) -> Option<Self> {
        let object = error.as_object()?;
        let code = object
            .get("code")
            .and_then(|c| c.as_str())
            .unwrap_or_default();
        // v2 services nest the text: {"message": {"lang": "en-US", "value": "..."}}
        let message = match object.get("message") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Object(m)) => m
                .get("value")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        };

        let mut detail = Self::new(code, message);
        for (key, value) in object {
            match key.as_str() {
                "code" | "message" => {}
                "innererror" => {
                    detail.inner_error = Self::from_json(value).map(Box::new);
                }
                _ => {
                    detail.additional_info.insert(key.clone(), value.clone());
                }
            }
        }
        Some(detail)
    }

    fn from_xml(body: &str) -> Option<Self> {
        let doc = roxmltree::Document::parse(body).ok()?;
        let root = doc.root_element();
        if !root.has_tag_name("error") {
            return None;
        }
        let text_of = |name: &str| {
            root.children()
                .find(|n| n.has_tag_name(name))
                .and_then(|n| n.text())
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        Some(Self::new(text_of("code"), text_of("message")))
    }

    /// Returns the innermost error in the chain.
    pub fn innermost(&self) -> &ODataErrorDetail {
        let mut current = self;
        while let Some(inner) = &current.inner_error {
            current = inner;
        }
        current
    }

    /// Checks if this error or any inner error has the given code.
    pub fn has_code(&self, code: &str) -> bool {
        if self.code == code {
            return true;
        }
        if let Some(inner) = &self.inner_error {
            return inner.has_code(code);
        }
        false
    }
}

impl std::fmt::Display for ODataErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.code.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "[{}] {}", self.code, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_error() {
        let body = r#"{"error": {"code": "E42", "message": "Resource not found for the segment 'Products'."}}"#;
        let detail = ODataErrorDetail::from_body(body).unwrap();
        assert_eq!(detail.code, "E42");
        assert_eq!(detail.message, "Resource not found for the segment 'Products'.");
    }

    #[test]
    fn test_parse_v2_json_error() {
        let body = r#"{"odata.error": {"code": "", "message": {"lang": "en-US", "value": "Bad key"}}}"#;
        let detail = ODataErrorDetail::from_body(body).unwrap();
        assert_eq!(detail.message, "Bad key");
        assert_eq!(detail.to_string(), "Bad key");
    }

    #[test]
    fn test_parse_xml_error() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<error xmlns="http://docs.oasis-open.org/odata/ns/metadata">
  <code>E1</code>
  <message>Something broke</message>
</error>"#;
        let detail = ODataErrorDetail::from_body(body).unwrap();
        assert_eq!(detail.to_string(), "[E1] Something broke");
    }

    #[test]
    fn test_inner_error_chain() {
        let body = r#"{"error": {"code": "outer", "message": "m", "innererror": {"code": "inner", "message": "deep"}}}"#;
        let detail = ODataErrorDetail::from_body(body).unwrap();
        assert!(detail.has_code("inner"));
        assert_eq!(detail.innermost().message, "deep");
    }

    #[test]
    fn test_plain_body_has_no_detail() {
        assert!(ODataErrorDetail::from_body("Not Found").is_none());
    }
}
