//! HTTP status errors surfaced by the service

use super::ODataErrorDetail;

/// The named error class for an unsuccessful HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 405
    MethodNotAllowed,
    /// 406
    NotAcceptable,
    /// 413
    RequestEntityTooLarge,
    /// 500
    InternalServerError,
    /// 503
    ServiceUnavailable,
    /// Any other non-success status.
    Other,
}

impl RequestErrorKind {
    /// Maps an HTTP status code to its error class.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            406 => Self::NotAcceptable,
            413 => Self::RequestEntityTooLarge,
            500 => Self::InternalServerError,
            503 => Self::ServiceUnavailable,
            _ => Self::Other,
        }
    }

    /// Returns the default message for this error class.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::BadRequest => "400 Bad Request",
            Self::Unauthorized => "401 Unauthorized Access",
            Self::Forbidden => "403 Forbidden",
            Self::NotFound => "404 Not Found",
            Self::MethodNotAllowed => "405 Method Not Allowed",
            Self::NotAcceptable => "406 Not Acceptable",
            Self::RequestEntityTooLarge => "413 Request Entity Too Large",
            Self::InternalServerError => "500 Internal Server Error",
            Self::ServiceUnavailable => "503 Service Unavailable",
            Self::Other => "Request failed",
        }
    }
}

/// An unsuccessful response from the OData service.
///
/// The message combines the default text for the status class with the
/// server's own explanation when the body carries one, e.g.
/// `404 Not Found: Resource not found for the segment 'Products'.`
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", self.message())]
pub struct RequestError {
    /// The error class.
    pub kind: RequestErrorKind,
    /// The HTTP status code.
    pub status: u16,
    /// Server-supplied error details, if the body could be parsed.
    pub detail: Option<ODataErrorDetail>,
    /// The raw response body.
    pub body: String,
}

impl RequestError {
    /// Creates a request error from a status code and response body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            kind: RequestErrorKind::from_status(status),
            status,
            detail: ODataErrorDetail::from_body(&body),
            body,
        }
    }

    /// Returns the composed error message.
    pub fn message(&self) -> String {
        let default = match self.kind {
            RequestErrorKind::Other => format!("HTTP {}", self.status),
            kind => kind.default_message().to_string(),
        };
        match &self.detail {
            Some(detail) if !detail.message.is_empty() => format!("{}: {}", default, detail.message),
            _ => default,
        }
    }

    /// Returns `true` if this is a `404 Not Found`.
    pub fn is_not_found(&self) -> bool {
        self.kind == RequestErrorKind::NotFound
    }
}
