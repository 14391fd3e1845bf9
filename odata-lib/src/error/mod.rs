//! Error types

mod api;
mod detail;
mod request;
mod schema;
mod validation;

pub use api::*;
pub use detail::*;
pub use request::*;
pub use schema::*;
pub use validation::*;

/// The crate-level error type.
///
/// Property getters and setters return [`ValidationError`] directly; every
/// other fallible operation returns this enum.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A property value failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A schema or registry lookup missed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The service answered with an unsuccessful status.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The request could not be performed or its payload decoded.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Malformed input to a constructor or builder.
    #[error("Invalid argument: {0}")]
    Argument(String),
}

impl Error {
    /// Creates an argument error.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Returns `true` if this is a `404 Not Found` from the service.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Request(err) if err.is_not_found())
    }
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Self::Api(ApiError::from(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Api(ApiError::from(err))
    }
}
