//! Error types and result types for document service operations.
//!
//! Two error types live here:
//!
//! - [`BackendError`] is what a [`PersistenceBackend`](crate::backend::PersistenceBackend)
//!   reports when a storage call fails.
//! - [`ServiceError`] is the domain error returned to callers of the service layer.
//!
//! Converting a [`BackendError`] into a [`ServiceError`] is the normalization step that
//! every service performs before a storage failure leaves the layer.

use bson::error::Error as BsonError;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};
use serde_json::Error as SerdeJsonError;
use std::fmt;
use thiserror::Error;

/// Structured detail attached to a validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDetail {
    /// The property that failed validation.
    pub property: String,
    /// The kind of check that failed (`format`, `required`, `type`, `unique`, ...).
    pub kind: String,
    /// Human readable message.
    pub message: String,
    /// The offending value, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ValidationDetail {
    /// Creates a new validation detail.
    pub fn new(
        property: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            property: property.into(),
            kind: kind.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Creates a `format` detail for a malformed value.
    pub fn format(
        property: impl Into<String>,
        message: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(property, "format", message).with_value(value)
    }

    /// Attaches the offending value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Category of a [`ServiceError`], with the status code the calling layer should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Uncaught,
    NotImplemented,
    Unauthorized,
    Forbidden,
    Configuration,
}

impl ErrorKind {
    /// Returns the error name exposed to API consumers.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Uncaught => "UncaughtError",
            ErrorKind::NotImplemented => "NotImplementedError",
            ErrorKind::Unauthorized => "UnauthorizedError",
            ErrorKind::Forbidden => "ForbiddenError",
            ErrorKind::Configuration => "ConfigurationError",
        }
    }

    /// Returns the status code associated with this kind of error.
    ///
    /// Validation failures use the non-standard `481` code so clients can tell them
    /// apart from generic bad requests.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 481,
            ErrorKind::NotFound => 404,
            ErrorKind::Uncaught => 500,
            ErrorKind::NotImplemented => 501,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::Configuration => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Domain errors returned by the service layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Malformed or out-of-range input.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<ValidationDetail>,
    },
    /// The targeted document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// A backend failure that does not fit a known category.
    #[error("Uncaught error: {0}")]
    Uncaught(String),
    /// The requested behavior is not supported.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    /// No user is attached to the service context.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The context user is not allowed to perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The service layer was wired incorrectly.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ServiceError {
    /// Creates a validation error without details.
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Creates a validation error carrying structured details.
    pub fn validation_with(message: impl Into<String>, details: Vec<ValidationDetail>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn uncaught(message: impl Into<String>) -> Self {
        ServiceError::Uncaught(message.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        ServiceError::NotImplemented(message.into())
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation { .. } => ErrorKind::Validation,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Uncaught(_) => ErrorKind::Uncaught,
            ServiceError::NotImplemented(_) => ErrorKind::NotImplemented,
            ServiceError::Unauthorized(_) => ErrorKind::Unauthorized,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Shorthand for `self.kind().status_code()`.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Returns the message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            ServiceError::Validation { message, .. } => message,
            ServiceError::NotFound(message)
            | ServiceError::Uncaught(message)
            | ServiceError::NotImplemented(message)
            | ServiceError::Unauthorized(message)
            | ServiceError::Forbidden(message)
            | ServiceError::Configuration(message) => message,
        }
    }

    /// Returns the validation details, empty for every other kind.
    pub fn details(&self) -> &[ValidationDetail] {
        match self {
            ServiceError::Validation { details, .. } => details,
            _ => &[],
        }
    }
}

impl Serialize for ServiceError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self.kind();
        let mut state = serializer.serialize_struct("ServiceError", 4)?;
        state.serialize_field("code", &kind.status_code())?;
        state.serialize_field("name", kind.name())?;
        state.serialize_field("message", self.message())?;
        state.serialize_field("details", self.details())?;
        state.end()
    }
}

/// A specialized `Result` type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors reported by persistence backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The document failed backend-side validation.
    #[error("Document validation failed: {message}")]
    Validation {
        message: String,
        details: Vec<ValidationDetail>,
    },
    /// A unique constraint was violated.
    #[error("Duplicate key: {message}")]
    Duplicate {
        field: Option<String>,
        message: String,
    },
    /// The backend could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A document could not be converted to or from its stored form.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Other(String),
}

/// A specialized `Result` type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

impl From<BackendError> for ServiceError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Validation { message, details } => {
                ServiceError::Validation { message, details }
            }
            BackendError::Duplicate { field, message } => ServiceError::Validation {
                details: vec![ValidationDetail::new(
                    field.unwrap_or_default(),
                    "unique",
                    message.clone(),
                )],
                message,
            },
            other => ServiceError::Uncaught(other.to_string()),
        }
    }
}

impl From<BsonError> for BackendError {
    fn from(err: BsonError) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

impl From<BsonError> for ServiceError {
    fn from(err: BsonError) -> Self {
        ServiceError::Uncaught(format!("Serialization error: {err}"))
    }
}

impl From<SerdeJsonError> for ServiceError {
    fn from(err: SerdeJsonError) -> Self {
        ServiceError::Uncaught(format!("Serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicate_key_normalizes_to_validation() {
        let err: ServiceError = BackendError::Duplicate {
            field: Some("email".to_string()),
            message: "email already taken".to_string(),
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.details()[0].property, "email");
        assert_eq!(err.details()[0].kind, "unique");
    }

    #[test]
    fn connection_failure_normalizes_to_uncaught() {
        let err: ServiceError = BackendError::Connection("refused".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Uncaught);
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn serializes_to_envelope() {
        let err = ServiceError::validation_with(
            "id must be an integer",
            vec![ValidationDetail::format("id", "must be an integer", "abc")],
        );

        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "code": 481,
                "name": "ValidationError",
                "message": "id must be an integer",
                "details": [{
                    "property": "id",
                    "kind": "format",
                    "message": "must be an integer",
                    "value": "abc",
                }],
            })
        );
    }
}
