//! Core traits and types for document representation and identification.
//!
//! Every persisted document carries a positive integer `id`. This module provides the
//! [`Document`] trait that typed models implement, the [`DocumentId`] newtype that
//! enforces the id invariant, and [`IntoDocumentId`] which validates loosely-typed ids
//! (path parameters, JSON numbers) before they reach a backend.

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ServiceError, ServiceResult, ValidationDetail};

/// Name of the identifier property on every stored document.
pub const ID_FIELD: &str = "id";

/// Raw stored form of a document.
pub type RawDocument = bson::Document;

/// A positive integer document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct DocumentId(i64);

impl DocumentId {
    /// Creates an id, returning `None` when `value` is not positive.
    pub fn new(value: i64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Returns the raw integer value.
    pub fn get(&self) -> i64 {
        self.0
    }

    /// Reads the `id` property of a stored document.
    ///
    /// Integral doubles are accepted since some drivers widen integers on the way out.
    pub fn of(document: &RawDocument) -> Option<Self> {
        match document.get(ID_FIELD)? {
            Bson::Int32(value) => Self::new(i64::from(*value)),
            Bson::Int64(value) => Self::new(*value),
            Bson::Double(value) if value.fract() == 0.0 => Self::new(*value as i64),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for DocumentId {
    type Error = ServiceError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        value.into_document_id()
    }
}

impl From<DocumentId> for i64 {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl From<DocumentId> for Bson {
    fn from(id: DocumentId) -> Self {
        Bson::Int64(id.0)
    }
}

fn not_an_integer(value: impl Into<String>) -> ServiceError {
    ServiceError::validation_with(
        "id must be an integer",
        vec![ValidationDetail::format("id", "must be an integer", value)],
    )
}

fn not_positive(value: impl Into<String>) -> ServiceError {
    ServiceError::validation_with(
        "id must be a positive integer",
        vec![ValidationDetail::format("id", "id must be a positive integer", value)],
    )
}

/// Conversion of loosely-typed identifiers into a validated [`DocumentId`].
///
/// Fails with a validation error when the input is not an integer or not positive.
pub trait IntoDocumentId {
    fn into_document_id(self) -> ServiceResult<DocumentId>;
}

impl IntoDocumentId for DocumentId {
    fn into_document_id(self) -> ServiceResult<DocumentId> {
        Ok(self)
    }
}

impl IntoDocumentId for i64 {
    fn into_document_id(self) -> ServiceResult<DocumentId> {
        DocumentId::new(self).ok_or_else(|| not_positive(self.to_string()))
    }
}

impl IntoDocumentId for i32 {
    fn into_document_id(self) -> ServiceResult<DocumentId> {
        i64::from(self).into_document_id()
    }
}

impl IntoDocumentId for u64 {
    fn into_document_id(self) -> ServiceResult<DocumentId> {
        i64::try_from(self)
            .map_err(|_| not_an_integer(self.to_string()))?
            .into_document_id()
    }
}

impl IntoDocumentId for f64 {
    fn into_document_id(self) -> ServiceResult<DocumentId> {
        if !self.is_finite() || self.fract() != 0.0 {
            return Err(not_an_integer(self.to_string()));
        }
        (self as i64).into_document_id()
    }
}

impl IntoDocumentId for &str {
    fn into_document_id(self) -> ServiceResult<DocumentId> {
        self.trim()
            .parse::<i64>()
            .map_err(|_| not_an_integer(self))?
            .into_document_id()
    }
}

impl IntoDocumentId for String {
    fn into_document_id(self) -> ServiceResult<DocumentId> {
        self.as_str().into_document_id()
    }
}

impl IntoDocumentId for &String {
    fn into_document_id(self) -> ServiceResult<DocumentId> {
        self.as_str().into_document_id()
    }
}

/// Core trait that all typed models served by a
/// [`ModelService`](crate::service::ModelService) must implement.
///
/// # Example
///
/// ```ignore
/// use docservice::document::{Document, DocumentId};
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Picture {
///     pub id: DocumentId,
///     pub title: String,
/// }
///
/// impl Document for Picture {
///     fn id(&self) -> DocumentId {
///         self.id
///     }
///
///     fn model_name() -> &'static str {
///         "pictures"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns this document's identifier.
    fn id(&self) -> DocumentId;

    /// Returns the name of the model this document belongs to.
    ///
    /// The name is the key used to look the model's backend up in a
    /// [`ModelRegistry`](crate::registry::ModelRegistry).
    fn model_name() -> &'static str;
}

/// Extension trait converting documents to and from their stored form.
///
/// Automatically implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a raw BSON document.
    fn to_raw(&self) -> ServiceResult<RawDocument>;

    /// Creates a document from its raw BSON form.
    fn from_raw(raw: RawDocument) -> ServiceResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_raw(&self) -> ServiceResult<RawDocument> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(ServiceError::uncaught(format!(
                "{} serialized to {:?} instead of a document",
                D::model_name(),
                other.element_type()
            ))),
        }
    }

    fn from_raw(raw: RawDocument) -> ServiceResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(raw))?)
    }
}
