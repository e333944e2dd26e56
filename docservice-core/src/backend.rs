//! Persistence backend abstraction for the service layer.
//!
//! A [`PersistenceBackend`] is bound to one model: it stores that model's documents,
//! exposes its [`Schema`](crate::schema::Schema) through [`SchemaProvider`], and executes
//! [`Criteria`] and [`PaginationEnvelope`]s against them. Documents are exchanged in
//! their raw BSON form and are keyed by the numeric `id` property.
//!
//! # Example
//!
//! ```ignore
//! use docservice::backend::{PersistenceBackend, UpdateOptions};
//! use docservice::query::Criteria;
//! use bson::doc;
//!
//! let saved = backend.save(doc! { "title": "Sunset" }).await?;
//! let outcome = backend
//!     .update(&Criteria::by_id(id), doc! { "title": "Sunrise" }, UpdateOptions::single())
//!     .await?;
//! assert!(outcome.ok);
//! ```

use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    document::RawDocument,
    error::BackendResult,
    page::{PaginationEnvelope, Paginated},
    query::Criteria,
    schema::SchemaProvider,
};

/// Options for [`PersistenceBackend::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Update every matching document instead of the first one.
    pub multi: bool,
    /// Validate the patch against the schema before writing.
    pub run_validators: bool,
}

impl UpdateOptions {
    /// A validated update of a single document.
    pub fn single() -> Self {
        Self { multi: false, run_validators: true }
    }
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self::single()
    }
}

/// Acknowledgement of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Whether the backend acknowledged the write.
    pub ok: bool,
    /// Number of documents modified.
    pub modified: u64,
}

/// Acknowledgement of a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// Whether the backend acknowledged the removal.
    pub ok: bool,
    /// Number of documents removed.
    pub removed: u64,
}

/// Storage capability required by the service layer.
///
/// Implementations must be thread-safe. The service layer never issues more than one
/// call at a time per operation, but several services may share a backend.
#[async_trait]
pub trait PersistenceBackend: SchemaProvider + Send + Sync + Debug {
    /// Returns every document matching `criteria`, in storage order.
    async fn find(&self, criteria: &Criteria) -> BackendResult<Vec<RawDocument>>;

    /// Returns the first document matching `criteria`.
    async fn find_one(&self, criteria: &Criteria) -> BackendResult<Option<RawDocument>>;

    /// Returns one page of the documents matching `criteria`, sorted by the envelope's
    /// sort keys.
    async fn paginate(
        &self,
        criteria: &Criteria,
        envelope: &PaginationEnvelope,
    ) -> BackendResult<Paginated<RawDocument>>;

    /// Persists a new document and returns it as stored.
    ///
    /// A document without an `id` is assigned the next free one.
    ///
    /// # Errors
    ///
    /// Validation or constraint violations are reported as
    /// [`BackendError::Validation`](crate::error::BackendError::Validation) or
    /// [`BackendError::Duplicate`](crate::error::BackendError::Duplicate).
    async fn save(&self, document: RawDocument) -> BackendResult<RawDocument>;

    /// Sets the fields of `patch` on the documents matching `criteria`.
    async fn update(
        &self,
        criteria: &Criteria,
        patch: RawDocument,
        options: UpdateOptions,
    ) -> BackendResult<UpdateOutcome>;

    /// Removes every document matching `criteria`.
    async fn remove(&self, criteria: &Criteria) -> BackendResult<RemoveOutcome>;
}

#[async_trait]
impl<B> PersistenceBackend for &B
where
    B: PersistenceBackend + ?Sized,
{
    async fn find(&self, criteria: &Criteria) -> BackendResult<Vec<RawDocument>> {
        (**self).find(criteria).await
    }

    async fn find_one(&self, criteria: &Criteria) -> BackendResult<Option<RawDocument>> {
        (**self).find_one(criteria).await
    }

    async fn paginate(
        &self,
        criteria: &Criteria,
        envelope: &PaginationEnvelope,
    ) -> BackendResult<Paginated<RawDocument>> {
        (**self).paginate(criteria, envelope).await
    }

    async fn save(&self, document: RawDocument) -> BackendResult<RawDocument> {
        (**self).save(document).await
    }

    async fn update(
        &self,
        criteria: &Criteria,
        patch: RawDocument,
        options: UpdateOptions,
    ) -> BackendResult<UpdateOutcome> {
        (**self).update(criteria, patch, options).await
    }

    async fn remove(&self, criteria: &Criteria) -> BackendResult<RemoveOutcome> {
        (**self).remove(criteria).await
    }
}

#[async_trait]
impl<B> PersistenceBackend for Arc<B>
where
    B: PersistenceBackend + ?Sized,
{
    async fn find(&self, criteria: &Criteria) -> BackendResult<Vec<RawDocument>> {
        (**self).find(criteria).await
    }

    async fn find_one(&self, criteria: &Criteria) -> BackendResult<Option<RawDocument>> {
        (**self).find_one(criteria).await
    }

    async fn paginate(
        &self,
        criteria: &Criteria,
        envelope: &PaginationEnvelope,
    ) -> BackendResult<Paginated<RawDocument>> {
        (**self).paginate(criteria, envelope).await
    }

    async fn save(&self, document: RawDocument) -> BackendResult<RawDocument> {
        (**self).save(document).await
    }

    async fn update(
        &self,
        criteria: &Criteria,
        patch: RawDocument,
        options: UpdateOptions,
    ) -> BackendResult<UpdateOutcome> {
        (**self).update(criteria, patch, options).await
    }

    async fn remove(&self, criteria: &Criteria) -> BackendResult<RemoveOutcome> {
        (**self).remove(criteria).await
    }
}

/// Type-erased backend shared between services.
pub type SharedBackend = Arc<dyn PersistenceBackend>;

/// Builder trait for constructing persistence backends.
///
/// Building is asynchronous so that backends can connect or prepare storage first.
#[async_trait]
pub trait BackendBuilder {
    type Backend: PersistenceBackend;

    async fn build(self) -> BackendResult<Self::Backend>;
}
