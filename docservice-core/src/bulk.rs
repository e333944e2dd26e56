//! Multi-document update and delete with per-document accounting.
//!
//! Both operations resolve the targeted documents through
//! [`ModelService::get_paginated`], so they accept the same filter and pagination
//! parameters as a listing request. A request without a `limit` targets every
//! matching document.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::{
    backend::PersistenceBackend,
    document::{Document, DocumentId, RawDocument},
    error::{ServiceError, ServiceResult},
    events::ServiceEvent,
    params::{LIMIT_KEY, QueryParams},
    query::Criteria,
    service::{ModelService, UpdateResult},
};

/// Cardinalities of a [`BulkResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkCount {
    pub documents: usize,
    pub updated: usize,
    pub errors: usize,
}

/// Per-document outcome of a bulk update.
///
/// Fields are read-only so that `count` always matches the collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkResult {
    documents: Vec<DocumentId>,
    updated: Vec<DocumentId>,
    errors: BTreeMap<DocumentId, ServiceError>,
    count: BulkCount,
}

impl BulkResult {
    pub fn new(
        documents: Vec<DocumentId>,
        updated: Vec<DocumentId>,
        errors: BTreeMap<DocumentId, ServiceError>,
    ) -> Self {
        let count = BulkCount {
            documents: documents.len(),
            updated: updated.len(),
            errors: errors.len(),
        };
        Self { documents, updated, errors, count }
    }

    /// Ids of every targeted document, in processing order.
    pub fn documents(&self) -> &[DocumentId] {
        &self.documents
    }

    /// Ids of the documents that were updated.
    pub fn updated(&self) -> &[DocumentId] {
        &self.updated
    }

    /// Failures keyed by document id.
    pub fn errors(&self) -> &BTreeMap<DocumentId, ServiceError> {
        &self.errors
    }

    pub fn count(&self) -> BulkCount {
        self.count
    }
}

impl<D: Document, B: PersistenceBackend> ModelService<D, B> {
    fn unbounded(&self, params: &QueryParams) -> QueryParams {
        let mut params = params.clone();
        if params.is_unset(LIMIT_KEY) {
            params.insert(LIMIT_KEY, self.settings.bulk_limit.to_string());
        }
        params
    }

    async fn targets(&self, params: &QueryParams) -> ServiceResult<Vec<D>> {
        Ok(self.get_paginated(&self.unbounded(params)).await?.docs)
    }

    /// Applies `patch` to every matching document, one at a time.
    ///
    /// A failing document is recorded in [`BulkResult::errors`] and processing moves on
    /// to the next one. Each updated document fires `updated`.
    pub async fn update(&self, params: &QueryParams, patch: RawDocument) -> ServiceResult<BulkResult> {
        let ids = Self::ids_of(&self.targets(params).await?);

        let mut updated = Vec::new();
        let mut errors = BTreeMap::new();

        for &id in &ids {
            match self.update_by_id(id, patch.clone()).await {
                Ok(UpdateResult { document, updated: Some(after), .. }) => {
                    updated.push(id);
                    if let Some(document) = document {
                        self.emit(ServiceEvent::Updated { document, updated: after });
                    }
                }
                Ok(UpdateResult { error: Some(err), .. }) => {
                    errors.insert(id, err);
                }
                Ok(_) => debug!(model = D::model_name(), %id, "document disappeared before update"),
                Err(err) => {
                    debug!(model = D::model_name(), %id, error = %err, "bulk update item failed");
                    errors.insert(id, err);
                }
            }
        }

        Ok(BulkResult::new(ids, updated, errors))
    }

    /// Removes every matching document and returns the ones confirmed gone.
    ///
    /// Each confirmed document fires `deleted`. A document still present after the
    /// removal is left out of the result without an error.
    ///
    /// # Errors
    ///
    /// `Uncaught` when the backend does not acknowledge the removal.
    pub async fn delete(&self, params: &QueryParams) -> ServiceResult<Vec<D>> {
        let targets = self.targets(params).await?;
        self.delete_documents(targets).await
    }

    pub(crate) async fn delete_documents(&self, targets: Vec<D>) -> ServiceResult<Vec<D>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let ids = Self::ids_of(&targets);
        let outcome = self.backend.remove(&Criteria::by_ids(ids.iter().copied())).await?;
        if !outcome.ok {
            warn!(model = D::model_name(), count = ids.len(), "removal was not acknowledged");
            return Err(ServiceError::uncaught("unable to delete the items"));
        }

        let still_present = self
            .backend
            .find(&Criteria::by_ids(ids))
            .await?
            .iter()
            .filter_map(DocumentId::of)
            .collect::<HashSet<_>>();

        let deleted = targets
            .into_iter()
            .filter(|document| {
                let gone = !still_present.contains(&document.id());
                if !gone {
                    debug!(model = D::model_name(), id = %document.id(), "document survived removal");
                }
                gone
            })
            .collect::<Vec<_>>();

        for document in &deleted {
            self.emit(ServiceEvent::Deleted(document.clone()));
        }

        Ok(deleted)
    }
}
