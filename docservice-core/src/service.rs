//! Model services: single-document operations over a persistence backend.
//!
//! A [`ModelService`] binds a typed [`Document`] to the [`PersistenceBackend`] storing
//! it. It validates ids before they reach the backend, normalizes backend failures into
//! [`ServiceError`]s and fires lifecycle events. Bulk operations live in
//! [`bulk`](crate::bulk).
//!
//! # Example
//!
//! ```ignore
//! use docservice::service::ModelService;
//! use bson::doc;
//!
//! let service = ModelService::<Picture, _>::new(backend);
//! let picture = service.create_one(doc! { "title": "Sunset", "likes": 3 }).await?;
//!
//! let result = service.update_by_id(picture.id, doc! { "likes": 4 }).await?;
//! assert!(result.updated.is_some());
//!
//! let page = service
//!     .get_paginated(&QueryParams::from([("likes__gte", "2"), ("order", "-likes")]))
//!     .await?;
//! ```

use serde::Serialize;
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::{
    backend::{PersistenceBackend, SharedBackend, UpdateOptions},
    context::{ContextCapable, ServiceContext},
    document::{Document, DocumentExt, DocumentId, IntoDocumentId, RawDocument},
    error::{ServiceError, ServiceResult},
    events::{EventBus, EventName, EventObserver, ServiceEvent},
    page::{PaginationDefaults, PaginationEnvelope, PaginationResolver, Paginated},
    params::QueryParams,
    query::Criteria,
    schema::{Schema, SchemaProvider},
    translate::FilterTranslator,
};

/// Page size used by bulk operations when the request does not set one.
pub const BULK_LIMIT: u64 = 1_000_000_000;

/// Settings applied to every service built by a
/// [`ServiceFactory`](crate::registry::ServiceFactory).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub pagination: PaginationDefaults,
    pub bulk_limit: u64,
    pub acl_check: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            pagination: PaginationDefaults::default(),
            bulk_limit: BULK_LIMIT,
            acl_check: true,
        }
    }
}

/// Outcome of [`ModelService::update_by_id`].
///
/// `document` is unset when no document has the id. Otherwise exactly one of
/// `updated` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateResult<D> {
    /// The document as it was before the update.
    pub document: Option<D>,
    /// The document as it is after the update.
    pub updated: Option<D>,
    pub error: Option<ServiceError>,
}

impl<D> UpdateResult<D> {
    pub fn not_found() -> Self {
        Self { document: None, updated: None, error: None }
    }

    pub fn updated(document: D, updated: D) -> Self {
        Self { document: Some(document), updated: Some(updated), error: None }
    }

    pub fn failed(document: D, error: ServiceError) -> Self {
        Self { document: Some(document), updated: None, error: Some(error) }
    }

    pub fn is_found(&self) -> bool {
        self.document.is_some()
    }
}

/// Query building over a model schema.
pub trait Queryable {
    fn schema(&self) -> &Schema;

    fn pagination_defaults(&self) -> PaginationDefaults;

    fn is_property_queryable(&self, name: &str) -> bool {
        self.schema().is_queryable(name)
    }

    /// Translates filter parameters into criteria.
    fn criteria_for(&self, params: &QueryParams) -> ServiceResult<Criteria> {
        FilterTranslator::new(self.schema()).translate(params)
    }

    /// Resolves the page, page size and sort order of a listing request.
    fn pagination_for(&self, params: &QueryParams) -> PaginationEnvelope {
        PaginationResolver::new(self.schema(), self.pagination_defaults()).resolve(params)
    }
}

/// A service bound to one document type and its backend.
pub struct ModelService<D: Document, B: PersistenceBackend = SharedBackend> {
    pub(crate) backend: B,
    pub(crate) events: EventBus<D>,
    pub(crate) context: ServiceContext,
    pub(crate) settings: ServiceSettings,
    _marker: PhantomData<fn() -> D>,
}

impl<D: Document, B: PersistenceBackend> ModelService<D, B> {
    pub fn new(backend: B) -> Self {
        Self::with_settings(backend, ServiceSettings::default())
    }

    pub fn with_settings(backend: B, settings: ServiceSettings) -> Self {
        Self {
            backend,
            events: EventBus::new(),
            context: ServiceContext {
                user: None,
                acl_check: settings.acl_check,
            },
            settings,
            _marker: PhantomData,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventBus<D> {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus<D> {
        &mut self.events
    }

    /// Registers an observer for one event.
    pub fn on(&mut self, event: EventName, observer: impl EventObserver<D> + 'static) -> &mut Self {
        self.events.on(event, observer);
        self
    }

    pub(crate) fn emit(&self, event: ServiceEvent<D>) {
        self.events.emit(&event);
    }

    fn decode(raw: RawDocument) -> ServiceResult<D> {
        D::from_raw(raw)
    }

    /// Returns the documents matching `criteria`.
    pub async fn get(&self, criteria: &Criteria) -> ServiceResult<Vec<D>> {
        self.backend
            .find(criteria)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    /// Returns the first document matching `criteria`.
    pub async fn get_one(&self, criteria: &Criteria) -> ServiceResult<Option<D>> {
        self.backend.find_one(criteria).await?.map(Self::decode).transpose()
    }

    /// Looks a document up by id.
    ///
    /// # Errors
    ///
    /// `Validation` when `id` is not a positive integer. The backend is not contacted.
    pub async fn get_by_id(&self, id: impl IntoDocumentId) -> ServiceResult<Option<D>> {
        let id = id.into_document_id()?;
        self.get_one(&Criteria::by_id(id)).await
    }

    /// Persists a new document built from `params` and fires `created`.
    pub async fn create_one(&self, params: RawDocument) -> ServiceResult<D> {
        let saved = self.backend.save(params).await.map_err(|err| {
            debug!(model = D::model_name(), error = %err, "create_one failed");
            ServiceError::from(err)
        })?;

        let document = Self::decode(saved)?;
        self.emit(ServiceEvent::Created(document.clone()));
        Ok(document)
    }

    /// Applies `patch` to the document with the given id.
    ///
    /// Failures after the document was found are reported in the returned
    /// [`UpdateResult`] rather than as `Err`. An empty patch succeeds without
    /// contacting the backend's update path and fires no event.
    pub async fn update_by_id(
        &self,
        id: impl IntoDocumentId,
        patch: RawDocument,
    ) -> ServiceResult<UpdateResult<D>> {
        let id = id.into_document_id()?;

        let Some(original) = self.get_by_id(id).await? else {
            return Ok(UpdateResult::not_found());
        };

        if patch.is_empty() {
            return Ok(UpdateResult::updated(original.clone(), original));
        }

        let outcome = self
            .backend
            .update(&Criteria::by_id(id), patch, UpdateOptions::single())
            .await;

        let result = match outcome {
            Ok(outcome) if outcome.ok && outcome.modified == 1 => {
                match self.get_by_id(id).await {
                    Ok(Some(updated)) => {
                        self.emit(ServiceEvent::Updated {
                            document: original.clone(),
                            updated: updated.clone(),
                        });
                        UpdateResult::updated(original, updated)
                    }
                    Ok(None) => UpdateResult::failed(
                        original,
                        ServiceError::uncaught(format!("document {id} vanished after update")),
                    ),
                    Err(err) => UpdateResult::failed(original, err),
                }
            }
            Ok(outcome) => {
                warn!(
                    model = D::model_name(),
                    %id,
                    ok = outcome.ok,
                    modified = outcome.modified,
                    "update was not applied"
                );
                UpdateResult::failed(original, ServiceError::uncaught("Model update error"))
            }
            Err(err) => {
                debug!(model = D::model_name(), %id, error = %err, "update_by_id failed");
                UpdateResult::failed(original, err.into())
            }
        };

        Ok(result)
    }

    /// Deletes the document with the given id and returns it.
    ///
    /// # Errors
    ///
    /// - `Validation` for an invalid id.
    /// - `NotFound` when no document has the id.
    /// - `Uncaught` when the removal could not be confirmed.
    pub async fn delete_by_id(&self, id: impl IntoDocumentId) -> ServiceResult<D> {
        let id = id.into_document_id()?;

        let Some(target) = self.get_by_id(id).await? else {
            return Err(ServiceError::not_found(format!(
                "{} {id} not found",
                D::model_name()
            )));
        };

        let mut deleted = self.delete_documents(vec![target]).await?;
        match (deleted.pop(), deleted.is_empty()) {
            (Some(document), true) => Ok(document),
            _ => Err(ServiceError::uncaught("Error while deleting the item")),
        }
    }

    /// Returns one page of the documents matching the filter parameters.
    ///
    /// The reserved `page`, `limit` and `order` parameters select the page.
    pub async fn get_paginated(&self, params: &QueryParams) -> ServiceResult<Paginated<D>> {
        let criteria = self.criteria_for(params)?;
        let envelope = self.pagination_for(params);

        self.backend
            .paginate(&criteria, &envelope)
            .await?
            .try_map(Self::decode)
    }

    /// Ids of the documents in `documents`, in order.
    pub(crate) fn ids_of(documents: &[D]) -> Vec<DocumentId> {
        documents.iter().map(Document::id).collect()
    }
}

impl<D: Document, B: PersistenceBackend> Queryable for ModelService<D, B> {
    fn schema(&self) -> &Schema {
        self.backend.properties()
    }

    fn pagination_defaults(&self) -> PaginationDefaults {
        self.settings.pagination
    }
}

impl<D: Document, B: PersistenceBackend> ContextCapable for ModelService<D, B> {
    fn context(&self) -> &ServiceContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut ServiceContext {
        &mut self.context
    }
}

impl<D: Document, B: PersistenceBackend> std::fmt::Debug for ModelService<D, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelService")
            .field("model", &D::model_name())
            .field("backend", &self.backend)
            .field("events", &self.events)
            .field("context", &self.context)
            .field("settings", &self.settings)
            .finish()
    }
}
