//! In-memory persistence backend.
//!
//! Documents of one model are kept in an id-ordered map behind an async-aware
//! read-write lock. Ids are assigned from an auto-increment counter and the
//! `created_at`/`updated_at` timestamps are stamped when the schema declares them.

use async_trait::async_trait;
use bson::{Bson, DateTime};
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};
use tracing::debug;

use docservice_core::{
    backend::{BackendBuilder, PersistenceBackend, RemoveOutcome, UpdateOptions, UpdateOutcome},
    document::{DocumentId, ID_FIELD, RawDocument},
    error::{BackendError, BackendResult, ValidationDetail},
    page::{PaginationEnvelope, Paginated},
    query::{Criteria, Sort, SortDirection},
    schema::{CREATED_AT_FIELD, Schema, SchemaProvider, UPDATED_AT_FIELD},
};

use crate::evaluator::{DocumentEvaluator, compare_field};

#[derive(Debug, Default)]
struct Collection {
    documents: BTreeMap<DocumentId, RawDocument>,
    /// Highest id handed out or stored so far.
    last_id: i64,
}

impl Collection {
    fn matching_ids(&self, criteria: &Criteria) -> BackendResult<Vec<DocumentId>> {
        let mut ids = Vec::new();
        for (id, document) in &self.documents {
            if DocumentEvaluator::new(document).matches(criteria)? {
                ids.push(*id);
            }
        }
        Ok(ids)
    }
}

fn sort_documents(documents: &mut [RawDocument], sort: &[Sort]) {
    if sort.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        sort.iter().fold(Ordering::Equal, |ordering, key| {
            ordering.then_with(|| {
                let ordering = compare_field(a, b, &key.field);
                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
        })
    });
}

/// Thread-safe in-memory backend for one model.
///
/// `InMemoryBackend` is cloneable; clones share the same documents.
///
/// # Example
///
/// ```ignore
/// use docservice_memory::InMemoryBackend;
/// use docservice::backend::{BackendBuilder, PersistenceBackend};
/// use bson::doc;
///
/// let backend = InMemoryBackend::builder()
///     .with_schema(schema)
///     .with_document(doc! { "title": "Sunset", "likes": 3 })
///     .build()
///     .await?;
///
/// let saved = backend.save(doc! { "title": "Sunrise" }).await?;
/// assert_eq!(saved.get_i64("id")?, 2);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryBackend {
    schema: Arc<Schema>,
    collection: Arc<RwLock<Collection>>,
}

impl InMemoryBackend {
    /// Creates an empty backend storing documents described by `schema`.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
            collection: Arc::new(RwLock::new(Collection::default())),
        }
    }

    pub fn builder() -> InMemoryBackendBuilder {
        InMemoryBackendBuilder::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.collection.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn stamp(&self, document: &mut RawDocument, field: &str, now: DateTime, overwrite: bool) {
        if self.schema.contains(field) && (overwrite || !document.contains_key(field)) {
            document.insert(field, Bson::DateTime(now));
        }
    }
}

impl SchemaProvider for InMemoryBackend {
    fn properties(&self) -> &Schema {
        &self.schema
    }
}

fn invalid_id(value: &Bson) -> BackendError {
    BackendError::Validation {
        message: "id must be a positive integer".to_string(),
        details: vec![ValidationDetail::format(
            ID_FIELD,
            "must be a positive integer",
            value.to_string(),
        )],
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn find(&self, criteria: &Criteria) -> BackendResult<Vec<RawDocument>> {
        let collection = self.collection.read().await;
        DocumentEvaluator::filter_documents(collection.documents.values(), criteria)
    }

    async fn find_one(&self, criteria: &Criteria) -> BackendResult<Option<RawDocument>> {
        let collection = self.collection.read().await;

        for document in collection.documents.values() {
            if DocumentEvaluator::new(document).matches(criteria)? {
                return Ok(Some(document.clone()));
            }
        }

        Ok(None)
    }

    async fn paginate(
        &self,
        criteria: &Criteria,
        envelope: &PaginationEnvelope,
    ) -> BackendResult<Paginated<RawDocument>> {
        let mut documents = self.find(criteria).await?;
        let total = documents.len() as u64;

        sort_documents(&mut documents, &envelope.sort);

        let offset = usize::try_from(envelope.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(envelope.limit).unwrap_or(usize::MAX);
        let page = documents.into_iter().skip(offset).take(limit).collect();

        Ok(envelope.page_of(page, total))
    }

    async fn save(&self, mut document: RawDocument) -> BackendResult<RawDocument> {
        let mut collection = self.collection.write().await;

        let id = match document.get(ID_FIELD) {
            None | Some(Bson::Null) => DocumentId::new(collection.last_id.saturating_add(1))
                .ok_or_else(|| BackendError::Other("id sequence exhausted".to_string()))?,
            Some(value) => DocumentId::of(&document).ok_or_else(|| invalid_id(value))?,
        };

        if collection.documents.contains_key(&id) {
            return Err(BackendError::Duplicate {
                field: Some(ID_FIELD.to_string()),
                message: format!("id {id} already exists"),
            });
        }

        document.insert(ID_FIELD, Bson::from(id));
        let now = DateTime::now();
        self.stamp(&mut document, CREATED_AT_FIELD, now, false);
        self.stamp(&mut document, UPDATED_AT_FIELD, now, false);

        self.schema.validate(&document, true)?;

        collection.last_id = collection.last_id.max(id.get());
        collection.documents.insert(id, document.clone());
        debug!(%id, "saved document");

        Ok(document)
    }

    async fn update(
        &self,
        criteria: &Criteria,
        patch: RawDocument,
        options: UpdateOptions,
    ) -> BackendResult<UpdateOutcome> {
        if let Some(value) = patch.get(ID_FIELD) {
            return Err(BackendError::Validation {
                message: "id cannot be modified".to_string(),
                details: vec![ValidationDetail::new(ID_FIELD, "immutable", "cannot be modified")
                    .with_value(value.to_string())],
            });
        }

        if options.run_validators {
            self.schema.validate(&patch, false)?;
        }

        let mut collection = self.collection.write().await;
        let mut ids = collection.matching_ids(criteria)?;
        if !options.multi {
            ids.truncate(1);
        }

        let now = DateTime::now();
        let stamps_updates = self.schema.contains(UPDATED_AT_FIELD);
        let mut modified = 0;

        for id in ids {
            let Some(document) = collection.documents.get_mut(&id) else {
                continue;
            };

            let before = document.clone();
            for (key, value) in &patch {
                document.insert(key.clone(), value.clone());
            }

            // A declared updated_at is bumped on every matched document
            if stamps_updates || *document != before {
                self.stamp(document, UPDATED_AT_FIELD, now, true);
                modified += 1;
            }
        }

        Ok(UpdateOutcome { ok: true, modified })
    }

    async fn remove(&self, criteria: &Criteria) -> BackendResult<RemoveOutcome> {
        let mut collection = self.collection.write().await;
        let ids = collection.matching_ids(criteria)?;

        let mut removed = 0;
        for id in ids {
            if collection.documents.remove(&id).is_some() {
                removed += 1;
            }
        }

        Ok(RemoveOutcome { ok: true, removed })
    }
}

/// Builder for [`InMemoryBackend`] instances, optionally seeded with documents.
#[derive(Debug, Default)]
pub struct InMemoryBackendBuilder {
    schema: Schema,
    documents: Vec<RawDocument>,
}

impl InMemoryBackendBuilder {
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Adds a document saved when the backend is built.
    pub fn with_document(mut self, document: RawDocument) -> Self {
        self.documents.push(document);
        self
    }

    pub fn with_documents(mut self, documents: impl IntoIterator<Item = RawDocument>) -> Self {
        self.documents.extend(documents);
        self
    }
}

#[async_trait]
impl BackendBuilder for InMemoryBackendBuilder {
    type Backend = InMemoryBackend;

    /// Builds the backend and saves the seed documents in order.
    async fn build(self) -> BackendResult<Self::Backend> {
        let backend = InMemoryBackend::new(self.schema);

        for document in self.documents {
            backend.save(document).await?;
        }

        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docservice_core::{
        query::Filter,
        schema::{PropertyKind, PropertySchema},
    };

    fn schema() -> Schema {
        Schema::builder()
            .number("id", false)
            .property(PropertySchema::new("title", PropertyKind::String).queryable().required())
            .number("likes", true)
            .date("created_at", false)
            .date("updated_at", false)
            .build()
    }

    async fn seeded() -> InMemoryBackend {
        InMemoryBackend::builder()
            .with_schema(schema())
            .with_documents([
                doc! { "title": "b", "likes": 5 },
                doc! { "title": "a", "likes": 5 },
                doc! { "title": "c", "likes": 1 },
            ])
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn save_assigns_ids_and_timestamps() {
        let backend = seeded().await;
        let saved = backend.save(doc! { "title": "d" }).await.unwrap();

        assert_eq!(saved.get_i64("id").unwrap(), 4);
        assert!(saved.get_datetime("created_at").is_ok());
        assert!(saved.get_datetime("updated_at").is_ok());

        let explicit = backend.save(doc! { "id": 10, "title": "e" }).await.unwrap();
        assert_eq!(explicit.get_i64("id").unwrap(), 10);
        assert_eq!(backend.save(doc! { "title": "f" }).await.unwrap().get_i64("id").unwrap(), 11);
    }

    #[tokio::test]
    async fn save_rejects_duplicates_and_invalid_documents() {
        let backend = seeded().await;

        assert!(matches!(
            backend.save(doc! { "id": 1, "title": "x" }).await,
            Err(BackendError::Duplicate { .. })
        ));
        assert!(matches!(
            backend.save(doc! { "likes": 3 }).await,
            Err(BackendError::Validation { .. })
        ));
        assert!(matches!(
            backend.save(doc! { "id": -2, "title": "x" }).await,
            Err(BackendError::Validation { .. })
        ));
        assert_eq!(backend.len().await, 3);
    }

    #[tokio::test]
    async fn paginate_sorts_on_several_keys() {
        let backend = seeded().await;
        let envelope = PaginationEnvelope::new(1, 2)
            .with_sort(Sort::desc("likes"))
            .with_sort(Sort::asc("title"));

        let page = backend.paginate(&Criteria::new(), &envelope).await.unwrap();

        let titles = page
            .docs
            .iter()
            .map(|document| document.get_str("title").unwrap())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!((page.total, page.pages), (3, 2));
    }

    #[tokio::test]
    async fn update_bumps_updated_at_even_without_changes() {
        let backend = seeded().await;
        let target = Criteria::by_id(DocumentId::new(3).unwrap());
        let before = backend.find_one(&target).await.unwrap().unwrap();

        let unchanged = backend
            .update(&target, doc! { "likes": 1 }, UpdateOptions::single())
            .await
            .unwrap();
        assert_eq!(unchanged, UpdateOutcome { ok: true, modified: 1 });

        let after = backend.find_one(&target).await.unwrap().unwrap();
        assert_eq!(after.get("likes"), before.get("likes"));
        assert!(after.get_datetime("updated_at").unwrap() >= before.get_datetime("updated_at").unwrap());
    }

    #[tokio::test]
    async fn update_counts_only_modified_documents_without_updated_at() {
        let backend = InMemoryBackend::builder()
            .with_schema(Schema::builder().string("title", true).number("likes", true).build())
            .with_documents([
                doc! { "title": "b", "likes": 5 },
                doc! { "title": "a", "likes": 5 },
                doc! { "title": "c", "likes": 1 },
            ])
            .build()
            .await
            .unwrap();
        let criteria = Criteria::new().and(Filter::eq("likes", 5));

        let single = backend
            .update(&criteria, doc! { "likes": 6 }, UpdateOptions::single())
            .await
            .unwrap();
        assert_eq!(single, UpdateOutcome { ok: true, modified: 1 });

        let unchanged = backend
            .update(&Criteria::by_id(DocumentId::new(3).unwrap()), doc! { "likes": 1 }, UpdateOptions::single())
            .await
            .unwrap();
        assert_eq!(unchanged.modified, 0);

        let multi = backend
            .update(
                &Criteria::new(),
                doc! { "likes": 0 },
                UpdateOptions { multi: true, run_validators: true },
            )
            .await
            .unwrap();
        assert_eq!(multi.modified, 3);
    }

    #[tokio::test]
    async fn update_validates_patch_kinds() {
        let backend = seeded().await;
        let result = backend
            .update(&Criteria::new(), doc! { "likes": "many" }, UpdateOptions::single())
            .await;

        assert!(matches!(result, Err(BackendError::Validation { .. })));
    }

    #[tokio::test]
    async fn remove_reports_removed_count() {
        let backend = seeded().await;
        let ids = [1, 3, 99].into_iter().filter_map(DocumentId::new);

        let outcome = backend.remove(&Criteria::by_ids(ids)).await.unwrap();

        assert_eq!(outcome, RemoveOutcome { ok: true, removed: 2 });
        assert_eq!(backend.len().await, 1);
    }
}
