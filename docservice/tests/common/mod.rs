#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use docservice::{
    backend::{RemoveOutcome, UpdateOutcome},
    bson::{DateTime, doc},
    error::BackendResult,
    memory::InMemoryBackend,
    prelude::*,
    schema::SchemaProvider,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Picture {
    pub id: DocumentId,
    pub title: String,
    pub likes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Document for Picture {
    fn id(&self) -> DocumentId {
        self.id
    }

    fn model_name() -> &'static str {
        "pictures"
    }
}

pub fn picture_schema() -> Schema {
    Schema::builder()
        .number("id", false)
        .property(PropertySchema::new("title", PropertyKind::String).queryable().required())
        .property(PropertySchema::new("likes", PropertyKind::Number).queryable().required())
        .string("secret", false)
        .date("created_at", false)
        .date("updated_at", false)
        .build()
}

/// Pictures 1 to 5: "Black cat" 10, "White cat" 3, "Dog" 7, "black dog" 1, "Bird" 7.
pub async fn seeded_backend() -> InMemoryBackend {
    InMemoryBackend::builder()
        .with_schema(picture_schema())
        .with_documents([
            doc! { "title": "Black cat", "likes": 10 },
            doc! { "title": "White cat", "likes": 3 },
            doc! { "title": "Dog", "likes": 7, "secret": "hidden" },
            doc! { "title": "black dog", "likes": 1 },
            doc! { "title": "Bird", "likes": 7 },
        ])
        .build()
        .await
        .unwrap()
}

pub fn id(value: i64) -> DocumentId {
    DocumentId::new(value).unwrap()
}

pub fn ids(values: &[i64]) -> Vec<DocumentId> {
    values.iter().copied().map(id).collect()
}

pub fn ids_of(pictures: &[Picture]) -> Vec<DocumentId> {
    pictures.iter().map(|picture| picture.id).collect()
}

/// Records `(event, id)` pairs delivered to a service.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<(EventName, DocumentId)>>>);

impl EventLog {
    pub fn observer(&self) -> impl EventObserver<Picture> + 'static {
        let log = Arc::clone(&self.0);
        move |event: &ServiceEvent<Picture>| -> ObserverResult {
            let id = match event {
                ServiceEvent::Created(picture) | ServiceEvent::Deleted(picture) => picture.id,
                ServiceEvent::Updated { updated, .. } => updated.id,
            };
            log.lock().unwrap().push((event.name(), id));
            Ok(())
        }
    }

    pub fn entries(&self) -> Vec<(EventName, DocumentId)> {
        self.0.lock().unwrap().clone()
    }

    pub fn of(&self, name: EventName) -> Vec<DocumentId> {
        self.entries()
            .into_iter()
            .filter(|(event, _)| *event == name)
            .map(|(_, id)| id)
            .collect()
    }
}

#[derive(Debug, Default)]
struct Faults {
    calls: AtomicUsize,
    failing_updates: Mutex<HashSet<DocumentId>>,
    unacknowledged_updates: AtomicBool,
    unacknowledged_removes: AtomicBool,
    surviving: Mutex<HashSet<DocumentId>>,
}

/// Wraps an [`InMemoryBackend`] and injects failures on demand.
#[derive(Debug, Clone)]
pub struct FaultyBackend {
    inner: InMemoryBackend,
    faults: Arc<Faults>,
}

impl FaultyBackend {
    pub fn new(inner: InMemoryBackend) -> Self {
        Self { inner, faults: Arc::default() }
    }

    /// Number of backend calls made so far.
    pub fn calls(&self) -> usize {
        self.faults.calls.load(Ordering::SeqCst)
    }

    /// Updates touching `id` fail with a connection error.
    pub fn fail_updates_of(&self, id: DocumentId) {
        self.faults.failing_updates.lock().unwrap().insert(id);
    }

    /// Updates report `ok: false` without writing.
    pub fn refuse_updates(&self) {
        self.faults.unacknowledged_updates.store(true, Ordering::SeqCst);
    }

    /// Removals report `ok: false` without writing.
    pub fn refuse_removes(&self) {
        self.faults.unacknowledged_removes.store(true, Ordering::SeqCst);
    }

    /// Removals silently keep `id`.
    pub fn keep_on_remove(&self, id: DocumentId) {
        self.faults.surviving.lock().unwrap().insert(id);
    }

    fn record(&self) {
        self.faults.calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn targets(&self, criteria: &Criteria) -> BackendResult<Vec<DocumentId>> {
        Ok(self
            .inner
            .find(criteria)
            .await?
            .iter()
            .filter_map(DocumentId::of)
            .collect())
    }
}

impl SchemaProvider for FaultyBackend {
    fn properties(&self) -> &Schema {
        self.inner.properties()
    }
}

#[async_trait]
impl PersistenceBackend for FaultyBackend {
    async fn find(&self, criteria: &Criteria) -> BackendResult<Vec<RawDocument>> {
        self.record();
        self.inner.find(criteria).await
    }

    async fn find_one(&self, criteria: &Criteria) -> BackendResult<Option<RawDocument>> {
        self.record();
        self.inner.find_one(criteria).await
    }

    async fn paginate(
        &self,
        criteria: &Criteria,
        envelope: &PaginationEnvelope,
    ) -> BackendResult<Paginated<RawDocument>> {
        self.record();
        self.inner.paginate(criteria, envelope).await
    }

    async fn save(&self, document: RawDocument) -> BackendResult<RawDocument> {
        self.record();
        self.inner.save(document).await
    }

    async fn update(
        &self,
        criteria: &Criteria,
        patch: RawDocument,
        options: UpdateOptions,
    ) -> BackendResult<UpdateOutcome> {
        self.record();

        if self.faults.unacknowledged_updates.load(Ordering::SeqCst) {
            return Ok(UpdateOutcome { ok: false, modified: 0 });
        }

        let targets = self.targets(criteria).await?;
        let failing = self.faults.failing_updates.lock().unwrap().clone();
        if targets.iter().any(|id| failing.contains(id)) {
            return Err(BackendError::Connection("connection reset".to_string()));
        }

        self.inner.update(criteria, patch, options).await
    }

    async fn remove(&self, criteria: &Criteria) -> BackendResult<RemoveOutcome> {
        self.record();

        if self.faults.unacknowledged_removes.load(Ordering::SeqCst) {
            return Ok(RemoveOutcome { ok: false, removed: 0 });
        }

        let surviving = self.faults.surviving.lock().unwrap().clone();
        let mut removed = 0;
        for id in self.targets(criteria).await? {
            if !surviving.contains(&id) {
                removed += self.inner.remove(&Criteria::by_id(id)).await?.removed;
            }
        }

        Ok(RemoveOutcome { ok: true, removed })
    }
}

pub async fn faulty_service() -> (ModelService<Picture, FaultyBackend>, FaultyBackend, EventLog) {
    let backend = FaultyBackend::new(seeded_backend().await);
    let log = EventLog::default();

    let mut service = ModelService::new(backend.clone());
    service.events_mut().subscribe_all(log.observer());

    (service, backend, log)
}
