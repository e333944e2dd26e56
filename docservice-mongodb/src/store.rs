use async_trait::async_trait;
use bson::{Bson, DateTime, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions, ReturnDocument},
};
use std::sync::Arc;
use tracing::debug;

use docservice_core::{
    backend::{BackendBuilder, PersistenceBackend, RemoveOutcome, UpdateOptions, UpdateOutcome},
    document::{DocumentId, ID_FIELD, RawDocument},
    error::{BackendError, BackendResult, ValidationDetail},
    page::{PaginationEnvelope, Paginated},
    query::Criteria,
    schema::{CREATED_AT_FIELD, Schema, SchemaProvider, UPDATED_AT_FIELD},
};

use crate::query::MongoQueryTranslator;

/// Collection holding one auto-increment sequence per model.
pub const COUNTERS_COLLECTION: &str = "_counters";

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Extracts the offending field from a duplicate key error message.
pub(crate) fn duplicate_field(message: &str) -> Option<String> {
    let (_, key) = message.split_once("dup key:")?;
    let (field, _) = key.trim_start().strip_prefix('{')?.split_once(':')?;
    let field = field.trim();

    (!field.is_empty()).then(|| field.to_string())
}

fn map_error(err: MongoError) -> BackendError {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == DUPLICATE_KEY_CODE => {
            BackendError::Duplicate {
                field: duplicate_field(&write.message),
                message: write.message.clone(),
            }
        }
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => BackendError::Connection(err.to_string()),
        _ => BackendError::Other(err.to_string()),
    }
}

fn restore_document(mut document: Document) -> RawDocument {
    document.remove("_id");
    document
}

fn read_sequence(document: &Document) -> Option<i64> {
    match document.get("seq")? {
        Bson::Int32(value) => Some(i64::from(*value)),
        Bson::Int64(value) => Some(*value),
        _ => None,
    }
}

/// A persistence backend over one MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoDbBackend {
    name: String,
    collection: MongoCollection<Document>,
    counters: MongoCollection<Document>,
    schema: Arc<Schema>,
}

impl MongoDbBackend {
    pub fn new(client: &Client, database: &str, collection: &str, schema: Schema) -> Self {
        let database = client.database(database);

        Self {
            name: collection.to_string(),
            collection: database.collection(collection),
            counters: database.collection(COUNTERS_COLLECTION),
            schema: Arc::new(schema),
        }
    }

    pub fn builder(dsn: &str, database: &str, collection: &str) -> MongoDbBackendBuilder {
        MongoDbBackendBuilder::new(dsn, database, collection)
    }

    /// Creates the unique index on `id`.
    pub async fn ensure_indexes(&self) -> BackendResult<()> {
        self.collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { ID_FIELD: 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await
            .map_err(map_error)?;

        Ok(())
    }

    async fn next_id(&self) -> BackendResult<DocumentId> {
        let counter = self
            .counters
            .find_one_and_update(doc! { "_id": self.name.as_str() }, doc! { "$inc": { "seq": 1i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_error)?;

        counter
            .as_ref()
            .and_then(read_sequence)
            .and_then(DocumentId::new)
            .ok_or_else(|| BackendError::Other(format!("invalid id sequence for {}", self.name)))
    }

    async fn reserve_id(&self, id: DocumentId) -> BackendResult<()> {
        self.counters
            .update_one(doc! { "_id": self.name.as_str() }, doc! { "$max": { "seq": id.get() } })
            .upsert(true)
            .await
            .map_err(map_error)?;

        Ok(())
    }

    fn stamp(&self, document: &mut Document, field: &str, now: DateTime, overwrite: bool) {
        if self.schema.contains(field) && (overwrite || !document.contains_key(field)) {
            document.insert(field, Bson::DateTime(now));
        }
    }
}

impl SchemaProvider for MongoDbBackend {
    fn properties(&self) -> &Schema {
        &self.schema
    }
}

#[async_trait]
impl PersistenceBackend for MongoDbBackend {
    async fn find(&self, criteria: &Criteria) -> BackendResult<Vec<RawDocument>> {
        let mut options = FindOptions::default();
        options.sort = Some(MongoQueryTranslator::sort(&[]));

        Ok(self
            .collection
            .find(MongoQueryTranslator::filter(criteria)?)
            .with_options(options)
            .await
            .map_err(map_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(map_error)?
            .into_iter()
            .map(restore_document)
            .collect())
    }

    async fn find_one(&self, criteria: &Criteria) -> BackendResult<Option<RawDocument>> {
        Ok(self
            .collection
            .find_one(MongoQueryTranslator::filter(criteria)?)
            .await
            .map_err(map_error)?
            .map(restore_document))
    }

    async fn paginate(
        &self,
        criteria: &Criteria,
        envelope: &PaginationEnvelope,
    ) -> BackendResult<Paginated<RawDocument>> {
        let filter = MongoQueryTranslator::filter(criteria)?;

        let total = self
            .collection
            .count_documents(filter.clone())
            .await
            .map_err(map_error)?;

        let mut options = FindOptions::default();
        options.skip = Some(envelope.offset());
        options.limit = Some(i64::try_from(envelope.limit).unwrap_or(i64::MAX));
        options.sort = Some(MongoQueryTranslator::sort(&envelope.sort));

        let documents = self
            .collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(map_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(map_error)?
            .into_iter()
            .map(restore_document)
            .collect();

        Ok(envelope.page_of(documents, total))
    }

    async fn save(&self, mut document: RawDocument) -> BackendResult<RawDocument> {
        let id = match document.get(ID_FIELD) {
            None | Some(Bson::Null) => self.next_id().await?,
            Some(value) => {
                let id = DocumentId::of(&document).ok_or_else(|| BackendError::Validation {
                    message: "id must be a positive integer".to_string(),
                    details: vec![ValidationDetail::format(
                        ID_FIELD,
                        "must be a positive integer",
                        value.to_string(),
                    )],
                })?;
                self.reserve_id(id).await?;
                id
            }
        };

        document.insert(ID_FIELD, Bson::from(id));
        let now = DateTime::now();
        self.stamp(&mut document, CREATED_AT_FIELD, now, false);
        self.stamp(&mut document, UPDATED_AT_FIELD, now, false);

        self.schema.validate(&document, true)?;

        self.collection
            .insert_one(&document)
            .await
            .map_err(map_error)?;
        debug!(collection = %self.name, %id, "saved document");

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

        let mut patch = patch;
        self.stamp(&mut patch, UPDATED_AT_FIELD, DateTime::now(), true);

        let filter = MongoQueryTranslator::filter(criteria)?;
        let update = doc! { "$set": patch };

        let result = if options.multi {
            self.collection.update_many(filter, update).await
        } else {
            self.collection.update_one(filter, update).await
        }
        .map_err(map_error)?;

        Ok(UpdateOutcome {
            ok: true,
            modified: result.modified_count,
        })
    }

    async fn remove(&self, criteria: &Criteria) -> BackendResult<RemoveOutcome> {
        let result = self
            .collection
            .delete_many(MongoQueryTranslator::filter(criteria)?)
            .await
            .map_err(map_error)?;

        Ok(RemoveOutcome {
            ok: true,
            removed: result.deleted_count,
        })
    }
}

/// Builder connecting a [`MongoDbBackend`] from a connection string.
pub struct MongoDbBackendBuilder {
    dsn: String,
    database: String,
    collection: String,
    schema: Schema,
}

impl MongoDbBackendBuilder {
    pub fn new(dsn: &str, database: &str, collection: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
            schema: Schema::default(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl BackendBuilder for MongoDbBackendBuilder {
    type Backend = MongoDbBackend;

    /// Connects and creates the unique `id` index.
    async fn build(self) -> BackendResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        let client = Client::with_options(options).map_err(|e| BackendError::Connection(e.to_string()))?;

        let backend = MongoDbBackend::new(&client, &self.database, &self.collection, self.schema);
        backend.ensure_indexes().await?;

        Ok(backend)
    }
}
