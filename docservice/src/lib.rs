//! Main docservice crate providing queryable model services over document stores.
//!
//! This crate is the primary entry point of the docservice project. It re-exports the
//! core types from the sub-crates, the available storage backends, and the ambient
//! configuration and tracing setup.
//!
//! # Features
//!
//! - **Request-driven queries** - `field__operator` parameters become typed filters
//! - **Pagination** - `page`, `limit` and `order` resolved against the model schema
//! - **Single and bulk operations** - With per-document error accounting
//! - **Events** - `created`, `updated` and `deleted` notifications
//! - **Multiple backends** - In-memory and MongoDB storage
//!
//! # Quick Start
//!
//! ```ignore
//! use docservice::{prelude::*, memory::InMemoryBackend};
//! use docservice::bson::doc;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Picture {
//!     pub id: DocumentId,
//!     pub title: String,
//!     pub likes: i64,
//! }
//!
//! impl Document for Picture {
//!     fn id(&self) -> DocumentId { self.id }
//!     fn model_name() -> &'static str { "pictures" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ServiceResult<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let schema = Schema::builder()
//!         .number("id", false)
//!         .string("title", true)
//!         .number("likes", true)
//!         .build();
//!
//!     let registry = ModelRegistry::new().with_backend("pictures", InMemoryBackend::new(schema));
//!     let pictures = config.factory(registry).service::<Picture>()?;
//!
//!     pictures.create_one(doc! { "title": "Black cat", "likes": 12 }).await?;
//!
//!     let page = pictures
//!         .get_paginated(&QueryParams::from([("title__ilike", "cat"), ("order", "-likes")]))
//!         .await?;
//!     println!("{} pictures", page.total);
//!
//!     let bulk = pictures
//!         .update(&QueryParams::from([("likes__lt", "5")]), doc! { "likes": 5 })
//!         .await?;
//!     println!("{:?}", bulk.count());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB storage (requires the `mongodb` feature)

pub mod config;
pub mod observability;
pub mod prelude;

pub use docservice_core::{
    backend, bulk, context, document, error, events, page, params, query, registry, schema,
    service, translate,
};

pub use docservice_core::{
    backend::{PersistenceBackend, SharedBackend},
    document::{Document, DocumentId, RawDocument},
    error::{ServiceError, ServiceResult},
    params::QueryParams,
    schema::Schema,
    service::ModelService,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docservice_memory::{InMemoryBackend, InMemoryBackendBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docservice_mongodb::{MongoDbBackend, MongoDbBackendBuilder};

    use crate::{config::MongoConfig, schema::Schema};

    impl MongoConfig {
        /// Builder of the backend storing `collection` in the configured database.
        pub fn backend(&self, collection: &str, schema: Schema) -> MongoDbBackendBuilder {
            MongoDbBackend::builder(&self.uri, &self.database, collection).with_schema(schema)
        }
    }
}
