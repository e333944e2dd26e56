//! MongoDB persistence backend for docservice.
//!
//! This crate provides a MongoDB-based implementation of the `PersistenceBackend`
//! trait, storing each model in its own collection and running filters, sorting and
//! pagination on the MongoDB query engine.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docservice = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Native queries** - Filters become MongoDB query documents, `like`/`ilike` escaped regexes
//! - **Auto-increment ids** - Integer ids are drawn from a per-model counter document
//! - **Error normalization** - Duplicate key errors surface as `BackendError::Duplicate`
//!
//! # Example
//!
//! ```ignore
//! use docservice::{backend::BackendBuilder, mongodb::MongoDbBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pictures = MongoDbBackend::builder("mongodb://localhost:27017", "app", "pictures")
//!         .with_schema(schema)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docservice_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbBackend, MongoDbBackendBuilder};
