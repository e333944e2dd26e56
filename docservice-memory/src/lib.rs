//! In-memory persistence backend for docservice.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `PersistenceBackend` trait. It uses async-aware read-write locks for concurrent
//! access and is meant for development, testing and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Schema-aware writes** - Property kinds and required properties are validated
//! - **Full query support** - Every filter operator, multi-key sorting and pagination
//! - **Auto-increment ids** - Documents saved without an id get the next free one
//!
//! # Quick Start
//!
//! ```ignore
//! use docservice::{ModelService, Schema, memory::InMemoryBackend};
//! use bson::doc;
//!
//! let schema = Schema::builder()
//!     .number("id", false)
//!     .string("title", true)
//!     .build();
//!
//! let pictures = ModelService::<Picture, _>::new(InMemoryBackend::new(schema));
//! let picture = pictures.create_one(doc! { "title": "Sunset" }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docservice_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryBackend, InMemoryBackendBuilder};
