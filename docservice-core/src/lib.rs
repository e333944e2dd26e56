//! A data-access layer that turns loosely-typed request parameters into structured
//! queries against a document store.
//!
//! This crate is the core of the docservice project and provides:
//!
//! - **Documents** ([`document`]) - The `Document` trait and validated integer ids
//! - **Schemas** ([`schema`]) - Property kinds and the queryable flag per model
//! - **Request parameters** ([`params`]) - Insertion-ordered raw parameter maps
//! - **Filter translation** ([`translate`]) - `field__operator` keys to filter expressions
//! - **Pagination** ([`page`]) - Page/limit/order resolution and paginated results
//! - **Persistence backend abstraction** ([`backend`]) - The storage contract services rely on
//! - **Model services** ([`service`], [`bulk`]) - Single-document and bulk operations
//! - **Events** ([`events`]) - Lifecycle notifications fired by services
//! - **Context** ([`context`]) - The acting user and ACL assertions
//! - **Wiring** ([`registry`]) - Model to backend registry and the service factory
//! - **Error handling** ([`error`]) - Service and backend error taxonomies
//!
//! # Example
//!
//! ```ignore
//! use docservice::{Document, DocumentId, ModelService, QueryParams};
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
//!     fn id(&self) -> DocumentId {
//!         self.id
//!     }
//!
//!     fn model_name() -> &'static str {
//!         "pictures"
//!     }
//! }
//!
//! let popular = pictures
//!     .get_paginated(&QueryParams::from([("likes__gte", "100"), ("order", "-likes")]))
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docservice_core;

pub mod backend;
pub mod bulk;
pub mod context;
pub mod document;
pub mod error;
pub mod events;
pub mod page;
pub mod params;
pub mod query;
pub mod registry;
pub mod schema;
pub mod service;
pub mod translate;
