//! Convenient re-exports of commonly used types from docservice.
//!
//! ```ignore
//! use docservice::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits and ids
//! - Services, bulk results and their settings
//! - Backends and builders
//! - Request parameters, schemas and filters
//! - Events, context and wiring
//! - Configuration and error types

pub use docservice_core::{
    backend::{BackendBuilder, PersistenceBackend, SharedBackend, UpdateOptions},
    bulk::{BulkCount, BulkResult},
    context::{ContextCapable, ContextUser, ServiceContext},
    document::{Document, DocumentExt, DocumentId, IntoDocumentId, RawDocument},
    error::{BackendError, ErrorKind, ServiceError, ServiceResult, ValidationDetail},
    events::{EventName, EventObserver, ObserverResult, ServiceEvent},
    page::{PaginationDefaults, PaginationEnvelope, Paginated},
    params::QueryParams,
    query::{Criteria, Filter, QueryVisitor, Sort, SortDirection},
    registry::{ModelRegistry, ServiceFactory, ServiceInitializer},
    schema::{PropertyKind, PropertySchema, Schema},
    service::{ModelService, Queryable, ServiceSettings, UpdateResult},
};

pub use crate::{
    config::{Config, Environment},
    observability::init_tracing,
};
