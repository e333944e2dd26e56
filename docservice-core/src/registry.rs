//! Wiring of models to backends and construction of configured services.
//!
//! A [`ModelRegistry`] maps model names to the backends storing them. A
//! [`ServiceFactory`] owns a registry together with the settings, observers and
//! initializers applied to every service it builds. Both are built once at startup
//! and passed by reference.
//!
//! # Example
//!
//! ```ignore
//! use docservice::registry::{ModelRegistry, ServiceFactory};
//!
//! let registry = ModelRegistry::new().with_backend("pictures", pictures_backend);
//! let mut factory = ServiceFactory::new(registry, ServiceSettings::default());
//! factory.on::<Picture>(EventName::Created, |event: &ServiceEvent<Picture>| -> ObserverResult {
//!     tracing::info!(?event, "picture created");
//!     Ok(())
//! });
//!
//! let pictures = factory.service::<Picture>()?;
//! ```

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};
use tracing::debug;

use crate::{
    backend::{PersistenceBackend, SharedBackend},
    context::{ContextCapable, ServiceContext},
    document::Document,
    error::{ServiceError, ServiceResult},
    events::{EventBus, EventName, EventObserver},
    service::{ModelService, ServiceSettings},
};

/// Registry key of the backend used for models without their own entry.
pub const DEFAULT_MODEL: &str = "*";

/// Model name to backend mapping.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    backends: HashMap<String, SharedBackend>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the backend storing `model`, replacing any previous one.
    pub fn register(&mut self, model: impl Into<String>, backend: impl PersistenceBackend + 'static) {
        self.register_shared(model, Arc::new(backend));
    }

    pub fn register_shared(&mut self, model: impl Into<String>, backend: SharedBackend) {
        self.backends.insert(model.into(), backend);
    }

    pub fn with_backend(mut self, model: impl Into<String>, backend: impl PersistenceBackend + 'static) -> Self {
        self.register(model, backend);
        self
    }

    /// Sets the backend used for models without their own entry.
    pub fn with_default(self, backend: impl PersistenceBackend + 'static) -> Self {
        self.with_backend(DEFAULT_MODEL, backend)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.backends.contains_key(model)
    }

    /// Returns the backend of `model`, falling back to the default backend.
    ///
    /// # Errors
    ///
    /// `Configuration` when neither is registered.
    pub fn backend(&self, model: &str) -> ServiceResult<SharedBackend> {
        self.backends
            .get(model)
            .or_else(|| self.backends.get(DEFAULT_MODEL))
            .cloned()
            .ok_or_else(|| {
                ServiceError::Configuration(format!("no backend registered for model \"{model}\""))
            })
    }

    pub fn backend_for<D: Document>(&self) -> ServiceResult<SharedBackend> {
        self.backend(D::model_name())
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models = self.backends.keys().collect::<Vec<_>>();
        models.sort();
        f.debug_struct("ModelRegistry").field("models", &models).finish()
    }
}

/// Hook run on every service a [`ServiceFactory`] builds.
///
/// Implemented for any `Fn(&str, &mut ServiceContext)` closure, which receives the
/// model name and the new service's context.
pub trait ServiceInitializer: Send + Sync {
    fn initialize(&self, model: &str, context: &mut ServiceContext);
}

impl<F> ServiceInitializer for F
where
    F: Fn(&str, &mut ServiceContext) + Send + Sync,
{
    fn initialize(&self, model: &str, context: &mut ServiceContext) {
        self(model, context)
    }
}

/// Builds configured [`ModelService`]s.
pub struct ServiceFactory {
    registry: ModelRegistry,
    settings: ServiceSettings,
    /// `EventBus<D>` per document type.
    observers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    initializers: Vec<Arc<dyn ServiceInitializer>>,
}

impl ServiceFactory {
    pub fn new(registry: ModelRegistry, settings: ServiceSettings) -> Self {
        Self {
            registry,
            settings,
            observers: HashMap::new(),
            initializers: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn with_bus<D: Document>(&mut self, register: impl FnOnce(&mut EventBus<D>)) {
        let slot = self
            .observers
            .entry(TypeId::of::<D>())
            .or_insert_with(|| Box::new(EventBus::<D>::new()));

        if let Some(bus) = slot.downcast_mut::<EventBus<D>>() {
            register(bus);
        }
    }

    /// Registers an observer attached to every `D` service built afterwards.
    pub fn on<D: Document>(&mut self, event: EventName, observer: impl EventObserver<D> + 'static) -> &mut Self {
        self.with_bus::<D>(|bus| {
            bus.on(event, observer);
        });
        self
    }

    /// Registers an observer of every event of `D` services.
    pub fn subscribe_all<D: Document>(&mut self, observer: impl EventObserver<D> + 'static) -> &mut Self {
        self.with_bus::<D>(|bus| {
            bus.subscribe_all(observer);
        });
        self
    }

    /// Adds an initializer. Initializers run in registration order.
    pub fn add_initializer(&mut self, initializer: impl ServiceInitializer + 'static) -> &mut Self {
        self.initializers.push(Arc::new(initializer));
        self
    }

    /// Builds the service of `D` over its registered backend.
    ///
    /// # Errors
    ///
    /// `Configuration` when no backend serves `D`.
    pub fn service<D: Document>(&self) -> ServiceResult<ModelService<D>> {
        let backend = self.registry.backend_for::<D>()?;
        let mut service = ModelService::with_settings(backend, self.settings);

        if let Some(bus) = self
            .observers
            .get(&TypeId::of::<D>())
            .and_then(|slot| slot.downcast_ref::<EventBus<D>>())
        {
            service.events_mut().extend(bus);
        }

        for initializer in &self.initializers {
            initializer.initialize(D::model_name(), service.context_mut());
        }

        debug!(
            model = D::model_name(),
            observers = service.events().len(),
            acl_check = service.context().acl_check,
            "built model service"
        );

        Ok(service)
    }
}

impl fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFactory")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("initializers", &self.initializers.len())
            .finish()
    }
}
