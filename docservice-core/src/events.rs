//! Lifecycle events fired by model services.
//!
//! Each [`ModelService`](crate::service::ModelService) owns an [`EventBus`]. Emission is
//! synchronous and never affects the operation that fired it: an observer that fails
//! or panics is logged and skipped.

use serde::Serialize;
use std::{
    error::Error as StdError,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use tracing::warn;

/// Result returned by event observers.
pub type ObserverResult = Result<(), Box<dyn StdError + Send + Sync>>;

/// Names of the events a service fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventName {
    Created,
    Updated,
    Deleted,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Created => "created",
            EventName::Updated => "updated",
            EventName::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event together with its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServiceEvent<D> {
    /// A document was persisted by `create_one`.
    Created(D),
    /// A document was modified. Carries the state before and after the update.
    Updated { document: D, updated: D },
    /// A document was confirmed removed.
    Deleted(D),
}

impl<D> ServiceEvent<D> {
    pub fn name(&self) -> EventName {
        match self {
            ServiceEvent::Created(_) => EventName::Created,
            ServiceEvent::Updated { .. } => EventName::Updated,
            ServiceEvent::Deleted(_) => EventName::Deleted,
        }
    }
}

/// Receives service events.
///
/// Implemented for any `Fn(&ServiceEvent<D>) -> ObserverResult` closure.
pub trait EventObserver<D>: Send + Sync {
    fn on_event(&self, event: &ServiceEvent<D>) -> ObserverResult;
}

impl<D, F> EventObserver<D> for F
where
    F: Fn(&ServiceEvent<D>) -> ObserverResult + Send + Sync,
{
    fn on_event(&self, event: &ServiceEvent<D>) -> ObserverResult {
        self(event)
    }
}

struct Subscription<D> {
    /// `None` subscribes to every event.
    event: Option<EventName>,
    observer: Arc<dyn EventObserver<D>>,
}

impl<D> Clone for Subscription<D> {
    fn clone(&self) -> Self {
        Self {
            event: self.event,
            observer: Arc::clone(&self.observer),
        }
    }
}

/// Ordered list of observers for one document type.
pub struct EventBus<D> {
    subscriptions: Vec<Subscription<D>>,
}

impl<D> EventBus<D> {
    pub fn new() -> Self {
        Self { subscriptions: Vec::new() }
    }

    /// Registers an observer for one event.
    pub fn on(&mut self, event: EventName, observer: impl EventObserver<D> + 'static) -> &mut Self {
        self.subscriptions.push(Subscription {
            event: Some(event),
            observer: Arc::new(observer),
        });
        self
    }

    /// Registers an observer for every event.
    pub fn subscribe_all(&mut self, observer: impl EventObserver<D> + 'static) -> &mut Self {
        self.subscriptions.push(Subscription {
            event: None,
            observer: Arc::new(observer),
        });
        self
    }

    /// Appends every subscription of `other`, keeping their order.
    pub fn extend(&mut self, other: &EventBus<D>) {
        self.subscriptions.extend(other.subscriptions.iter().cloned());
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Delivers `event` to every matching observer in registration order.
    pub fn emit(&self, event: &ServiceEvent<D>) {
        let name = event.name();

        for subscription in &self.subscriptions {
            if subscription.event.is_some_and(|event| event != name) {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| subscription.observer.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(event = %name, error = %err, "event observer failed"),
                Err(_) => warn!(event = %name, "event observer panicked"),
            }
        }
    }
}

impl<D> Default for EventBus<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> Clone for EventBus<D> {
    fn clone(&self) -> Self {
        Self {
            subscriptions: self.subscriptions.clone(),
        }
    }
}

impl<D> fmt::Debug for EventBus<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.subscriptions.len())
            .finish()
    }
}
