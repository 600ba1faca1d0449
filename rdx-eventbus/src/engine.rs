//! The shareable event bus that wraps a `ListenerRegistry` and delivers events.

use crate::common::{EventType, ListenerId};
use crate::components::listener::Listener;
use crate::components::subscription::LazySubscription;
use crate::config::{EventBusConfig, ListenerDecl, ListenerOptions};
use crate::error::{CircularPivotError, EventBusError};
use crate::events::Event;
use crate::registry::{EventTypes, ListenerRegistry, RemovalTarget, ResolvedListeners};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// The main event bus.
///
/// This struct is a handle: clones share one registry. The registry is guarded
/// by a mutex that is never held while listeners run, so a listener may add or
/// remove listeners; those changes apply from the next dispatch on.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Mutex<ListenerRegistry>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

// Core implementation block.
impl EventBus {
    /// Creates a new `EventBus` with the given configuration.
    pub fn new(config: EventBusConfig) -> Self {
        Self {
            registry: Arc::new(Mutex::new(ListenerRegistry::new(config))),
        }
    }

    /// Creates a bus and registers every listener declared in `config`.
    ///
    /// Declared listeners have no behavior of their own; `make_listener`
    /// builds the callback for each declaration.
    pub fn from_config(
        config: EventBusConfig,
        mut make_listener: impl FnMut(&ListenerDecl) -> Listener,
    ) -> Result<Self, EventBusError> {
        let declarations = config.listeners.clone();
        let bus = Self::new(config);
        for decl in &declarations {
            let listener = make_listener(decl);
            let id = bus.add_listener(decl.event_types.clone(), listener, decl.options())?;
            debug!(
                "Preloaded listener '{}' ({}).",
                id,
                decl.label.as_deref().unwrap_or("unlabeled")
            );
        }
        info!("Event bus ready with {} preloaded listener(s).", declarations.len());
        Ok(bus)
    }

    /// Runs `f` with exclusive access to the underlying registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut ListenerRegistry) -> R) -> R {
        f(&mut self.registry.lock())
    }
}

// Public API implementation block.
impl EventBus {
    /// Registers a listener. See [`ListenerRegistry::add_listener`].
    pub fn add_listener(
        &self,
        event_types: impl Into<EventTypes>,
        listener: Listener,
        options: ListenerOptions,
    ) -> Result<ListenerId, EventBusError> {
        self.registry.lock().add_listener(event_types, listener, options)
    }

    /// Registers a closure as a listener.
    pub fn on(
        &self,
        event_types: impl Into<EventTypes>,
        callback: impl Fn(&mut dyn Event) + Send + Sync + 'static,
        options: ListenerOptions,
    ) -> Result<ListenerId, EventBusError> {
        self.add_listener(event_types, Listener::new(callback), options)
    }

    /// Removes listeners by id or callback identity. Returns how many were removed.
    pub fn remove_listener(&self, target: impl Into<RemovalTarget>) -> usize {
        self.registry.lock().remove_listener(target)
    }

    /// The ordered listeners that apply to `event`.
    pub fn get_listeners_for_event(
        &self,
        event: &dyn Event,
    ) -> Result<ResolvedListeners, CircularPivotError> {
        self.registry.lock().get_listeners_for_event(event)
    }

    /// The ordered listeners for a type described by name.
    pub fn listeners_for_type(
        &self,
        event_type: &EventType,
        ancestors: &[EventType],
    ) -> Result<ResolvedListeners, CircularPivotError> {
        self.registry.lock().listeners_for_type(event_type, ancestors)
    }

    /// Delivers `event` to its listeners in order and hands it back.
    ///
    /// Delivery stops as soon as the event reports stopped propagation.
    pub fn dispatch<E: Event>(&self, mut event: E) -> Result<E, CircularPivotError> {
        self.dispatch_dyn(&mut event)?;
        Ok(event)
    }

    /// Delivers a type-erased event. Returns the number of listeners invoked.
    pub fn dispatch_dyn(&self, event: &mut dyn Event) -> Result<usize, CircularPivotError> {
        let listeners = self.get_listeners_for_event(event)?;
        let mut invoked = 0;
        for listener in &listeners {
            if event.is_propagation_stopped() {
                trace!(
                    "Propagation of '{}' stopped after {} listener(s).",
                    event.event_type(),
                    invoked
                );
                break;
            }
            listener.call(event);
            invoked += 1;
        }
        trace!("Dispatched '{}' to {} listener(s).", event.event_type(), invoked);
        Ok(invoked)
    }

    /// Starts a lazy subscription whose handler object is built by `factory`
    /// on every delivery.
    pub fn lazy_subscription<T, F>(&self, factory: F) -> LazySubscription<T>
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        LazySubscription::new(self.clone(), factory)
    }
}
