//! Lazy subscriptions: listeners whose handler object is only built on delivery.

use crate::common::ListenerId;
use crate::components::listener::Listener;
use crate::config::ListenerOptions;
use crate::engine::EventBus;
use crate::error::EventBusError;
use crate::events::Event;
use crate::registry::EventTypes;
use std::sync::Arc;

/// Registers listeners that build their handler object through a factory.
///
/// The factory runs on every delivery, never at subscription time; whether it
/// returns a fresh instance or a shared one is up to the factory.
pub struct LazySubscription<T> {
    bus: EventBus,
    factory: Arc<dyn Fn() -> T + Send + Sync>,
    ids: Vec<ListenerId>,
}

impl<T: 'static> LazySubscription<T> {
    pub fn new(bus: EventBus, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            bus,
            factory: Arc::new(factory),
            ids: Vec::new(),
        }
    }

    /// Subscribes `handler` to `event_types`. Returns `self` for chaining.
    pub fn subscribe(
        &mut self,
        event_types: impl Into<EventTypes>,
        handler: impl Fn(&T, &mut dyn Event) + Send + Sync + 'static,
        options: ListenerOptions,
    ) -> Result<&mut Self, EventBusError> {
        let factory = self.factory.clone();
        let listener = Listener::new(move |event: &mut dyn Event| {
            let instance = factory();
            handler(&instance, event);
        });
        let id = self.bus.add_listener(event_types, listener, options)?;
        self.ids.push(id);
        Ok(self)
    }

    /// Ids of every listener registered through this subscription.
    pub fn ids(&self) -> &[ListenerId] {
        &self.ids
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
