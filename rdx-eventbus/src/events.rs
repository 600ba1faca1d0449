//! Defines the event capability model consumed by the registry.
//!
//! The registry never inspects concrete Rust types. Every event describes
//! itself: its own [`EventType`] plus the closed set of ancestor types it
//! satisfies. Listeners registered against any of those types apply to it.

use crate::common::EventType;
use std::any::Any;

/// Object-safe access to `Any` for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An event that can be routed through the bus.
///
/// # Example
/// ```
/// use eventbus::prelude::*;
///
/// struct UserLoggedIn;
/// struct AdminLoggedIn;
///
/// impl Event for UserLoggedIn {
///     fn event_type(&self) -> EventType {
///         EventType::from_static("user.logged_in")
///     }
/// }
///
/// impl Event for AdminLoggedIn {
///     fn event_type(&self) -> EventType {
///         EventType::from_static("admin.logged_in")
///     }
///     fn ancestors(&self) -> Vec<EventType> {
///         vec![EventType::from_static("user.logged_in")]
///     }
/// }
/// ```
pub trait Event: AsAny + Send + 'static {
    /// The concrete type of this event.
    fn event_type(&self) -> EventType;

    /// Every supertype this event satisfies. Order is irrelevant.
    fn ancestors(&self) -> Vec<EventType> {
        Vec::new()
    }

    /// Whether a listener asked to stop delivery to the remaining listeners.
    fn is_propagation_stopped(&self) -> bool {
        false
    }
}

impl dyn Event {
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Event>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// The event's own type followed by its ancestors, without duplicates.
    pub(crate) fn lookup_chain(&self) -> Vec<EventType> {
        let mut chain = vec![self.event_type()];
        for ancestor in self.ancestors() {
            if !chain.contains(&ancestor) {
                chain.push(ancestor);
            }
        }
        chain
    }
}

/// An embeddable stop flag for events whose listeners may halt delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Propagation {
    stopped: bool,
}

impl Propagation {
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// A runtime-described event.
///
/// Useful when event types are only known at runtime, e.g. when they are
/// declared in a configuration file or typed into the shell.
pub struct DynamicEvent {
    pub event_type: EventType,
    pub ancestors: Vec<EventType>,
    pub propagation: Propagation,
    /// The type-erased data payload. Listeners downcast it themselves.
    pub payload: Option<Box<dyn Any + Send>>,
}

impl DynamicEvent {
    pub fn new(event_type: impl Into<EventType>) -> Self {
        Self {
            event_type: event_type.into(),
            ancestors: Vec::new(),
            propagation: Propagation::default(),
            payload: None,
        }
    }

    pub fn with_ancestors<I, T>(mut self, ancestors: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EventType>,
    {
        self.ancestors = ancestors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_payload(mut self, payload: impl Any + Send) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for DynamicEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicEvent")
            .field("event_type", &self.event_type)
            .field("ancestors", &self.ancestors)
            .field("propagation", &self.propagation)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

impl Event for DynamicEvent {
    fn event_type(&self) -> EventType {
        self.event_type.clone()
    }

    fn ancestors(&self) -> Vec<EventType> {
        self.ancestors.clone()
    }

    fn is_propagation_stopped(&self) -> bool {
        self.propagation.is_stopped()
    }
}
