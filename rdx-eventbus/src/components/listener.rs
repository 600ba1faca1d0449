//! Defines listener callbacks and the bindings that attach them to event types.

use crate::common::ListenerId;
use crate::components::ordering::{Orderable, Pivot};
use crate::events::Event;
use std::fmt;
use std::sync::Arc;

/// The callback signature every listener implements.
pub type Callback = dyn Fn(&mut dyn Event) + Send + Sync;

/// A cloneable handle to a listener callback.
///
/// Two handles are equal only when they share the same callback allocation,
/// which is what removal-by-reference matches on.
#[derive(Clone)]
pub struct Listener {
    callback: Arc<Callback>,
}

impl Listener {
    pub fn new(callback: impl Fn(&mut dyn Event) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Wraps a callback that only cares about one concrete event type.
    ///
    /// Events of any other type are ignored.
    pub fn typed<E: Event>(callback: impl Fn(&mut E) + Send + Sync + 'static) -> Self {
        Self::new(move |event: &mut dyn Event| {
            if let Some(event) = event.downcast_mut::<E>() {
                callback(event);
            }
        })
    }

    pub fn call(&self, event: &mut dyn Event) {
        (self.callback)(event)
    }

    pub fn same_as(&self, other: &Listener) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(&other.callback))
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Arc::as_ptr(&self.callback))
    }
}

/// One registered listener with its ordering metadata.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub id: ListenerId,
    pub listener: Listener,
    pub priority: i32,
    pub pivot: Option<Pivot>,
    /// Global registration order, used as the tie-break between equal priorities.
    pub sequence: u64,
}

impl Orderable for Binding {
    fn pivot_id(&self) -> &ListenerId {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn sequence(&self) -> u64 {
        self.sequence
    }

    fn pivot(&self) -> Option<&Pivot> {
        self.pivot.as_ref()
    }
}
