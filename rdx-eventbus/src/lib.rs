//! # Eventbus
//!
//! An in-process event bus with deterministic listener ordering.
//!
//! Callers register listeners against event types; the bus later answers
//! "which listeners apply to this event, and in what order?" and delivers the
//! event to them.
//!
//! ## Core Concepts
//!
//! - **Event types and ancestors**: Every event names its own type plus the
//!   supertypes it satisfies. Listeners registered against a supertype apply to
//!   every subtype event.
//! - **Priority**: Higher priorities run earlier. Equal priorities keep
//!   registration order.
//! - **Pivots**: A listener may ask to run immediately `before` or `after`
//!   another listener, named by id. Pivot chains are resolved transitively and
//!   cycles are reported as a `CircularPivotError`.
//! - **Configuration-Driven**: Cache behavior, duplicate-id handling and
//!   preloaded listeners can be defined at startup via an `EventBusConfig`,
//!   often loaded from a file.
//!
//! ## Example Usage
//!
//! ```rust
//! use eventbus::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     // 1. Create the bus.
//!     let bus = EventBus::new(EventBusConfig::default());
//!
//!     // 2. Register listeners.
//!     bus.on("user.login", |_| println!("audit"), ListenerOptions::new().with_id("audit"))?;
//!     bus.on("user.login", |_| println!("greet"), ListenerOptions::new().before("audit"))?;
//!
//!     // 3. Dispatch an event. A subtype event reaches the supertype's listeners.
//!     let event = DynamicEvent::new("user.admin_login").with_ancestors(["user.login"]);
//!     bus.dispatch(event)?;
//!
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Pivot Event Bus";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod registry;

/// A prelude module for easy importing of the most common event bus types.
pub mod prelude {
    pub use crate::common::{EventType, ListenerId};
    pub use crate::components::listener::Listener;
    pub use crate::components::ordering::Pivot;
    pub use crate::components::subscription::LazySubscription;
    pub use crate::config::{DuplicateIdPolicy, EventBusConfig, ListenerOptions};
    pub use crate::engine::EventBus;
    pub use crate::error::{CircularPivotError, EventBusError};
    pub use crate::events::{DynamicEvent, Event, Propagation};
    pub use crate::registry::{ListenerRegistry, RemovalTarget, ResolvedListeners};
}
