//! Defines all configuration structures for the event bus.
//!
//! These structs are deserialized with `serde`, usually from a TOML file layered
//! under `EVENTBUS_*` environment variables. Listener options are the same
//! structure whether they come from code or from a file.

use crate::common::{EventType, ListenerId};
use crate::components::ordering::Pivot;
use crate::error::EventBusError;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

/// The top-level configuration for a `ListenerRegistry` / `EventBus`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventBusConfig {
    /// Keep resolved listener orders until the next registration or removal.
    #[serde(default = "default_cache_resolved")]
    pub cache_resolved: bool,

    /// Most lookup chains kept in the resolution cache. Reaching it clears
    /// the cache before the next order is stored.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// What to do when a custom listener id is registered twice for one type.
    #[serde(default)]
    pub duplicate_ids: DuplicateIdPolicy,

    /// Runtime-declared event types and their supertypes.
    #[serde(default)]
    pub types: Vec<TypeDecl>,

    /// Listeners to register at startup.
    #[serde(default)]
    pub listeners: Vec<ListenerDecl>,
}

/// Handling of a custom id that already exists in a target bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateIdPolicy {
    /// Fail the registration with `DuplicateListenerId`.
    #[default]
    Reject,
    /// Register anyway. Pivots naming the id bind to the first such listener
    /// in priority order.
    Allow,
}

/// Ordering and identity options for one registration.
///
/// Unknown keys are ignored when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListenerOptions {
    /// Higher values run earlier.
    pub priority: i32,
    /// Run immediately before the listener with this id.
    pub before: Option<ListenerId>,
    /// Run immediately after the listener with this id.
    pub after: Option<ListenerId>,
    /// A custom id. Derived from the event type when absent.
    pub id: Option<ListenerId>,
}

impl ListenerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn before(mut self, id: impl Into<ListenerId>) -> Self {
        self.before = Some(id.into());
        self
    }

    pub fn after(mut self, id: impl Into<ListenerId>) -> Self {
        self.after = Some(id.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<ListenerId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The single pivot constraint these options declare, if any.
    pub fn pivot(&self) -> Result<Option<Pivot>, EventBusError> {
        match (&self.before, &self.after) {
            (Some(before), Some(after)) => Err(EventBusError::ConflictingPivots {
                before: before.clone(),
                after: after.clone(),
            }),
            (Some(before), None) => Ok(Some(Pivot::Before(before.clone()))),
            (None, Some(after)) => Ok(Some(Pivot::After(after.clone()))),
            (None, None) => Ok(None),
        }
    }
}

/// Declares an event type and the supertypes it satisfies.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeDecl {
    pub name: EventType,
    #[serde(default)]
    pub extends: Vec<EventType>,
}

/// Declares a listener to register at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerDecl {
    pub event_types: Vec<EventType>,
    /// A human-readable label for logging.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub id: Option<ListenerId>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub before: Option<ListenerId>,
    #[serde(default)]
    pub after: Option<ListenerId>,
}

impl ListenerDecl {
    pub fn options(&self) -> ListenerOptions {
        ListenerOptions {
            priority: self.priority,
            before: self.before.clone(),
            after: self.after.clone(),
            id: self.id.clone(),
        }
    }
}

impl EventBusConfig {
    /// Loads the configuration from an optional TOML file, then applies
    /// `EVENTBUS_*` environment overrides (e.g. `EVENTBUS_CACHE_RESOLVED=false`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder = builder.add_source(Environment::with_prefix("EVENTBUS").try_parsing(true));
        builder.build()?.try_deserialize()
    }

    /// Parses a configuration from TOML text, without environment overrides.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Supertypes declared for `event_type`, transitively, nearest first.
    pub fn ancestors_of(&self, event_type: &EventType) -> Vec<EventType> {
        let mut ancestors: Vec<EventType> = Vec::new();
        let mut pending = vec![event_type.clone()];
        while let Some(current) = pending.pop() {
            let Some(decl) = self.types.iter().find(|decl| decl.name == current) else {
                continue;
            };
            for parent in &decl.extends {
                if parent != event_type && !ancestors.contains(parent) {
                    ancestors.push(parent.clone());
                    pending.insert(0, parent.clone());
                }
            }
        }
        ancestors
    }
}

// --- Default value functions for serde ---

fn default_cache_resolved() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            cache_resolved: default_cache_resolved(),
            cache_capacity: default_cache_capacity(),
            duplicate_ids: DuplicateIdPolicy::default(),
            types: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EventBusConfig::from_toml_str("").unwrap();
        assert!(config.cache_resolved);
        assert_eq!(config.cache_capacity, 1024);
        assert_eq!(config.duplicate_ids, DuplicateIdPolicy::Reject);
        assert!(config.types.is_empty());
        assert!(config.listeners.is_empty());
    }

    #[test]
    fn parses_types_and_listeners() {
        let config = EventBusConfig::from_toml_str(
            r#"
            cache_resolved = false
            cache_capacity = 8
            duplicate_ids = "allow"

            [[types]]
            name = "user.admin_login"
            extends = ["user.login"]

            [[listeners]]
            event_types = ["user.login"]
            label = "audit"
            id = "audit"
            priority = 10

            [[listeners]]
            event_types = ["user.admin_login"]
            after = 2
            colour = "ignored"
            "#,
        )
        .unwrap();

        assert!(!config.cache_resolved);
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.duplicate_ids, DuplicateIdPolicy::Allow);
        assert_eq!(config.types[0].extends, vec![EventType::from("user.login")]);
        assert_eq!(config.listeners[0].options().priority, 10);
        assert_eq!(config.listeners[0].options().id, Some("audit".into()));
        assert_eq!(config.listeners[1].options().after, Some(ListenerId::from("2")));
    }

    #[test]
    fn ancestors_are_transitive_and_deduplicated() {
        let config = EventBusConfig::from_toml_str(
            r#"
            [[types]]
            name = "c"
            extends = ["b", "a"]

            [[types]]
            name = "b"
            extends = ["a"]
            "#,
        )
        .unwrap();
        let names: Vec<_> = config
            .ancestors_of(&EventType::from("c"))
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(names, ["b", "a"]);
        assert!(config.ancestors_of(&EventType::from("a")).is_empty());
    }

    #[test]
    fn options_reject_two_pivots() {
        let options = ListenerOptions::new().before("a").after("b");
        assert!(matches!(
            options.pivot(),
            Err(EventBusError::ConflictingPivots { .. })
        ));
        assert_eq!(
            ListenerOptions::new().after("b").pivot().unwrap(),
            Some(Pivot::After("b".into()))
        );
    }
}
