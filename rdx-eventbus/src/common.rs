//! Contains common, primitive types shared by the registry and the ordering engine.
//!
//! This module defines the identifier types used to name event types, listeners
//! and the internal storage slots of bindings. Using distinct types keeps ids and
//! type names from being mixed up at call sites.

use serde::Deserialize;
use slotmap::new_key_type;
use std::borrow::Cow;
use std::fmt;

new_key_type! {
    /// Identifies one stored binding inside a `ListenerRegistry`.
    ///
    /// A binding registered against several event types is stored once and
    /// referenced from every bucket by this key.
    pub struct BindingKey;
}

/// Identifies an event type.
///
/// Event types are plain names. Statically known events use
/// [`EventType::from_static`]; runtime-described events (see
/// [`DynamicEvent`](crate::events::DynamicEvent)) use owned names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct EventType(Cow<'static, str>);

impl EventType {
    /// Creates an event type from a static name without allocating.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// The identifier of a registered listener.
///
/// Ids are either chosen by the caller or derived from the event type and a
/// per-type registration counter. In configuration files an id may be written
/// as a string or as an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "RawListenerId")]
pub struct ListenerId(String);

impl ListenerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the id of the `index`-th listener registered for `event_type`.
    ///
    /// The result is the lowercase hex MD5 digest of `"{event_type}-{index}"`.
    pub fn derived(event_type: &EventType, index: usize) -> Self {
        let digest = md5::compute(format!("{}-{}", event_type, index).as_bytes());
        Self(format!("{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListenerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ListenerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for ListenerId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl PartialEq<str> for ListenerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ListenerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// --- Serde helper accepting both `id = "a"` and `id = 2` ---

#[derive(Deserialize)]
#[serde(untagged)]
enum RawListenerId {
    Text(String),
    Number(i64),
}

impl From<RawListenerId> for ListenerId {
    fn from(raw: RawListenerId) -> Self {
        match raw {
            RawListenerId::Text(text) => Self(text),
            RawListenerId::Number(number) => Self::from(number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_id_is_md5_of_type_and_index() {
        let event_type = EventType::from_static("DummyEventA");
        let id = ListenerId::derived(&event_type, 0);
        let expected = format!("{:x}", md5::compute(b"DummyEventA-0"));
        assert_eq!(id.as_str(), expected);
        assert_eq!(id.as_str().len(), 32);
    }

    #[test]
    fn derived_ids_differ_per_type_and_index() {
        let a = EventType::from_static("A");
        let b = EventType::from_static("B");
        assert_ne!(ListenerId::derived(&a, 0), ListenerId::derived(&a, 1));
        assert_ne!(ListenerId::derived(&a, 0), ListenerId::derived(&b, 0));
        assert_eq!(ListenerId::derived(&a, 3), ListenerId::derived(&a, 3));
    }

    #[test]
    fn static_and_owned_event_types_compare_equal() {
        assert_eq!(EventType::from_static("user.login"), EventType::from("user.login"));
    }

    #[test]
    fn integer_ids_become_their_decimal_text() {
        assert_eq!(ListenerId::from(2), "2");
    }
}
