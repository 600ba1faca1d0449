//! Error types returned by the registry and the ordering engine.

use crate::common::{EventType, ListenerId};
use thiserror::Error;

/// The before/after constraints of a listener set form a cycle.
///
/// `ids` holds every listener that is part of the cycle or whose pivot chain
/// ends inside it, in base (priority) order and without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circular pivot ids in listener ordering; the pivot ids that failed are: {}", join_ids(.ids))]
pub struct CircularPivotError {
    pub ids: Vec<ListenerId>,
}

impl CircularPivotError {
    pub fn ids(&self) -> &[ListenerId] {
        &self.ids
    }
}

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error(transparent)]
    CircularPivot(#[from] CircularPivotError),

    #[error("listener id `{id}` is already registered for event type `{event_type}`")]
    DuplicateListenerId { id: ListenerId, event_type: EventType },

    #[error("listener declares both `before: {before}` and `after: {after}`; only one pivot is allowed")]
    ConflictingPivots { before: ListenerId, after: ListenerId },

    #[error("a listener must be registered for at least one event type")]
    NoEventTypes,

    #[error("failed to load event bus configuration: {0}")]
    Config(#[from] config::ConfigError),
}

fn join_ids(ids: &[ListenerId]) -> String {
    ids.iter()
        .map(ListenerId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_pivot_message_lists_ids() {
        let err = CircularPivotError {
            ids: vec!["0".into(), "1".into(), "2".into()],
        };
        assert!(err.to_string().ends_with("the pivot ids that failed are: 0, 1, 2"));
    }
}
