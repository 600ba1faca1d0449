//! The listener registry: stores bindings per event type and resolves the
//! ordered listener list for a concrete event.

use crate::common::{BindingKey, EventType, ListenerId};
use crate::components::listener::{Binding, Listener};
use crate::components::ordering;
use crate::config::{DuplicateIdPolicy, EventBusConfig, ListenerOptions};
use crate::error::{CircularPivotError, EventBusError};
use crate::events::Event;
use slotmap::SlotMap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// One or more event types a listener is registered against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTypes(Vec<EventType>);

impl From<EventType> for EventTypes {
    fn from(event_type: EventType) -> Self {
        Self(vec![event_type])
    }
}

impl From<&EventType> for EventTypes {
    fn from(event_type: &EventType) -> Self {
        Self(vec![event_type.clone()])
    }
}

impl From<&str> for EventTypes {
    fn from(event_type: &str) -> Self {
        Self(vec![EventType::from(event_type)])
    }
}

impl From<Vec<EventType>> for EventTypes {
    fn from(event_types: Vec<EventType>) -> Self {
        Self(event_types)
    }
}

impl From<&[EventType]> for EventTypes {
    fn from(event_types: &[EventType]) -> Self {
        Self(event_types.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for EventTypes {
    fn from(event_types: [&str; N]) -> Self {
        Self(event_types.into_iter().map(EventType::from).collect())
    }
}

/// What `remove_listener` should match on.
#[derive(Debug, Clone)]
pub enum RemovalTarget {
    Id(ListenerId),
    Callback(Listener),
}

impl From<ListenerId> for RemovalTarget {
    fn from(id: ListenerId) -> Self {
        Self::Id(id)
    }
}

impl From<&ListenerId> for RemovalTarget {
    fn from(id: &ListenerId) -> Self {
        Self::Id(id.clone())
    }
}

impl From<&str> for RemovalTarget {
    fn from(id: &str) -> Self {
        Self::Id(ListenerId::from(id))
    }
}

impl From<Listener> for RemovalTarget {
    fn from(listener: Listener) -> Self {
        Self::Callback(listener)
    }
}

impl From<&Listener> for RemovalTarget {
    fn from(listener: &Listener) -> Self {
        Self::Callback(listener.clone())
    }
}

/// The ordered listeners for one event.
///
/// Cloning is cheap and every iteration starts over from the first listener.
#[derive(Debug, Clone, Default)]
pub struct ResolvedListeners {
    entries: Arc<[(ListenerId, Listener)]>,
}

impl ResolvedListeners {
    pub fn iter(&self) -> impl Iterator<Item = &Listener> + '_ {
        self.entries.iter().map(|(_, listener)| listener)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ListenerId> + '_ {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResolvedListeners {
    type Item = &'a Listener;
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (ListenerId, Listener)>,
        fn(&'a (ListenerId, Listener)) -> &'a Listener,
    >;

    fn into_iter(self) -> Self::IntoIter {
        let callback: fn(&'a (ListenerId, Listener)) -> &'a Listener = |(_, listener)| listener;
        self.entries.iter().map(callback)
    }
}

/// Stores listener bindings by event type and resolves their execution order.
///
/// The registry is single-threaded by design; wrap it (see
/// [`EventBus`](crate::engine::EventBus)) to share it.
pub struct ListenerRegistry {
    config: EventBusConfig,
    bindings: SlotMap<BindingKey, Binding>,
    buckets: HashMap<EventType, Vec<BindingKey>>,
    /// Custom and derived ids per bucket, with how many bindings carry each.
    bucket_ids: HashMap<EventType, HashMap<ListenerId, usize>>,
    /// Registrations ever made per type; feeds derived ids.
    type_counters: HashMap<EventType, usize>,
    next_sequence: u64,
    /// Resolved orders keyed by lookup chain (own type followed by ancestors).
    /// Bounded by `cache_capacity`.
    cache: RefCell<HashMap<Vec<EventType>, ResolvedListeners>>,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

impl ListenerRegistry {
    pub fn new(config: EventBusConfig) -> Self {
        Self {
            config,
            bindings: SlotMap::with_key(),
            buckets: HashMap::new(),
            bucket_ids: HashMap::new(),
            type_counters: HashMap::new(),
            next_sequence: 0,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Registers `listener` for every type in `event_types`.
    ///
    /// All listed types share one binding: one id and one registration
    /// sequence number. Without a custom id, the id is derived from the first
    /// listed type and its registration count.
    ///
    /// # Errors
    /// - `NoEventTypes` if `event_types` is empty.
    /// - `ConflictingPivots` if both `before` and `after` are set.
    /// - `DuplicateListenerId` if the custom id is already present in one of the
    ///   target buckets and the policy is `Reject`.
    pub fn add_listener(
        &mut self,
        event_types: impl Into<EventTypes>,
        listener: Listener,
        options: ListenerOptions,
    ) -> Result<ListenerId, EventBusError> {
        let EventTypes(mut event_types) = event_types.into();
        dedup_in_order(&mut event_types);
        let Some(first_type) = event_types.first().cloned() else {
            return Err(EventBusError::NoEventTypes);
        };
        let pivot = options.pivot()?;

        if let Some(id) = &options.id {
            if self.config.duplicate_ids == DuplicateIdPolicy::Reject {
                for event_type in &event_types {
                    if self.bucket_contains(event_type, id) {
                        return Err(EventBusError::DuplicateListenerId {
                            id: id.clone(),
                            event_type: event_type.clone(),
                        });
                    }
                }
            }
        }

        let mut indices = Vec::with_capacity(event_types.len());
        for event_type in &event_types {
            let counter = self.type_counters.entry(event_type.clone()).or_insert(0);
            indices.push(*counter);
            *counter += 1;
        }
        let id = options
            .id
            .unwrap_or_else(|| ListenerId::derived(&first_type, indices[0]));

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let key = self.bindings.insert(Binding {
            id: id.clone(),
            listener,
            priority: options.priority,
            pivot,
            sequence,
        });
        for event_type in &event_types {
            self.buckets.entry(event_type.clone()).or_default().push(key);
            *self
                .bucket_ids
                .entry(event_type.clone())
                .or_default()
                .entry(id.clone())
                .or_insert(0) += 1;
        }
        self.invalidate();

        debug!(
            "Listener '{}' added for {:?} (priority {}, sequence {}).",
            id, event_types, options.priority, sequence
        );
        Ok(id)
    }

    /// Removes every binding matching `target` from every bucket.
    ///
    /// Ids match by equality, callbacks by identity. Unknown or empty targets
    /// are ignored. Returns the number of bindings removed.
    pub fn remove_listener(&mut self, target: impl Into<RemovalTarget>) -> usize {
        let target = target.into();
        if let RemovalTarget::Id(id) = &target {
            if id.is_empty() {
                return 0;
            }
        }

        let doomed: HashMap<BindingKey, ListenerId> = self
            .bindings
            .iter()
            .filter(|(_, binding)| match &target {
                RemovalTarget::Id(id) => &binding.id == id,
                RemovalTarget::Callback(listener) => binding.listener.same_as(listener),
            })
            .map(|(key, binding)| (key, binding.id.clone()))
            .collect();
        if doomed.is_empty() {
            trace!("Removal target {:?} matched no listener.", target);
            return 0;
        }

        for key in doomed.keys() {
            self.bindings.remove(*key);
        }
        let bucket_ids = &mut self.bucket_ids;
        self.buckets.retain(|event_type, keys| {
            keys.retain(|key| match doomed.get(key) {
                Some(id) => {
                    forget_id(bucket_ids, event_type, id);
                    false
                }
                None => true,
            });
            !keys.is_empty()
        });
        self.invalidate();

        debug!("Removed {} listener(s) matching {:?}.", doomed.len(), target);
        doomed.len()
    }

    /// Resolves the ordered listeners that apply to `event`.
    ///
    /// Bindings come from the event's own type and every ancestor type; each
    /// binding is included once even when reachable through several types.
    pub fn get_listeners_for_event(
        &self,
        event: &dyn Event,
    ) -> Result<ResolvedListeners, CircularPivotError> {
        self.resolve_chain(event.lookup_chain())
    }

    /// Like [`get_listeners_for_event`](Self::get_listeners_for_event), for a
    /// type described by name.
    pub fn listeners_for_type(
        &self,
        event_type: &EventType,
        ancestors: &[EventType],
    ) -> Result<ResolvedListeners, CircularPivotError> {
        let mut chain = vec![event_type.clone()];
        chain.extend(ancestors.iter().cloned());
        dedup_in_order(&mut chain);
        self.resolve_chain(chain)
    }

    /// The types that currently have at least one listener, sorted by name.
    pub fn event_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.buckets.keys().cloned().collect();
        types.sort();
        types
    }

    /// The ids registered directly against `event_type`, in registration order.
    pub fn listener_ids(&self, event_type: &EventType) -> Vec<ListenerId> {
        self.buckets
            .get(event_type)
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| self.bindings.get(*key))
                    .map(|binding| binding.id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of stored bindings. A multi-type registration counts once.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn resolve_chain(
        &self,
        chain: Vec<EventType>,
    ) -> Result<ResolvedListeners, CircularPivotError> {
        if self.config.cache_resolved {
            if let Some(resolved) = self.cache.borrow().get(&chain) {
                trace!("Resolved order for {:?} served from cache.", chain);
                return Ok(resolved.clone());
            }
        }

        let mut seen = HashSet::new();
        let collected: Vec<&Binding> = chain
            .iter()
            .filter_map(|event_type| self.buckets.get(event_type))
            .flatten()
            .filter(|key| seen.insert(**key))
            .filter_map(|key| self.bindings.get(*key))
            .collect();

        let ordered = ordering::resolve(collected)?;
        let resolved = ResolvedListeners {
            entries: ordered
                .into_iter()
                .map(|binding| (binding.id.clone(), binding.listener.clone()))
                .collect(),
        };
        trace!("Resolved {} listener(s) for {:?}.", resolved.len(), chain);

        if self.config.cache_resolved && self.config.cache_capacity > 0 {
            let mut cache = self.cache.borrow_mut();
            if cache.len() >= self.config.cache_capacity {
                trace!("Resolution cache full at {} chain(s); clearing.", cache.len());
                cache.clear();
            }
            cache.insert(chain, resolved.clone());
        }
        Ok(resolved)
    }

    fn bucket_contains(&self, event_type: &EventType, id: &ListenerId) -> bool {
        self.bucket_ids
            .get(event_type)
            .is_some_and(|ids| ids.contains_key(id))
    }

    /// Parent/child relations are only known per query, so every mutation
    /// drops every cached order.
    fn invalidate(&mut self) {
        self.cache.get_mut().clear();
    }
}

/// Drops one occurrence of `id` from the index of `event_type`.
fn forget_id(
    bucket_ids: &mut HashMap<EventType, HashMap<ListenerId, usize>>,
    event_type: &EventType,
    id: &ListenerId,
) {
    let Some(ids) = bucket_ids.get_mut(event_type) else {
        return;
    };
    if let Some(count) = ids.get_mut(id) {
        *count -= 1;
        if *count == 0 {
            ids.remove(id);
        }
    }
    if ids.is_empty() {
        bucket_ids.remove(event_type);
    }
}

fn dedup_in_order(event_types: &mut Vec<EventType>) {
    let mut seen = HashSet::new();
    event_types.retain(|event_type| seen.insert(event_type.clone()));
}
