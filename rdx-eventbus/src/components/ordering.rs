//! The ordering engine: turns an unordered listener set into its execution order.
//!
//! Resolution runs in two passes.
//!
//! 1. **Priority pass.** Entries are sorted by priority, highest first. Equal
//!    priorities keep registration order. The result is the *base order*.
//! 2. **Pivot pass.** An entry declaring `Before(p)` or `After(p)` is detached
//!    from its base position and attached next to the entry whose id is `p`.
//!    Entries attached to the same pivot keep base order among themselves.
//!    Every entry without a usable pivot is a root; the final order is the
//!    expansion of each root, in base order, as
//!    `[attached-before..., root, attached-after...]`, recursively.
//!
//! A pivot id that names no entry is dropped and the entry stays a root. An
//! entry that can never be reached from a root is part of a cycle, or its chain
//! ends in one; all such entries are reported in one [`CircularPivotError`].
//!
//! The engine knows nothing about callbacks or event types, only [`Orderable`].

use crate::common::ListenerId;
use crate::error::CircularPivotError;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A relative placement constraint naming another listener's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pivot {
    /// Run immediately before the named listener.
    Before(ListenerId),
    /// Run immediately after the named listener.
    After(ListenerId),
}

impl Pivot {
    pub fn target(&self) -> &ListenerId {
        match self {
            Pivot::Before(id) | Pivot::After(id) => id,
        }
    }
}

/// Anything the engine can order.
pub trait Orderable {
    /// The id other entries use to pivot on this one.
    fn pivot_id(&self) -> &ListenerId;
    fn priority(&self) -> i32;
    /// Registration sequence number, unique per entry.
    fn sequence(&self) -> u64;
    fn pivot(&self) -> Option<&Pivot>;
}

impl<T: Orderable + ?Sized> Orderable for &T {
    fn pivot_id(&self) -> &ListenerId {
        (**self).pivot_id()
    }

    fn priority(&self) -> i32 {
        (**self).priority()
    }

    fn sequence(&self) -> u64 {
        (**self).sequence()
    }

    fn pivot(&self) -> Option<&Pivot> {
        (**self).pivot()
    }
}

#[derive(Default)]
struct Attachments {
    before: Vec<usize>,
    after: Vec<usize>,
}

/// Computes the execution order of `entries`.
///
/// The result is a pure function of the entries' ids, priorities, pivots and
/// sequence numbers; the input order does not matter.
pub fn resolve<T: Orderable>(mut entries: Vec<T>) -> Result<Vec<T>, CircularPivotError> {
    // Priority pass. `sequence` is unique, so the order is total.
    entries.sort_by(|a, b| {
        b.priority()
            .cmp(&a.priority())
            .then_with(|| a.sequence().cmp(&b.sequence()))
    });

    if entries.iter().all(|entry| entry.pivot().is_none()) {
        return Ok(entries);
    }

    // First entry in base order wins when an id is shared.
    let mut positions: HashMap<&ListenerId, usize> = HashMap::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        positions.entry(entry.pivot_id()).or_insert(index);
    }

    let mut attachments: Vec<Attachments> = (0..entries.len())
        .map(|_| Attachments::default())
        .collect();
    let mut roots = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(pivot) = entry.pivot() else {
            roots.push(index);
            continue;
        };
        match positions.get(pivot.target()) {
            Some(&target) => match pivot {
                Pivot::Before(_) => attachments[target].before.push(index),
                Pivot::After(_) => attachments[target].after.push(index),
            },
            None => {
                debug!(
                    "Listener '{}' pivots on unknown id '{}'; keeping its priority position.",
                    entry.pivot_id(),
                    pivot.target()
                );
                roots.push(index);
            }
        }
    }

    let mut order = Vec::with_capacity(entries.len());
    for root in roots {
        expand(root, &attachments, &mut order);
    }

    if order.len() != entries.len() {
        let mut placed = vec![false; entries.len()];
        for &index in &order {
            placed[index] = true;
        }
        let mut reported = HashSet::new();
        let mut ids: Vec<ListenerId> = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            if !placed[index] && reported.insert(entry.pivot_id()) {
                ids.push(entry.pivot_id().clone());
            }
        }
        warn!("Circular pivot ids detected: {:?}", ids);
        return Err(CircularPivotError { ids });
    }

    let mut slots: Vec<Option<T>> = entries.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect())
}

/// Appends the in-order expansion of `index` to `order`.
///
/// Attachments form a forest (each entry has at most one pivot), so every
/// entry reachable from a root is visited exactly once. The walk keeps its own
/// stack so chain length is bounded by memory, not by the thread stack.
fn expand(index: usize, attachments: &[Attachments], order: &mut Vec<usize>) {
    // `(entry, emit)`: emit pushes the entry itself, otherwise it is unfolded.
    let mut stack = vec![(index, false)];
    while let Some((current, emit)) = stack.pop() {
        if emit {
            order.push(current);
            continue;
        }
        let links = &attachments[current];
        stack.extend(links.after.iter().rev().map(|&child| (child, false)));
        stack.push((current, true));
        stack.extend(links.before.iter().rev().map(|&child| (child, false)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Entry {
        id: ListenerId,
        priority: i32,
        sequence: u64,
        pivot: Option<Pivot>,
    }

    impl Orderable for Entry {
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

    /// Builds entries in registration order from `(id, priority, pivot)` triples.
    fn entries(rows: &[(&str, i32, Option<Pivot>)]) -> Vec<Entry> {
        rows
            .iter()
            .enumerate()
            .map(|(sequence, (id, priority, pivot))| Entry {
                id: ListenerId::from(*id),
                priority: *priority,
                sequence: sequence as u64,
                pivot: pivot.clone(),
            })
            .collect()
    }

    fn before(id: &str) -> Option<Pivot> {
        Some(Pivot::Before(id.into()))
    }

    fn after(id: &str) -> Option<Pivot> {
        Some(Pivot::After(id.into()))
    }

    fn ids(resolved: &[Entry]) -> Vec<&str> {
        resolved.iter().map(|entry| entry.id.as_str()).collect()
    }

    #[test]
    fn empty_set_resolves_to_nothing() {
        assert!(resolve(Vec::<Entry>::new()).unwrap().is_empty());
    }

    #[test]
    fn priority_descending_with_registration_tie_break() {
        let resolved = resolve(entries(&[
            ("a", 0, None),
            ("b", -400, None),
            ("c", -500, None),
            ("d", -500, None),
            ("e", 500, None),
            ("f", -700, None),
        ]))
        .unwrap();
        assert_eq!(ids(&resolved), ["e", "a", "b", "c", "d", "f"]);
    }

    #[test]
    fn before_chain_is_placed_at_its_anchor() {
        let resolved = resolve(entries(&[
            ("2", 0, before("3")),
            ("1", 0, before("2")),
            ("0", 0, before("1")),
            ("4", 0, after("3")),
            ("3", 0, None),
        ]))
        .unwrap();
        assert_eq!(ids(&resolved), ["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn pivots_override_individual_priorities() {
        let resolved = resolve(entries(&[
            ("1", 100, None),
            ("0", 0, before("1")),
            ("2", 50, None),
            ("3", 0, before("4")),
            ("4", 0, after("2")),
            ("5", 0, None),
        ]))
        .unwrap();
        assert_eq!(ids(&resolved), ["0", "1", "2", "3", "4", "5"]);
    }

    #[test]
    fn after_chain_follows_its_anchor() {
        let resolved = resolve(entries(&[
            ("5", 0, None),
            ("7", 0, after("5")),
            ("6", 0, before("7")),
        ]))
        .unwrap();
        assert_eq!(ids(&resolved), ["5", "6", "7"]);
    }

    #[test]
    fn missing_pivot_keeps_priority_position() {
        let resolved = resolve(entries(&[
            ("a", 10, None),
            ("b", 0, before("nope")),
            ("c", 5, None),
        ]))
        .unwrap();
        assert_eq!(ids(&resolved), ["a", "c", "b"]);
    }

    #[test]
    fn siblings_on_one_pivot_keep_base_order() {
        let resolved = resolve(entries(&[
            ("p", 0, None),
            ("x", 0, before("p")),
            ("y", 10, before("p")),
        ]))
        .unwrap();
        assert_eq!(ids(&resolved), ["y", "x", "p"]);
    }

    #[test]
    fn cycle_reports_members_and_dependents() {
        let err = resolve(entries(&[
            ("0", 0, before("1")),
            ("1", 0, before("2")),
            ("2", 0, before("1")),
        ]))
        .unwrap_err();
        assert_eq!(err.ids, vec![ListenerId::from("0"), "1".into(), "2".into()]);
    }

    #[test]
    fn mixed_before_after_cycle_is_detected() {
        let err = resolve(entries(&[
            ("ok", 0, None),
            ("x", 0, after("y")),
            ("y", 0, before("x")),
        ]))
        .unwrap_err();
        assert_eq!(err.ids, vec![ListenerId::from("x"), "y".into()]);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let err = resolve(entries(&[("solo", 0, before("solo"))])).unwrap_err();
        assert_eq!(err.ids, vec![ListenerId::from("solo")]);
    }

    #[test]
    fn input_order_does_not_matter() {
        let rows = [
            ("a", 1, None),
            ("b", 0, after("a")),
            ("c", 1, None),
            ("d", 0, before("c")),
        ];
        let forward = resolve(entries(&rows)).unwrap();
        let mut shuffled = entries(&rows);
        shuffled.reverse();
        let backward = resolve(shuffled).unwrap();
        assert_eq!(ids(&forward), ids(&backward));
        assert_eq!(ids(&forward), ["a", "b", "d", "c"]);
    }

    fn chain(len: usize, link: fn(&str) -> Option<Pivot>) -> Vec<Entry> {
        (0..len)
            .map(|index| Entry {
                id: ListenerId::new(format!("l{}", index)),
                priority: 0,
                sequence: index as u64,
                pivot: (index + 1 < len).then(|| link(&format!("l{}", index + 1))).flatten(),
            })
            .collect()
    }

    #[test]
    fn very_long_before_chain_resolves() {
        let len = 100_000;
        let resolved = resolve(chain(len, before)).unwrap();
        assert_eq!(resolved.len(), len);
        assert!(resolved
            .iter()
            .enumerate()
            .all(|(position, entry)| entry.sequence == position as u64));
    }

    #[test]
    fn very_long_after_chain_resolves_in_reverse() {
        let len = 100_000;
        let resolved = resolve(chain(len, after)).unwrap();
        assert_eq!(resolved.len(), len);
        assert_eq!(resolved[0].id, "l99999");
        assert_eq!(resolved[len - 1].id, "l0");
    }

    #[test]
    fn nested_attachments_expand_in_order() {
        let resolved = resolve(entries(&[
            ("root", 0, None),
            ("b1", 0, before("root")),
            ("a1", 0, after("root")),
            ("b2", 0, before("root")),
            ("b1b", 0, before("b1")),
            ("a1a", 0, after("a1")),
        ]))
        .unwrap();
        assert_eq!(ids(&resolved), ["b1b", "b1", "b2", "root", "a1", "a1a"]);
    }
}
