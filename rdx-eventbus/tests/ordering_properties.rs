use eventbus::common::ListenerId;
use eventbus::components::ordering::{resolve, Orderable, Pivot};
use proptest::prelude::*;
use std::cmp::Reverse;

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

fn plain(priorities: &[i32]) -> Vec<Entry> {
    priorities
        .iter()
        .enumerate()
        .map(|(index, priority)| Entry {
            id: ListenerId::new(format!("l{}", index)),
            priority: *priority,
            sequence: index as u64,
            pivot: None,
        })
        .collect()
}

fn ids(entries: &[Entry]) -> Vec<String> {
    entries.iter().map(|entry| entry.id.to_string()).collect()
}

proptest! {
    #[test]
    fn without_pivots_order_is_a_stable_priority_sort(
        priorities in prop::collection::vec(-3i32..3, 0..40)
    ) {
        let entries = plain(&priorities);
        let mut expected = entries.clone();
        expected.sort_by_key(|entry| Reverse(entry.priority));

        let resolved = resolve(entries).unwrap();
        prop_assert_eq!(ids(&resolved), ids(&expected));
    }

    #[test]
    fn before_chains_are_contiguous_whatever_the_priorities(
        priorities in prop::collection::vec(-100i32..100, 2..30),
        chain_len in 2usize..6,
    ) {
        let chain_len = chain_len.min(priorities.len());
        let mut entries = plain(&priorities);
        // l0 before l1 before ... before l(chain_len - 1).
        for index in 0..chain_len - 1 {
            entries[index].pivot = Some(Pivot::Before(ListenerId::new(format!("l{}", index + 1))));
        }

        let resolved = ids(&resolve(entries).unwrap());
        let start = resolved.iter().position(|id| id == "l0").unwrap();
        for offset in 0..chain_len {
            prop_assert_eq!(&resolved[start + offset], &format!("l{}", offset));
        }
    }

    #[test]
    fn cycles_report_members_and_dependents_only(
        free in 0usize..5,
        cycle_len in 1usize..5,
        dependents in 0usize..4,
    ) {
        let mut entries = Vec::new();
        let mut push = |id: String, pivot: Option<Pivot>| {
            let sequence = entries.len() as u64;
            entries.push(Entry { id: ListenerId::new(id), priority: 0, sequence, pivot });
        };
        for index in 0..free {
            push(format!("free{}", index), None);
        }
        for index in 0..cycle_len {
            let next = format!("cyc{}", (index + 1) % cycle_len);
            push(format!("cyc{}", index), Some(Pivot::After(ListenerId::new(next))));
        }
        for index in 0..dependents {
            let target = if index == 0 { "cyc0".to_string() } else { format!("dep{}", index - 1) };
            push(format!("dep{}", index), Some(Pivot::Before(ListenerId::new(target))));
        }

        let err = resolve(entries).unwrap_err();
        prop_assert_eq!(err.ids.len(), cycle_len + dependents);
        prop_assert!(err.ids.iter().all(|id| !id.as_str().starts_with("free")));
    }

    #[test]
    fn resolution_is_deterministic_and_input_order_independent(
        priorities in prop::collection::vec(-2i32..2, 1..25),
        pivots in prop::collection::vec((any::<bool>(), 0usize..25), 1..25),
    ) {
        let mut entries = plain(&priorities);
        let len = entries.len();
        // Only point at lower indices so no cycle can form.
        for (index, (before, target)) in pivots.into_iter().enumerate().take(len) {
            if index == 0 {
                continue;
            }
            let target = ListenerId::new(format!("l{}", target % index));
            entries[index].pivot = Some(if before { Pivot::Before(target) } else { Pivot::After(target) });
        }

        let once = ids(&resolve(entries.clone()).unwrap());
        let twice = ids(&resolve(entries.clone()).unwrap());
        entries.reverse();
        let reversed = ids(&resolve(entries).unwrap());
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(&once, &reversed);
        prop_assert_eq!(once.len(), len);
    }
}
