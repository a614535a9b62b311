//! Property tests for queue and watermark invariants.

#![allow(clippy::unwrap_used)]

use bondsmith_core::{AckMatcher, GrantKind, GrantPayload};
use bondsmith_sync::{ConfirmationLedger, GrantStore};
use bondsmith_testkit::{character, item, level_up};
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Enqueue(u32),
    Ack(u32),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..4).prop_map(Op::Enqueue),
        (0u32..4).prop_map(Op::Ack),
    ]
}

proptest! {
    /// The watermark equals the maximum acked level and never decreases
    #[test]
    fn watermark_never_decreases(levels in prop::collection::vec(0u32..50, 1..40)) {
        let mut ledger = ConfirmationLedger::new();
        let id = character("dalinar");
        let mut previous = None;

        for level in &levels {
            ledger.record_level_ack(&id, *level);
            let current = ledger.confirmed_level(&id);
            prop_assert!(current >= previous);
            previous = current;
        }
        prop_assert_eq!(previous, levels.iter().copied().max());
    }

    /// Head-matched acks behave like a model FIFO that only pops on a head match
    #[test]
    fn head_matched_acks_preserve_fifo(ops in prop::collection::vec(arb_op(), 0..60)) {
        let mut store = GrantStore::new();
        let mut model: VecDeque<u32> = VecDeque::new();
        let id = character("dalinar");

        for op in ops {
            match op {
                Op::Enqueue(quantity) => {
                    store.enqueue(&id, item(&id, "sphere", quantity));
                    model.push_back(quantity);
                }
                Op::Ack(quantity) => {
                    let matcher = AckMatcher::Item { item_id: "sphere".to_string(), quantity };
                    let removed = store.acknowledge(&id, GrantKind::Item, &matcher);
                    if model.front() == Some(&quantity) {
                        model.pop_front();
                        prop_assert!(removed.is_some());
                    } else {
                        prop_assert!(removed.is_none());
                    }
                }
            }
        }

        let pending: Vec<u32> = store
            .peek_all(&id)
            .of_kind(GrantKind::Item)
            .iter()
            .map(|event| match &event.payload {
                GrantPayload::Item { quantity, .. } => *quantity,
                _ => unreachable!("item queue holds only items"),
            })
            .collect();
        prop_assert_eq!(pending, model.into_iter().collect::<Vec<_>>());
    }

    /// Operations on one character never touch another's queues
    #[test]
    fn other_characters_untouched(levels in prop::collection::vec(1u32..20, 0..20)) {
        let mut store = GrantStore::new();
        let a = character("dalinar");
        let b = character("navani");
        store.enqueue(&b, level_up(&b, 2));
        let before = store.peek_all(&b);

        for level in levels {
            store.enqueue(&a, level_up(&a, level));
            store.acknowledge(&a, GrantKind::LevelUp, &AckMatcher::Level(level));
        }

        prop_assert_eq!(store.peek_all(&b), before);
    }
}
