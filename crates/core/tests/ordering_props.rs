use cardshelf_core::ordering::{move_card, resolve_ids};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use storage::models::{Card, CardId, CardKind, Thumbnail};

fn members(n: usize, stamps: &[i64]) -> Vec<Card> {
    (0..n)
        .map(|i| {
            let at = Utc.timestamp_opt(1_700_000_000 + stamps[i % stamps.len()], 0).unwrap();
            Card::new(
                CardId::new(format!("c{i}")),
                format!("Card {i}"),
                CardKind::Document,
                1,
                Thumbnail::placeholder(),
                at,
            )
        })
        .collect()
}

/// Hints drawn from a pool wider than the membership, with repeats.
fn hints() -> impl Strategy<Value = Vec<CardId>> {
    prop::collection::vec((0usize..16).prop_map(|i| CardId::new(format!("c{i}"))), 0..24)
}

fn ids(cards: &[Card]) -> HashSet<CardId> {
    cards.iter().map(|c| c.id.clone()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn resolve_is_a_permutation_of_members(
        n in 0usize..10,
        stamps in prop::collection::vec(0i64..5, 1..10),
        persisted in hints(),
    ) {
        let cards = members(n, &stamps);
        let order = resolve_ids(&cards, &persisted);
        prop_assert_eq!(order.len(), cards.len());
        let unique: HashSet<CardId> = order.iter().cloned().collect();
        prop_assert_eq!(unique, ids(&cards));
    }

    #[test]
    fn resolve_is_deterministic_and_idempotent(
        n in 0usize..10,
        stamps in prop::collection::vec(0i64..5, 1..10),
        persisted in hints(),
    ) {
        let cards = members(n, &stamps);
        let mut shuffled = cards.clone();
        shuffled.reverse();
        let order = resolve_ids(&cards, &persisted);
        prop_assert_eq!(&order, &resolve_ids(&shuffled, &persisted));
        prop_assert_eq!(&order, &resolve_ids(&cards, &order));
    }

    #[test]
    fn move_preserves_membership_and_places_dragged(
        n in 2usize..10,
        stamps in prop::collection::vec(0i64..5, 1..10),
        persisted in hints(),
        d in 0usize..10,
        t in 0usize..10,
        place_before in any::<bool>(),
    ) {
        let cards = members(n, &stamps);
        let dragged = cards[d % n].id.clone();
        let target = cards[t % n].id.clone();
        let moved = move_card(&cards, &persisted, &dragged, &target, place_before);

        prop_assert_eq!(moved.len(), n);
        let unique: HashSet<CardId> = moved.iter().cloned().collect();
        prop_assert_eq!(unique, ids(&cards));
        if dragged != target {
            let di = moved.iter().position(|id| id == &dragged).unwrap();
            let ti = moved.iter().position(|id| id == &target).unwrap();
            if place_before {
                prop_assert_eq!(di + 1, ti);
            } else {
                prop_assert_eq!(ti + 1, di);
            }
        }
        prop_assert_eq!(&moved, &resolve_ids(&cards, &moved));
    }
}
