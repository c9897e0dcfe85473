//! Order reconciliation: merges authoritative group membership with the
//! persisted (possibly stale) order hints.
//!
//! Membership always comes from card metadata. A persisted list only
//! contributes relative order for ids that are still members.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use storage::models::{Card, CardId};

/// Anything that can take part in a group ordering.
pub trait Orderable {
    fn order_id(&self) -> &CardId;
    fn order_created_at(&self) -> DateTime<Utc>;
}

impl Orderable for Card {
    fn order_id(&self) -> &CardId {
        &self.id
    }

    fn order_created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl<T: Orderable + ?Sized> Orderable for &T {
    fn order_id(&self) -> &CardId {
        (**self).order_id()
    }

    fn order_created_at(&self) -> DateTime<Utc> {
        (**self).order_created_at()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Earlier,
    Later,
}

/// Orders `members` by the persisted hints, then appends members the hints
/// never mention by ascending creation time (id breaks ties). Every member
/// appears exactly once; ids outside `members` are dropped.
pub fn resolve<T: Orderable + Clone>(members: &[T], persisted: &[CardId]) -> Vec<T> {
    let mut lookup: HashMap<&CardId, &T> = HashMap::with_capacity(members.len());
    for member in members {
        lookup.entry(member.order_id()).or_insert(member);
    }

    let mut out: Vec<T> = Vec::with_capacity(lookup.len());
    let mut placed: HashSet<&CardId> = HashSet::with_capacity(lookup.len());
    for id in persisted {
        if let Some(&member) = lookup.get(id) {
            if placed.insert(member.order_id()) {
                out.push(member.clone());
            }
        }
    }

    let mut remaining: Vec<&T> = lookup
        .values()
        .copied()
        .filter(|m| !placed.contains(m.order_id()))
        .collect();
    remaining.sort_by(|a, b| {
        a.order_created_at()
            .cmp(&b.order_created_at())
            .then_with(|| a.order_id().cmp(b.order_id()))
    });
    out.extend(remaining.into_iter().cloned());
    out
}

pub fn resolve_ids<T: Orderable + Clone>(members: &[T], persisted: &[CardId]) -> Vec<CardId> {
    resolve(members, persisted)
        .iter()
        .map(|m| m.order_id().clone())
        .collect()
}

/// Computes the new persisted list after dropping `dragged` next to
/// `target`. Pure: persisting the result is up to the caller.
///
/// The working list is the resolved order, so members missing from the
/// hints keep their visual position. A target that is not in the list
/// sends the dragged card to the end; dropping a card onto itself changes
/// nothing.
pub fn move_card<T: Orderable + Clone>(
    members: &[T],
    persisted: &[CardId],
    dragged: &CardId,
    target: &CardId,
    place_before: bool,
) -> Vec<CardId> {
    let mut working = resolve_ids(members, persisted);
    if dragged == target {
        return working;
    }
    let member_ids: HashSet<&CardId> = members.iter().map(|m| m.order_id()).collect();

    working.retain(|id| id != dragged);
    match working.iter().position(|id| id == target) {
        Some(idx) if place_before => working.insert(idx, dragged.clone()),
        Some(idx) => working.insert(idx + 1, dragged.clone()),
        None => working.push(dragged.clone()),
    }
    working.retain(|id| member_ids.contains(id));
    working
}

/// Swaps `id` with its neighbour in the resolved order. `None` when the
/// card is not a member or is already at that end.
pub fn shift_card<T: Orderable + Clone>(
    members: &[T],
    persisted: &[CardId],
    id: &CardId,
    direction: Direction,
) -> Option<Vec<CardId>> {
    let mut working = resolve_ids(members, persisted);
    let idx = working.iter().position(|m| m == id)?;
    let neighbour = match direction {
        Direction::Earlier => idx.checked_sub(1)?,
        Direction::Later => {
            let next = idx + 1;
            if next >= working.len() {
                return None;
            }
            next
        }
    };
    working.swap(idx, neighbour);
    Some(working)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::card_at;

    fn ids(list: &[CardId]) -> Vec<&str> {
        list.iter().map(CardId::as_str).collect()
    }

    fn abc() -> Vec<Card> {
        vec![card_at("A", "a", 0), card_at("B", "b", 1), card_at("C", "c", 2)]
    }

    #[test]
    fn resolve_follows_hints_then_creation_time() {
        let cards = abc();
        let persisted = vec![CardId::from("C"), CardId::from("gone"), CardId::from("A")];
        assert_eq!(ids(&resolve_ids(&cards, &persisted)), vec!["C", "A", "B"]);
    }

    #[test]
    fn resolve_ignores_duplicate_hints() {
        let cards = abc();
        let persisted = vec![CardId::from("B"), CardId::from("B"), CardId::from("A")];
        assert_eq!(ids(&resolve_ids(&cards, &persisted)), vec!["B", "A", "C"]);
    }

    #[test]
    fn unseen_members_tie_break_on_id() {
        let cards = vec![card_at("z", "z", 5), card_at("m", "m", 5), card_at("a", "a", 9)];
        assert_eq!(ids(&resolve_ids(&cards, &[])), vec!["m", "z", "a"]);
    }

    #[test]
    fn move_places_before_and_after() {
        let cards = abc();
        let seed = resolve_ids(&cards, &[]);
        let before = move_card(&cards, &seed, &CardId::from("C"), &CardId::from("A"), true);
        assert_eq!(ids(&before), vec!["C", "A", "B"]);
        let after = move_card(&cards, &seed, &CardId::from("A"), &CardId::from("C"), false);
        assert_eq!(ids(&after), vec!["B", "C", "A"]);
    }

    #[test]
    fn first_move_seeds_from_visual_order() {
        let cards = abc();
        let out = move_card(&cards, &[], &CardId::from("B"), &CardId::from("A"), true);
        assert_eq!(ids(&out), vec!["B", "A", "C"]);
    }

    #[test]
    fn self_drop_keeps_order() {
        let cards = abc();
        let out = move_card(&cards, &[], &CardId::from("B"), &CardId::from("B"), false);
        assert_eq!(ids(&out), vec!["A", "B", "C"]);
    }

    #[test]
    fn missing_target_appends() {
        let cards = abc();
        let out = move_card(&cards, &[], &CardId::from("A"), &CardId::from("nope"), true);
        assert_eq!(ids(&out), vec!["B", "C", "A"]);
    }

    #[test]
    fn foreign_dragged_id_is_filtered_out() {
        let cards = abc();
        let out = move_card(&cards, &[], &CardId::from("X"), &CardId::from("A"), true);
        assert_eq!(ids(&out), vec!["A", "B", "C"]);
    }

    #[test]
    fn shift_swaps_with_neighbour() {
        let cards = abc();
        let out = shift_card(&cards, &[], &CardId::from("B"), Direction::Earlier).unwrap();
        assert_eq!(ids(&out), vec!["B", "A", "C"]);
        let out = shift_card(&cards, &out, &CardId::from("B"), Direction::Later).unwrap();
        assert_eq!(ids(&out), vec!["A", "B", "C"]);
        assert!(shift_card(&cards, &[], &CardId::from("A"), Direction::Earlier).is_none());
        assert!(shift_card(&cards, &[], &CardId::from("C"), Direction::Later).is_none());
        assert!(shift_card(&cards, &[], &CardId::from("X"), Direction::Later).is_none());
    }
}
