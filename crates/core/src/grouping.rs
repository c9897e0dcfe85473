//! Derives the displayed card list: filter, then either sort flat or group by
//! collection with manual order inside each group.

use crate::filter::{compare_names, filter_cards, sort_cards, FilterCriteria, SortMode};
use crate::ordering;
use std::collections::HashMap;
use storage::models::{Card, GroupKey, OrderMap};

pub const NONE_LABEL: &str = "(None)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupLabel {
    Collection(String),
    Unassigned,
}

impl GroupLabel {
    pub fn as_str(&self) -> &str {
        match self {
            GroupLabel::Collection(name) => name,
            GroupLabel::Unassigned => NONE_LABEL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CardGroup<'a> {
    pub label: GroupLabel,
    pub key: GroupKey,
    pub cards: Vec<&'a Card>,
}

#[derive(Debug, Clone)]
pub enum CardView<'a> {
    Flat(Vec<&'a Card>),
    Grouped(Vec<CardGroup<'a>>),
}

impl<'a> CardView<'a> {
    /// Cards in display order, groups concatenated.
    pub fn cards(&self) -> Vec<&'a Card> {
        match self {
            CardView::Flat(cards) => cards.clone(),
            CardView::Grouped(groups) => groups.iter().flat_map(|g| g.cards.iter().copied()).collect(),
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        match self {
            CardView::Flat(_) => Vec::new(),
            CardView::Grouped(groups) => groups.iter().map(|g| g.label.as_str()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CardView::Flat(cards) => cards.is_empty(),
            CardView::Grouped(groups) => groups.is_empty(),
        }
    }
}

/// Partitions cards by collection. Built-ins come first in their fixed
/// order, then other collections alphabetically, then unassigned cards.
/// Empty buckets are omitted. Member order within a bucket is input order.
/// Labels take the registered spelling from `builtins` or `customs` when one
/// matches, else the first card's spelling.
pub fn group_cards<'a>(
    cards: &[&'a Card],
    builtins: &[String],
    customs: &[String],
) -> Vec<CardGroup<'a>> {
    let mut buckets: HashMap<GroupKey, CardGroup<'a>> = HashMap::new();
    for &card in cards {
        let key = card.group_key();
        let bucket = buckets.entry(key.clone()).or_insert_with(|| CardGroup {
            label: label_for(card.collection.as_deref(), builtins, customs),
            key,
            cards: Vec::new(),
        });
        bucket.cards.push(card);
    }

    let mut out = Vec::with_capacity(buckets.len());
    for name in builtins {
        if let Some(group) = buckets.remove(&GroupKey::for_collection(Some(name))) {
            out.push(group);
        }
    }
    let unassigned = buckets.remove(&GroupKey::none());
    let mut custom: Vec<CardGroup<'a>> = buckets.into_values().collect();
    custom.sort_by(|a, b| compare_names(a.label.as_str(), b.label.as_str()));
    out.extend(custom);
    out.extend(unassigned);
    out
}

fn label_for(collection: Option<&str>, builtins: &[String], customs: &[String]) -> GroupLabel {
    let key = GroupKey::for_collection(collection);
    if key.is_none() {
        return GroupLabel::Unassigned;
    }
    let name = builtins
        .iter()
        .chain(customs)
        .find(|b| GroupKey::for_collection(Some(b)) == key)
        .map(String::as_str)
        .or(collection)
        .unwrap_or_default();
    GroupLabel::Collection(name.trim().to_string())
}

/// Full pipeline. With `SortMode::None` the result is grouped and each
/// group is put in resolved manual order; otherwise a flat sorted list.
pub fn build_view<'a>(
    cards: &'a [Card],
    criteria: &FilterCriteria,
    sort: SortMode,
    builtins: &[String],
    customs: &[String],
    order_map: &OrderMap,
) -> CardView<'a> {
    let mut visible = filter_cards(cards, criteria);
    if !sort.is_manual() {
        sort_cards(&mut visible, sort);
        return CardView::Flat(visible);
    }
    let mut groups = group_cards(&visible, builtins, customs);
    for group in &mut groups {
        let persisted = order_map.get(&group.key).map(Vec::as_slice).unwrap_or(&[]);
        group.cards = ordering::resolve(&group.cards, persisted);
    }
    CardView::Grouped(groups)
}
