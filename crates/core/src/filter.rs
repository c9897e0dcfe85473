//! Filter predicate and sort modes for the card list.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use storage::models::Card;

/// Active filter criteria. Empty/`None` fields accept everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub query: String,
    pub tag: Option<String>,
    pub collection: Option<String>,
    pub tier: Option<String>,
    pub favorites_only: bool,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
            && self.tag.is_none()
            && self.collection.is_none()
            && self.tier.is_none()
            && !self.favorites_only
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn matches(card: &Card, criteria: &FilterCriteria) -> bool {
    let query = criteria.query.trim().to_lowercase();
    if !query.is_empty() {
        let in_name = card.name.to_lowercase().contains(&query);
        let in_tags = card.tags.iter().any(|t| t.to_lowercase().contains(&query));
        if !in_name && !in_tags {
            return false;
        }
    }
    if let Some(tag) = non_empty(&criteria.tag) {
        if !card.has_tag(tag) {
            return false;
        }
    }
    if let Some(collection) = non_empty(&criteria.collection) {
        let held = card.collection.as_deref().map(str::trim).unwrap_or("");
        if held.to_lowercase() != collection.to_lowercase() {
            return false;
        }
    }
    if let Some(tier) = non_empty(&criteria.tier) {
        if card.tier.as_deref() != Some(tier) {
            return false;
        }
    }
    !criteria.favorites_only || card.favorite
}

pub fn filter_cards<'a>(cards: &'a [Card], criteria: &FilterCriteria) -> Vec<&'a Card> {
    cards.iter().filter(|c| matches(c, criteria)).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Grouped by collection, manual order within each group.
    #[default]
    None,
    NameAsc,
    NameDesc,
    CreatedNew,
    CreatedOld,
    UpdatedNew,
    PagesDesc,
    PagesAsc,
}

impl SortMode {
    pub const ALL: [SortMode; 8] = [
        SortMode::None,
        SortMode::NameAsc,
        SortMode::NameDesc,
        SortMode::CreatedNew,
        SortMode::CreatedOld,
        SortMode::UpdatedNew,
        SortMode::PagesDesc,
        SortMode::PagesAsc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::None => "none",
            SortMode::NameAsc => "name_asc",
            SortMode::NameDesc => "name_desc",
            SortMode::CreatedNew => "created_new",
            SortMode::CreatedOld => "created_old",
            SortMode::UpdatedNew => "updated_new",
            SortMode::PagesDesc => "pages_desc",
            SortMode::PagesAsc => "pages_asc",
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, SortMode::None)
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| format!("unknown sort mode: {s}"))
    }
}

/// Case-folded comparison with a raw-string tie-break, used wherever names
/// are shown in order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Sorts in place. `slice::sort_by` is stable, so equal keys keep their
/// input order. `SortMode::None` leaves the input untouched.
pub fn sort_cards(cards: &mut [&Card], mode: SortMode) {
    match mode {
        SortMode::None => {}
        SortMode::NameAsc => cards.sort_by(|a, b| compare_names(&a.name, &b.name)),
        SortMode::NameDesc => cards.sort_by(|a, b| compare_names(&b.name, &a.name)),
        SortMode::CreatedNew => cards.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortMode::CreatedOld => cards.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortMode::UpdatedNew => cards.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        SortMode::PagesDesc => cards.sort_by(|a, b| b.page_count.cmp(&a.page_count)),
        SortMode::PagesAsc => cards.sort_by(|a, b| a.page_count.cmp(&b.page_count)),
    }
}
