use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque, immutable card identifier assigned at import.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Document,
    AnimatedImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub mime: String,
    pub data: Vec<u8>,
    #[serde(default)]
    pub placeholder: bool,
}

// 1x1 grey PNG.
const PLACEHOLDER_PNG: [u8; 68] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x04, 0x00, 0x00, 0x00, 0xb5,
    0x1c, 0x0c, 0x02, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0x60, 0x00, 0x00, 0x00, 0x06, 0x00, 0x02, 0x30, 0x81, 0xd0, 0x2f, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

impl Thumbnail {
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            mime: "image/png".to_string(),
            data,
            placeholder: false,
        }
    }

    /// Stand-in preview used when rendering fails or is unavailable.
    pub fn placeholder() -> Self {
        Self {
            mime: "image/png".to_string(),
            data: PLACEHOLDER_PNG.to_vec(),
            placeholder: true,
        }
    }
}

/// One catalogued document or animation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub page_count: u32,
    pub kind: CardKind,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    pub thumbnail: Thumbnail,
    #[serde(default)]
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(
        id: CardId,
        name: impl Into<String>,
        kind: CardKind,
        page_count: u32,
        thumbnail: Thumbnail,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            page_count: page_count.max(1),
            kind,
            tags: Vec::new(),
            collection: None,
            tier: None,
            favorite: false,
            thumbnail,
            content_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes `updated_at`, never letting it fall behind `created_at`
    /// or its previous value.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.updated_at).max(self.created_at);
    }

    /// Replaces the tag set; see [`normalize_tags`].
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey::for_collection(self.collection.as_deref())
    }
}

/// Trims, drops empties, de-duplicates ignoring case (first spelling wins)
/// and sorts case-insensitively.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        let folded = tag.to_lowercase();
        if tag.is_empty() || out.iter().any(|t| t.to_lowercase() == folded) {
            continue;
        }
        out.push(tag.to_string());
    }
    out.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    out
}

/// Normalized index into the [`OrderMap`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    /// Key used for cards without a collection.
    pub const NONE: &'static str = "__none__";

    pub fn for_collection(collection: Option<&str>) -> Self {
        match collection.map(str::trim) {
            Some(name) if !name.is_empty() => Self(name.to_lowercase()),
            _ => Self(Self::NONE.to_string()),
        }
    }

    pub fn none() -> Self {
        Self(Self::NONE.to_string())
    }

    pub fn is_none(&self) -> bool {
        self.0 == Self::NONE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-group manual ordering hints.
pub type OrderMap = BTreeMap<GroupKey, Vec<CardId>>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn card() -> Card {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Card::new(CardId::from("c1"), "Deck", CardKind::Document, 3, Thumbnail::placeholder(), t)
    }

    #[test]
    fn tags_dedupe_ignoring_case_and_sort() {
        let mut c = card();
        c.set_tags(["zeta", "Alpha", "alpha", " ", "beta ", "ZETA"]);
        assert_eq!(c.tags, vec!["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut c = card();
        let earlier = c.created_at - chrono::Duration::seconds(30);
        c.touch(earlier);
        assert_eq!(c.updated_at, c.created_at);
        let later = c.created_at + chrono::Duration::seconds(30);
        c.touch(later);
        assert_eq!(c.updated_at, later);
    }

    #[test]
    fn group_keys_fold_case_and_reserve_none() {
        assert_eq!(GroupKey::for_collection(Some("Dayseal")), GroupKey::for_collection(Some("dayseal ")));
        assert!(GroupKey::for_collection(Some("  ")).is_none());
        assert!(GroupKey::for_collection(None).is_none());
    }

    #[test]
    fn card_json_uses_camel_case() {
        let json = serde_json::to_value(card()).unwrap();
        assert_eq!(json["pageCount"], 3);
        assert_eq!(json["kind"], "document");
        assert!(json.get("createdAt").is_some());
    }
}
