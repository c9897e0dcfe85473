//! Versioned JSON backup of the whole library.
//!
//! Restores are validated completely (shape, version, card invariants and
//! byte payloads) before any store is written. Tags and collection names are
//! normalized on the way in.

use crate::error::BackupError;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use storage::models::{Card, CardId, GroupKey, OrderMap};
use storage::{CardStore, OrderStore, PrefStore};
use tracing::info;

pub const SCHEMA_VERSION: u32 = 1;

/// Raw bytes as written by any exporter: a numeric array (current) or a
/// base64 string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BytePayload {
    Array(Vec<u8>),
    Base64(String),
}

impl BytePayload {
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            BytePayload::Array(bytes) => Ok(bytes.clone()),
            BytePayload::Base64(text) => {
                base64::engine::general_purpose::STANDARD.decode(text.trim())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub cards: Vec<Card>,
    #[serde(default)]
    pub files: BTreeMap<String, BytePayload>,
    #[serde(default)]
    pub order_map: OrderMap,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl BackupFile {
    pub fn to_json(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A backup that passed every check and is safe to write.
#[derive(Debug, Clone)]
pub struct ValidatedBackup {
    pub cards: Vec<Card>,
    pub files: Vec<(CardId, Vec<u8>)>,
    pub order_map: OrderMap,
    pub collections: Vec<String>,
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreMode {
    /// Upsert into the existing library.
    Merge,
    /// Wipe every store first.
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub cards: usize,
    pub files: usize,
    pub groups: usize,
    pub collections: usize,
}

pub fn parse_backup(file_name: &str, text: &str) -> Result<ValidatedBackup, BackupError> {
    let is_json = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if !is_json {
        return Err(BackupError::WrongExtension(file_name.to_string()));
    }
    let file: BackupFile = serde_json::from_str(text)?;
    validate(file)
}

pub fn validate(mut file: BackupFile) -> Result<ValidatedBackup, BackupError> {
    if file.version == 0 || file.version > SCHEMA_VERSION {
        return Err(BackupError::UnsupportedVersion {
            found: file.version,
            supported: SCHEMA_VERSION,
        });
    }

    let mut seen = HashSet::new();
    for card in &file.cards {
        let invalid = |reason: &str| BackupError::InvalidCard {
            id: card.id.to_string(),
            reason: reason.to_string(),
        };
        if card.id.as_str().trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if card.name.trim().is_empty() {
            return Err(invalid("empty name"));
        }
        if card.page_count == 0 {
            return Err(invalid("page count must be positive"));
        }
        if card.created_at > card.updated_at {
            return Err(invalid("created after last update"));
        }
        if !seen.insert(card.id.clone()) {
            return Err(BackupError::DuplicateCard(card.id.to_string()));
        }
    }
    for card in &mut file.cards {
        let tags = std::mem::take(&mut card.tags);
        card.set_tags(tags);
    }

    let mut files = Vec::with_capacity(file.files.len());
    for (id, payload) in &file.files {
        let bytes = payload.decode().map_err(|source| BackupError::Payload {
            id: id.clone(),
            source,
        })?;
        files.push((CardId::new(id.as_str()), bytes));
    }

    Ok(ValidatedBackup {
        cards: file.cards,
        files,
        order_map: file.order_map,
        collections: clean_collections(&file.collections),
        theme: file.theme,
    })
}

/// Trimmed, non-blank, non-reserved names; the first spelling of a
/// case-insensitive duplicate wins.
fn clean_collections(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| {
            let key = GroupKey::for_collection(Some(*name));
            !key.is_none() && seen.insert(key)
        })
        .map(str::to_string)
        .collect()
}

fn matches_any(names: &[String], name: &str) -> bool {
    let key = GroupKey::for_collection(Some(name));
    names.iter().any(|n| GroupKey::for_collection(Some(n.as_str())) == key)
}

pub async fn export_backup(
    cards: &dyn CardStore,
    order: &dyn OrderStore,
    prefs: &dyn PrefStore,
) -> Result<BackupFile, BackupError> {
    let all = cards.list_all().await?;
    let mut files = BTreeMap::new();
    for card in &all {
        if let Some(bytes) = cards.get_bytes(&card.id).await? {
            files.insert(card.id.to_string(), BytePayload::Array(bytes));
        }
    }
    Ok(BackupFile {
        version: SCHEMA_VERSION,
        exported_at: Utc::now(),
        cards: all,
        files,
        order_map: order.load_map().await?,
        collections: prefs.load_collections().await?,
        theme: prefs.load_theme().await?,
    })
}

/// Writes a validated backup. Names matching a configured built-in are never
/// stored as custom collections.
pub async fn restore(
    backup: ValidatedBackup,
    mode: RestoreMode,
    builtins: &[String],
    cards: &dyn CardStore,
    order: &dyn OrderStore,
    prefs: &dyn PrefStore,
) -> Result<RestoreSummary, BackupError> {
    let incoming: Vec<String> = backup
        .collections
        .into_iter()
        .filter(|name| !matches_any(builtins, name))
        .collect();
    let summary = RestoreSummary {
        cards: backup.cards.len(),
        files: backup.files.len(),
        groups: backup.order_map.len(),
        collections: incoming.len(),
    };

    let (order_map, collections) = match mode {
        RestoreMode::Replace => {
            cards.clear().await?;
            order.clear().await?;
            prefs.clear().await?;
            (backup.order_map, incoming)
        }
        RestoreMode::Merge => {
            let mut map = order.load_map().await?;
            map.extend(backup.order_map);
            let mut names = prefs.load_collections().await?;
            for name in incoming {
                if !matches_any(&names, &name) {
                    names.push(name);
                }
            }
            (map, names)
        }
    };

    for card in &backup.cards {
        cards.put(card).await?;
    }
    for (id, bytes) in &backup.files {
        cards.put_bytes(id, bytes).await?;
    }
    order.save_map(&order_map).await?;
    prefs.save_collections(&collections).await?;
    if backup.theme.is_some() {
        prefs.save_theme(backup.theme.as_deref()).await?;
    }

    info!(
        ?mode,
        cards = summary.cards,
        files = summary.files,
        "backup restored"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": "Deck",
            "pageCount": 2,
            "kind": "document",
            "tags": ["lore"],
            "collection": null,
            "tier": null,
            "favorite": false,
            "thumbnail": { "mime": "image/png", "data": [1, 2, 3] },
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        })
    }

    fn backup_json(cards: Vec<serde_json::Value>, files: serde_json::Value) -> String {
        json!({
            "version": 1,
            "exportedAt": "2024-02-01T00:00:00Z",
            "cards": cards,
            "files": files,
            "orderMap": { "__none__": ["a"] },
            "collections": ["Maps"],
            "theme": "dark"
        })
        .to_string()
    }

    #[test]
    fn accepts_array_and_base64_payloads() {
        let text = backup_json(
            vec![card_json("a"), card_json("b")],
            json!({ "a": [37, 80, 68, 70], "b": "JVBERg==" }),
        );
        let backup = parse_backup("shelf.json", &text).unwrap();
        assert_eq!(backup.files.len(), 2);
        assert!(backup.files.iter().all(|(_, bytes)| bytes == b"%PDF"));
        assert_eq!(backup.theme.as_deref(), Some("dark"));
    }

    #[test]
    fn rejects_wrong_extension_before_parsing() {
        let err = parse_backup("shelf.txt", "{}").unwrap_err();
        assert!(matches!(err, BackupError::WrongExtension(_)));
    }

    #[test]
    fn rejects_bad_shapes_and_versions() {
        assert!(matches!(
            parse_backup("x.json", "not json").unwrap_err(),
            BackupError::Parse(_)
        ));
        assert!(matches!(
            parse_backup("x.json", r#"{"version": 1}"#).unwrap_err(),
            BackupError::Parse(_)
        ));
        let future = backup_json(vec![], json!({})).replace("\"version\":1", "\"version\":9");
        assert!(matches!(
            parse_backup("x.json", &future).unwrap_err(),
            BackupError::UnsupportedVersion { found: 9, .. }
        ));
    }

    #[test]
    fn rejects_invalid_cards_and_payloads() {
        let mut bad = card_json("a");
        bad["name"] = json!("  ");
        let text = backup_json(vec![bad], json!({}));
        assert!(matches!(
            parse_backup("x.json", &text).unwrap_err(),
            BackupError::InvalidCard { .. }
        ));

        let mut flat = card_json("a");
        flat["pageCount"] = json!(0);
        let text = backup_json(vec![flat], json!({}));
        assert!(matches!(
            parse_backup("x.json", &text).unwrap_err(),
            BackupError::InvalidCard { reason, .. } if reason.contains("page count")
        ));

        let mut backwards = card_json("a");
        backwards["createdAt"] = json!("2024-03-01T00:00:00Z");
        let text = backup_json(vec![backwards], json!({}));
        assert!(matches!(
            parse_backup("x.json", &text).unwrap_err(),
            BackupError::InvalidCard { reason, .. } if reason.contains("created after")
        ));

        let text = backup_json(vec![card_json("a"), card_json("a")], json!({}));
        assert!(matches!(
            parse_backup("x.json", &text).unwrap_err(),
            BackupError::DuplicateCard(_)
        ));

        let text = backup_json(vec![card_json("a")], json!({ "a": "***" }));
        assert!(matches!(
            parse_backup("x.json", &text).unwrap_err(),
            BackupError::Payload { .. }
        ));
    }

    #[test]
    fn normalizes_tags_and_collection_names() {
        let mut card = card_json("a");
        card["tags"] = json!(["Foo", "foo", " ", " lore "]);
        let mut text: serde_json::Value =
            serde_json::from_str(&backup_json(vec![card], json!({}))).unwrap();
        text["collections"] = json!(["Dayseal", "", "  ", "__none__", " Maps ", "MAPS", "Atlas"]);
        let backup = parse_backup("x.json", &text.to_string()).unwrap();
        assert_eq!(backup.cards[0].tags, vec!["Foo", "lore"]);
        assert_eq!(backup.collections, vec!["Dayseal", "Maps", "Atlas"]);
    }
}
