//! Collaborator contracts consumed by the card library.

use crate::models::{Card, CardId, OrderMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt record {key}: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Card metadata and raw file bytes, addressed by card id.
#[async_trait::async_trait]
pub trait CardStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Card>, StoreError>;
    async fn get(&self, id: &CardId) -> Result<Option<Card>, StoreError>;
    async fn put(&self, card: &Card) -> Result<(), StoreError>;
    /// Removes the card and its raw bytes.
    async fn delete(&self, id: &CardId) -> Result<(), StoreError>;
    async fn put_bytes(&self, id: &CardId, bytes: &[u8]) -> Result<(), StoreError>;
    async fn get_bytes(&self, id: &CardId) -> Result<Option<Vec<u8>>, StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Holds the single group-key → ordered ids map.
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    async fn load_map(&self) -> Result<OrderMap, StoreError>;
    async fn save_map(&self, map: &OrderMap) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Custom collection names and the theme preference.
#[async_trait::async_trait]
pub trait PrefStore: Send + Sync {
    async fn load_collections(&self) -> Result<Vec<String>, StoreError>;
    async fn save_collections(&self, names: &[String]) -> Result<(), StoreError>;
    async fn load_theme(&self) -> Result<Option<String>, StoreError>;
    async fn save_theme(&self, theme: Option<&str>) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}
