//! SQLite backend. Each record is a JSON document keyed by id, so the
//! schema stays a plain key-value layout.

use crate::models::{Card, CardId, OrderMap};
use crate::store::{CardStore, OrderStore, PrefStore, StoreError};
use sqlx::SqlitePool;

const COLLECTIONS_KEY: &str = "collections";
const THEME_KEY: &str = "theme";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects and runs migrations.
    pub async fn open(database_url: &str) -> anyhow::Result<Self> {
        let pool = crate::connect(database_url).await?;
        crate::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn get_pref(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM prefs WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn set_pref(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        match value {
            Some(v) => {
                sqlx::query(
                    "INSERT INTO prefs (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )
                .bind(key)
                .bind(v)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM prefs WHERE key = ?1")
                    .bind(key)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }
}

fn decode_card(id: &str, json: &str) -> Result<Card, StoreError> {
    serde_json::from_str(json).map_err(|source| StoreError::Corrupt {
        key: id.to_string(),
        source,
    })
}

#[async_trait::async_trait]
impl CardStore for SqliteStore {
    async fn list_all(&self) -> Result<Vec<Card>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, meta_json FROM cards ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(|(id, json)| decode_card(id, json)).collect()
    }

    async fn get(&self, id: &CardId) -> Result<Option<Card>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT meta_json FROM cards WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(json,)| decode_card(id.as_str(), &json)).transpose()
    }

    async fn put(&self, card: &Card) -> Result<(), StoreError> {
        let json = serde_json::to_string(card)?;
        sqlx::query(
            "INSERT INTO cards (id, meta_json, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET meta_json = excluded.meta_json",
        )
        .bind(card.id.as_str())
        .bind(json)
        .bind(card.created_at.timestamp_micros())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &CardId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cards WHERE id = ?1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM card_files WHERE card_id = ?1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn put_bytes(&self, id: &CardId, bytes: &[u8]) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO card_files (card_id, bytes) VALUES (?1, ?2)
             ON CONFLICT(card_id) DO UPDATE SET bytes = excluded.bytes",
        )
        .bind(id.as_str())
        .bind(bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_bytes(&self, id: &CardId) -> Result<Option<Vec<u8>>, StoreError> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT bytes FROM card_files WHERE card_id = ?1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(b,)| b))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cards").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM card_files").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderStore for SqliteStore {
    async fn load_map(&self) -> Result<OrderMap, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT map_json FROM order_map WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((json,)) => serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
                key: "order_map".to_string(),
                source,
            }),
            None => Ok(OrderMap::new()),
        }
    }

    async fn save_map(&self, map: &OrderMap) -> Result<(), StoreError> {
        let json = serde_json::to_string(map)?;
        sqlx::query(
            "INSERT INTO order_map (id, map_json) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET map_json = excluded.map_json",
        )
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM order_map")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PrefStore for SqliteStore {
    async fn load_collections(&self) -> Result<Vec<String>, StoreError> {
        match self.get_pref(COLLECTIONS_KEY).await? {
            Some(json) => serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
                key: COLLECTIONS_KEY.to_string(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn save_collections(&self, names: &[String]) -> Result<(), StoreError> {
        let json = serde_json::to_string(names)?;
        self.set_pref(COLLECTIONS_KEY, Some(&json)).await
    }

    async fn load_theme(&self) -> Result<Option<String>, StoreError> {
        self.get_pref(THEME_KEY).await
    }

    async fn save_theme(&self, theme: Option<&str>) -> Result<(), StoreError> {
        self.set_pref(THEME_KEY, theme).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM prefs").execute(&self.pool).await?;
        Ok(())
    }
}
