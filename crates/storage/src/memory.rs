use crate::models::{Card, CardId, OrderMap};
use crate::store::{CardStore, OrderStore, PrefStore, StoreError};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    cards: HashMap<CardId, Card>,
    bytes: HashMap<CardId, Vec<u8>>,
    order: OrderMap,
    collections: Vec<String>,
    theme: Option<String>,
}

/// Process-local backend for all three stores. Used by tests and by hosts
/// that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn card_count(&self) -> usize {
        self.inner.read().await.cards.len()
    }

    pub async fn bytes_count(&self) -> usize {
        self.inner.read().await.bytes.len()
    }
}

#[async_trait::async_trait]
impl CardStore for MemoryStore {
    async fn list_all(&self) -> Result<Vec<Card>, StoreError> {
        let inner = self.inner.read().await;
        let mut cards: Vec<Card> = inner.cards.values().cloned().collect();
        cards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(cards)
    }

    async fn get(&self, id: &CardId) -> Result<Option<Card>, StoreError> {
        Ok(self.inner.read().await.cards.get(id).cloned())
    }

    async fn put(&self, card: &Card) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .cards
            .insert(card.id.clone(), card.clone());
        Ok(())
    }

    async fn delete(&self, id: &CardId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.cards.remove(id);
        inner.bytes.remove(id);
        Ok(())
    }

    async fn put_bytes(&self, id: &CardId, bytes: &[u8]) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .bytes
            .insert(id.clone(), bytes.to_vec());
        Ok(())
    }

    async fn get_bytes(&self, id: &CardId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.read().await.bytes.get(id).cloned())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.cards.clear();
        inner.bytes.clear();
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderStore for MemoryStore {
    async fn load_map(&self) -> Result<OrderMap, StoreError> {
        Ok(self.inner.read().await.order.clone())
    }

    async fn save_map(&self, map: &OrderMap) -> Result<(), StoreError> {
        self.inner.write().await.order = map.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.write().await.order.clear();
        Ok(())
    }
}

#[async_trait::async_trait]
impl PrefStore for MemoryStore {
    async fn load_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.read().await.collections.clone())
    }

    async fn save_collections(&self, names: &[String]) -> Result<(), StoreError> {
        self.inner.write().await.collections = names.to_vec();
        Ok(())
    }

    async fn load_theme(&self) -> Result<Option<String>, StoreError> {
        Ok(self.inner.read().await.theme.clone())
    }

    async fn save_theme(&self, theme: Option<&str>) -> Result<(), StoreError> {
        self.inner.write().await.theme = theme.map(str::to_string);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.collections.clear();
        inner.theme = None;
        Ok(())
    }
}
