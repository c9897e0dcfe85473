//! Serializes order-map saves so rapid successive moves cannot lose an
//! update. A single task drains the queue in order; last write wins.

use crate::error::LibraryError;
use std::sync::Arc;
use storage::models::OrderMap;
use storage::OrderStore;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

enum Command {
    Save(OrderMap),
    Flush(oneshot::Sender<Option<String>>),
}

pub struct OrderWriter {
    tx: mpsc::UnboundedSender<Command>,
}

impl OrderWriter {
    /// Spawns the writer task on the current tokio runtime.
    pub fn spawn(store: Arc<dyn OrderStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        tokio::spawn(async move {
            let mut last_error: Option<String> = None;
            let mut saved = 0u64;
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Save(map) => match store.save_map(&map).await {
                        Ok(()) => {
                            saved += 1;
                            debug!(groups = map.len(), saved, "order map saved");
                        }
                        Err(e) => {
                            error!("order map save failed: {}", e);
                            last_error = Some(e.to_string());
                        }
                    },
                    Command::Flush(reply) => {
                        // Receiver may have given up waiting.
                        let _ = reply.send(last_error.take());
                    }
                }
            }
        });
        Self { tx }
    }

    pub fn enqueue(&self, map: OrderMap) -> Result<(), LibraryError> {
        self.tx
            .send(Command::Save(map))
            .map_err(|_| LibraryError::WriterStopped)
    }

    /// Waits until every save queued so far has finished. Reports the most
    /// recent failure since the previous flush.
    pub async fn flush(&self) -> Result<(), LibraryError> {
        let (reply, wait) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply))
            .map_err(|_| LibraryError::WriterStopped)?;
        match wait.await.map_err(|_| LibraryError::WriterStopped)? {
            Some(e) => Err(LibraryError::OrderWrite(e)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::models::{CardId, GroupKey};
    use storage::{MemoryStore, StoreError};
    use tokio::sync::Mutex;

    /// Records every saved snapshot and sleeps a little so writes overlap
    /// if they were not serialized.
    #[derive(Default)]
    struct SlowStore {
        saves: Mutex<Vec<OrderMap>>,
    }

    #[async_trait::async_trait]
    impl OrderStore for SlowStore {
        async fn load_map(&self) -> Result<OrderMap, StoreError> {
            Ok(self.saves.lock().await.last().cloned().unwrap_or_default())
        }

        async fn save_map(&self, map: &OrderMap) -> Result<(), StoreError> {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.saves.lock().await.push(map.clone());
            Ok(())
        }

        async fn clear(&self) -> Result<(), StoreError> {
            self.saves.lock().await.clear();
            Ok(())
        }
    }

    fn map_with(ids: &[&str]) -> OrderMap {
        let mut map = OrderMap::new();
        map.insert(GroupKey::none(), ids.iter().map(|i| CardId::from(*i)).collect());
        map
    }

    #[tokio::test]
    async fn saves_land_in_enqueue_order() {
        let store = Arc::new(SlowStore::default());
        let writer = OrderWriter::spawn(store.clone());
        writer.enqueue(map_with(&["a", "b"])).unwrap();
        writer.enqueue(map_with(&["b", "a"])).unwrap();
        writer.enqueue(map_with(&["b", "c", "a"])).unwrap();
        writer.flush().await.unwrap();

        let saves = store.saves.lock().await;
        assert_eq!(saves.len(), 3);
        assert_eq!(saves.last().unwrap(), &map_with(&["b", "c", "a"]));
    }

    #[tokio::test]
    async fn flush_on_idle_writer_succeeds() {
        let writer = OrderWriter::spawn(Arc::new(MemoryStore::new()));
        writer.flush().await.unwrap();
    }
}
