//! locus-queue - QueueStoreClient capability interface.
//!
//! No real vendor queue's wire protocol is implemented here; what matters
//! is the atomic `read_all_and_delete` contract that makes drain-and-ship
//! safe against concurrently-writing producers. The single implementation
//! below is the "simulation mode" analogue of `otlp2parquet`'s in-memory
//! OpenDAL backend: a conformance-grade stand-in any real client (Redis
//! list, SQS queue, ...) must behave identically to.

use async_trait::async_trait;
use locus_core::PipelineError;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

#[async_trait]
pub trait QueueStoreClient: Send + Sync {
    /// Number of entries currently queued under `key`.
    async fn length(&self, key: &str) -> Result<usize, PipelineError>;

    /// Append `records` to the tail of `key`, preserving order.
    async fn append_many(&self, key: &str, records: Vec<String>) -> Result<(), PipelineError>;

    /// Return all entries currently under `key`, oldest first, without
    /// removing them.
    async fn read_all(&self, key: &str) -> Result<Vec<String>, PipelineError>;

    /// Remove every entry under `key`.
    async fn delete_all(&self, key: &str) -> Result<(), PipelineError>;

    /// In a single observable action, return everything under `key` and
    /// leave `key` empty. Any `append_many` that is not already linearized
    /// before this call belongs to the *next* call, never to this one.
    async fn read_all_and_delete_atomically(&self, key: &str) -> Result<Vec<String>, PipelineError>;
}

/// In-process, `tokio::sync::Mutex`-backed simulation of an ordered list
/// queue store. Not crash-safe (lives in memory): a durable backend is a
/// vendor concern out of this crate's scope.
#[derive(Default)]
pub struct InMemoryQueueStore {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStoreClient for InMemoryQueueStore {
    async fn length(&self, key: &str) -> Result<usize, PipelineError> {
        let queues = self.queues.lock().await;
        Ok(queues.get(key).map(VecDeque::len).unwrap_or(0))
    }

    async fn append_many(&self, key: &str, records: Vec<String>) -> Result<(), PipelineError> {
        let mut queues = self.queues.lock().await;
        queues.entry(key.to_string()).or_default().extend(records);
        Ok(())
    }

    async fn read_all(&self, key: &str) -> Result<Vec<String>, PipelineError> {
        let queues = self.queues.lock().await;
        Ok(queues
            .get(key)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_all(&self, key: &str) -> Result<(), PipelineError> {
        let mut queues = self.queues.lock().await;
        queues.remove(key);
        Ok(())
    }

    async fn read_all_and_delete_atomically(
        &self,
        key: &str,
    ) -> Result<Vec<String>, PipelineError> {
        let mut queues = self.queues.lock().await;
        // Holding the lock across both the read and the removal is what
        // makes this one "observable action": no append_many interleaves
        // between the snapshot and the clear.
        let drained = queues.remove(key).unwrap_or_default();
        Ok(drained.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn drain_returns_everything_and_empties_the_key() {
        let store = InMemoryQueueStore::new();
        store
            .append_many("k", vec!["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();

        let drained = store.read_all_and_delete_atomically("k").await.unwrap();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert_eq!(store.length("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn drain_preserves_order() {
        let store = InMemoryQueueStore::new();
        for i in 0..50 {
            store
                .append_many("k", vec![i.to_string()])
                .await
                .unwrap();
        }
        let drained = store.read_all_and_delete_atomically("k").await.unwrap();
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(drained, expected);
    }

    #[tokio::test]
    async fn empty_drain_is_not_an_error() {
        let store = InMemoryQueueStore::new();
        let drained = store.read_all_and_delete_atomically("empty").await.unwrap();
        assert!(drained.is_empty());
    }

    /// A concurrent producer's appends land either entirely in the drained
    /// batch or entirely in the next one: never split, never lost, never
    /// duplicated.
    #[tokio::test]
    async fn concurrent_appends_never_split_across_a_drain() {
        let store = Arc::new(InMemoryQueueStore::new());

        for i in 0..20 {
            store
                .append_many("k", vec![format!("pre-{i}")])
                .await
                .unwrap();
        }

        let drain_store = store.clone();
        let drainer = tokio::spawn(async move {
            drain_store
                .read_all_and_delete_atomically("k")
                .await
                .unwrap()
        });

        let producer_store = store.clone();
        let producer = tokio::spawn(async move {
            for i in 0..20 {
                producer_store
                    .append_many("k", vec![format!("post-{i}")])
                    .await
                    .unwrap();
            }
        });

        let drained = drainer.await.unwrap();
        producer.await.unwrap();

        let remaining = store.read_all("k").await.unwrap();
        // Every record appears in exactly one of the two sets.
        let total = drained.len() + remaining.len();
        assert_eq!(total, 40);
        let pre_in_drained = drained.iter().filter(|r| r.starts_with("pre-")).count();
        assert_eq!(pre_in_drained, 20, "all pre-drain records must be drained");
        assert!(
            remaining.iter().all(|r| r.starts_with("post-")),
            "remaining records must all be post-drain appends"
        );
    }
}
