//! In-memory vector store: useful for testing and offline sessions.

use async_trait::async_trait;
use fixdesk_core::error::StoreError;
use fixdesk_core::knowledge::{ScoredPoint, VectorPoint, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::vector::rank_points;

#[derive(Default)]
struct Collection {
    vector_size: usize,
    points: Vec<VectorPoint>,
}

/// Collections of points held in process memory, searched by brute-force
/// cosine similarity.
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds an empty `collection`.
    pub async fn with_collection(collection: &str, vector_size: usize) -> Self {
        let store = Self::new();
        store.collections.write().await.insert(
            collection.to_string(),
            Collection {
                vector_size,
                points: Vec::new(),
            },
        );
        store
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                vector_size,
                points: Vec::new(),
            });
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionMissing(collection.to_string()))?;

        if point.vector.len() != coll.vector_size {
            return Err(StoreError::DimensionMismatch {
                expected: coll.vector_size,
                actual: point.vector.len(),
            });
        }

        // Overwrite in place so storage order stays stable
        match coll.points.iter_mut().find(|p| p.id == point.id) {
            Some(existing) => *existing = point,
            None => coll.points.push(point),
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let collections = self.collections.read().await;
        let coll = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionMissing(collection.to_string()))?;
        Ok(rank_points(&coll.points, vector, limit))
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.points.len())
            .ok_or_else(|| StoreError::CollectionMissing(collection.to_string()))
    }
}
