//! Shared test helpers for knowledge store tests.

use async_trait::async_trait;
use fixdesk_core::error::{ProviderError, StoreError};
use fixdesk_core::knowledge::{ScoredPoint, VectorPoint, VectorStore};
use fixdesk_core::message::Message;
use fixdesk_core::provider::{EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse};
use std::sync::atomic::{AtomicBool, Ordering};

const VOCABULARY: &[&str] = &["power", "wifi", "ice", "water", "leak", "nois", "clean", "drain"];

/// Embeds text as keyword counts over a small fixed vocabulary.
///
/// Device prefixes and filler words land on no dimension, so similarity
/// reflects only the problem keywords.
pub struct KeywordEmbedder {
    fail_next: AtomicBool,
}

impl KeywordEmbedder {
    pub const DIMS: usize = VOCABULARY.len();

    pub fn new() -> Self {
        Self {
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn vectorize(text: &str) -> Vec<f32> {
        let text = text.to_lowercase().replace("wi-fi", "wifi");
        VOCABULARY
            .iter()
            .map(|term| text.matches(term).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Provider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword_embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant(""),
            usage: None,
            model: "keyword".into(),
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Network("embedding service unreachable".into()));
        }
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|t| Self::vectorize(t)).collect(),
            model: request.model,
            usage: None,
        })
    }
}

/// A vector database that refuses every connection.
pub struct UnreachableStore;

#[async_trait]
impl VectorStore for UnreachableStore {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn collection_exists(&self, _collection: &str) -> Result<bool, StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn create_collection(&self, _collection: &str, _vector_size: usize) -> Result<(), StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn upsert(&self, _collection: &str, _point: VectorPoint) -> Result<(), StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn search(
        &self,
        _collection: &str,
        _vector: &[f32],
        _limit: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn count(&self, _collection: &str) -> Result<usize, StoreError> {
        Err(StoreError::Connection("connection refused".into()))
    }
}
