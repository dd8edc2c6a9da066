//! The knowledge store: solution records over a vector database.
//!
//! Construction pings the database. An unreachable database is a hard
//! `StoreError::Connection`; a reachable database without the target
//! collection yields a *degraded* store whose searches return nothing.

use std::sync::Arc;
use std::time::Duration;

use fixdesk_config::AppConfig;
use fixdesk_core::error::StoreError;
use fixdesk_core::knowledge::{RetrievalQuery, RetrievalResult, SolutionRecord, VectorPoint, VectorStore};
use fixdesk_core::provider::{EmbeddingRequest, Provider};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::in_memory::InMemoryVectorStore;
use crate::qdrant::QdrantStore;
use crate::record_id::RecordId;
use crate::samples::SAMPLE_SOLUTIONS;
use crate::vector::by_score_desc;

/// Store parameters, usually taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub collection: String,
    pub vector_size: usize,
    pub embedding_model: String,
    pub create_collection_if_missing: bool,
}

impl StoreSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            collection: config.knowledge.collection.clone(),
            vector_size: config.knowledge.vector_size,
            embedding_model: config.embedding.model.clone(),
            create_collection_if_missing: config.knowledge.create_collection_if_missing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeStatus {
    /// Collection present; searches hit the database
    Ready,
    /// Collection absent; searches return nothing
    Degraded,
}

impl std::fmt::Display for KnowledgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KnowledgeStatus::Ready => f.write_str("ready"),
            KnowledgeStatus::Degraded => f.write_str("degraded"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub collection: String,
    pub points: usize,
    pub vector_size: usize,
    pub status: KnowledgeStatus,
}

pub struct KnowledgeStore {
    backend: Arc<dyn VectorStore>,
    embedder: Arc<dyn Provider>,
    settings: StoreSettings,
    status: KnowledgeStatus,
}

impl KnowledgeStore {
    /// Connect to `backend` and probe the configured collection.
    pub async fn connect(
        backend: Arc<dyn VectorStore>,
        embedder: Arc<dyn Provider>,
        settings: StoreSettings,
    ) -> Result<Self, StoreError> {
        backend.ping().await?;

        let status = match backend.collection_exists(&settings.collection).await {
            Ok(true) => KnowledgeStatus::Ready,
            Ok(false) if settings.create_collection_if_missing => {
                backend
                    .create_collection(&settings.collection, settings.vector_size)
                    .await?;
                info!(collection = %settings.collection, "Created missing collection");
                KnowledgeStatus::Ready
            }
            Ok(false) => {
                warn!(
                    collection = %settings.collection,
                    "Collection does not exist; knowledge search will return no results"
                );
                KnowledgeStatus::Degraded
            }
            Err(e) => {
                warn!(collection = %settings.collection, error = %e, "Collection check failed");
                KnowledgeStatus::Degraded
            }
        };

        info!(
            backend = backend.name(),
            collection = %settings.collection,
            status = %status,
            "Knowledge store connected"
        );

        Ok(Self {
            backend,
            embedder,
            settings,
            status,
        })
    }

    /// Build the configured backend (`qdrant` or `in_memory`) and connect.
    pub async fn from_config(
        config: &AppConfig,
        embedder: Arc<dyn Provider>,
    ) -> Result<Self, StoreError> {
        let settings = StoreSettings::from_config(config);
        let backend: Arc<dyn VectorStore> = match config.knowledge.backend.as_str() {
            "in_memory" => {
                Arc::new(InMemoryVectorStore::with_collection(&settings.collection, settings.vector_size).await)
            }
            _ => Arc::new(QdrantStore::new(
                &config.knowledge.url,
                config.knowledge.api_key.clone(),
                Duration::from_secs(config.knowledge.timeout_secs),
            )),
        };
        Self::connect(backend, embedder, settings).await
    }

    pub fn status(&self) -> KnowledgeStatus {
        self.status
    }

    pub fn collection(&self) -> &str {
        &self.settings.collection
    }

    /// Embed one text, checking the vector width against the collection.
    async fn embed(&self, text: String) -> Result<Vec<f32>, StoreError> {
        let response = self
            .embedder
            .embed(EmbeddingRequest {
                model: self.settings.embedding_model.clone(),
                inputs: vec![text],
            })
            .await
            .map_err(|e| StoreError::Embedding(e.to_string()))?;

        let vector = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Embedding("Provider returned no embeddings".into()))?;

        if vector.len() != self.settings.vector_size {
            return Err(StoreError::DimensionMismatch {
                expected: self.settings.vector_size,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Insert or overwrite the solution for a device/problem pair.
    ///
    /// Returns the record id, which depends only on `device_type` and `problem`.
    pub async fn upsert_solution(
        &self,
        device_type: &str,
        problem: &str,
        solution: &str,
        manual_reference: Option<&str>,
    ) -> Result<String, StoreError> {
        if self.status == KnowledgeStatus::Degraded {
            return Err(StoreError::CollectionMissing(self.settings.collection.clone()));
        }

        let id = RecordId::new(device_type, problem);
        let mut record = SolutionRecord {
            id: id.to_hex(),
            device_type: device_type.trim().to_string(),
            problem: problem.trim().to_string(),
            solution: solution.trim().to_string(),
            manual_reference: manual_reference
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from),
            embedding: Vec::new(),
        };

        let query = RetrievalQuery::new(&record.device_type, &record.problem, 1);
        record.embedding = self.embed(query.embedding_text()).await?;

        let point = VectorPoint {
            id: id.point_id().to_string(),
            payload: record.to_payload(),
            vector: record.embedding,
        };
        self.backend.upsert(&self.settings.collection, point).await?;

        debug!(device = %record.device_type, problem = %record.problem, id = %record.id, "Upserted solution");
        Ok(record.id)
    }

    /// Up to `k` solutions for the problem, most relevant first.
    pub async fn search(
        &self,
        device_type: &str,
        problem_description: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>, StoreError> {
        self.search_query(&RetrievalQuery::new(device_type, problem_description, k))
            .await
    }

    pub async fn search_query(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalResult>, StoreError> {
        if self.status == KnowledgeStatus::Degraded || query.k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed(query.embedding_text()).await?;

        let points = match self
            .backend
            .search(&self.settings.collection, &vector, query.k)
            .await
        {
            Ok(points) => points,
            Err(StoreError::CollectionMissing(collection)) => {
                warn!(%collection, "Collection disappeared; returning no results");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut results: Vec<RetrievalResult> = points.iter().map(RetrievalResult::from_point).collect();
        results.sort_by(|a, b| by_score_desc(a.score, b.score));
        results.truncate(query.k);

        debug!(
            device = %query.device_type,
            hits = results.len(),
            top_score = results.first().map(|r| r.score),
            "Knowledge search"
        );
        Ok(results)
    }

    pub async fn stats(&self) -> Result<KnowledgeStats, StoreError> {
        let points = match self.status {
            KnowledgeStatus::Ready => self.backend.count(&self.settings.collection).await?,
            KnowledgeStatus::Degraded => 0,
        };
        Ok(KnowledgeStats {
            collection: self.settings.collection.clone(),
            points,
            vector_size: self.settings.vector_size,
            status: self.status,
        })
    }

    /// Upsert the built-in sample solutions for every given device model.
    ///
    /// Returns the number of records written. Re-seeding overwrites.
    pub async fn seed_samples<'a>(
        &self,
        device_models: impl IntoIterator<Item = &'a str>,
    ) -> Result<usize, StoreError> {
        let mut written = 0;
        for device in device_models {
            for sample in SAMPLE_SOLUTIONS {
                self.upsert_solution(
                    device,
                    sample.problem,
                    sample.solution,
                    Some(sample.manual_reference),
                )
                .await?;
                written += 1;
            }
        }
        info!(records = written, "Seeded sample solutions");
        Ok(written)
    }
}
