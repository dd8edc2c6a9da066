//! Knowledge base domain types and the vector database trait.
//!
//! A [`SolutionRecord`] is one previously recorded fix for a device problem.
//! Records are stored as points in a vector database: the embedding of
//! `"{device_type}: {problem}"` is the vector, the record fields are the
//! payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// A stored solution for a device problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
    /// Deterministic ID derived from `device_type` + `problem`
    pub id: String,

    /// Device model from the catalog (e.g. "EH222")
    pub device_type: String,

    /// Problem description
    pub problem: String,

    /// Solution / fix description
    pub solution: String,

    /// Reference to a manual or documentation section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_reference: Option<String>,

    /// Embedding vector (never serialized into the payload)
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

impl SolutionRecord {
    /// Payload map stored alongside the vector.
    ///
    /// An absent manual reference is stored as an empty string.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("record_id".into(), Value::String(self.id.clone()));
        payload.insert("device_type".into(), Value::String(self.device_type.clone()));
        payload.insert("problem".into(), Value::String(self.problem.clone()));
        payload.insert("solution".into(), Value::String(self.solution.clone()));
        payload.insert(
            "manual_reference".into(),
            Value::String(self.manual_reference.clone().unwrap_or_default()),
        );
        payload
    }
}

/// A similarity search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub device_type: String,
    pub problem_description: String,
    /// Maximum number of results
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    3
}

impl RetrievalQuery {
    pub fn new(device_type: impl Into<String>, problem_description: impl Into<String>, k: usize) -> Self {
        Self {
            device_type: device_type.into(),
            problem_description: problem_description.into(),
            k,
        }
    }

    /// The text that gets embedded for this query.
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.device_type, self.problem_description)
    }
}

/// One ranked search hit. Higher `score` is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub score: f32,
    pub id: String,
    pub device_type: String,
    pub problem: String,
    pub solution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_reference: Option<String>,
}

impl RetrievalResult {
    /// Build a result from a scored point's payload.
    ///
    /// Missing payload fields become empty strings; an empty manual
    /// reference becomes `None`.
    pub fn from_point(point: &ScoredPoint) -> Self {
        let field = |key: &str| {
            point
                .payload
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let manual_reference = Some(field("manual_reference")).filter(|r| !r.is_empty());
        let record_id = field("record_id");

        Self {
            score: point.score,
            id: if record_id.is_empty() { point.id.clone() } else { record_id },
            device_type: field("device_type"),
            problem: field("problem"),
            solution: field("solution"),
            manual_reference,
        }
    }
}

/// A point to upsert into a vector collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

/// A point returned by a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// The vector database backend.
///
/// Implementations: Qdrant (REST), in-memory (for testing and offline use).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "qdrant", "in_memory").
    fn name(&self) -> &str;

    /// Verify the database is reachable. Fails only with `StoreError::Connection`.
    async fn ping(&self) -> std::result::Result<(), StoreError>;

    /// Non-fatal probe: does `collection` exist?
    async fn collection_exists(&self, collection: &str) -> std::result::Result<bool, StoreError>;

    /// Create `collection` with cosine distance and the given vector size.
    async fn create_collection(&self, collection: &str, vector_size: usize) -> std::result::Result<(), StoreError>;

    /// Insert or overwrite a point by ID.
    async fn upsert(&self, collection: &str, point: VectorPoint) -> std::result::Result<(), StoreError>;

    /// Nearest-neighbour search, best match first, at most `limit` points.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> std::result::Result<Vec<ScoredPoint>, StoreError>;

    /// Number of points in `collection`.
    async fn count(&self, collection: &str) -> std::result::Result<usize, StoreError>;
}
