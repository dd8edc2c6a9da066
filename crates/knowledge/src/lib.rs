//! Knowledge store implementations for FixDesk.
//!
//! [`KnowledgeStore`] turns solution records into vector points and back.
//! The vector database behind it is any `fixdesk_core::VectorStore`:
//! Qdrant over REST in production, in-memory for tests and offline use.

pub mod in_memory;
pub mod qdrant;
pub mod record_id;
pub mod samples;
pub mod store;
pub mod vector;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use in_memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;
pub use record_id::RecordId;
pub use samples::SAMPLE_SOLUTIONS;
pub use store::{KnowledgeStats, KnowledgeStatus, KnowledgeStore, StoreSettings};
pub use vector::{cosine_similarity, rank_points};
