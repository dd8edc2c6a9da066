//! # FixDesk Core
//!
//! Domain types, traits, and error definitions for the FixDesk troubleshooting
//! assistant. This crate has **no backend dependencies**: it defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`Provider`]: LLM completions and embeddings
//! - [`VectorStore`]: the vector database behind the knowledge base
//!
//! Implementations live in their respective crates, which keeps the stage
//! orchestrator testable with scripted providers and in-memory stores.

pub mod error;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError, TurnError};
pub use knowledge::{
    RetrievalQuery, RetrievalResult, ScoredPoint, SolutionRecord, VectorPoint, VectorStore,
};
pub use message::{Message, Role, Transcript};
pub use provider::{EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse};
pub use session::{ConversationSession, SessionId, Stage, TurnResult};
