//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a list of messages to an LLM and get a
//! completion back, and (optionally) how to turn text into embeddings.
//! No server-side session is retained between calls: every request carries
//! its full conditioning context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Ask the backend for a single JSON object instead of free text
    #[serde(default)]
    pub json_mode: bool,
}

fn default_temperature() -> f32 {
    0.3
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// An embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// The model to use for embeddings (e.g., "voyage-3-large").
    pub model: String,

    /// The texts to embed.
    pub inputs: Vec<String>,
}

/// An embedding response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The embedding vectors, one per input text.
    pub embeddings: Vec<Vec<f32>>,

    /// Which model was used.
    pub model: String,

    /// Token usage.
    pub usage: Option<Usage>,
}

/// The core Provider trait.
///
/// The stage orchestrator calls `complete()` without knowing which backend
/// is being used; the knowledge store calls `embed()` the same way.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "voyage").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Generate embeddings for the given texts.
    ///
    /// Default implementation returns an error indicating embeddings aren't supported.
    async fn embed(
        &self,
        _request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            format!("Provider '{}' does not support embeddings", self.name()),
        ))
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ChatOnly;

    #[async_trait]
    impl Provider for ChatOnly {
        fn name(&self) -> &str {
            "chat_only"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant("ok"),
                usage: None,
                model: request.model,
            })
        }
    }

    #[test]
    fn provider_request_defaults() {
        let req: ProviderRequest =
            serde_json::from_str(r#"{"model":"gpt-4","messages":[]}"#).unwrap();
        assert!((req.temperature - 0.3).abs() < f32::EPSILON);
        assert!(!req.json_mode);
        assert!(req.max_tokens.is_none());
    }

    #[tokio::test]
    async fn embed_defaults_to_not_configured() {
        let err = ChatOnly
            .embed(EmbeddingRequest {
                model: "voyage-3-large".into(),
                inputs: vec!["EH222: no ice".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("chat_only"));
    }
}
