//! Shared test helpers for agent tests.

use fixdesk_core::error::ProviderError;
use fixdesk_core::message::Message;
use fixdesk_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted outcomes.
///
/// Each call to `complete` returns the next entry in the queue; an `Err`
/// entry simulates a backend failure for that call. Every request is
/// recorded. Panics if more calls are made than entries provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();

        if index >= responses.len() {
            panic!(
                "ScriptedProvider: no more responses (call #{}, have {})",
                index,
                responses.len()
            );
        }

        let model = request.model.clone();
        requests.push(request);
        responses[index].clone().map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }
}

/// A structured symptom-phase reply.
pub fn symptom_json(reply: &str, complete: bool) -> String {
    serde_json::json!({ "reply": reply, "symptoms_complete": complete }).to_string()
}

const VOCABULARY: &[&str] = &["power", "wifi", "ice", "water", "leak", "nois", "clean", "drain"];

/// Embeds text as keyword counts over a small fixed vocabulary.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub const DIMS: usize = VOCABULARY.len();
}

#[async_trait::async_trait]
impl Provider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword_embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("embedding only".into()))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let embeddings = request
            .inputs
            .iter()
            .map(|text| {
                let text = text.to_lowercase();
                VOCABULARY
                    .iter()
                    .map(|term| text.matches(term).count() as f32)
                    .collect()
            })
            .collect();
        Ok(EmbeddingResponse {
            embeddings,
            model: request.model,
            usage: None,
        })
    }
}
