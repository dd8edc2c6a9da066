//! Provider router: selects the completion and embedding providers based on config.

use std::collections::HashMap;
use std::sync::Arc;

use fixdesk_config::AppConfig;
use fixdesk_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build completion providers from configuration.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key)),
        );
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);
        router.register(
            config.default_provider.clone(),
            Arc::new(OpenAiCompatProvider::new(
                &config.default_provider,
                &base_url,
                &api_key,
            )),
        );
    }

    router
}

/// Build the embedding provider, if one is usable.
///
/// Returns `None` when no embedding API key is configured; the knowledge
/// store is then unavailable and remediation runs ungrounded.
pub fn build_embedder(config: &AppConfig) -> Option<Arc<dyn Provider>> {
    let embedding = &config.embedding;

    // An OpenAI embedder may share the completion key.
    let api_key = embedding.api_key.clone().or_else(|| {
        (embedding.provider == config.default_provider)
            .then(|| config.api_key.clone())
            .flatten()
    });

    let Some(api_key) = api_key else {
        tracing::warn!(
            provider = %embedding.provider,
            "No embedding API key configured; knowledge retrieval disabled"
        );
        return None;
    };

    let base_url = embedding
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&embedding.provider));

    Some(Arc::new(OpenAiCompatProvider::new(
        &embedding.provider,
        &base_url,
        &api_key,
    )))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "voyage" => "https://api.voyageai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
