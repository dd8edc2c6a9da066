//! The service facade: everything a presentation layer calls.
//!
//! [`SupportService`] owns the configuration, the stage orchestrator, the
//! session registry and (when reachable) the knowledge store. Construction
//! refuses an invalid configuration; a knowledge store that cannot be built
//! only disables retrieval.

use std::sync::Arc;

use fixdesk_config::{AppConfig, DeviceModel};
use fixdesk_core::error::{Error, Result, StoreError, TurnError};
use fixdesk_core::knowledge::RetrievalResult;
use fixdesk_core::provider::Provider;
use fixdesk_core::session::{ConversationSession, SessionId, TurnResult};
use fixdesk_knowledge::{KnowledgeStats, KnowledgeStore};
use fixdesk_providers::{build_embedder, build_from_config};
use tracing::{info, warn};

use crate::completion::CompletionHeuristic;
use crate::invoker::PhaseInvoker;
use crate::orchestrator::StageOrchestrator;
use crate::registry::SessionRegistry;
use crate::remediation::RemediationPolicy;

/// Whether the knowledge store could be built.
#[derive(Clone)]
pub enum KnowledgeAvailability {
    Available(Arc<KnowledgeStore>),
    /// Retrieval disabled, with the reason shown to users
    Unavailable(String),
}

impl KnowledgeAvailability {
    pub fn store(&self) -> Option<&Arc<KnowledgeStore>> {
        match self {
            KnowledgeAvailability::Available(store) => Some(store),
            KnowledgeAvailability::Unavailable(_) => None,
        }
    }

    fn require(&self) -> std::result::Result<&Arc<KnowledgeStore>, StoreError> {
        match self {
            KnowledgeAvailability::Available(store) => Ok(store),
            KnowledgeAvailability::Unavailable(reason) => Err(StoreError::Unavailable(reason.clone())),
        }
    }
}

pub struct SupportService {
    config: AppConfig,
    orchestrator: StageOrchestrator,
    sessions: SessionRegistry,
    knowledge: KnowledgeAvailability,
}

impl SupportService {
    /// Assemble the service from explicit collaborators.
    ///
    /// Fails with [`Error::Config`] when the configuration does not validate.
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        knowledge: KnowledgeAvailability,
    ) -> Result<Self> {
        config.check().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let invoker = PhaseInvoker::new(provider, &config.default_model, config.default_temperature)
            .with_max_tokens(config.default_max_tokens);

        let orchestrator = StageOrchestrator::new(invoker, config.devices.clone())
            .with_heuristic(CompletionHeuristic::from_config(&config.dialogue))
            .with_policy(RemediationPolicy::new(config.dialogue.max_step_attempts))
            .with_top_k(config.knowledge.top_k);

        let orchestrator = match &knowledge {
            KnowledgeAvailability::Available(store) => orchestrator.with_knowledge(store.clone()),
            KnowledgeAvailability::Unavailable(reason) => {
                orchestrator.with_knowledge_unavailable(reason.clone())
            }
        };

        Ok(Self {
            config,
            orchestrator,
            sessions: SessionRegistry::new(),
            knowledge,
        })
    }

    /// Build providers and the knowledge store from configuration.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        config.check().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let router = build_from_config(&config);
        let provider = router.default().ok_or_else(|| Error::Config {
            message: format!("Provider '{}' is not available", config.default_provider),
        })?;

        let knowledge = Self::connect_knowledge(&config).await;
        info!(
            provider = %config.default_provider,
            model = %config.default_model,
            knowledge = matches!(knowledge, KnowledgeAvailability::Available(_)),
            "Support service ready"
        );
        Self::new(config, provider, knowledge)
    }

    async fn connect_knowledge(config: &AppConfig) -> KnowledgeAvailability {
        let Some(embedder) = build_embedder(config) else {
            return KnowledgeAvailability::Unavailable("no embedding API key configured".into());
        };
        match KnowledgeStore::from_config(config, embedder).await {
            Ok(store) => KnowledgeAvailability::Available(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "Knowledge store unavailable; continuing without retrieval");
                KnowledgeAvailability::Unavailable(e.to_string())
            }
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &KnowledgeAvailability {
        &self.knowledge
    }

    /// Run one user turn on the session, creating it on first use.
    pub async fn process_turn(&self, session_id: &SessionId, user_text: &str) -> TurnResult {
        let session = self.sessions.get_or_create(session_id).await;
        let mut session = session.lock().await;
        self.orchestrator.process_turn(&mut session, user_text).await
    }

    /// Explicit "it worked" / "it did not work" for the pending step.
    pub async fn confirm_outcome(
        &self,
        session_id: &SessionId,
        resolved: bool,
    ) -> std::result::Result<TurnResult, TurnError> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| TurnError::UnknownSession(session_id.to_string()))?;
        let mut session = session.lock().await;
        Ok(self.orchestrator.confirm_outcome(&mut session, resolved))
    }

    /// Discard the session and start over under the same id.
    pub async fn reset_session(&self, session_id: &SessionId) {
        self.sessions.reset(session_id).await;
    }

    /// Discard the session. Returns whether it existed.
    pub async fn end_session(&self, session_id: &SessionId) -> bool {
        self.sessions.remove(session_id).await
    }

    pub async fn session_snapshot(&self, session_id: &SessionId) -> Option<ConversationSession> {
        self.sessions.snapshot(session_id).await
    }

    pub async fn search_knowledge(
        &self,
        device_type: &str,
        text: &str,
        k: usize,
    ) -> std::result::Result<Vec<RetrievalResult>, StoreError> {
        self.knowledge.require()?.search(device_type, text, k).await
    }

    pub async fn add_solution(
        &self,
        device_type: &str,
        problem: &str,
        solution: &str,
        manual_reference: Option<&str>,
    ) -> std::result::Result<String, StoreError> {
        self.knowledge
            .require()?
            .upsert_solution(device_type, problem, solution, manual_reference)
            .await
    }

    pub async fn knowledge_stats(&self) -> std::result::Result<KnowledgeStats, StoreError> {
        self.knowledge.require()?.stats().await
    }

    pub fn supported_devices(&self) -> &[DeviceModel] {
        self.orchestrator.devices()
    }

    pub fn validate_configuration(&self) -> (bool, Option<String>) {
        self.config.validate_configuration()
    }
}
