//! End-to-end integration tests for the FixDesk troubleshooting assistant.
//!
//! These tests drive the full pipeline through `SupportService`: device
//! identification, symptom gathering, knowledge-grounded remediation and
//! session lifecycle, against scripted providers and in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use fixdesk_agent::{KnowledgeAvailability, SupportService};
use fixdesk_config::AppConfig;
use fixdesk_core::error::{ProviderError, StoreError};
use fixdesk_core::message::{Message, Role};
use fixdesk_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use fixdesk_core::session::{SessionId, Stage};
use fixdesk_knowledge::{InMemoryVectorStore, KnowledgeStore, QdrantStore, StoreSettings};

// ── Mock Providers ───────────────────────────────────────────────────────

/// A mock provider that returns scripted outcomes in sequence.
struct ScriptedProvider {
    responses: std::sync::Mutex<Vec<Result<String, ProviderError>>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_prompt(&self) -> String {
        let requests = self.requests.lock().unwrap();
        requests
            .last()
            .and_then(|r| r.messages.last())
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();
        if index >= responses.len() {
            panic!(
                "ScriptedProvider exhausted: call #{}, have {}",
                index,
                responses.len()
            );
        }
        requests.push(request);
        responses[index].clone().map(|text| text_response(&text))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
    }
}

/// Answers by phase, naming whichever device the user mentioned. Yields
/// before replying so concurrent sessions interleave.
struct DeviceEchoProvider;

impl DeviceEchoProvider {
    fn user_message(prompt: &str) -> &str {
        prompt
            .split("User message:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Provider for DeviceEchoProvider {
    fn name(&self) -> &str {
        "device_echo"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::task::yield_now().await;
        let system = &request.messages[0].content;
        let prompt = &request.messages[1].content;

        let reply = if system.contains("Device Support Specialist") {
            format!("So you have an {}?", Self::user_message(prompt))
        } else if request.json_mode {
            serde_json::json!({ "reply": "Thanks, that is enough.", "symptoms_complete": true })
                .to_string()
        } else {
            let device = prompt
                .lines()
                .skip_while(|l| !l.starts_with("Device information:"))
                .nth(1)
                .unwrap_or_default()
                .to_string();
            format!("Unplug the {device} for 30 seconds.")
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(text_response(&reply))
    }
}

const VOCABULARY: &[&str] = &["power", "wifi", "ice", "water", "leak", "nois", "clean", "drain"];

/// Embeds text as keyword counts over a small fixed vocabulary.
struct KeywordEmbedder;

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
                VOCABULARY.iter().map(|t| text.matches(t).count() as f32).collect()
            })
            .collect();
        Ok(EmbeddingResponse {
            embeddings,
            model: request.model,
            usage: None,
        })
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

const COLLECTION: &str = "device_solutions";

fn config() -> AppConfig {
    let mut config = AppConfig {
        api_key: Some("sk-test".into()),
        ..AppConfig::default()
    };
    config.knowledge.backend = "in_memory".into();
    config.knowledge.vector_size = VOCABULARY.len();
    config
}

fn settings() -> StoreSettings {
    StoreSettings {
        collection: COLLECTION.into(),
        vector_size: VOCABULARY.len(),
        embedding_model: "keyword".into(),
        create_collection_if_missing: false,
    }
}

async fn knowledge_store() -> Arc<KnowledgeStore> {
    let backend = InMemoryVectorStore::with_collection(COLLECTION, VOCABULARY.len()).await;
    let store = KnowledgeStore::connect(Arc::new(backend), Arc::new(KeywordEmbedder), settings())
        .await
        .unwrap();
    Arc::new(store)
}

fn symptom(reply: &str, complete: bool) -> String {
    serde_json::json!({ "reply": reply, "symptoms_complete": complete }).to_string()
}

// ── E2E: Knowledge Store ─────────────────────────────────────────────────

#[tokio::test]
async fn e2e_power_solution_outranks_wifi() {
    let service = SupportService::new(
        config(),
        Arc::new(ScriptedProvider::new(vec![])),
        KnowledgeAvailability::Available(knowledge_store().await),
    )
    .unwrap();

    service
        .add_solution("EH222", "won't power on", "hold power 30s", None)
        .await
        .unwrap();
    service
        .add_solution("EH222", "no wifi", "re-pair the app", None)
        .await
        .unwrap();
    // Same key again overwrites
    service
        .add_solution("EH222", "no wifi", "reset the network module", None)
        .await
        .unwrap();

    let results = service.search_knowledge("EH222", "no power response", 3).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].problem, "won't power on");
    assert_eq!(results[1].solution, "reset the network module");
    assert!(results[0].score >= results[1].score);
    assert_eq!(service.knowledge_stats().await.unwrap().points, 2);
}

/// Scripted replies that take a session from INITIAL to its first step.
fn intake_script() -> Vec<String> {
    vec![
        "So you have an EH222 (Ice Cube Machine), is that correct? What is the problem?".into(),
        symptom("When did it stop making ice?", false),
        symptom("Thanks, I have what I need to start troubleshooting.", true),
    ]
}

async fn run_intake(service: &SupportService, id: &SessionId) -> Vec<Stage> {
    let mut stages = Vec::new();
    for text in ["I have an EH222", "It stopped making ice", "Since Monday, after I moved it"] {
        let result = service.process_turn(id, text).await;
        assert!(!result.is_error, "{}", result.agent_text);
        stages.push(result.stage);
    }
    stages
}

fn scripted(replies: Vec<String>) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(replies.into_iter().map(Ok).collect()))
}

// ── E2E: Full Session ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_session_runs_to_resolution() {
    let store = knowledge_store().await;
    store.seed_samples(["EH222"]).await.unwrap();

    let mut replies = intake_script();
    replies.push("Check that the water reservoir is filled above the MIN line.".into());
    replies.push("Run a cleaning cycle with the supplied descaler.".into());
    let provider = scripted(replies);

    let service = SupportService::new(
        config(),
        provider.clone(),
        KnowledgeAvailability::Available(store),
    )
    .unwrap();
    let id = SessionId::new();

    let mut stages = run_intake(&service, &id).await;
    assert_eq!(stages, vec![Stage::DeviceConfirmed, Stage::DeviceConfirmed, Stage::SymptomsGathered]);

    let first = service.process_turn(&id, "What should I try first?").await;
    assert!(first.awaiting_confirmation);
    assert_eq!(first.step_counter, 1);
    // Grounded in the seeded ice-production sample
    assert!(provider.last_prompt().contains("Relevant solutions from the knowledge base"));
    stages.push(first.stage);

    let ack = service.process_turn(&id, "No, still no ice").await;
    assert!(!ack.awaiting_confirmation);
    assert_eq!(ack.step_counter, 1);
    stages.push(ack.stage);

    let second = service.process_turn(&id, "The reservoir was already full").await;
    assert_eq!(second.step_counter, 2);
    assert!(second.agent_text.starts_with("Run a cleaning cycle"));
    stages.push(second.stage);

    let done = service.confirm_outcome(&id, true).await.unwrap();
    assert_eq!(done.stage, Stage::Complete);
    stages.push(done.stage);

    // Never backward
    assert!(stages.windows(2).all(|w| w[0] <= w[1]));

    let after = service.process_turn(&id, "one more thing").await;
    assert_eq!(after.stage, Stage::Complete);
    assert!(!after.is_error);
    assert_eq!(provider.calls(), 5);

    let snapshot = service.session_snapshot(&id).await.unwrap();
    assert_eq!(snapshot.device_confirmed.as_deref(), Some("EH222"));
    assert_eq!(snapshot.proposed_steps().len(), 2);
    assert!(snapshot.symptom_summary.unwrap().contains("Since Monday"));
}

#[tokio::test]
async fn e2e_symptom_phase_ends_at_turn_cap() {
    let mut replies = vec!["So you have an EH130 (Ice Cube Machine)?".to_string()];
    // Plain questions: no structured flag and no completion phrase
    replies.extend((1..=5).map(|i| format!("Question {i}: is the display lit?")));
    let service = SupportService::new(
        config(),
        scripted(replies),
        KnowledgeAvailability::Unavailable("offline".into()),
    )
    .unwrap();
    let id = SessionId::new();

    service.process_turn(&id, "EH130").await;
    for turn in 1..=4 {
        let result = service.process_turn(&id, "it is noisy").await;
        assert_eq!(result.stage, Stage::DeviceConfirmed, "turn {turn}");
    }
    let fifth = service.process_turn(&id, "only at night").await;
    assert_eq!(fifth.stage, Stage::SymptomsGathered);
    assert_eq!(service.session_snapshot(&id).await.unwrap().symptom_turns, 5);
}

#[tokio::test]
async fn e2e_backend_failure_mid_turn_is_recoverable() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok("So you have an EH330 (Ice Cube Machine)?".into()),
        Err(ProviderError::ApiError {
            status_code: 503,
            message: "overloaded".into(),
        }),
        Ok(symptom("Thanks, that is enough to start.", true)),
    ]));
    let service = SupportService::new(
        config(),
        provider.clone(),
        KnowledgeAvailability::Unavailable("offline".into()),
    )
    .unwrap();
    let id = SessionId::new();

    service.process_turn(&id, "EH330").await;

    let failed = service.process_turn(&id, "water leaks underneath").await;
    assert!(failed.is_error);
    assert_eq!(failed.stage, Stage::DeviceConfirmed);
    assert!(failed.agent_text.contains("Error in symptom gathering"));

    let snapshot = service.session_snapshot(&id).await.unwrap();
    assert_eq!(snapshot.symptom_turns, 0);
    assert_eq!(
        snapshot.transcript.last_by(Role::System).map(|m| m.content.clone()),
        Some(failed.agent_text.clone())
    );

    let retried = service.process_turn(&id, "water leaks underneath").await;
    assert!(!retried.is_error);
    assert_eq!(retried.stage, Stage::SymptomsGathered);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn e2e_not_fixed_leads_to_a_different_step() {
    let mut replies = intake_script();
    replies.push("Hold the power button for 30 seconds.".into());
    // The backend repeats itself once; the policy re-prompts
    replies.push("Hold the power button for 30 seconds.".into());
    replies.push("Plug the machine into a different wall outlet.".into());
    let provider = scripted(replies);
    let service = SupportService::new(
        config(),
        provider.clone(),
        KnowledgeAvailability::Unavailable("offline".into()),
    )
    .unwrap();
    let id = SessionId::new();

    run_intake(&service, &id).await;
    service.process_turn(&id, "ok").await;

    let ack = service.process_turn(&id, "not fixed").await;
    assert_eq!(ack.stage, Stage::SymptomsGathered);
    assert!(!ack.awaiting_confirmation);

    let next = service.process_turn(&id, "nothing happened at all").await;
    assert!(!next.is_error);
    assert!(next.awaiting_confirmation);

    let snapshot = service.session_snapshot(&id).await.unwrap();
    let steps = snapshot.proposed_steps();
    assert_eq!(steps.len(), 2);
    assert_ne!(steps[0], steps[1]);
    assert!(steps[1].starts_with("Plug the machine into a different wall outlet."));
    // No enumerated options in any proposed step
    assert!(steps.iter().all(|s| !s.contains("\n1.") && !s.contains("Option 2")));
    assert_eq!(provider.calls(), 6);
}

#[tokio::test]
async fn e2e_unreachable_database_degrades_to_notices() {
    let backend = QdrantStore::new("http://127.0.0.1:1", None, Duration::from_secs(2));
    let err = KnowledgeStore::connect(Arc::new(backend), Arc::new(KeywordEmbedder), settings())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::Connection(_)));

    let mut replies = intake_script();
    replies.push("Check that the power cord is seated firmly.".into());
    let provider = scripted(replies);
    let service = SupportService::new(
        config(),
        provider.clone(),
        KnowledgeAvailability::Unavailable(err.to_string()),
    )
    .unwrap();
    let id = SessionId::new();

    run_intake(&service, &id).await;
    let result = service.process_turn(&id, "what should I try?").await;

    assert!(!result.is_error);
    assert_eq!(result.step_counter, 1);
    assert_eq!(result.notices.len(), 1);
    assert!(result.notices[0].starts_with("Knowledge base unavailable"));
    assert!(!provider.last_prompt().contains("Relevant solutions"));
    assert!(matches!(
        service.search_knowledge("EH222", "no power", 3).await,
        Err(StoreError::Unavailable(_))
    ));
}

// ── E2E: Concurrency ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_concurrent_sessions_do_not_interfere() {
    let service = Arc::new(
        SupportService::new(
            config(),
            Arc::new(DeviceEchoProvider),
            KnowledgeAvailability::Unavailable("offline".into()),
        )
        .unwrap(),
    );
    let models = ["EH222", "EH130", "EH330"];

    let mut handles = Vec::new();
    for i in 0..9 {
        let service = service.clone();
        let model = models[i % models.len()];
        handles.push(tokio::spawn(async move {
            let id = SessionId::from(&format!("session-{i}"));
            service.process_turn(&id, model).await;
            service.process_turn(&id, "it makes a grinding noise").await;
            let step = service.process_turn(&id, "what now?").await;
            (id, model, step)
        }));
    }

    for handle in handles {
        let (id, model, step) = handle.await.unwrap();
        assert!(!step.is_error);
        assert!(step.agent_text.contains(model), "{} vs {model}", step.agent_text);

        let snapshot = service.session_snapshot(&id).await.unwrap();
        assert_eq!(snapshot.device_confirmed.as_deref(), Some(model));
        assert_eq!(snapshot.stage(), Stage::SymptomsGathered);
        assert_eq!(snapshot.step_counter, 1);
    }
}

// ── E2E: Configuration ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_invalid_configuration_refuses_operation() {
    let mut config = config();
    config.api_key = None;
    assert_eq!(
        config.validate_configuration(),
        (false, Some("OPENAI_API_KEY not set".to_string()))
    );

    let result = SupportService::new(
        config,
        Arc::new(ScriptedProvider::new(vec![])),
        KnowledgeAvailability::Unavailable("offline".into()),
    );
    assert!(result.is_err());
}
