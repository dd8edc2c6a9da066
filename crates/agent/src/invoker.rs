//! Stateless phase invocation against the completion backend.

use std::sync::Arc;

use fixdesk_core::error::ProviderError;
use fixdesk_core::message::Message;
use fixdesk_core::provider::{Provider, ProviderRequest};
use tracing::debug;

use crate::profile::{AgentProfile, TaskBrief};

/// Sends one (profile, task, inputs) triple to the provider.
///
/// Nothing is retained between calls: the inputs carry all conditioning.
pub struct PhaseInvoker {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl PhaseInvoker {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
        }
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the request without sending it.
    pub fn build_request(
        &self,
        profile: &AgentProfile,
        task: &TaskBrief,
        inputs: &[(&str, String)],
        json_mode: bool,
    ) -> ProviderRequest {
        let mut body = format!("Current task: {}", task.description);
        for (label, value) in inputs {
            body.push_str(&format!("\n\n{label}:\n{value}"));
        }
        body.push_str(&format!("\n\nExpected output: {}", task.expected_output));

        ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(profile.system_prompt()), Message::user(body)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_mode,
        }
    }

    /// Invoke the backend and return the trimmed reply text.
    pub async fn invoke(
        &self,
        profile: &AgentProfile,
        task: &TaskBrief,
        inputs: &[(&str, String)],
        json_mode: bool,
    ) -> Result<String, ProviderError> {
        let request = self.build_request(profile, task, inputs, json_mode);
        let response = self.provider.complete(request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                role = %profile.role,
                model = %response.model,
                total_tokens = usage.total_tokens,
                "Phase invocation complete"
            );
        }

        Ok(response.message.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{solver_agent, solver_task};
    use crate::test_helpers::ScriptedProvider;
    use fixdesk_core::message::Role;

    #[test]
    fn request_carries_profile_task_and_inputs() {
        let invoker = PhaseInvoker::new(Arc::new(ScriptedProvider::new(vec![])), "gpt-4", 0.3)
            .with_max_tokens(512);
        let request = invoker.build_request(
            &solver_agent(),
            &solver_task(None),
            &[("Device", "EH222".into()), ("Symptoms", "No ice".into())],
            false,
        );

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("Technical Problem Solver"));
        let body = &request.messages[1].content;
        assert!(body.starts_with("Current task:"));
        assert!(body.contains("Device:\nEH222"));
        assert!(body.contains("Symptoms:\nNo ice"));
        assert!(body.contains("Expected output:"));
        assert_eq!(request.max_tokens, Some(512));
        assert!(!request.json_mode);
    }

    #[tokio::test]
    async fn invoke_trims_reply() {
        let provider = Arc::new(ScriptedProvider::texts(&["  Unplug it.  \n"]));
        let invoker = PhaseInvoker::new(provider.clone(), "gpt-4", 0.3);
        let reply = invoker
            .invoke(&solver_agent(), &solver_task(None), &[], false)
            .await
            .unwrap();
        assert_eq!(reply, "Unplug it.");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn invoke_propagates_provider_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Timeout("30s".into()))]));
        let invoker = PhaseInvoker::new(provider, "gpt-4", 0.3);
        let err = invoker
            .invoke(&solver_agent(), &solver_task(None), &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }
}
