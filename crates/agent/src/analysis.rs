use std::sync::Arc;

use mobicare_core::Message;
use tracing::info;

use crate::llm::{Content, GenerateRequest, LlmClient, LlmError};
use crate::prompt::{analysis_prompt, ANALYSIS_FALLBACK};

const ANALYSIS_TEMPERATURE: f32 = 0.2;
const ANALYSIS_THINKING_BUDGET: u32 = 2000;

/// Produces an executive report over a conversation transcript.
#[derive(Clone)]
pub struct ConversationAnalyst {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl ConversationAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self { llm, model: model.into() }
    }

    pub async fn analyze(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            contents: vec![Content::user_text(analysis_prompt(messages))],
            temperature: Some(ANALYSIS_TEMPERATURE),
            thinking_budget: Some(ANALYSIS_THINKING_BUDGET),
            ..GenerateRequest::default()
        };

        let response = self.llm.generate(request).await?;
        info!(
            event_name = "agent.analysis.completed",
            messages = messages.len(),
            "transcript analysis completed"
        );
        Ok(response.text().unwrap_or_else(|| ANALYSIS_FALLBACK.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mobicare_core::Message;

    use super::ConversationAnalyst;
    use crate::llm::{GenerateResponse, LlmError};
    use crate::testing::ScriptedLlm;

    #[tokio::test]
    async fn analysis_uses_low_temperature_and_transcript() {
        let llm = Arc::new(ScriptedLlm::replying("1. **Summary of Interaction**: fiber outage"));
        let analyst = ConversationAnalyst::new(llm.clone(), "gemini-3-pro-preview");

        let report = analyst
            .analyze(&[Message::user("No signal in Colombo", None), Message::model("Ticket raised")])
            .await
            .expect("analysis");
        assert!(report.contains("Summary of Interaction"));

        let requests = llm.requests();
        assert_eq!(requests[0].model, "gemini-3-pro-preview");
        assert_eq!(requests[0].temperature, Some(0.2));
        assert!(requests[0].function_declarations.is_empty());
        assert!(!requests[0].web_search);
        assert!(requests[0].contents[0].text().contains("USER: No signal in Colombo"));
    }

    #[tokio::test]
    async fn empty_analysis_falls_back() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(GenerateResponse::default())]));
        let report = ConversationAnalyst::new(llm, "m").analyze(&[]).await.expect("analysis");
        assert_eq!(report, "Analysis unavailable.");
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let llm = Arc::new(ScriptedLlm::failing(LlmError::Transport("down".into())));
        let result = ConversationAnalyst::new(llm, "m").analyze(&[]).await;
        assert!(matches!(result, Err(LlmError::Transport(_))));
    }
}
