use std::sync::Arc;

use async_trait::async_trait;
use mobicare_agent::llm::{GenerateRequest, GenerateResponse};
use mobicare_agent::{LlmClient, LlmError};
use mobicare_core::{Feedback, MessageId};

use crate::commands::{
    async_runtime, exit, flush_archive, load_config, new_session, support_desk, CommandResult,
};

/// Stands in for the provider when a command only touches session state.
struct Offline;

#[async_trait]
impl LlmClient for Offline {
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        Err(LlmError::MissingApiKey)
    }
}

/// Rates a saved model message and mirrors the rating when a user email is
/// configured. Works without an llm key.
pub fn run(message_id: &str, feedback: Feedback) -> CommandResult {
    let config = match load_config("feedback") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("feedback") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let desk = support_desk(&config, Arc::new(Offline));
    let mut session = desk.open_session(new_session(&config));
    let message_id = MessageId(message_id.to_string());

    runtime.block_on(async {
        let recorded = desk.record_feedback(&mut session, &message_id, feedback);
        flush_archive(&desk).await;
        match recorded {
            Ok(()) => CommandResult::success(
                "feedback",
                format!("recorded {} feedback for message {message_id}", feedback.as_str()),
            ),
            Err(error) => CommandResult::failure(
                "feedback",
                "invalid_input",
                error.to_string(),
                exit::INVALID_INPUT,
            ),
        }
    })
}
