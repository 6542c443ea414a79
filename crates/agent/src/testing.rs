//! In-memory [`LlmClient`] doubles for exercising the orchestrator without
//! network access.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{GenerateRequest, GenerateResponse, LlmClient, LlmError};

/// Replays a fixed script of responses and records every request it saw.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    steps: Mutex<VecDeque<Result<GenerateResponse, LlmError>>>,
    repeat: Option<GenerateResponse>,
    delay: Option<Duration>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedLlm {
    pub fn new(steps: Vec<Result<GenerateResponse, LlmError>>) -> Self {
        Self { steps: Mutex::new(steps.into()), ..Self::default() }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(GenerateResponse::from_text(text))])
    }

    pub fn failing(error: LlmError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Answers every request with the same response once the script runs out.
    pub fn repeating(response: GenerateResponse) -> Self {
        Self { repeat: Some(response), ..Self::default() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|guard| guard.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(request);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.steps.lock().ok().and_then(|mut guard| guard.pop_front());
        match (next, &self.repeat) {
            (Some(step), _) => step,
            (None, Some(response)) => Ok(response.clone()),
            (None, None) => Err(LlmError::Transport("scripted responses exhausted".to_string())),
        }
    }
}
