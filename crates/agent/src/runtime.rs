//! The bounded request/response loop behind a single conversation turn.
//!
//! A turn moves through [`TurnState`]: `AwaitingResponse` issues one provider
//! round-trip, `ResolvingTools` answers every pending function call locally
//! and loops back, and the machine stops in `Done` or `Failed`. The number
//! of tool rounds is capped by [`GuardrailPolicy`]; each round-trip runs
//! under a timeout and races the caller's cancellation token.

use std::sync::Arc;
use std::time::Instant;

use mobicare_core::{Citation, Message, PersonaId, Role};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conversation::{history_contents, user_content, TurnInput};
use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::{
    Content, FunctionResponse, GenerateRequest, GenerateResponse, LlmClient, LlmError, Part,
};
use crate::prompt::{system_instruction, EMPTY_REPLY_FALLBACK};
use crate::tools::{ToolRegistry, ToolSignal};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PersonaSwitch {
    pub target: PersonaId,
    pub reason: String,
}

/// Result of a completed turn. Signal fields are explicit so callers must
/// decide what to do when each one is absent.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub text: String,
    pub citations: Vec<Citation>,
    pub ticket_id: Option<String>,
    pub persona_switch: Option<PersonaSwitch>,
    pub open_bill_calculator: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error(transparent)]
    Provider(#[from] LlmError),
    #[error("provider round-trip timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("model kept requesting tools after {rounds} rounds")]
    RoundLimitExceeded { rounds: u32 },
    #[error("turn was cancelled")]
    Cancelled,
}

pub const COMMUNICATION_ERROR_TEXT: &str =
    "I encountered a communication error. Please ensure you're connected to the network.";
pub const INCOMPLETE_TURN_TEXT: &str =
    "I could not complete that request. Please try rephrasing or ask again.";

impl TurnError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RoundLimitExceeded { .. } => INCOMPLETE_TURN_TEXT,
            Self::Provider(_) | Self::Timeout { .. } | Self::Cancelled => COMMUNICATION_ERROR_TEXT,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider_failure",
            Self::Timeout { .. } => "provider_timeout",
            Self::RoundLimitExceeded { .. } => "tool_round_limit",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug)]
enum TurnState {
    AwaitingResponse { round: u32 },
    ResolvingTools { round: u32, response: GenerateResponse },
    Done(TurnOutcome),
    Failed(TurnError),
}

#[derive(Debug, Default)]
struct TurnSignals {
    ticket_id: Option<String>,
    persona_switch: Option<PersonaSwitch>,
    open_bill_calculator: bool,
}

impl TurnSignals {
    fn record(&mut self, signal: ToolSignal) {
        match signal {
            ToolSignal::TicketIssued { ticket_id, .. } => self.ticket_id = Some(ticket_id),
            ToolSignal::PersonaSwitch { target, reason } => {
                self.persona_switch = Some(PersonaSwitch { target, reason })
            }
            ToolSignal::OpenBillCalculator => self.open_bill_calculator = true,
        }
    }
}

#[derive(Clone)]
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    guardrails: GuardrailPolicy,
    model: String,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, guardrails: GuardrailPolicy) -> Self {
        Self { llm, tools: ToolRegistry::new(), guardrails, model: model.into() }
    }

    pub async fn run_turn(
        &self,
        history: &[Message],
        input: &TurnInput,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let started = Instant::now();
        let system = system_instruction(input.persona, input.language);
        let declarations = self.tools.declarations();
        let mut contents = history_contents(history);
        contents.push(user_content(input));

        let mut signals = TurnSignals::default();
        let mut state = TurnState::AwaitingResponse { round: 0 };

        loop {
            state = match state {
                TurnState::AwaitingResponse { round } => {
                    if cancel.is_cancelled() {
                        TurnState::Failed(TurnError::Cancelled)
                    } else {
                        let request = GenerateRequest {
                            model: self.model.clone(),
                            system_instruction: Some(system.clone()),
                            contents: contents.clone(),
                            function_declarations: declarations.clone(),
                            web_search: round == 0,
                            ..GenerateRequest::default()
                        };
                        match self.dispatch(request, cancel).await {
                            Ok(response) if response.has_function_calls() => {
                                TurnState::ResolvingTools { round, response }
                            }
                            Ok(response) => {
                                TurnState::Done(finish(response, std::mem::take(&mut signals)))
                            }
                            Err(error) => TurnState::Failed(error),
                        }
                    }
                }
                TurnState::ResolvingTools { round, response } => {
                    match self.guardrails.evaluate_round(round) {
                        GuardrailDecision::Halt { rounds } => {
                            TurnState::Failed(TurnError::RoundLimitExceeded { rounds })
                        }
                        GuardrailDecision::Continue => {
                            let mut responses = Vec::new();
                            for call in response.function_calls() {
                                let resolution = self.tools.resolve(&call);
                                debug!(
                                    event_name = "agent.tool.resolved",
                                    tool = %resolution.name,
                                    round,
                                    error = resolution.is_error(),
                                    "tool call resolved"
                                );
                                if let Some(signal) = resolution.signal {
                                    signals.record(signal);
                                }
                                responses.push(Part::function_response(FunctionResponse {
                                    name: call.name.clone(),
                                    response: json!({ "result": resolution.payload }),
                                    id: call.id.clone(),
                                }));
                            }

                            if let Some(model_turn) = response.content {
                                contents.push(model_turn);
                            }
                            contents.push(Content::new(Role::User, responses));
                            TurnState::AwaitingResponse { round: round + 1 }
                        }
                    }
                }
                TurnState::Done(outcome) => {
                    info!(
                        event_name = "agent.turn.completed",
                        persona = %input.persona,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        citations = outcome.citations.len(),
                        ticket = outcome.ticket_id.is_some(),
                        "turn completed"
                    );
                    return Ok(outcome);
                }
                TurnState::Failed(error) => {
                    warn!(
                        event_name = "agent.turn.failed",
                        persona = %input.persona,
                        error_code = error.error_code(),
                        error = %error,
                        "turn failed"
                    );
                    return Err(error);
                }
            };
        }
    }

    async fn dispatch(
        &self,
        request: GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerateResponse, TurnError> {
        let timeout = self.guardrails.round_timeout;
        tokio::select! {
            _ = cancel.cancelled() => Err(TurnError::Cancelled),
            result = tokio::time::timeout(timeout, self.llm.generate(request)) => match result {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(error)) => Err(TurnError::Provider(error)),
                Err(_) => Err(TurnError::Timeout { secs: timeout.as_secs() }),
            },
        }
    }
}

fn finish(response: GenerateResponse, signals: TurnSignals) -> TurnOutcome {
    TurnOutcome {
        text: response.text().unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string()),
        citations: response.citations,
        ticket_id: signals.ticket_id,
        persona_switch: signals.persona_switch,
        open_bill_calculator: signals.open_bill_calculator,
    }
}
