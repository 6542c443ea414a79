//! Agent runtime for the MobiCare support assistant.
//!
//! This crate turns a user submission into a model answer:
//! - Builds provider contents from session history (`conversation`, `prompt`)
//! - Drives the bounded tool-calling loop against the LLM (`runtime`)
//! - Resolves model function calls against a closed catalog (`tools`)
//! - Applies turn results to the session and archives them (`desk`, `archive`)
//!
//! # Architecture
//!
//! The loop is a small state machine:
//! 1. **AwaitingResponse** - one `generateContent` round-trip, timed out and
//!    cancellable
//! 2. **ResolvingTools** - every pending call answered locally, results fed back
//! 3. **Done** / **Failed** - a [`runtime::TurnOutcome`] or a [`runtime::TurnError`]
//!
//! The number of tool rounds is capped by [`guardrails::GuardrailPolicy`].
//!
//! # Key Types
//!
//! - `AgentRuntime` - turn orchestrator (see `runtime` module)
//! - `LlmClient` - pluggable provider trait, implemented by `GeminiClient`
//! - `SupportDesk` - session-level send/report/feedback/reset flow

pub mod analysis;
pub mod archive;
pub mod conversation;
pub mod desk;
pub mod gemini;
pub mod guardrails;
pub mod llm;
pub mod personas;
pub mod prompt;
pub mod runtime;
pub mod testing;
pub mod tools;

pub use analysis::ConversationAnalyst;
pub use archive::{ChatArchive, HttpChatArchive, NoopChatArchive};
pub use conversation::TurnInput;
pub use desk::{QuickAction, ReportFiling, ReportReceipt, Submission, SupportDesk, TurnReply};
pub use gemini::GeminiClient;
pub use guardrails::GuardrailPolicy;
pub use llm::{LlmClient, LlmError};
pub use runtime::{AgentRuntime, PersonaSwitch, TurnError, TurnOutcome};
pub use tools::{ToolName, ToolRegistry, ToolSignal};
