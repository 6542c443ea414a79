pub mod analyze;
pub mod chat;
pub mod config;
pub mod doctor;
pub mod feedback;
pub mod knowledge;
pub mod report;
pub mod reset;

use std::sync::Arc;
use std::time::Duration;

use mobicare_agent::{
    AgentRuntime, ChatArchive, GeminiClient, GuardrailPolicy, HttpChatArchive, LlmClient,
    NoopChatArchive, SupportDesk,
};
use mobicare_core::config::{AppConfig, LoadOptions};
use mobicare_core::{ConversationSession, JsonFileKnowledgeStore, JsonFileSessionStore};
use serde::Serialize;
use serde_json::Value;

const ARCHIVE_TIMEOUT_SECS: u64 = 10;
const ARCHIVE_DRAIN_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::ok_with(command, message, None)
    }

    pub fn success_with_details(command: &str, message: impl Into<String>, details: Value) -> Self {
        Self::ok_with(command, message, Some(details))
    }

    fn ok_with(command: &str, message: impl Into<String>, details: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            details,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            details: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// Exit codes shared by every subcommand.
pub mod exit {
    pub const CONFIG: u8 = 2;
    pub const RUNTIME: u8 = 3;
    pub const LLM_UNAVAILABLE: u8 = 4;
    pub const SESSION: u8 = 5;
    pub const TURN_FAILED: u8 = 6;
    pub const INVALID_INPUT: u8 = 7;
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            payload.command,
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            exit::CONFIG,
        )
    })
}

/// Commands that mirror to the archive keep a multi-threaded runtime so
/// background writes progress while the command waits on stdin.
pub(crate) fn async_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build().map_err(
        |error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                exit::RUNTIME,
            )
        },
    )
}

pub(crate) fn llm_client(
    command: &str,
    config: &AppConfig,
) -> Result<Arc<dyn LlmClient>, CommandResult> {
    match GeminiClient::from_config(&config.llm) {
        Ok(client) => Ok(Arc::new(client)),
        Err(error) => Err(CommandResult::failure(
            command,
            "llm_unavailable",
            format!("{error}; set MOBICARE_LLM_API_KEY or GEMINI_API_KEY"),
            exit::LLM_UNAVAILABLE,
        )),
    }
}

/// Wires a support desk over the configured session log and archive.
pub fn support_desk(config: &AppConfig, llm: Arc<dyn LlmClient>) -> SupportDesk {
    let runtime =
        AgentRuntime::new(llm, config.llm.model.clone(), GuardrailPolicy::from_config(&config.llm));
    let archive: Arc<dyn ChatArchive> = match config.session.archive_url.as_deref() {
        Some(base_url) => {
            match HttpChatArchive::new(base_url, Duration::from_secs(ARCHIVE_TIMEOUT_SECS)) {
                Ok(archive) => Arc::new(archive),
                Err(error) => {
                    tracing::warn!(
                        event_name = "cli.archive.disabled",
                        error = %error,
                        "chat archive unavailable; continuing without mirroring"
                    );
                    Arc::new(NoopChatArchive)
                }
            }
        }
        None => Arc::new(NoopChatArchive),
    };
    let store = Arc::new(JsonFileSessionStore::new(config.session.path.clone()));
    SupportDesk::new(runtime, archive, store)
}

/// Gives background archive writes a bounded chance to finish before the
/// command drops its runtime.
pub(crate) async fn flush_archive(desk: &SupportDesk) {
    desk.drain_archive(Duration::from_secs(ARCHIVE_DRAIN_SECS)).await;
}

/// A fresh session framed by the configured persona, language and the
/// saved knowledge base.
pub fn new_session(config: &AppConfig) -> ConversationSession {
    let knowledge = JsonFileKnowledgeStore::beside(&config.session.path).restore();
    let session = ConversationSession::new(config.session.persona, config.session.language)
        .with_knowledge(knowledge);
    match config.session.user_email.as_deref() {
        Some(email) => session.with_user_email(email),
        None => session,
    }
}
