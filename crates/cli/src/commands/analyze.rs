use mobicare_agent::ConversationAnalyst;
use mobicare_core::{restore_messages, JsonFileSessionStore};

use crate::commands::{async_runtime, exit, llm_client, load_config, CommandResult};

/// Produces the executive report over the saved conversation.
pub fn run() -> CommandResult {
    let config = match load_config("analyze") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let messages = restore_messages(&JsonFileSessionStore::new(config.session.path.clone()));
    if messages.is_empty() {
        return CommandResult::failure(
            "analyze",
            "empty_session",
            format!("no saved conversation at `{}`", config.session.path.display()),
            exit::SESSION,
        );
    }

    let llm = match llm_client("analyze", &config) {
        Ok(llm) => llm,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("analyze") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let analyst = ConversationAnalyst::new(llm, config.llm.analysis_model.clone());
    match runtime.block_on(analyst.analyze(&messages)) {
        Ok(report) => CommandResult::success("analyze", report),
        Err(error) => {
            CommandResult::failure("analyze", "provider_failure", error.to_string(), exit::TURN_FAILED)
        }
    }
}
