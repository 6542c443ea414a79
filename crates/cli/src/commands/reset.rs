use mobicare_core::{JsonFileSessionStore, SessionStore};

use crate::commands::{exit, load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("reset") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let store = JsonFileSessionStore::new(config.session.path.clone());
    match store.clear() {
        Ok(()) => CommandResult::success(
            "reset",
            format!("cleared saved session `{}`", store.path().display()),
        ),
        Err(error) => {
            CommandResult::failure("reset", "session_store", error.to_string(), exit::SESSION)
        }
    }
}
