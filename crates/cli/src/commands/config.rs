use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use mobicare_core::config::AppConfig;
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::load_config;

/// One reported setting: dotted key, rendered value, env variables checked
/// in precedence order.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure.output,
    };

    let file_path = detect_config_path();
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["MOBICARE_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["MOBICARE_SERVER_PORT", "PORT"],
        },
        Field {
            key: "server.static_dir",
            value: config.server.static_dir.display().to_string(),
            env_keys: &["MOBICARE_SERVER_STATIC_DIR"],
        },
        Field {
            key: "store.api_key",
            value: redact(config.store.api_key.as_ref()),
            env_keys: &["MOBICARE_STORE_API_KEY", "FIREBASE_API_KEY"],
        },
        Field {
            key: "store.project_id",
            value: config.store.project_id.clone(),
            env_keys: &["MOBICARE_STORE_PROJECT_ID", "FIREBASE_PROJECT_ID"],
        },
        Field {
            key: "store.base_url",
            value: config.store.base_url.clone(),
            env_keys: &["MOBICARE_STORE_BASE_URL"],
        },
        Field {
            key: "llm.api_key",
            value: redact(config.llm.api_key.as_ref()),
            env_keys: &["MOBICARE_LLM_API_KEY", "GEMINI_API_KEY"],
        },
        Field {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["MOBICARE_LLM_MODEL"],
        },
        Field {
            key: "llm.analysis_model",
            value: config.llm.analysis_model.clone(),
            env_keys: &["MOBICARE_LLM_ANALYSIS_MODEL"],
        },
        Field {
            key: "llm.max_tool_rounds",
            value: config.llm.max_tool_rounds.to_string(),
            env_keys: &["MOBICARE_LLM_MAX_TOOL_ROUNDS"],
        },
        Field {
            key: "session.path",
            value: config.session.path.display().to_string(),
            env_keys: &["MOBICARE_SESSION_PATH"],
        },
        Field {
            key: "session.language",
            value: config.session.language.code().to_string(),
            env_keys: &["MOBICARE_SESSION_LANGUAGE"],
        },
        Field {
            key: "session.persona",
            value: config.session.persona.to_string(),
            env_keys: &["MOBICARE_SESSION_PERSONA"],
        },
        Field {
            key: "session.archive_url",
            value: config.session.archive_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["MOBICARE_SESSION_ARCHIVE_URL"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["MOBICARE_LOGGING_LEVEL", "MOBICARE_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_lowercase(),
            env_keys: &["MOBICARE_LOGGING_FORMAT", "MOBICARE_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("mobicare.toml"), PathBuf::from("config/mobicare.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse::<Value>().ok()
}

fn field_source(field: &Field, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    let from_env = field
        .env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = from_env {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

fn redact(secret: Option<&SecretString>) -> String {
    match secret.map(|secret| secret.expose_secret().trim()) {
        None => "<unset>".to_string(),
        Some("") => "<empty>".to_string(),
        Some(value) if value.chars().count() > 8 => {
            let prefix: String = value.chars().take(4).collect();
            format!("{prefix}***")
        }
        Some(_) => "<redacted>".to_string(),
    }
}
