use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::language::Language;
use crate::domain::persona::PersonaId;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub graceful_shutdown_secs: u64,
}

/// Document store the persistence gateway writes to.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub api_key: Option<SecretString>,
    pub project_id: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub analysis_model: String,
    pub timeout_secs: u64,
    pub max_tool_rounds: u32,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub path: PathBuf,
    pub language: Language,
    pub persona: PersonaId,
    pub user_email: Option<String>,
    pub archive_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub static_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub store_api_key: Option<String>,
    pub store_project_id: Option<String>,
    pub store_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub llm_max_tool_rounds: Option<u32>,
    pub session_path: Option<PathBuf>,
    pub session_language: Option<Language>,
    pub session_persona: Option<PersonaId>,
    pub session_user_email: Option<String>,
    pub session_archive_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                static_dir: PathBuf::from("dist"),
                graceful_shutdown_secs: 15,
            },
            store: StoreConfig {
                api_key: None,
                project_id: "slt-chatbot".to_string(),
                base_url: "https://firestore.googleapis.com/v1".to_string(),
                timeout_secs: 10,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-3-flash-preview".to_string(),
                analysis_model: "gemini-3-pro-preview".to_string(),
                timeout_secs: 60,
                max_tool_rounds: 5,
            },
            session: SessionConfig {
                path: PathBuf::from("mobicare-session.json"),
                language: Language::Sinhala,
                persona: PersonaId::Main,
                user_email: None,
                archive_url: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("mobicare.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// True when the gateway can actually reach the document store.
    pub fn store_writes_enabled(&self) -> bool {
        self.store
            .api_key
            .as_ref()
            .map(|key| !key.expose_secret().trim().is_empty())
            .unwrap_or(false)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(static_dir) = server.static_dir {
                self.server.static_dir = static_dir;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(store) = patch.store {
            if let Some(store_api_key_value) = store.api_key {
                self.store.api_key = Some(secret_value(store_api_key_value));
            }
            if let Some(project_id) = store.project_id {
                self.store.project_id = project_id;
            }
            if let Some(base_url) = store.base_url {
                self.store.base_url = base_url;
            }
            if let Some(timeout_secs) = store.timeout_secs {
                self.store.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(analysis_model) = llm.analysis_model {
                self.llm.analysis_model = analysis_model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tool_rounds) = llm.max_tool_rounds {
                self.llm.max_tool_rounds = max_tool_rounds;
            }
        }

        if let Some(session) = patch.session {
            if let Some(path) = session.path {
                self.session.path = path;
            }
            if let Some(language) = session.language {
                self.session.language = language;
            }
            if let Some(persona) = session.persona {
                self.session.persona = persona;
            }
            if let Some(user_email) = session.user_email {
                self.session.user_email = Some(user_email);
            }
            if let Some(archive_url) = session.archive_url {
                self.session.archive_url = Some(archive_url);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MOBICARE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        // `PORT` is what container platforms inject.
        if let Some((key, value)) = read_env_with_alias("MOBICARE_SERVER_PORT", "PORT") {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("MOBICARE_SERVER_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("MOBICARE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("MOBICARE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some((_, value)) = read_env_with_alias("MOBICARE_STORE_API_KEY", "FIREBASE_API_KEY")
        {
            self.store.api_key = Some(secret_value(value));
        }
        if let Some((_, value)) =
            read_env_with_alias("MOBICARE_STORE_PROJECT_ID", "FIREBASE_PROJECT_ID")
        {
            self.store.project_id = value;
        }
        if let Some(value) = read_env("MOBICARE_STORE_BASE_URL") {
            self.store.base_url = value;
        }
        if let Some(value) = read_env("MOBICARE_STORE_TIMEOUT_SECS") {
            self.store.timeout_secs = parse_u64("MOBICARE_STORE_TIMEOUT_SECS", &value)?;
        }

        if let Some((_, value)) = read_env_with_alias("MOBICARE_LLM_API_KEY", "GEMINI_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MOBICARE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("MOBICARE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("MOBICARE_LLM_ANALYSIS_MODEL") {
            self.llm.analysis_model = value;
        }
        if let Some(value) = read_env("MOBICARE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("MOBICARE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MOBICARE_LLM_MAX_TOOL_ROUNDS") {
            self.llm.max_tool_rounds = parse_u32("MOBICARE_LLM_MAX_TOOL_ROUNDS", &value)?;
        }

        if let Some(value) = read_env("MOBICARE_SESSION_PATH") {
            self.session.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("MOBICARE_SESSION_LANGUAGE") {
            self.session.language = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "MOBICARE_SESSION_LANGUAGE".to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = read_env("MOBICARE_SESSION_PERSONA") {
            self.session.persona = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "MOBICARE_SESSION_PERSONA".to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = read_env("MOBICARE_SESSION_USER_EMAIL") {
            self.session.user_email = Some(value);
        }
        if let Some(value) = read_env("MOBICARE_SESSION_ARCHIVE_URL") {
            self.session.archive_url = Some(value);
        }

        let log_level =
            read_env("MOBICARE_LOGGING_LEVEL").or_else(|| read_env("MOBICARE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("MOBICARE_LOGGING_FORMAT").or_else(|| read_env("MOBICARE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(static_dir) = overrides.static_dir {
            self.server.static_dir = static_dir;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(store_api_key) = overrides.store_api_key {
            self.store.api_key = Some(secret_value(store_api_key));
        }
        if let Some(project_id) = overrides.store_project_id {
            self.store.project_id = project_id;
        }
        if let Some(base_url) = overrides.store_base_url {
            self.store.base_url = base_url;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(max_tool_rounds) = overrides.llm_max_tool_rounds {
            self.llm.max_tool_rounds = max_tool_rounds;
        }
        if let Some(path) = overrides.session_path {
            self.session.path = path;
        }
        if let Some(language) = overrides.session_language {
            self.session.language = language;
        }
        if let Some(persona) = overrides.session_persona {
            self.session.persona = persona;
        }
        if let Some(user_email) = overrides.session_user_email {
            self.session.user_email = Some(user_email);
        }
        if let Some(archive_url) = overrides.session_archive_url {
            self.session.archive_url = Some(archive_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_store(&self.store)?;
        validate_llm(&self.llm)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("mobicare.toml"), PathBuf::from("config/mobicare.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if store.project_id.trim().is_empty() {
        return Err(ConfigError::Validation("store.project_id must not be empty".to_string()));
    }
    if !is_http_url(&store.base_url) {
        return Err(ConfigError::Validation(
            "store.base_url must start with http:// or https://".to_string(),
        ));
    }
    if store.timeout_secs == 0 || store.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "store.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.max_tool_rounds == 0 || llm.max_tool_rounds > 20 {
        return Err(ConfigError::Validation(
            "llm.max_tool_rounds must be in range 1..=20".to_string(),
        ));
    }
    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }
    if llm.model.trim().is_empty() || llm.analysis_model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "llm.model and llm.analysis_model must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("session.path must not be empty".to_string()));
    }
    if let Some(archive_url) = &session.archive_url {
        if !is_http_url(archive_url) {
            return Err(ConfigError::Validation(
                "session.archive_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_with_alias(
    key: &'static str,
    alias: &'static str,
) -> Option<(&'static str, String)> {
    read_env(key).map(|value| (key, value)).or_else(|| read_env(alias).map(|value| (alias, value)))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    store: Option<StorePatch>,
    llm: Option<LlmPatch>,
    session: Option<SessionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    static_dir: Option<PathBuf>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    api_key: Option<String>,
    project_id: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    analysis_model: Option<String>,
    timeout_secs: Option<u64>,
    max_tool_rounds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    path: Option<PathBuf>,
    language: Option<Language>,
    persona: Option<PersonaId>,
    user_email: Option<String>,
    archive_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
