use mobicare_core::config::{AppConfig, LoadOptions};
use mobicare_core::{JsonFileSessionStore, SessionStore};
use secrecy::ExposeSecret;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] = ["llm_api_key", "store_api_key", "static_dir", "session_log"];

pub fn run(json_output: bool) -> (u8, String) {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
        return (exit_code, output);
    }

    (exit_code, render_human(&report))
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_llm_key(&config));
            checks.push(check_store_key(&config));
            checks.push(check_static_dir(&config));
            checks.push(check_session_log(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string()));
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| {
                DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                )
            }));
        }
    }

    let failed = checks.iter().any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped));
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = match (failed, warned) {
        (true, _) => (CheckStatus::Fail, "doctor: one or more readiness checks failed"),
        (false, true) => (CheckStatus::Warn, "doctor: ready with degraded features"),
        (false, false) => (CheckStatus::Pass, "doctor: all readiness checks passed"),
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_llm_key(config: &AppConfig) -> DoctorCheck {
    let configured =
        config.llm.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty());
    if configured {
        DoctorCheck::new(
            "llm_api_key",
            CheckStatus::Pass,
            format!("model `{}` will be used for chat turns", config.llm.model),
        )
    } else {
        DoctorCheck::new(
            "llm_api_key",
            CheckStatus::Fail,
            "no llm api key; set MOBICARE_LLM_API_KEY or GEMINI_API_KEY",
        )
    }
}

fn check_store_key(config: &AppConfig) -> DoctorCheck {
    if config.store_writes_enabled() {
        DoctorCheck::new(
            "store_api_key",
            CheckStatus::Pass,
            format!("writes go to project `{}`", config.store.project_id),
        )
    } else {
        DoctorCheck::new(
            "store_api_key",
            CheckStatus::Warn,
            "no store api key; persistence writes will return `API Key missing`",
        )
    }
}

fn check_static_dir(config: &AppConfig) -> DoctorCheck {
    let index = config.server.static_dir.join("index.html");
    if index.is_file() {
        DoctorCheck::new("static_dir", CheckStatus::Pass, format!("serving `{}`", index.display()))
    } else {
        DoctorCheck::new(
            "static_dir",
            CheckStatus::Warn,
            format!("`{}` not found; the web client will not be served", index.display()),
        )
    }
}

fn check_session_log(config: &AppConfig) -> DoctorCheck {
    let store = JsonFileSessionStore::new(config.session.path.clone());
    match store.load() {
        Ok(Some(messages)) => DoctorCheck::new(
            "session_log",
            CheckStatus::Pass,
            format!("{} saved messages in `{}`", messages.len(), store.path().display()),
        ),
        Ok(None) => DoctorCheck::new(
            "session_log",
            CheckStatus::Pass,
            format!("no saved session at `{}`", store.path().display()),
        ),
        Err(error) => DoctorCheck::new(
            "session_log",
            CheckStatus::Warn,
            format!("{error}; it will be discarded on next chat"),
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
