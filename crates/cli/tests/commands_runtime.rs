use std::env;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use mobicare_agent::llm::{FunctionCall, GenerateResponse};
use mobicare_agent::personas::greeting;
use mobicare_agent::testing::ScriptedLlm;
use mobicare_cli::commands::knowledge::{self, KnowledgeAction};
use mobicare_cli::commands::{
    analyze, chat, chat::ChatOptions, config, doctor, feedback, new_session, report, reset,
    support_desk,
};
use mobicare_core::config::{AppConfig, LoadOptions};
use mobicare_core::{
    Feedback, IncidentReport, JsonFileSessionStore, Message, PersonaId, SessionStore,
};
use serde_json::{json, Value};

#[test]
fn config_redacts_llm_key_and_attributes_env_source() {
    with_env(&[("MOBICARE_LLM_API_KEY", "AIzaSyLongSecretValue")], || {
        let output = config::run();

        assert!(output.contains("- llm.api_key = AIza*** (source: env (MOBICARE_LLM_API_KEY))"));
        assert!(output.contains("- store.api_key = <unset> (source: default)"));
        assert!(!output.contains("AIzaSyLongSecretValue"));
    });
}

#[test]
fn config_reports_legacy_alias_as_source() {
    with_env(&[("GEMINI_API_KEY", "legacy-gemini-key"), ("PORT", "9191")], || {
        let output = config::run();

        assert!(output.contains("- server.port = 9191 (source: env (PORT))"));
        assert!(output.contains("(source: env (GEMINI_API_KEY))"));
    });
}

#[test]
fn doctor_fails_without_llm_key() {
    let assets = tempfile::tempdir().expect("tempdir");
    let static_dir = assets.path().display().to_string();

    with_env(&[("MOBICARE_SERVER_STATIC_DIR", &static_dir)], || {
        let (exit_code, output) = doctor::run(true);
        assert_eq!(exit_code, 1);

        let payload = parse_payload(&output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(check(&payload, "llm_api_key")["status"], "fail");
        assert_eq!(check(&payload, "store_api_key")["status"], "warn");
        assert_eq!(check(&payload, "static_dir")["status"], "warn");
    });
}

#[test]
fn doctor_passes_with_keys_assets_and_clean_session() {
    let workspace = tempfile::tempdir().expect("tempdir");
    fs::write(workspace.path().join("index.html"), "<html></html>").expect("index");
    let static_dir = workspace.path().display().to_string();
    let session_path = workspace.path().join("session.json").display().to_string();

    with_env(
        &[
            ("MOBICARE_LLM_API_KEY", "llm-key"),
            ("MOBICARE_STORE_API_KEY", "store-key"),
            ("MOBICARE_SERVER_STATIC_DIR", &static_dir),
            ("MOBICARE_SESSION_PATH", &session_path),
        ],
        || {
            let (exit_code, output) = doctor::run(false);
            assert_eq!(exit_code, 0, "unexpected doctor output:\n{output}");
            assert!(output.starts_with("doctor: all readiness checks passed"));
            assert!(output.contains("- [ok] session_log: no saved session"));
        },
    );
}

#[test]
fn chat_requires_llm_key() {
    with_env(&[], || {
        let result = chat::run(ChatOptions {
            message: Some("hello".to_string()),
            ..ChatOptions::default()
        });
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "llm_unavailable");
    });
}

#[test]
fn invalid_config_is_reported_as_config_validation() {
    with_env(&[("MOBICARE_SESSION_PERSONA", "billing")], || {
        let result = reset::run();
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn report_rejects_missing_fields_before_contacting_provider() {
    with_env(&[], || {
        let result = report::run(IncidentReport {
            customer_name: "Alice".to_string(),
            email: "alice@x.com".to_string(),
            ..IncidentReport::default()
        });
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("serviceType"));
        assert!(message.contains("location"));
    });
}

#[test]
fn reset_clears_saved_session() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let session_file = workspace.path().join("session.json");
    save_messages(&session_file, &[Message::user("hi", None), Message::model("hello")]);
    let session_path = session_file.display().to_string();

    with_env(&[("MOBICARE_SESSION_PATH", &session_path)], || {
        let result = reset::run();
        assert_eq!(result.exit_code, 0);
        assert_eq!(parse_payload(&result.output)["status"], "ok");
        assert!(!session_file.exists());

        let again = reset::run();
        assert_eq!(again.exit_code, 0, "clearing an absent log is not an error");
    });
}

#[test]
fn feedback_updates_saved_message_without_llm_key() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let session_file = workspace.path().join("session.json");
    let answer = Message::model("Your balance is Rs. 450.");
    save_messages(&session_file, &[Message::user("balance?", None), answer.clone()]);
    let session_path = session_file.display().to_string();

    with_env(&[("MOBICARE_SESSION_PATH", &session_path)], || {
        let unknown = feedback::run("missing-id", Feedback::Positive);
        assert_eq!(unknown.exit_code, 7);

        let result = feedback::run(answer.id.as_str(), Feedback::Negative);
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let saved = JsonFileSessionStore::new(&session_file)
            .load()
            .expect("load")
            .expect("saved messages");
        assert_eq!(saved[1].feedback, Some(Feedback::Negative));
    });
}

#[test]
fn feedback_mirror_reaches_archive_before_exit() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let session_file = workspace.path().join("session.json");
    let answer = Message::model("Your balance is Rs. 450.");
    save_messages(&session_file, &[Message::user("balance?", None), answer.clone()]);
    let session_path = session_file.display().to_string();

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind archive listener");
    let archive_url = format!("http://{}", listener.local_addr().expect("address"));
    let (sender, received) = mpsc::channel();
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            let _ = sender.send(read_request(stream));
        }
    });

    with_env(
        &[
            ("MOBICARE_SESSION_PATH", &session_path),
            ("MOBICARE_SESSION_USER_EMAIL", "alice@x.com"),
            ("MOBICARE_SESSION_ARCHIVE_URL", &archive_url),
        ],
        || {
            let result = feedback::run(answer.id.as_str(), Feedback::Positive);
            assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
        },
    );

    let request = received.recv_timeout(Duration::from_secs(5)).expect("archive request");
    assert!(request.starts_with("POST /api/firestore/feedback"), "request: {request}");
    assert!(request.contains("\"feedbackType\":\"positive\""));
    assert!(request.contains("\"userEmail\":\"alice@x.com\""));
    assert!(request.contains(&format!("\"messageId\":\"{}\"", answer.id)));
}

#[test]
fn analyze_needs_a_saved_conversation() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let session_path = workspace.path().join("absent.json").display().to_string();

    with_env(&[("MOBICARE_SESSION_PATH", &session_path)], || {
        let result = analyze::run();
        assert_eq!(result.exit_code, 5);
        assert_eq!(parse_payload(&result.output)["error_class"], "empty_session");
    });
}

#[test]
fn interactive_chat_prints_greeting_replies_and_tickets() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let session_file = workspace.path().join("session.json");
    let session_path = session_file.display().to_string();

    with_env(&[("MOBICARE_SESSION_PATH", &session_path), ("MOBICARE_SESSION_LANGUAGE", "en")], || {
        let config = AppConfig::load(LoadOptions::default()).expect("config");
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(GenerateResponse::from_text("Please share the affected area.")),
            Ok(GenerateResponse::from_calls(vec![FunctionCall::new(
                "submitIncidentReport",
                json!({
                    "report": {
                        "customerName": "Alice",
                        "email": "alice@x.com",
                        "serviceType": "Fiber",
                        "issueDescription": "No signal",
                        "location": "Colombo"
                    }
                }),
            )])),
            Ok(GenerateResponse::from_text("Your ticket has been raised.")),
        ]));
        let desk = support_desk(&config, llm.clone());
        let mut session = desk.open_session(new_session(&config));

        let input = "My fiber is down\n\nColombo, please file it\n/exit\nnever sent\n".as_bytes();
        let mut transcript = Vec::new();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let turns = runtime
            .block_on(chat::converse(&desk, &mut session, input, &mut transcript))
            .expect("converse");

        let transcript = String::from_utf8(transcript).expect("utf8");
        assert_eq!(turns, 2);
        assert!(transcript.starts_with("I m SLT mobitel customer support AI how can i help you"));
        assert!(transcript.contains("> Please share the affected area."));
        assert!(transcript.contains("> Your ticket has been raised.\n  ticket: SLT-REF-"));
        assert_eq!(llm.request_count(), 3);

        let saved = JsonFileSessionStore::new(&session_file)
            .load()
            .expect("load")
            .expect("saved messages");
        assert_eq!(saved.len(), 4);
    });
}

/// Reads one HTTP request (headers plus `content-length` body) and answers 200.
fn read_request(mut stream: std::net::TcpStream) -> String {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut raw = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let body_len = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
                })
                .unwrap_or(0_usize);
            if raw.len() >= header_end + 4 + body_len {
                break;
            }
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(read) => raw.extend_from_slice(&chunk[..read]),
        }
    }
    let response = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\n\r\n{}";
    let _ = stream.write_all(response.as_bytes());
    String::from_utf8_lossy(&raw).to_string()
}

#[test]
fn interactive_chat_greets_after_persona_switch() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let session_path = workspace.path().join("session.json").display().to_string();

    with_env(&[("MOBICARE_SESSION_PATH", &session_path)], || {
        let config = AppConfig::load(LoadOptions::default()).expect("config");
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(GenerateResponse::from_calls(vec![FunctionCall::new(
                "switch_agent",
                json!({ "targetAgent": "support", "reason": "Router fault" }),
            )])),
            Ok(GenerateResponse::from_text("Which lights are on?")),
        ]));
        let desk = support_desk(&config, llm);
        let mut session = desk.open_session(new_session(&config));

        let mut transcript = Vec::new();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let input = "my router is dead\n".as_bytes();
        runtime
            .block_on(chat::converse(&desk, &mut session, input, &mut transcript))
            .expect("converse");

        let transcript = String::from_utf8(transcript).expect("utf8");
        let answer = transcript.find("> Which lights are on?").expect("answer printed");
        let welcome = transcript.rfind(greeting(PersonaId::Support)).expect("support greeting");
        assert!(welcome > answer);
        assert_eq!(session.persona, PersonaId::Support);
    });
}

#[test]
fn knowledge_changes_persist_and_frame_later_chats() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let session_path = workspace.path().join("session.json").display().to_string();
    let pdf = workspace.path().join("fiber-plans.pdf");
    fs::write(&pdf, b"%PDF-1.4").expect("pdf");
    let notes = workspace.path().join("notes.txt");
    fs::write(&notes, "plain text").expect("notes");

    with_env(&[("MOBICARE_SESSION_PATH", &session_path)], || {
        let added = knowledge::run(KnowledgeAction::AddSource { path: pdf.clone() });
        assert_eq!(added.exit_code, 0, "unexpected output: {}", added.output);
        let payload = parse_payload(&added.output);
        assert_eq!(payload["details"]["sources"][0]["name"], "fiber-plans.pdf");
        assert_eq!(payload["details"]["sources"][0]["size"], 8);
        assert_eq!(payload["details"]["webResources"].as_array().map(Vec::len), Some(5));

        let rejected = knowledge::run(KnowledgeAction::AddSource { path: notes.clone() });
        assert_eq!(rejected.exit_code, 7);

        let linked = knowledge::run(KnowledgeAction::AddLink {
            title: "Coverage map".to_string(),
            uri: "https://www.slt.lk/coverage".to_string(),
        });
        assert_eq!(linked.exit_code, 0);
        let removed = knowledge::run(KnowledgeAction::RemoveLink { id: "5".to_string() });
        assert_eq!(removed.exit_code, 0);
        let missing = knowledge::run(KnowledgeAction::RemoveSource { id: "nope".to_string() });
        assert_eq!(missing.exit_code, 7);

        let listed = parse_payload(&knowledge::run(KnowledgeAction::List).output);
        let titles: Vec<_> = listed["details"]["webResources"]
            .as_array()
            .map(|links| links.iter().filter_map(|link| link["title"].as_str()).collect())
            .unwrap_or_default();
        assert!(titles.contains(&"Coverage map"));
        assert!(!titles.contains(&"Wikipedia SLTMobitel"));

        let config = AppConfig::load(LoadOptions::default()).expect("config");
        let llm = Arc::new(ScriptedLlm::replying("Fiber plans start at Rs. 2,990."));
        let desk = support_desk(&config, llm.clone());
        let mut session = desk.open_session(new_session(&config));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let mut transcript = Vec::new();
        let input = "fiber plans?\n".as_bytes();
        runtime
            .block_on(chat::converse(&desk, &mut session, input, &mut transcript))
            .expect("converse");

        let requests = llm.requests();
        let sent = requests[0].contents.last().expect("user turn").text();
        assert!(sent.contains("Knowledge Base: fiber-plans.pdf"));
        assert!(sent.contains("Coverage map"));
    });
}

fn save_messages(path: &Path, messages: &[Message]) {
    JsonFileSessionStore::new(path).save(messages).expect("save session");
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn check<'a>(payload: &'a Value, name: &str) -> &'a Value {
    payload["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .unwrap_or_else(|| panic!("missing doctor check `{name}`"))
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PORT",
        "FIREBASE_API_KEY",
        "FIREBASE_PROJECT_ID",
        "GEMINI_API_KEY",
        "MOBICARE_SERVER_BIND_ADDRESS",
        "MOBICARE_SERVER_PORT",
        "MOBICARE_SERVER_STATIC_DIR",
        "MOBICARE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "MOBICARE_STORE_API_KEY",
        "MOBICARE_STORE_PROJECT_ID",
        "MOBICARE_STORE_BASE_URL",
        "MOBICARE_STORE_TIMEOUT_SECS",
        "MOBICARE_LLM_API_KEY",
        "MOBICARE_LLM_BASE_URL",
        "MOBICARE_LLM_MODEL",
        "MOBICARE_LLM_ANALYSIS_MODEL",
        "MOBICARE_LLM_TIMEOUT_SECS",
        "MOBICARE_LLM_MAX_TOOL_ROUNDS",
        "MOBICARE_SESSION_PATH",
        "MOBICARE_SESSION_LANGUAGE",
        "MOBICARE_SESSION_PERSONA",
        "MOBICARE_SESSION_USER_EMAIL",
        "MOBICARE_SESSION_ARCHIVE_URL",
        "MOBICARE_LOGGING_LEVEL",
        "MOBICARE_LOGGING_FORMAT",
        "MOBICARE_LOG_LEVEL",
        "MOBICARE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
