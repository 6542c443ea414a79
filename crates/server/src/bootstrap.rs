use std::sync::Arc;

use axum::Router;
use mobicare_agent::{
    AgentRuntime, ConversationAnalyst, GeminiClient, GuardrailPolicy, LlmClient, LlmError,
};
use mobicare_core::config::{AppConfig, ConfigError, LoadOptions};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{self, ApiState};
use crate::gateway::PersistenceGateway;
use crate::{health, spa};

pub struct Application {
    pub config: AppConfig,
    pub state: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("llm client construction failed: {0}")]
    Llm(#[source] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let gateway = PersistenceGateway::from_config(&config.store).map_err(BootstrapError::HttpClient)?;
    if gateway.writes_enabled() {
        info!(
            event_name = "system.bootstrap.store_ready",
            project_id = %config.store.project_id,
            "document store writes enabled"
        );
    } else {
        warn!(
            event_name = "system.bootstrap.store_disabled",
            "store api key missing; persistence writes will be skipped"
        );
    }

    let (runtime, analyst) = match GeminiClient::from_config(&config.llm) {
        Ok(client) => {
            let llm: Arc<dyn LlmClient> = Arc::new(client);
            let runtime = AgentRuntime::new(
                Arc::clone(&llm),
                config.llm.model.clone(),
                GuardrailPolicy::from_config(&config.llm),
            );
            let analyst = ConversationAnalyst::new(llm, config.llm.analysis_model.clone());
            info!(
                event_name = "system.bootstrap.llm_ready",
                model = %config.llm.model,
                max_tool_rounds = config.llm.max_tool_rounds,
                "llm client initialized"
            );
            (Some(runtime), Some(analyst))
        }
        Err(LlmError::MissingApiKey) => {
            warn!(
                event_name = "system.bootstrap.llm_disabled",
                "llm api key missing; chat and analysis endpoints will be unavailable"
            );
            (None, None)
        }
        Err(error) => return Err(BootstrapError::Llm(error)),
    };

    Ok(Application { config, state: ApiState { gateway, runtime, analyst } })
}

impl Application {
    pub fn router(&self) -> Router {
        Router::new()
            .merge(api::router(self.state.clone()))
            .merge(health::router())
            .merge(spa::router(&self.config.server.static_dir))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use mobicare_core::config::{ConfigOverrides, LoadOptions};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::bootstrap::bootstrap;

    fn options(static_dir: &std::path::Path) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                static_dir: Some(static_dir.to_path_buf()),
                store_api_key: Some(String::new()),
                llm_api_key: Some(String::new()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn bootstrap_without_keys_degrades_instead_of_failing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = bootstrap(options(dir.path())).await.expect("bootstrap");

        assert!(!app.state.gateway.writes_enabled());
        assert!(app.state.runtime.is_none());
        assert!(app.state.analyst.is_none());
    }

    #[tokio::test]
    async fn router_serves_health_persistence_and_spa_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("index.html"), "<html>mobicare</html>").expect("index");
        let router = bootstrap(options(dir.path())).await.expect("bootstrap").router();

        let health = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health response");
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(body_text(health).await, "OK");

        let write = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/firestore/chat_history")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"userEmail":"a@x.com","role":"user","text":"hi"}"#))
                    .expect("request"),
            )
            .await
            .expect("write response");
        assert_eq!(write.status(), StatusCode::OK);
        let payload: Value = serde_json::from_str(&body_text(write).await).expect("json");
        assert_eq!(payload, json!({ "error": "API Key missing" }));

        let deep_link = router
            .oneshot(Request::builder().uri("/reports/42").body(Body::empty()).expect("request"))
            .await
            .expect("spa response");
        assert_eq!(deep_link.status(), StatusCode::OK);
        assert_eq!(body_text(deep_link).await, "<html>mobicare</html>");
    }
}
