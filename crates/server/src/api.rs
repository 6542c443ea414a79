use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use mobicare_agent::conversation::TurnInput;
use mobicare_agent::{AgentRuntime, ConversationAnalyst, TurnError, TurnOutcome};
use mobicare_core::{
    ApplicationError, DomainError, InterfaceError, KnowledgeContext, KnowledgeSource, Language,
    Message, PersonaId, WebResource,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::gateway::{json_record, Collection, PersistenceGateway};

#[derive(Clone)]
pub struct ApiState {
    pub gateway: PersistenceGateway,
    pub runtime: Option<AgentRuntime>,
    pub analyst: Option<ConversationAnalyst>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub persona: PersonaId,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub knowledge_sources: Vec<KnowledgeSource>,
    #[serde(default)]
    pub web_resources: Option<Vec<WebResource>>,
}

impl ChatRequest {
    fn into_parts(self) -> (Vec<Message>, TurnInput) {
        let mut knowledge =
            KnowledgeContext { sources: self.knowledge_sources, ..KnowledgeContext::default() };
        if let Some(web_resources) = self.web_resources {
            knowledge.web_resources = web_resources;
        }

        let input = TurnInput {
            text: self.text,
            image: self.image,
            persona: self.persona,
            language: self.language,
            source_names: knowledge.source_names(),
            resource_titles: knowledge.resource_titles(),
        };
        (self.history, input)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalysisResponse {
    pub report: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/firestore/chat_history", post(store_chat_history))
        .route("/api/firestore/feedback", post(store_feedback))
        .route("/api/firestore/reports", post(store_report))
        .route("/api/chat", post(chat))
        .route("/api/analysis", post(analysis))
        .with_state(state)
}

pub async fn store_chat_history(
    State(state): State<ApiState>,
    Json(body): Json<Map<String, Value>>,
) -> Json<Value> {
    Json(state.gateway.write(Collection::ChatHistory, json_record(body)).await)
}

pub async fn store_feedback(
    State(state): State<ApiState>,
    Json(body): Json<Map<String, Value>>,
) -> Json<Value> {
    Json(state.gateway.write(Collection::Feedback, json_record(body)).await)
}

pub async fn store_report(
    State(state): State<ApiState>,
    Json(body): Json<Map<String, Value>>,
) -> Json<Value> {
    Json(state.gateway.write(Collection::Reports, json_record(body)).await)
}

pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<TurnOutcome> {
    let correlation_id = Uuid::new_v4().to_string();
    let Some(runtime) = state.runtime.as_ref() else {
        return Err(unavailable(&correlation_id));
    };

    if request.text.trim().is_empty() && request.image.is_none() {
        let error = ApplicationError::from(DomainError::EmptySubmission);
        return Err(interface_error(error.into_interface(correlation_id)));
    }

    let (history, input) = request.into_parts();
    let persona = input.persona;
    match runtime.run_turn(&history, &input, &CancellationToken::new()).await {
        Ok(outcome) => {
            info!(
                event_name = "api.chat.completed",
                correlation_id = %correlation_id,
                persona = persona.as_str(),
                ticket_issued = outcome.ticket_id.is_some(),
                "chat turn completed"
            );
            Ok(Json(outcome))
        }
        Err(error) => {
            warn!(
                event_name = "api.chat.failed",
                correlation_id = %correlation_id,
                error_code = error.error_code(),
                error = %error,
                "chat turn failed"
            );
            Err(turn_failure(&error, correlation_id))
        }
    }
}

pub async fn analysis(
    State(state): State<ApiState>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<AnalysisResponse> {
    let correlation_id = Uuid::new_v4().to_string();
    let Some(analyst) = state.analyst.as_ref() else {
        return Err(unavailable(&correlation_id));
    };

    match analyst.analyze(&request.messages).await {
        Ok(report) => Ok(Json(AnalysisResponse { report })),
        Err(error) => {
            warn!(
                event_name = "api.analysis.failed",
                correlation_id = %correlation_id,
                error = %error,
                "transcript analysis failed"
            );
            let error = ApplicationError::Provider(error.to_string());
            Err(interface_error(error.into_interface(correlation_id)))
        }
    }
}

fn unavailable(correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    warn!(
        event_name = "api.llm.unconfigured",
        correlation_id = %correlation_id,
        "llm api key is not configured"
    );
    let error = ApplicationError::Configuration("llm.api_key is not set".to_string());
    let (_, body) = interface_error(error.into_interface(correlation_id));
    (StatusCode::SERVICE_UNAVAILABLE, body)
}

fn turn_failure(error: &TurnError, correlation_id: String) -> (StatusCode, Json<ApiError>) {
    let status = match error {
        TurnError::RoundLimitExceeded { .. } => StatusCode::BAD_GATEWAY,
        TurnError::Provider(_) | TurnError::Timeout { .. } | TurnError::Cancelled => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (status, Json(ApiError { error: error.user_message().to_string(), correlation_id }))
}

fn interface_error(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let user_message = error.user_message().to_string();
    match error {
        InterfaceError::BadRequest { correlation_id, .. } => {
            (StatusCode::BAD_REQUEST, Json(ApiError { error: user_message, correlation_id }))
        }
        InterfaceError::ServiceUnavailable { correlation_id, .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError { error: user_message, correlation_id }),
        ),
        InterfaceError::Internal { correlation_id, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError { error: user_message, correlation_id }),
        ),
    }
}
