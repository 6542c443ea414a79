//! Gemini `generateContent` REST client.

use std::time::Duration;

use async_trait::async_trait;
use mobicare_core::config::LlmConfig;
use mobicare_core::Citation;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::llm::{Content, GenerateRequest, GenerateResponse, LlmClient, LlmError};

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LlmError::Transport(format!("could not build http client: {err}")))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), api_key })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        Self::new(config.base_url.clone(), api_key, Duration::from_secs(config.timeout_secs))
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let body = WireRequest::from_request(&request);
        debug!(
            event_name = "llm.request.dispatched",
            model = %request.model,
            contents = request.contents.len(),
            web_search = request.web_search,
            "dispatching generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Transport(err.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }

        let parsed: WireResponse =
            response.json().await.map_err(|err| LlmError::Decode(err.to_string()))?;
        Ok(parsed.into_response())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<Value>,
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        let system_instruction =
            request.system_instruction.as_ref().map(|text| json!({ "parts": [{ "text": text }] }));

        let mut tools = Vec::new();
        if request.web_search {
            tools.push(json!({ "googleSearch": {} }));
        }
        if !request.function_declarations.is_empty() {
            tools.push(json!({ "functionDeclarations": request.function_declarations }));
        }

        let generation_config = if request.temperature.is_some() || request.thinking_budget.is_some()
        {
            let mut config = serde_json::Map::new();
            if let Some(temperature) = request.temperature {
                config.insert("temperature".to_string(), json!(temperature));
            }
            if let Some(budget) = request.thinking_budget {
                config.insert("thinkingConfig".to_string(), json!({ "thinkingBudget": budget }));
            }
            Some(Value::Object(config))
        } else {
            None
        };

        Self { contents: &request.contents, system_instruction, tools, generation_config }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<Content>,
    grounding_metadata: Option<WireGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<WireGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct WireGroundingChunk {
    web: Option<WireWebChunk>,
}

#[derive(Debug, Deserialize)]
struct WireWebChunk {
    uri: Option<String>,
    title: Option<String>,
}

impl WireResponse {
    fn into_response(self) -> GenerateResponse {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return GenerateResponse::default();
        };

        let citations = candidate
            .grounding_metadata
            .map(|metadata| metadata.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|chunk| chunk.web)
            .filter_map(|web| web.uri.map(|uri| Citation::new(web.title, uri)))
            .collect();

        GenerateResponse { content: candidate.content, citations }
    }
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let message = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                message
            } else {
                format!("{status_text}: {message}")
            }
        })
        .unwrap_or_else(|_| body.to_string());

    LlmError::Status { status: status.as_u16(), message }
}
