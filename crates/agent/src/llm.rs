//! Provider-neutral request/response model for the hosted LLM.
//!
//! The shapes mirror the `generateContent` wire format closely enough that a
//! model turn containing function calls can be echoed back verbatim on the
//! next round (including opaque thought signatures).

use async_trait::async_trait;
use mobicare_core::{Citation, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default = "model_role")]
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

fn model_role() -> Role {
    Role::Model
}

impl Content {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|part| part.function_call.as_ref())
    }

    /// Concatenated visible text, skipping thought parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|part| !part.thought.unwrap_or(false))
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            inline_data: Some(InlineData { mime_type: mime_type.into(), data: data.into() }),
            ..Self::default()
        }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self { function_call: Some(call), ..Self::default() }
    }

    pub fn function_response(response: FunctionResponse) -> Self {
        Self { function_response: Some(response), ..Self::default() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self { name: name.into(), args, id: None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub function_declarations: Vec<Value>,
    /// Enables provider-side live web search grounding.
    pub web_search: bool,
    pub temperature: Option<f32>,
    pub thinking_budget: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateResponse {
    pub content: Option<Content>,
    pub citations: Vec<Citation>,
}

impl GenerateResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { content: Some(Content::model_text(text)), citations: Vec::new() }
    }

    pub fn from_calls(calls: Vec<FunctionCall>) -> Self {
        let parts = calls.into_iter().map(Part::function_call).collect();
        Self { content: Some(Content::new(Role::Model, parts)), citations: Vec::new() }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.content
            .as_ref()
            .map(|content| content.function_calls().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_function_calls(&self) -> bool {
        self.content.as_ref().is_some_and(|content| content.function_calls().next().is_some())
    }

    pub fn text(&self) -> Option<String> {
        self.content.as_ref().map(Content::text).filter(|text| !text.trim().is_empty())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm api key is not configured")]
    MissingApiKey,
    #[error("llm transport failure: {0}")]
    Transport(String),
    #[error("llm provider returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("llm response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use mobicare_core::Role;
    use serde_json::json;

    use super::{Content, FunctionCall, GenerateResponse, Part};

    #[test]
    fn model_turn_with_thought_signature_round_trips() {
        let raw = json!({
            "role": "model",
            "parts": [
                {"functionCall": {"name": "switch_agent", "args": {"targetAgent": "support", "reason": "fault"}, "id": "c1"},
                 "thoughtSignature": "opaque-sig"}
            ]
        });

        let content: Content = serde_json::from_value(raw.clone()).expect("decode");
        assert_eq!(content.role, Role::Model);
        assert_eq!(content.function_calls().count(), 1);
        assert_eq!(serde_json::to_value(&content).expect("encode"), raw);
    }

    #[test]
    fn text_skips_thought_parts() {
        let content = Content::new(
            Role::Model,
            vec![
                Part { text: Some("thinking...".to_string()), thought: Some(true), ..Part::default() },
                Part::text("Fiber plans start "),
                Part::text("at Rs. 2,990."),
            ],
        );
        assert_eq!(content.text(), "Fiber plans start at Rs. 2,990.");
    }

    #[test]
    fn blank_text_is_treated_as_absent() {
        assert_eq!(GenerateResponse::from_text("   ").text(), None);
        assert!(!GenerateResponse::default().has_function_calls());

        let calls = GenerateResponse::from_calls(vec![FunctionCall::new("x", json!({}))]);
        assert!(calls.has_function_calls());
        assert_eq!(calls.text(), None);
    }
}
