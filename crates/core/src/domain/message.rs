use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Positive,
    Negative,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl std::str::FromStr for Feedback {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" | "up" | "+" => Ok(Self::Positive),
            "negative" | "down" | "-" => Ok(Self::Negative),
            other => Err(format!("unsupported feedback `{other}` (expected positive|negative)")),
        }
    }
}

/// A (title, uri) reference surfaced by provider-side search grounding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub uri: String,
}

impl Citation {
    pub const UNTITLED: &'static str = "External Source";

    pub fn new(title: Option<String>, uri: impl Into<String>) -> Self {
        let title = title
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| Self::UNTITLED.to_string());
        Self { title, uri: uri.into() }
    }
}

/// One conversational turn. Field names follow the saved-session format
/// used by the web client so logs can be exchanged unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default, rename = "groundingLinks", skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_fixes: Vec<String>,
}

impl Message {
    pub fn user(text: impl Into<String>, image: Option<String>) -> Self {
        Self::new(Role::User, text.into(), image)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text.into(), None)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { is_error: true, ..Self::new(Role::Model, text.into(), None) }
    }

    fn new(role: Role, text: String, image: Option<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            text,
            image,
            timestamp: Utc::now(),
            is_error: false,
            feedback: None,
            citations: Vec::new(),
            ticket_id: None,
            quick_fixes: Vec::new(),
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    pub fn with_ticket_id(mut self, ticket_id: Option<String>) -> Self {
        self.ticket_id = ticket_id;
        self
    }
}
