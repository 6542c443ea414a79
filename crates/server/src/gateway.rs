//! Write-only proxy from flat JSON records to document-store collections.
//!
//! No validation and no retry: every outcome, including failures, is a JSON
//! value the HTTP layer returns with status 200.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use mobicare_core::config::StoreConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

pub const API_KEY_MISSING: &str = "API Key missing";
pub const NETWORK_ERROR: &str = "Network error";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
    ChatHistory,
    Feedback,
    Reports,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatHistory => "chat_history",
            Self::Feedback => "feedback",
            Self::Reports => "reports",
        }
    }
}

/// A record value before it is mapped onto a typed document field.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Other(Value),
}

impl From<Value> for RecordValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Number(number) => match number.as_f64() {
                Some(number) => Self::Number(number),
                None => Self::Other(Value::Number(number)),
            },
            Value::Bool(flag) => Self::Bool(flag),
            other => Self::Other(other),
        }
    }
}

impl RecordValue {
    pub fn to_field(&self) -> Value {
        match self {
            Self::Text(text) => json!({ "stringValue": text }),
            Self::Number(number) => json!({ "doubleValue": number }),
            Self::Bool(flag) => json!({ "booleanValue": flag }),
            Self::Timestamp(at) => {
                json!({ "timestampValue": at.to_rfc3339_opts(SecondsFormat::Millis, true) })
            }
            Self::Other(value) => json!({ "stringValue": value.to_string() }),
        }
    }
}

pub fn document_fields<I>(record: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, RecordValue)>,
{
    record.into_iter().map(|(key, value)| (key, value.to_field())).collect()
}

pub fn json_record(body: Map<String, Value>) -> Vec<(String, RecordValue)> {
    body.into_iter().map(|(key, value)| (key, RecordValue::from(value))).collect()
}

#[derive(Clone)]
pub struct PersistenceGateway {
    client: Client,
    base_url: String,
    project_id: String,
    api_key: Option<SecretString>,
}

impl PersistenceGateway {
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            api_key: api_key.filter(|key| !key.expose_secret().trim().is_empty()),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.base_url.clone(),
            config.project_id.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn writes_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            self.base_url,
            self.project_id,
            collection.as_str()
        )
    }

    pub async fn write(
        &self,
        collection: Collection,
        record: Vec<(String, RecordValue)>,
    ) -> Value {
        let Some(api_key) = &self.api_key else {
            warn!(
                event_name = "gateway.write.skipped",
                collection = collection.as_str(),
                "store api key is not set"
            );
            return json!({ "error": API_KEY_MISSING });
        };

        let body = json!({ "fields": document_fields(record) });
        let result = self
            .client
            .post(self.collection_url(collection))
            .query(&[("key", api_key.expose_secret())])
            .json(&body)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                error!(
                    event_name = "gateway.write.network_error",
                    collection = collection.as_str(),
                    error = %err.without_url(),
                    "document store request failed"
                );
                return json!({ "error": NETWORK_ERROR });
            }
        };

        let status = response.status();
        let payload = match response.json::<Value>().await {
            Ok(payload) => payload,
            Err(err) => {
                error!(
                    event_name = "gateway.write.network_error",
                    collection = collection.as_str(),
                    status = status.as_u16(),
                    error = %err.without_url(),
                    "document store response was not json"
                );
                return json!({ "error": NETWORK_ERROR });
            }
        };

        if !status.is_success() {
            error!(
                event_name = "gateway.write.failed",
                collection = collection.as_str(),
                status = status.as_u16(),
                upstream = %payload,
                "document store rejected write"
            );
            return json!({ "error": payload });
        }

        info!(
            event_name = "gateway.write.completed",
            collection = collection.as_str(),
            "document written"
        );
        payload
    }
}
