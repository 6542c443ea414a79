//! Fire-and-forget mirroring of turns, feedback and reports to the backend's
//! persistence endpoints. Failures are logged and never reach the user.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mobicare_core::{Feedback, IncidentReport, Message, MessageId};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive transport failure: {0}")]
    Transport(String),
    #[error("archive endpoint returned {0}")]
    Status(u16),
}

#[async_trait]
pub trait ChatArchive: Send + Sync {
    async fn record_turn(&self, user_email: &str, message: &Message) -> Result<(), ArchiveError>;

    async fn record_feedback(
        &self,
        user_email: &str,
        message_id: &MessageId,
        feedback: Feedback,
    ) -> Result<(), ArchiveError>;

    async fn record_report(&self, report: &IncidentReport) -> Result<(), ArchiveError>;
}

#[derive(Clone, Debug, Default)]
pub struct NoopChatArchive;

#[async_trait]
impl ChatArchive for NoopChatArchive {
    async fn record_turn(&self, _user_email: &str, _message: &Message) -> Result<(), ArchiveError> {
        Ok(())
    }

    async fn record_feedback(
        &self,
        _user_email: &str,
        _message_id: &MessageId,
        _feedback: Feedback,
    ) -> Result<(), ArchiveError> {
        Ok(())
    }

    async fn record_report(&self, _report: &IncidentReport) -> Result<(), ArchiveError> {
        Ok(())
    }
}

/// Posts records to `{base_url}/api/firestore/{collection}`.
#[derive(Clone, Debug)]
pub struct HttpChatArchive {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TurnRecord<'a> {
    user_email: &'a str,
    role: &'static str,
    text: &'a str,
    timestamp: String,
    ticket_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackRecord<'a> {
    user_email: &'a str,
    message_id: &'a str,
    feedback_type: &'static str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct ReportRecord<'a> {
    #[serde(flatten)]
    report: &'a IncidentReport,
    timestamp: String,
}

impl HttpChatArchive {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ArchiveError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ArchiveError::Transport(err.to_string()))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn endpoint(&self, collection: &str) -> String {
        format!("{}/api/firestore/{collection}", self.base_url)
    }

    async fn post<T: Serialize + Sync>(&self, collection: &str, body: &T) -> Result<(), ArchiveError> {
        let response = self
            .client
            .post(self.endpoint(collection))
            .json(body)
            .send()
            .await
            .map_err(|err| ArchiveError::Transport(err.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ArchiveError::Status(response.status().as_u16()))
        }
    }
}

fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[async_trait]
impl ChatArchive for HttpChatArchive {
    async fn record_turn(&self, user_email: &str, message: &Message) -> Result<(), ArchiveError> {
        let record = TurnRecord {
            user_email,
            role: message.role.as_str(),
            text: &message.text,
            timestamp: message.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            ticket_id: message.ticket_id.as_deref().unwrap_or_default(),
        };
        self.post("chat_history", &record).await
    }

    async fn record_feedback(
        &self,
        user_email: &str,
        message_id: &MessageId,
        feedback: Feedback,
    ) -> Result<(), ArchiveError> {
        let record = FeedbackRecord {
            user_email,
            message_id: message_id.as_str(),
            feedback_type: feedback.as_str(),
            timestamp: iso_now(),
        };
        self.post("feedback", &record).await
    }

    async fn record_report(&self, report: &IncidentReport) -> Result<(), ArchiveError> {
        let record = ReportRecord { report, timestamp: iso_now() };
        self.post("reports", &record).await
    }
}

/// Runs an archive write in the background when a runtime is available.
/// The write is tracked so callers can wait for it before shutting down.
pub(crate) fn spawn_archive_write<F>(tasks: &TaskTracker, operation: &'static str, write: F)
where
    F: Future<Output = Result<(), ArchiveError>> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            tasks.spawn_on(
                async move {
                    if let Err(error) = write.await {
                        warn!(
                            event_name = "archive.write.failed",
                            operation,
                            error = %error,
                            "archive write failed"
                        );
                    }
                },
                &handle,
            );
        }
        Err(_) => {
            debug!(event_name = "archive.write.skipped", operation, "no async runtime for archive write");
        }
    }
}

pub type SharedArchive = Arc<dyn ChatArchive>;
