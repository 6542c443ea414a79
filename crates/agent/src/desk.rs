//! Session-level support flow: the caller-side half of a conversation.
//!
//! [`SupportDesk`] owns the bookkeeping around an orchestrated turn. It
//! appends the user message, runs the turn, applies persona switches, turns
//! failures into a single error bubble, mirrors records to the archive and
//! saves the log through the session store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mobicare_core::{
    restore_messages, ConversationSession, DomainError, Feedback, IncidentReport, Message,
    MessageId, SessionStore, SessionStoreError,
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::archive::{spawn_archive_write, SharedArchive};
use crate::conversation::TurnInput;
use crate::prompt::switch_announcement;
use crate::runtime::{AgentRuntime, TurnError, TurnOutcome};

/// Text the model receives plus, optionally, a friendlier label shown in
/// the log instead.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Submission {
    pub text: String,
    pub display_text: Option<String>,
    pub image: Option<String>,
}

impl Submission {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_display_text(mut self, display_text: impl Into<String>) -> Self {
        self.display_text = Some(display_text.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TurnReply {
    Answered { outcome: TurnOutcome, message: Message },
    Failed { error: TurnError, message: Message },
    Cancelled,
}

impl TurnReply {
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Answered { message, .. } | Self::Failed { message, .. } => Some(message),
            Self::Cancelled => None,
        }
    }

    pub fn outcome(&self) -> Option<&TurnOutcome> {
        match self {
            Self::Answered { outcome, .. } => Some(outcome),
            Self::Failed { .. } | Self::Cancelled => None,
        }
    }
}

/// Confirmation shown after an incident report produced a ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportReceipt {
    pub email: String,
    pub ticket_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReportFiling {
    pub reply: TurnReply,
    pub receipt: Option<ReportReceipt>,
}

/// Canned prompts behind the quick-action buttons.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuickAction {
    Balance { service_type: String, account_number: String },
    Outage { area: String },
    Package { name: String },
}

impl QuickAction {
    pub fn prompt(&self) -> String {
        match self {
            Self::Balance { service_type, account_number } => {
                format!("I want to check my {service_type} balance for account {account_number}")
            }
            Self::Outage { area } => format!("Are there any reported network outages in {area}?"),
            Self::Package { name } => format!("Tell me more about the {name} plan."),
        }
    }
}

pub struct SupportDesk {
    runtime: AgentRuntime,
    archive: SharedArchive,
    store: Arc<dyn SessionStore>,
    cancel: Mutex<CancellationToken>,
    archive_tasks: TaskTracker,
}

impl SupportDesk {
    pub fn new(runtime: AgentRuntime, archive: SharedArchive, store: Arc<dyn SessionStore>) -> Self {
        Self {
            runtime,
            archive,
            store,
            cancel: Mutex::new(CancellationToken::new()),
            archive_tasks: TaskTracker::new(),
        }
    }

    /// Loads the saved log into `session`, discarding unreadable state.
    pub fn open_session(&self, session: ConversationSession) -> ConversationSession {
        let messages = restore_messages(self.store.as_ref());
        info!(event_name = "session.opened", messages = messages.len(), "session restored");
        session.with_messages(messages)
    }

    pub async fn send(
        &self,
        session: &mut ConversationSession,
        submission: Submission,
    ) -> Result<TurnReply, DomainError> {
        let history = session.messages().to_vec();
        let label = submission.display_text.clone().unwrap_or_else(|| submission.text.clone());
        let user_message = Message::user(label, submission.image.clone());
        session.begin_turn(user_message.clone())?;
        self.mirror_turn(session, &user_message);

        let input = TurnInput::for_session(session, submission.text, submission.image);
        let cancel = self.current_token();
        let reply = match self.runtime.run_turn(&history, &input, &cancel).await {
            Ok(outcome) => {
                let mut replies = Vec::with_capacity(2);
                if let Some(switch) = &outcome.persona_switch {
                    session.persona = switch.target;
                    replies.push(Message::model(switch_announcement(switch.target, &switch.reason)));
                }
                let message = Message::model(outcome.text.clone())
                    .with_citations(outcome.citations.clone())
                    .with_ticket_id(outcome.ticket_id.clone());
                replies.push(message.clone());
                session.complete_turn(replies);
                self.mirror_turn(session, &message);
                TurnReply::Answered { outcome, message }
            }
            Err(TurnError::Cancelled) => {
                session.complete_turn(Vec::new());
                TurnReply::Cancelled
            }
            Err(error) => {
                let message = Message::error(error.user_message());
                session.complete_turn(vec![message.clone()]);
                TurnReply::Failed { error, message }
            }
        };

        self.persist(session);
        Ok(reply)
    }

    pub async fn quick_action(
        &self,
        session: &mut ConversationSession,
        action: &QuickAction,
    ) -> Result<TurnReply, DomainError> {
        self.send(session, Submission::text(action.prompt())).await
    }

    /// Archives the report and asks the model to file it through the
    /// incident tool.
    pub async fn file_incident_report(
        &self,
        session: &mut ConversationSession,
        report: IncidentReport,
    ) -> Result<ReportFiling, DomainError> {
        let missing = report.missing_fields();
        if !missing.is_empty() {
            return Err(DomainError::IncompleteReport(missing.join(", ")));
        }

        let archive = Arc::clone(&self.archive);
        let archived = report.clone();
        spawn_archive_write(&self.archive_tasks, "record_report", async move {
            archive.record_report(&archived).await
        });

        let payload = serde_json::to_string(&report)
            .map_err(|err| DomainError::InvariantViolation(err.to_string()))?;
        let submission = Submission::text(format!("agent_task: submit_report {payload}"))
            .with_display_text(format!("Filing a service report for {}...", report.customer_name));

        let reply = self.send(session, submission).await?;
        let receipt = reply
            .outcome()
            .and_then(|outcome| outcome.ticket_id.clone())
            .map(|ticket_id| ReportReceipt { email: report.email.clone(), ticket_id });

        if let Some(receipt) = &receipt {
            info!(
                event_name = "desk.report.filed",
                ticket_id = %receipt.ticket_id,
                "incident report filed"
            );
        }
        Ok(ReportFiling { reply, receipt })
    }

    pub fn record_feedback(
        &self,
        session: &mut ConversationSession,
        message_id: &MessageId,
        feedback: Feedback,
    ) -> Result<(), DomainError> {
        session.set_feedback(message_id, feedback)?;

        if let Some(email) = session.user_email.clone() {
            let archive = Arc::clone(&self.archive);
            let message_id = message_id.clone();
            spawn_archive_write(&self.archive_tasks, "record_feedback", async move {
                archive.record_feedback(&email, &message_id, feedback).await
            });
        }

        self.persist(session);
        Ok(())
    }

    /// Aborts any in-flight turn. Later turns get a fresh token.
    pub fn cancel_in_flight(&self) {
        if let Ok(mut guard) = self.cancel.lock() {
            guard.cancel();
            *guard = CancellationToken::new();
        }
    }

    /// Clears the conversation and removes the saved log.
    pub fn reset(&self, session: &mut ConversationSession) -> Result<(), SessionStoreError> {
        self.cancel_in_flight();
        session.reset();
        self.store.clear()?;
        info!(event_name = "session.reset", "conversation reset");
        Ok(())
    }

    /// Waits for pending archive writes, up to `timeout`. Returns `false`
    /// when writes were still running at the deadline.
    pub async fn drain_archive(&self, timeout: Duration) -> bool {
        self.archive_tasks.close();
        let drained = tokio::time::timeout(timeout, self.archive_tasks.wait()).await.is_ok();
        self.archive_tasks.reopen();
        if !drained {
            warn!(
                event_name = "archive.drain.timeout",
                pending = self.archive_tasks.len(),
                "archive writes still pending after drain timeout"
            );
        }
        drained
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    fn mirror_turn(&self, session: &ConversationSession, message: &Message) {
        let Some(email) = session.user_email.clone() else {
            return;
        };
        let archive = Arc::clone(&self.archive);
        let message = message.clone();
        spawn_archive_write(&self.archive_tasks, "record_turn", async move {
            archive.record_turn(&email, &message).await
        });
    }

    fn persist(&self, session: &ConversationSession) {
        if let Err(error) = self.store.save(session.messages()) {
            warn!(
                event_name = "session.save.failed",
                error = %error,
                "could not save session log"
            );
        }
    }
}
