//! Conversation session state and its load/save hooks.
//!
//! A [`ConversationSession`] is the explicit context object handed to every
//! component that needs the current user, persona, language, reference
//! material or message log. Persistence goes through [`SessionStore`]; the
//! saved format is the bare message array the web client keeps locally.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

use crate::domain::knowledge::KnowledgeContext;
use crate::domain::language::Language;
use crate::domain::message::{Feedback, Message, MessageId, Role};
use crate::domain::persona::PersonaId;
use crate::errors::DomainError;

#[derive(Clone, Debug)]
pub struct ConversationSession {
    pub user_email: Option<String>,
    pub persona: PersonaId,
    pub language: Language,
    pub knowledge: KnowledgeContext,
    messages: Vec<Message>,
    busy: bool,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(PersonaId::default(), Language::default())
    }
}

impl ConversationSession {
    pub fn new(persona: PersonaId, language: Language) -> Self {
        Self {
            user_email: None,
            persona,
            language,
            knowledge: KnowledgeContext::default(),
            messages: Vec::new(),
            busy: false,
        }
    }

    pub fn with_user_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    pub fn with_knowledge(mut self, knowledge: KnowledgeContext) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn count_by_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|message| message.role == role).count()
    }

    /// Accepts a user submission and marks the session busy until
    /// [`Self::complete_turn`] is called.
    pub fn begin_turn(&mut self, message: Message) -> Result<(), DomainError> {
        if self.busy {
            return Err(DomainError::TurnInFlight);
        }
        if message.role != Role::User {
            return Err(DomainError::InvariantViolation(
                "only user messages can open a turn".to_string(),
            ));
        }
        if message.text.trim().is_empty() && message.image.is_none() {
            return Err(DomainError::EmptySubmission);
        }

        self.messages.push(message);
        self.busy = true;
        Ok(())
    }

    /// Appends the model-side messages produced by a finished turn and
    /// releases the busy flag.
    pub fn complete_turn(&mut self, replies: Vec<Message>) {
        self.messages.extend(replies);
        self.busy = false;
    }

    /// Sets feedback on a message. Repeating the same call leaves the same
    /// value in place.
    pub fn set_feedback(
        &mut self,
        message_id: &MessageId,
        feedback: Feedback,
    ) -> Result<&Message, DomainError> {
        let message = self
            .messages
            .iter_mut()
            .find(|message| &message.id == message_id)
            .ok_or_else(|| DomainError::MessageNotFound(message_id.to_string()))?;
        message.feedback = Some(feedback);
        Ok(message)
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.busy = false;
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("could not access session log `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("session log `{path}` is corrupt: {source}")]
    Corrupt { path: PathBuf, source: serde_json::Error },
    #[error("could not encode session log: {0}")]
    Encode(#[source] serde_json::Error),
}

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Vec<Message>>, SessionStoreError>;
    fn save(&self, messages: &[Message]) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// Loads the saved message log, falling back to an empty log when the
/// saved state cannot be read or decoded.
pub fn restore_messages(store: &dyn SessionStore) -> Vec<Message> {
    match store.load() {
        Ok(messages) => messages.unwrap_or_default(),
        Err(error) => {
            warn!(
                event_name = "session.restore.discarded",
                error = %error,
                "discarding unreadable session log and starting empty"
            );
            if let Err(error) = store.clear() {
                warn!(
                    event_name = "session.restore.clear_failed",
                    error = %error,
                    "could not remove unreadable session log"
                );
            }
            Vec::new()
        }
    }
}

#[derive(Clone, Debug)]
pub struct JsonFileSessionStore {
    path: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SessionStoreError {
        SessionStoreError::Io { path: self.path.clone(), source }
    }
}

impl SessionStore for JsonFileSessionStore {
    fn load(&self) -> Result<Option<Vec<Message>>, SessionStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        serde_json::from_str::<Vec<Message>>(&raw)
            .map(Some)
            .map_err(|source| SessionStoreError::Corrupt { path: self.path.clone(), source })
    }

    fn save(&self, messages: &[Message]) -> Result<(), SessionStoreError> {
        let encoded = serde_json::to_string_pretty(messages).map_err(SessionStoreError::Encode)?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        fs::write(&self.path, encoded).map_err(|source| self.io_error(source))
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }
}

/// Reference material saved next to the session log. A missing file means
/// the official defaults apply.
#[derive(Clone, Debug)]
pub struct JsonFileKnowledgeStore {
    path: PathBuf,
}

impl JsonFileKnowledgeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `chat.json` keeps its knowledge in `chat.knowledge.json`.
    pub fn beside(session_log: &Path) -> Self {
        let stem = session_log.file_stem().and_then(|stem| stem.to_str()).unwrap_or("session");
        Self::new(session_log.with_file_name(format!("{stem}.knowledge.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<KnowledgeContext>, SessionStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|source| SessionStoreError::Io { path: self.path.clone(), source })?;
        serde_json::from_str::<KnowledgeContext>(&raw)
            .map(Some)
            .map_err(|source| SessionStoreError::Corrupt { path: self.path.clone(), source })
    }

    pub fn save(&self, knowledge: &KnowledgeContext) -> Result<(), SessionStoreError> {
        let encoded = serde_json::to_string_pretty(knowledge).map_err(SessionStoreError::Encode)?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| SessionStoreError::Io { path: self.path.clone(), source })?;
        }
        fs::write(&self.path, encoded)
            .map_err(|source| SessionStoreError::Io { path: self.path.clone(), source })
    }

    /// Saved knowledge, or the defaults when nothing usable is saved.
    pub fn restore(&self) -> KnowledgeContext {
        match self.load() {
            Ok(knowledge) => knowledge.unwrap_or_default(),
            Err(error) => {
                warn!(
                    event_name = "knowledge.restore.discarded",
                    error = %error,
                    "ignoring unreadable knowledge file and using defaults"
                );
                KnowledgeContext::default()
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    raw: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { raw: Mutex::new(Some(raw.into())) }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().ok().and_then(|guard| guard.clone())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Vec<Message>>, SessionStoreError> {
        let raw = self.raw();
        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str::<Vec<Message>>(&raw).map(Some).map_err(|source| {
                SessionStoreError::Corrupt { path: PathBuf::from("<memory>"), source }
            }),
        }
    }

    fn save(&self, messages: &[Message]) -> Result<(), SessionStoreError> {
        let encoded = serde_json::to_string(messages).map_err(SessionStoreError::Encode)?;
        if let Ok(mut guard) = self.raw.lock() {
            *guard = Some(encoded);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        if let Ok(mut guard) = self.raw.lock() {
            *guard = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use std::fs;

    use super::{
        restore_messages, ConversationSession, JsonFileKnowledgeStore, JsonFileSessionStore,
        MemorySessionStore, SessionStore,
    };
    use crate::domain::knowledge::KnowledgeContext;
    use crate::domain::message::{Feedback, Message, Role};
    use crate::errors::DomainError;

    #[test]
    fn begin_turn_rejects_second_submission_while_busy() {
        let mut session = ConversationSession::default();
        session.begin_turn(Message::user("hello", None)).expect("first turn");

        let second = session.begin_turn(Message::user("again", None));
        assert_eq!(second, Err(DomainError::TurnInFlight));
        assert_eq!(session.count_by_role(Role::User), 1);

        session.complete_turn(vec![Message::model("hi")]);
        assert!(!session.is_busy());
        session.begin_turn(Message::user("again", None)).expect("released after completion");
        assert_eq!(session.count_by_role(Role::User), 2);
    }

    #[test]
    fn begin_turn_rejects_empty_submission() {
        let mut session = ConversationSession::default();
        assert_eq!(session.begin_turn(Message::user("   ", None)), Err(DomainError::EmptySubmission));
        assert!(session.is_empty());
        assert!(!session.is_busy());

        session
            .begin_turn(Message::user("", Some("data:image/jpeg;base64,AAAA".to_string())))
            .expect("image-only submissions are accepted");
    }

    #[test]
    fn feedback_is_last_write_wins() {
        let reply = Message::model("Try restarting your router.");
        let id = reply.id.clone();
        let mut session = ConversationSession::default().with_messages(vec![reply]);

        session.set_feedback(&id, Feedback::Positive).expect("first feedback");
        session.set_feedback(&id, Feedback::Positive).expect("repeat feedback");
        assert_eq!(session.messages()[0].feedback, Some(Feedback::Positive));

        session.set_feedback(&id, Feedback::Negative).expect("changed feedback");
        assert_eq!(session.messages()[0].feedback, Some(Feedback::Negative));
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn feedback_for_unknown_message_fails() {
        let mut session = ConversationSession::default();
        let missing = crate::domain::message::MessageId("nope".to_string());
        assert!(matches!(
            session.set_feedback(&missing, Feedback::Positive),
            Err(DomainError::MessageNotFound(_))
        ));
    }

    #[test]
    fn file_store_round_trip_and_clear() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileSessionStore::new(dir.path().join("nested/session.json"));

        assert!(store.load().expect("load missing").is_none());

        let messages = vec![Message::user("hi", None), Message::model("hello")];
        store.save(&messages).expect("save");
        let loaded = store.load().expect("load").expect("saved log");
        assert_eq!(loaded, messages);

        store.clear().expect("clear");
        assert!(!store.path().exists());
        store.clear().expect("clearing twice is fine");
    }

    #[test]
    fn corrupt_state_is_discarded_on_restore() {
        let store = MemorySessionStore::with_raw("{not json");
        let messages = restore_messages(&store);
        assert!(messages.is_empty());
        assert!(store.raw().is_none(), "corrupt log is removed");
    }

    #[test]
    fn corrupt_file_is_discarded_on_restore() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "[{\"id\": 1}]").expect("write corrupt log");

        let store = JsonFileSessionStore::new(&path);
        assert!(store.load().is_err());
        assert!(restore_messages(&store).is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn knowledge_lives_beside_session_log_and_falls_back_to_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileKnowledgeStore::beside(&dir.path().join("chat.json"));
        assert_eq!(store.path(), dir.path().join("chat.knowledge.json"));
        assert_eq!(store.restore(), KnowledgeContext::default());

        let mut knowledge = KnowledgeContext::empty();
        knowledge.add_source("plans.pdf", "application/pdf", 5, "data:application/pdf;base64,JVBERi0=");
        store.save(&knowledge).expect("save");
        assert_eq!(store.restore().source_names(), vec!["plans.pdf".to_string()]);

        fs::write(store.path(), "{broken").expect("corrupt");
        assert_eq!(store.restore(), KnowledgeContext::default());
    }
}
