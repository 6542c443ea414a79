pub mod config;
pub mod domain;
pub mod errors;
pub mod session;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::knowledge::{KnowledgeContext, KnowledgeSource, WebResource};
pub use domain::language::Language;
pub use domain::message::{Citation, Feedback, Message, MessageId, Role};
pub use domain::persona::PersonaId;
pub use domain::report::{IncidentReport, SERVICE_TYPES};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use session::{
    restore_messages, ConversationSession, JsonFileKnowledgeStore, JsonFileSessionStore,
    MemorySessionStore, SessionStore, SessionStoreError,
};
