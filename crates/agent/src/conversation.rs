//! Turns session history and a new submission into provider contents.

use mobicare_core::domain::knowledge::advisory_note;
use mobicare_core::{ConversationSession, Language, Message, PersonaId, Role};

use crate::llm::{Content, Part};
use crate::prompt::bootstrap_exchange;

const IMAGE_MIME_TYPE: &str = "image/jpeg";

/// One user submission plus the context that frames it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnInput {
    pub text: String,
    pub image: Option<String>,
    pub persona: PersonaId,
    pub language: Language,
    pub source_names: Vec<String>,
    pub resource_titles: Vec<String>,
}

impl TurnInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    /// Input framed by the session's persona, language and reference material.
    pub fn for_session(
        session: &ConversationSession,
        text: impl Into<String>,
        image: Option<String>,
    ) -> Self {
        Self {
            text: text.into(),
            image,
            persona: session.persona,
            language: session.language,
            source_names: session.knowledge.source_names(),
            resource_titles: session.knowledge.resource_titles(),
        }
    }

    pub fn with_persona(mut self, persona: PersonaId) -> Self {
        self.persona = persona;
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Replays history as provider contents. A brand new conversation gets the
/// fixed opening exchange instead.
pub fn history_contents(history: &[Message]) -> Vec<Content> {
    if history.is_empty() {
        return bootstrap_exchange();
    }

    history
        .iter()
        .map(|message| {
            let mut parts = Vec::with_capacity(2);
            if !message.text.trim().is_empty() {
                parts.push(Part::text(message.text.clone()));
            }
            if let Some(image) = &message.image {
                parts.push(image_part(image));
            }
            Content::new(message.role, parts)
        })
        .collect()
}

pub fn user_content(input: &TurnInput) -> Content {
    let mut parts = Vec::with_capacity(3);
    if !input.text.is_empty() {
        parts.push(Part::text(input.text.clone()));
    }
    if let Some(image) = &input.image {
        parts.push(image_part(image));
    }
    parts.push(Part::text(advisory_note(&input.source_names, &input.resource_titles)));
    Content::new(Role::User, parts)
}

fn image_part(image: &str) -> Part {
    Part::inline_data(IMAGE_MIME_TYPE, strip_data_url(image))
}

/// Accepts either a `data:<mime>;base64,<payload>` URL or a bare payload.
pub fn strip_data_url(image: &str) -> &str {
    image.split(',').nth(1).filter(|payload| !payload.is_empty()).unwrap_or(image)
}
