//! Terminal chat: one-shot when a message is given, otherwise a line-based
//! loop over stdin until `/exit` or end of input.

use std::io::{self, BufRead, Write};

use mobicare_agent::personas::greeting;
use mobicare_agent::{QuickAction, Submission, SupportDesk, TurnReply};
use mobicare_core::{ConversationSession, Language, Message, PersonaId, Role};
use serde_json::json;

use crate::commands::{
    async_runtime, exit, flush_archive, llm_client, load_config, new_session, support_desk,
    CommandResult,
};

#[derive(Clone, Debug, Default)]
pub struct ChatOptions {
    pub message: Option<String>,
    pub image: Option<String>,
    pub persona: Option<PersonaId>,
    pub language: Option<Language>,
    pub quick: Option<QuickAction>,
}

pub fn run(options: ChatOptions) -> CommandResult {
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let llm = match llm_client("chat", &config) {
        Ok(llm) => llm,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let desk = support_desk(&config, llm);
    let mut session = desk.open_session(new_session(&config));
    if let Some(persona) = options.persona {
        session.persona = persona;
    }
    if let Some(language) = options.language {
        session.language = language;
    }

    let one_shot = match (options.quick, options.message) {
        (Some(action), _) => Some(Submission::text(action.prompt())),
        (None, Some(text)) => Some(Submission {
            text,
            image: options.image,
            ..Submission::default()
        }),
        (None, None) => None,
    };

    runtime.block_on(async {
        let result = match one_shot {
            Some(submission) => send_once(&desk, &mut session, submission).await,
            None => {
                let stdin = io::stdin();
                let mut stdout = io::stdout();
                match converse(&desk, &mut session, stdin.lock(), &mut stdout).await {
                    Ok(turns) => CommandResult::success("chat", format!("{turns} turns completed")),
                    Err(error) => CommandResult::failure(
                        "chat",
                        "terminal_io",
                        error.to_string(),
                        exit::RUNTIME,
                    ),
                }
            }
        };
        flush_archive(&desk).await;
        result
    })
}

async fn send_once(
    desk: &SupportDesk,
    session: &mut ConversationSession,
    submission: Submission,
) -> CommandResult {
    match desk.send(session, submission).await {
        Ok(TurnReply::Answered { outcome, message }) => CommandResult::success_with_details(
            "chat",
            message.text.clone(),
            json!({
                "messageId": message.id.as_str(),
                "persona": session.persona.as_str(),
                "outcome": outcome,
            }),
        ),
        Ok(TurnReply::Failed { error, message }) => {
            CommandResult::failure("chat", error.error_code(), message.text, exit::TURN_FAILED)
        }
        Ok(TurnReply::Cancelled) => {
            CommandResult::failure("chat", "cancelled", "turn was cancelled", exit::TURN_FAILED)
        }
        Err(error) => {
            CommandResult::failure("chat", "invalid_input", error.to_string(), exit::INVALID_INPUT)
        }
    }
}

/// Runs the interactive loop over `input`, writing the transcript to `out`.
/// Returns the number of turns sent.
pub async fn converse<R: BufRead, W: Write>(
    desk: &SupportDesk,
    session: &mut ConversationSession,
    input: R,
    out: &mut W,
) -> io::Result<usize> {
    writeln!(out, "{}", greeting(session.persona))?;
    let mut turns = 0;

    for line in input.lines() {
        let line = line?;
        let text = line.trim();
        match text {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                if let Err(error) = desk.reset(session) {
                    writeln!(out, "! could not clear saved session: {error}")?;
                }
                writeln!(out, "{}", greeting(session.persona))?;
                continue;
            }
            _ => {}
        }

        turns += 1;
        let before = session.messages().len();
        let persona = session.persona;
        match desk.send(session, Submission::text(text)).await {
            Ok(TurnReply::Cancelled) => writeln!(out, "! turn cancelled")?,
            Ok(_) => {
                let replies = session.messages()[before..]
                    .iter()
                    .filter(|message| message.role == Role::Model);
                for message in replies {
                    write_message(out, message)?;
                }
                if session.persona != persona {
                    writeln!(out, "{}", greeting(session.persona))?;
                }
            }
            Err(error) => writeln!(out, "! {error}")?,
        }
    }

    Ok(turns)
}

fn write_message<W: Write>(out: &mut W, message: &Message) -> io::Result<()> {
    let marker = if message.is_error { "!" } else { ">" };
    writeln!(out, "{marker} {}", message.text)?;
    if let Some(ticket_id) = &message.ticket_id {
        writeln!(out, "  ticket: {ticket_id}")?;
    }
    for citation in &message.citations {
        writeln!(out, "  source: {} <{}>", citation.title, citation.uri)?;
    }
    Ok(())
}
