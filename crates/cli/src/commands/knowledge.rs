//! Administers the reference material summarised into every chat turn.
//! Changes are saved beside the session log and picked up by later
//! `chat` and `report` runs.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use clap::Subcommand;
use mobicare_core::{JsonFileKnowledgeStore, KnowledgeContext};
use serde_json::{json, Value};

use crate::commands::{exit, load_config, CommandResult};

const PDF_MIME_TYPE: &str = "application/pdf";

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum KnowledgeAction {
    #[command(about = "List knowledge-base documents and web resources")]
    List,
    #[command(about = "Add a web resource used for grounding")]
    AddLink {
        #[arg(long)]
        title: String,
        #[arg(long)]
        uri: String,
    },
    #[command(about = "Remove a web resource by id")]
    RemoveLink { id: String },
    #[command(about = "Upload a PDF into the knowledge base")]
    AddSource { path: PathBuf },
    #[command(about = "Remove a knowledge-base document by id")]
    RemoveSource { id: String },
}

pub fn run(action: KnowledgeAction) -> CommandResult {
    let config = match load_config("knowledge") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let store = JsonFileKnowledgeStore::beside(&config.session.path);
    let mut knowledge = store.restore();

    let message = match apply(&mut knowledge, action) {
        Ok(Some(message)) => message,
        Ok(None) => {
            return CommandResult::success_with_details(
                "knowledge",
                format!(
                    "{} documents, {} web resources",
                    knowledge.sources.len(),
                    knowledge.web_resources.len()
                ),
                summary(&knowledge),
            )
        }
        Err(failure) => return failure,
    };

    match store.save(&knowledge) {
        Ok(()) => CommandResult::success_with_details("knowledge", message, summary(&knowledge)),
        Err(error) => {
            CommandResult::failure("knowledge", "session_store", error.to_string(), exit::SESSION)
        }
    }
}

/// Applies a change, returning the confirmation text. `None` means nothing
/// was changed and nothing needs saving.
fn apply(
    knowledge: &mut KnowledgeContext,
    action: KnowledgeAction,
) -> Result<Option<String>, CommandResult> {
    match action {
        KnowledgeAction::List => Ok(None),
        KnowledgeAction::AddLink { title, uri } => knowledge
            .add_web_resource(title, uri)
            .map(|resource| Some(format!("added web resource {} ({})", resource.id, resource.title)))
            .ok_or_else(|| invalid("link title and uri must not be blank")),
        KnowledgeAction::RemoveLink { id } => {
            if knowledge.remove_web_resource(&id) {
                Ok(Some(format!("removed web resource {id}")))
            } else {
                Err(invalid(format!("no web resource with id `{id}`")))
            }
        }
        KnowledgeAction::AddSource { path } => {
            let (name, size, data) = read_pdf(&path)?;
            let source = knowledge.add_source(name, PDF_MIME_TYPE, size, data);
            Ok(Some(format!("added document {} ({})", source.id, source.name)))
        }
        KnowledgeAction::RemoveSource { id } => {
            if knowledge.remove_source(&id) {
                Ok(Some(format!("removed document {id}")))
            } else {
                Err(invalid(format!("no document with id `{id}`")))
            }
        }
    }
}

/// Reads a PDF as a data URL, the form the web client uploads.
fn read_pdf(path: &Path) -> Result<(String, u64, String), CommandResult> {
    let is_pdf = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(invalid("only PDF documents can be uploaded"));
    }

    let bytes = fs::read(path)
        .map_err(|error| invalid(format!("could not read `{}`: {error}", path.display())))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let data = format!("data:{PDF_MIME_TYPE};base64,{}", BASE64_STANDARD.encode(&bytes));
    Ok((name, bytes.len() as u64, data))
}

fn summary(knowledge: &KnowledgeContext) -> Value {
    let sources: Vec<Value> = knowledge
        .sources
        .iter()
        .map(|source| {
            json!({
                "id": source.id,
                "name": source.name,
                "size": source.size,
                "mimeType": source.mime_type,
            })
        })
        .collect();
    json!({ "sources": sources, "webResources": knowledge.web_resources })
}

fn invalid(message: impl Into<String>) -> CommandResult {
    CommandResult::failure("knowledge", "invalid_input", message, exit::INVALID_INPUT)
}
