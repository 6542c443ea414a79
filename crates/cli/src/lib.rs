pub mod commands;

use std::process::ExitCode;

use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use commands::chat::ChatOptions;
use commands::knowledge::KnowledgeAction;
use commands::CommandResult;
use mobicare_agent::QuickAction;
use mobicare_core::config::{AppConfig, LoadOptions};
use mobicare_core::{Feedback, IncidentReport, Language, PersonaId, SERVICE_TYPES};

#[derive(Debug, Parser)]
#[command(
    name = "mobicare",
    about = "MobiCare support assistant CLI",
    long_about = "Chat with the MobiCare assistant, file incident reports, and inspect runtime readiness.",
    after_help = "Examples:\n  mobicare doctor --json\n  mobicare chat --persona sales\n  mobicare chat --message \"Check my balance\"\n  mobicare report --name Alice --email alice@x.com --service Fiber --issue \"No signal\" --location Colombo\n  mobicare knowledge add-source ./fiber-plans.pdf"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Check api keys, static assets and the saved session log")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Chat with the assistant; reads stdin lines unless --message or a quick action is given")]
    Chat(ChatArgs),
    #[command(about = "File a service incident report and print the issued ticket")]
    Report(ReportArgs),
    #[command(about = "Rate a saved assistant message")]
    Feedback {
        #[arg(help = "Id of the rated message")]
        message_id: String,
        #[arg(help = "positive|negative")]
        rating: Feedback,
    },
    #[command(about = "Generate an executive report over the saved conversation")]
    Analyze,
    #[command(about = "Clear the saved conversation")]
    Reset,
    #[command(about = "Manage the knowledge base and web resources used for grounding")]
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long, short, help = "Send one message and exit")]
    message: Option<String>,
    #[arg(long, help = "Image as a data URL or base64 payload, sent with --message")]
    image: Option<String>,
    #[arg(long, help = "main|sales|existing|support")]
    persona: Option<PersonaId>,
    #[arg(long, help = "si|en")]
    language: Option<Language>,
    #[arg(long, value_name = "AREA", help = "Ask about network outages in AREA")]
    outage: Option<String>,
    #[arg(long, value_name = "PLAN", help = "Ask about a package")]
    package: Option<String>,
    #[arg(long, num_args = 2, value_names = ["SERVICE", "ACCOUNT"], help = "Check a balance")]
    balance: Option<Vec<String>>,
}

impl ChatArgs {
    fn quick_action(&self) -> Option<QuickAction> {
        if let Some(area) = &self.outage {
            return Some(QuickAction::Outage { area: area.clone() });
        }
        if let Some(name) = &self.package {
            return Some(QuickAction::Package { name: name.clone() });
        }
        match self.balance.as_deref() {
            Some([service_type, account_number]) => Some(QuickAction::Balance {
                service_type: service_type.clone(),
                account_number: account_number.clone(),
            }),
            _ => None,
        }
    }

    fn into_options(self) -> ChatOptions {
        let quick = self.quick_action();
        ChatOptions {
            message: self.message,
            image: self.image,
            persona: self.persona,
            language: self.language,
            quick,
        }
    }
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long, value_parser = PossibleValuesParser::new(SERVICE_TYPES))]
    service: String,
    #[arg(long)]
    issue: String,
    #[arg(long)]
    location: String,
}

impl From<ReportArgs> for IncidentReport {
    fn from(args: ReportArgs) -> Self {
        Self {
            customer_name: args.name,
            email: args.email,
            service_type: args.service,
            issue_description: args.issue,
            location: args.location,
        }
    }
}

fn init_logging() {
    use mobicare_core::config::LogFormat::*;
    use tracing::Level;

    let Ok(config) = AppConfig::load(LoadOptions::default()) else {
        return;
    };
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::WARN);
    let builder =
        tracing_subscriber::fmt().with_target(false).with_max_level(log_level).with_writer(std::io::stderr);

    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Config => CommandResult { exit_code: 0, output: commands::config::run() },
        Command::Doctor { json } => {
            let (exit_code, output) = commands::doctor::run(json);
            CommandResult { exit_code, output }
        }
        Command::Chat(args) => commands::chat::run(args.into_options()),
        Command::Report(args) => commands::report::run(args.into()),
        Command::Feedback { message_id, rating } => commands::feedback::run(&message_id, rating),
        Command::Analyze => commands::analyze::run(),
        Command::Reset => commands::reset::run(),
        Command::Knowledge { action } => commands::knowledge::run(action),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn report_service_is_limited_to_offered_services() {
        let args = ["mobicare", "report", "--name", "Alice", "--email", "alice@x.com"];
        let rest = ["--issue", "No signal", "--location", "Colombo"];

        let accepted = Cli::try_parse_from(args.iter().chain(&["--service", "Fiber"]).chain(&rest))
            .expect("Fiber is offered");
        assert!(matches!(accepted.command, Command::Report(ref report) if report.service == "Fiber"));

        let rejected = Cli::try_parse_from(args.iter().chain(&["--service", "Satellite"]).chain(&rest));
        assert!(rejected.is_err());
    }

    #[test]
    fn knowledge_subcommands_parse() {
        let cli = Cli::try_parse_from(["mobicare", "knowledge", "remove-link", "3"]).expect("parse");
        assert!(matches!(cli.command, Command::Knowledge { .. }));
    }
}
