use mobicare_agent::TurnReply;
use mobicare_core::IncidentReport;
use serde_json::json;

use crate::commands::{
    async_runtime, exit, flush_archive, llm_client, load_config, new_session, support_desk,
    CommandResult,
};

pub fn run(report: IncidentReport) -> CommandResult {
    let missing = report.missing_fields();
    if !missing.is_empty() {
        return CommandResult::failure(
            "report",
            "invalid_input",
            format!("missing required fields: {}", missing.join(", ")),
            exit::INVALID_INPUT,
        );
    }

    let config = match load_config("report") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let llm = match llm_client("report", &config) {
        Ok(llm) => llm,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("report") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let desk = support_desk(&config, llm);
    let mut session = desk.open_session(new_session(&config));

    runtime.block_on(async {
        let filed = desk.file_incident_report(&mut session, report).await;
        flush_archive(&desk).await;
        let filing = match filed {
            Ok(filing) => filing,
            Err(error) => {
                return CommandResult::failure(
                    "report",
                    "invalid_input",
                    error.to_string(),
                    exit::INVALID_INPUT,
                )
            }
        };

        match (filing.receipt, filing.reply) {
            (Some(receipt), _) => CommandResult::success_with_details(
                "report",
                format!("ticket {} issued; confirmation goes to {}", receipt.ticket_id, receipt.email),
                json!({ "ticketId": receipt.ticket_id, "email": receipt.email }),
            ),
            (None, TurnReply::Answered { message, .. }) => CommandResult::failure(
                "report",
                "no_ticket",
                format!("the assistant answered without filing a ticket: {}", message.text),
                exit::TURN_FAILED,
            ),
            (None, TurnReply::Failed { error, message }) => {
                CommandResult::failure("report", error.error_code(), message.text, exit::TURN_FAILED)
            }
            (None, TurnReply::Cancelled) => CommandResult::failure(
                "report",
                "cancelled",
                "report submission was cancelled",
                exit::TURN_FAILED,
            ),
        }
    })
}
