//! Closed catalog of functions the model may call mid-turn.
//!
//! Every resolver is local and side-effect free: it fabricates a small
//! result payload and, for some tools, a [`ToolSignal`] the caller reacts to.
//! Resolution never fails the turn. Unknown names or malformed arguments come
//! back as an `{"error": ...}` payload so the model can still answer.

use std::str::FromStr;

use mobicare_core::{IncidentReport, PersonaId};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use crate::llm::FunctionCall;

pub const TICKET_PREFIX: &str = "SLT-REF-";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolName {
    SubmitIncidentReport,
    SwitchAgent,
    SuggestBillCalculator,
    CollectSalesLead,
    RequestServiceChange,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        Self::SubmitIncidentReport,
        Self::SwitchAgent,
        Self::SuggestBillCalculator,
        Self::CollectSalesLead,
        Self::RequestServiceChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitIncidentReport => "submitIncidentReport",
            Self::SwitchAgent => "switch_agent",
            Self::SuggestBillCalculator => "suggest_bill_calculator",
            Self::CollectSalesLead => "collect_sales_lead",
            Self::RequestServiceChange => "request_service_change",
        }
    }

    pub fn declaration(&self) -> Value {
        match self {
            Self::SubmitIncidentReport => json!({
                "name": self.as_str(),
                "description": "Submits a technical incident report and sends an email summary to the user.",
                "parameters": {
                    "type": "OBJECT",
                    "properties": {
                        "report": {
                            "type": "OBJECT",
                            "properties": {
                                "customerName": { "type": "STRING" },
                                "email": { "type": "STRING" },
                                "serviceType": { "type": "STRING" },
                                "location": { "type": "STRING" },
                                "issueDescription": { "type": "STRING" }
                            },
                            "required": ["customerName", "email", "serviceType", "location", "issueDescription"]
                        }
                    },
                    "required": ["report"]
                }
            }),
            Self::SwitchAgent => json!({
                "name": self.as_str(),
                "description": "Switches the conversation to a specialized agent based on the user's intent.",
                "parameters": {
                    "type": "OBJECT",
                    "properties": {
                        "targetAgent": {
                            "type": "STRING",
                            "enum": PersonaId::ALL.iter().map(PersonaId::as_str).collect::<Vec<_>>(),
                            "description": "The agent to switch to."
                        },
                        "reason": { "type": "STRING", "description": "The reason for switching." }
                    },
                    "required": ["targetAgent", "reason"]
                }
            }),
            Self::SuggestBillCalculator => json!({
                "name": self.as_str(),
                "description": "Suggests the user to use the Bill Calculator tool to estimate their monthly costs.",
                "parameters": {
                    "type": "OBJECT",
                    "properties": {
                        "reason": { "type": "STRING", "description": "Why the calculator is being suggested." }
                    },
                    "required": ["reason"]
                }
            }),
            Self::CollectSalesLead => json!({
                "name": self.as_str(),
                "description": "Collects contact information for a potential new SLTMobitel customer.",
                "parameters": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "phone": { "type": "STRING" },
                        "interestedService": { "type": "STRING", "description": "Fiber, Mobile, etc." },
                        "location": { "type": "STRING" }
                    },
                    "required": ["name", "phone", "interestedService"]
                }
            }),
            Self::RequestServiceChange => json!({
                "name": self.as_str(),
                "description": "Initiates a request to change or upgrade an existing SLTMobitel service.",
                "parameters": {
                    "type": "OBJECT",
                    "properties": {
                        "accountNumber": { "type": "STRING" },
                        "requestedChange": { "type": "STRING", "description": "e.g. Upgrade to Fiber Unlimited 100" },
                        "contactPhone": { "type": "STRING" }
                    },
                    "required": ["accountNumber", "requestedChange", "contactPhone"]
                }
            }),
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == value)
            .ok_or_else(|| ToolError::UnknownTool(value.to_string()))
    }
}

/// Side-channel effect a resolved call asks the caller to apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolSignal {
    PersonaSwitch { target: PersonaId, reason: String },
    OpenBillCalculator,
    TicketIssued { ticket_id: String, email: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolResolution {
    pub name: String,
    pub payload: Value,
    pub signal: Option<ToolSignal>,
}

impl ToolResolution {
    pub fn is_error(&self) -> bool {
        self.payload.get("error").is_some()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {reason}")]
    InvalidArguments { tool: ToolName, reason: String },
    #[error("unknown target agent `{0}`")]
    UnknownPersona(String),
}

#[derive(Clone, Debug, Default)]
pub struct ToolRegistry;

impl ToolRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn declarations(&self) -> Vec<Value> {
        ToolName::ALL.iter().map(ToolName::declaration).collect()
    }

    pub fn resolve(&self, call: &FunctionCall) -> ToolResolution {
        match self.try_resolve(call) {
            Ok((payload, signal)) => ToolResolution { name: call.name.clone(), payload, signal },
            Err(error) => {
                warn!(
                    event_name = "agent.tool.rejected",
                    tool = %call.name,
                    error = %error,
                    "tool call rejected"
                );
                ToolResolution {
                    name: call.name.clone(),
                    payload: json!({ "error": error.to_string() }),
                    signal: None,
                }
            }
        }
    }

    fn try_resolve(&self, call: &FunctionCall) -> Result<(Value, Option<ToolSignal>), ToolError> {
        let tool = call.name.parse::<ToolName>()?;
        match tool {
            ToolName::SubmitIncidentReport => {
                let args: IncidentArgs = parse_args(tool, &call.args)?;
                let report = IncidentReport::from(args.report);
                let ticket_id = format!("{TICKET_PREFIX}{}", rand::thread_rng().gen_range(100_000..1_000_000));
                let payload = json!({
                    "success": true,
                    "ticketId": ticket_id,
                    "emailConfirmed": true,
                    "summarySentTo": report.email,
                    "message": format!(
                        "A summary has been sent to {}. Our team will contact you shortly.",
                        report.email
                    ),
                });
                Ok((payload, Some(ToolSignal::TicketIssued { ticket_id, email: report.email })))
            }
            ToolName::SwitchAgent => {
                let args: SwitchAgentArgs = parse_args(tool, &call.args)?;
                let target = PersonaId::from_str(&args.target_agent)
                    .map_err(|_| ToolError::UnknownPersona(args.target_agent.clone()))?;
                let payload = json!({
                    "success": true,
                    "targetAgent": target.as_str(),
                    "reason": args.reason,
                });
                Ok((payload, Some(ToolSignal::PersonaSwitch { target, reason: args.reason })))
            }
            ToolName::SuggestBillCalculator => {
                let args: ReasonArgs = parse_args(tool, &call.args)?;
                let payload = json!({
                    "action": "trigger_ui",
                    "component": "BillCalculator",
                    "message": format!(
                        "I've suggested the Bill Calculator because: {}. You can find the button in the header.",
                        args.reason
                    ),
                });
                Ok((payload, Some(ToolSignal::OpenBillCalculator)))
            }
            ToolName::CollectSalesLead => {
                let _args: SalesLeadArgs = parse_args(tool, &call.args)?;
                let payload = json!({
                    "success": true,
                    "message": "Your interest has been recorded. A sales representative will contact you within 24 hours.",
                    "leadId": format!("LEAD-{}", rand::thread_rng().gen_range(1_000..10_000)),
                });
                Ok((payload, None))
            }
            ToolName::RequestServiceChange => {
                let _args: ServiceChangeArgs = parse_args(tool, &call.args)?;
                let payload = json!({
                    "success": true,
                    "message": "Service change request submitted. You will receive an SMS confirmation once processed.",
                    "requestId": format!("REQ-{}", rand::thread_rng().gen_range(1_000..10_000)),
                });
                Ok((payload, None))
            }
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: ToolName, args: &Value) -> Result<T, ToolError> {
    T::deserialize(args)
        .map_err(|err| ToolError::InvalidArguments { tool, reason: err.to_string() })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchAgentArgs {
    target_agent: String,
    reason: String,
}

#[derive(Deserialize)]
struct ReasonArgs {
    reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct SalesLeadArgs {
    name: String,
    phone: String,
    interested_service: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct ServiceChangeArgs {
    account_number: String,
    requested_change: String,
    contact_phone: String,
}

#[derive(Deserialize)]
struct IncidentArgs {
    report: IncidentReportArgs,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncidentReportArgs {
    customer_name: String,
    email: String,
    service_type: String,
    location: String,
    issue_description: String,
}

impl From<IncidentReportArgs> for IncidentReport {
    fn from(args: IncidentReportArgs) -> Self {
        Self {
            customer_name: args.customer_name,
            email: args.email,
            service_type: args.service_type,
            issue_description: args.issue_description,
            location: args.location,
        }
    }
}

pub fn is_ticket_id(value: &str) -> bool {
    value
        .strip_prefix(TICKET_PREFIX)
        .is_some_and(|digits| digits.len() == 6 && digits.chars().all(|ch| ch.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use mobicare_core::PersonaId;
    use serde_json::json;

    use super::{is_ticket_id, ToolName, ToolRegistry, ToolSignal};
    use crate::llm::FunctionCall;

    fn alice_report() -> serde_json::Value {
        json!({
            "report": {
                "customerName": "Alice",
                "email": "alice@x.com",
                "serviceType": "Fiber",
                "location": "Colombo",
                "issueDescription": "No signal"
            }
        })
    }

    #[test]
    fn catalog_declares_every_tool_once() {
        let declarations = ToolRegistry::new().declarations();
        let names: Vec<_> = declarations.iter().filter_map(|d| d["name"].as_str()).collect();
        assert_eq!(
            names,
            vec![
                "submitIncidentReport",
                "switch_agent",
                "suggest_bill_calculator",
                "collect_sales_lead",
                "request_service_change"
            ]
        );
        assert_eq!(
            declarations[1]["parameters"]["properties"]["targetAgent"]["enum"],
            json!(["main", "sales", "existing", "support"])
        );
    }

    #[test]
    fn incident_report_issues_ticket_for_reporter() {
        let resolution = ToolRegistry::new()
            .resolve(&FunctionCall::new("submitIncidentReport", alice_report()));

        let ticket_id = resolution.payload["ticketId"].as_str().expect("ticket id").to_string();
        assert!(is_ticket_id(&ticket_id), "unexpected ticket format {ticket_id}");
        assert_eq!(resolution.payload["summarySentTo"], "alice@x.com");
        assert_eq!(resolution.payload["emailConfirmed"], true);
        assert_eq!(
            resolution.signal,
            Some(ToolSignal::TicketIssued { ticket_id, email: "alice@x.com".to_string() })
        );
    }

    #[test]
    fn switch_agent_accepts_known_personas_only() {
        let registry = ToolRegistry::new();
        let accepted = registry.resolve(&FunctionCall::new(
            "switch_agent",
            json!({ "targetAgent": "support", "reason": "router is blinking red" }),
        ));
        assert_eq!(
            accepted.signal,
            Some(ToolSignal::PersonaSwitch {
                target: PersonaId::Support,
                reason: "router is blinking red".to_string()
            })
        );

        let rejected = registry.resolve(&FunctionCall::new(
            "switch_agent",
            json!({ "targetAgent": "billing", "reason": "invoice" }),
        ));
        assert!(rejected.is_error());
        assert!(rejected.signal.is_none());
    }

    #[test]
    fn bill_calculator_triggers_ui_signal() {
        let resolution = ToolRegistry::new().resolve(&FunctionCall::new(
            "suggest_bill_calculator",
            json!({ "reason": "comparing fiber plans" }),
        ));
        assert_eq!(resolution.signal, Some(ToolSignal::OpenBillCalculator));
        assert_eq!(resolution.payload["component"], "BillCalculator");
        assert!(resolution.payload["message"]
            .as_str()
            .is_some_and(|message| message.contains("comparing fiber plans")));
    }

    #[test]
    fn sales_lead_tolerates_missing_optional_location() {
        let resolution = ToolRegistry::new().resolve(&FunctionCall::new(
            "collect_sales_lead",
            json!({ "name": "Nimal", "phone": "0771234567", "interestedService": "Fiber" }),
        ));
        assert_eq!(resolution.payload["success"], true);
        let lead_id = resolution.payload["leadId"].as_str().expect("lead id");
        assert!(lead_id.starts_with("LEAD-") && lead_id.len() == 9);
        assert!(resolution.signal.is_none());
    }

    #[test]
    fn service_change_returns_request_id() {
        let resolution = ToolRegistry::new().resolve(&FunctionCall::new(
            "request_service_change",
            json!({
                "accountNumber": "0112345678",
                "requestedChange": "Upgrade to Fiber Unlimited 100",
                "contactPhone": "0771234567"
            }),
        ));
        let request_id = resolution.payload["requestId"].as_str().expect("request id");
        assert!(request_id.starts_with("REQ-"));
    }

    #[test]
    fn missing_required_fields_become_error_payloads() {
        let resolution = ToolRegistry::new().resolve(&FunctionCall::new(
            "submitIncidentReport",
            json!({ "report": { "customerName": "Alice" } }),
        ));
        assert!(resolution.is_error());
        assert!(resolution.signal.is_none());
    }

    #[test]
    fn unknown_tool_is_rejected_explicitly() {
        assert!("delete_account".parse::<ToolName>().is_err());
        let resolution =
            ToolRegistry::new().resolve(&FunctionCall::new("delete_account", json!({})));
        assert_eq!(resolution.payload, json!({ "error": "unknown tool `delete_account`" }));
    }

    #[test]
    fn ticket_format_check() {
        assert!(is_ticket_id("SLT-REF-123456"));
        assert!(!is_ticket_id("SLT-REF-12345"));
        assert!(!is_ticket_id("SLT-REF-12345a"));
        assert!(!is_ticket_id("REF-123456"));
    }
}
