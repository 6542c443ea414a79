//! System instruction composition and the fixed prompt texts.

use mobicare_core::{Language, Message, PersonaId};

use crate::llm::Content;
use crate::personas::persona;

const GLOBAL_INSTRUCTION: &str = "
# PERSONA: MobiCare AI
You are an advanced agentic support assistant exclusively for SLTMOBITEL Sri Lanka.

# PRIMARY OBJECTIVE: VERIFIABLE ACCURACY & SUPPORT
Provide helpful, accurate support. **Whenever you make a factual claim or provide news, you MUST provide references or cite your sources.**

# GROUNDING & CITATION RULES
1. **Search Grounding**: Use Google Search for SLTMobitel news, financial performance, outages, or tech trends.
2. **References**: Always point the user to official sources if available.
3. **Internal Data**: Use the provided knowledge base context for technical specifications.

# STRICT DOMAIN LIMITATION
- **ONLY ANSWER SLTMOBITEL RELATED QUESTIONS**. If a question is unrelated, politely refuse.

# VISUAL CAPABILITIES
- **Visual Diagnostics**: Analyze user-provided photos (bills, router lights) to troubleshoot.
- **Visual Aid**: If the user asks for a visual, describe it clearly or generate a response that helps them visualize the solution.
";

pub const BOOT_USER_TEXT: &str =
    "System Boot: Act as MobiCare AI. Ground all factual answers in search results and provide references.";
pub const BOOT_MODEL_TEXT: &str =
    "MobiCare AI online. I will provide referenced support for all SLTMobitel queries.";

pub const EMPTY_REPLY_FALLBACK: &str = "I've analyzed your request.";
pub const ANALYSIS_FALLBACK: &str = "Analysis unavailable.";

pub fn system_instruction(persona_id: PersonaId, language: Language) -> String {
    let language_name = language.display_name();
    format!(
        "{GLOBAL_INSTRUCTION}
# AGENT CONTEXT
{instruction}

# LANGUAGE REQUIREMENT
- **SPEAK AND RESPOND ONLY IN {upper}**.
- If the user speaks a different language, politely ask them to switch or continue in {language_name}.
",
        instruction = persona(persona_id).instruction,
        upper = language_name.to_uppercase(),
    )
}

/// Opening exchange sent in place of history for a brand new conversation.
pub fn bootstrap_exchange() -> Vec<Content> {
    vec![Content::user_text(BOOT_USER_TEXT), Content::model_text(BOOT_MODEL_TEXT)]
}

pub fn switch_announcement(target: PersonaId, reason: &str) -> String {
    format!("*System: Switching to {target} agent. Reason: {reason}*")
}

pub fn analysis_prompt(messages: &[Message]) -> String {
    let transcript = messages
        .iter()
        .map(|message| format!("{}: {}", message.role.as_str().to_uppercase(), message.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are the Lead Support Analyst for SLTMobitel.
    Analyze the following conversation transcript from the MobiCare AI Support portal.
    Provide a professional, structured executive report including:
    1. **Summary of Interaction**: What was the primary goal?
    2. **Sentiment Analysis**: Evaluate the user's emotional state and satisfaction.
    3. **Technical Diagnostics**: What issues were identified? (Fiber, Mobile, Billing, etc.)
    4. **Resolution Status**: Was the issue resolved or escalated (Ticket ID generated)?
    5. **Executive Recommendations**: Suggest 3 specific actions for the SLT management team to improve service based on this interaction.

    TRANSCRIPT:
    {transcript}"
    )
}
