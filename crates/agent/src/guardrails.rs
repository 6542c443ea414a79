use std::time::Duration;

use mobicare_core::config::LlmConfig;

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(60);

/// Bounds on a single orchestrated turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub max_tool_rounds: u32,
    pub round_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Continue,
    Halt { rounds: u32 },
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS, round_timeout: DEFAULT_ROUND_TIMEOUT }
    }
}

impl GuardrailPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_tool_rounds: config.max_tool_rounds,
            round_timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_round_timeout(mut self, round_timeout: Duration) -> Self {
        self.round_timeout = round_timeout;
        self
    }

    /// Decides whether another tool round may run after `completed` rounds.
    pub fn evaluate_round(&self, completed: u32) -> GuardrailDecision {
        if completed < self.max_tool_rounds {
            GuardrailDecision::Continue
        } else {
            GuardrailDecision::Halt { rounds: completed }
        }
    }
}
