//! Configuration for an [`Agent`](crate::Agent).

use chatwire_types::ResponseFormat;
use serde::{Deserialize, Serialize};

/// Built-in personas, each with its own system prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Answers whatever it is asked.
    #[default]
    GenericResponder,
    /// Condenses the given text.
    Summarizer,
    /// Breaks a goal into ordered steps.
    Planner,
    /// Answers with a single JSON object.
    JsonResponder,
}

impl AgentType {
    /// The built-in system prompt for this persona.
    #[must_use]
    pub fn system_prompt(self) -> &'static str {
        match self {
            AgentType::GenericResponder => {
                "You are a helpful assistant. Answer the user's request accurately and concisely."
            }
            AgentType::Summarizer => {
                "You are a summarizer. Condense the text the user gives you into a short summary \
                 that keeps every key fact. Do not add information that is not in the text."
            }
            AgentType::Planner => {
                "You are a planner. Break the user's goal into a numbered list of concrete, \
                 ordered steps. Keep each step to one sentence."
            }
            AgentType::JsonResponder => {
                "You are a helpful assistant that always answers with a single valid JSON object \
                 and nothing else."
            }
        }
    }
}

/// Static configuration for an agent.
///
/// Every [`Agent::ask`](crate::Agent::ask) call uses these settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Persona providing the default system prompt.
    pub agent_type: AgentType,

    /// Extra instructions appended to the system prompt.
    pub additional_instructions: String,

    /// Replaces the persona's system prompt entirely.
    pub custom_system_prompt: Option<String>,

    /// Requested reply format.
    pub format: ResponseFormat,

    /// Sampling temperature.
    pub temperature: f32,

    /// Whether replies are streamed as fragments.
    pub stream: bool,

    /// Extra backend request fields.
    pub extra: Option<serde_json::Value>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_type: AgentType::GenericResponder,
            additional_instructions: String::new(),
            custom_system_prompt: None,
            format: ResponseFormat::Text,
            temperature: 0.8,
            stream: false,
            extra: None,
        }
    }
}

impl AgentConfig {
    /// The system prompt text this configuration produces.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        let base = self
            .custom_system_prompt
            .as_deref()
            .unwrap_or_else(|| self.agent_type.system_prompt());
        let extra = self.additional_instructions.trim();
        if extra.is_empty() {
            base.to_string()
        } else {
            format!("{base}\n\n{extra}")
        }
    }
}
