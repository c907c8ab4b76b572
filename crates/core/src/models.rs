use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    General,
    Teach,
    Assess,
    Evaluate,
    OutOfScope,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Teach => "teach",
            Self::Assess => "assess",
            Self::Evaluate => "evaluate",
            Self::OutOfScope => "out_of_scope",
        }
    }

    pub fn is_out_of_scope(self) -> bool {
        self == Self::OutOfScope
    }
}

/// Mode reported back to the caller. Out-of-scope messages surface as `refuse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Refuse,
    General,
    Teach,
    Assess,
    Evaluate,
}

impl AgentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Refuse => "refuse",
            Self::General => "general",
            Self::Teach => "teach",
            Self::Assess => "assess",
            Self::Evaluate => "evaluate",
        }
    }
}

impl From<Intent> for AgentMode {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::General => Self::General,
            Intent::Teach => Self::Teach,
            Intent::Assess => Self::Assess,
            Intent::Evaluate => Self::Evaluate,
            Intent::OutOfScope => Self::Refuse,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub agent_mode: AgentMode,
    pub response: String,
}

impl ChatResponse {
    pub fn refusal() -> Self {
        Self {
            agent_mode: AgentMode::Refuse,
            response: crate::prompt::REFUSAL_MESSAGE.to_string(),
        }
    }
}
