use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

/// Response of `GET /api/start_chat`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StartSessionResponse {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// One agent reply.
///
/// `waiting` and `transfer` are mutually exclusive in practice; both false
/// is a normal reply.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AgentReply {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub waiting: bool,
    #[serde(default)]
    pub transfer: bool,
    #[serde(default)]
    pub funny_personality: Option<bool>,
}

fn default_role() -> String {
    "assistant".to_string()
}

impl AgentReply {
    /// A plain reply with no hold or transfer
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: default_role(),
            ..Default::default()
        }
    }

    /// A reply that puts the user on hold
    pub fn hold(content: impl Into<String>) -> Self {
        Self {
            waiting: true,
            ..Self::text(content)
        }
    }

    /// A reply that hands the user to an operator
    pub fn transfer(content: impl Into<String>) -> Self {
        Self {
            transfer: true,
            ..Self::text(content)
        }
    }

    pub fn with_personality(mut self, funny: bool) -> Self {
        self.funny_personality = Some(funny);
        self
    }

    /// Empty content with no flag set violates the server contract
    pub fn is_empty_violation(&self) -> bool {
        self.content.is_empty() && !self.waiting && !self.transfer
    }

    /// Content as displayed, with the model's `"\n*"` artifacts removed
    pub fn display_content(&self) -> String {
        self.content.replace("\n*", "")
    }
}

/// FastAPI style error body
#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Text for the session modal: `message` first, then `detail`
    pub fn session_text(&self) -> Option<String> {
        self.message.clone().or_else(|| self.detail_text())
    }

    /// Text for an inline send error: `detail` first, then `message`
    pub fn reply_text(&self) -> Option<String> {
        self.detail_text().or_else(|| self.message.clone())
    }

    fn detail_text(&self) -> Option<String> {
        match &self.detail {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}
