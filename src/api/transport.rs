use super::types::AgentReply;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified transport failure
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    /// The server answered with a non-success status
    #[error("server error ({status})")]
    Server { status: u16, detail: Option<String> },

    /// The request left but no reply came back (timeout, connection reset)
    #[error("no response: {0}")]
    NoResponse(String),

    /// Anything else (bad payload, request build failure)
    #[error("{0}")]
    Unknown(String),
}

impl TransportError {
    pub fn server(status: u16) -> Self {
        TransportError::Server {
            status,
            detail: None,
        }
    }

    pub fn server_with_detail(status: u16, detail: impl Into<String>) -> Self {
        TransportError::Server {
            status,
            detail: Some(detail.into()),
        }
    }

    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text shown in the session-creation modal
    pub fn session_detail(&self) -> String {
        match self {
            TransportError::Server {
                detail: Some(detail),
                ..
            } => detail.clone(),
            TransportError::Server { status, .. } => format!("Errore del server ({})", status),
            TransportError::NoResponse(_) => {
                "Il server non risponde. Verifica la connessione.".to_string()
            }
            TransportError::Unknown(message) if !message.is_empty() => message.clone(),
            TransportError::Unknown(_) => "Errore sconosciuto".to_string(),
        }
    }

    /// Text of the inline agent message for a failed send
    pub fn inline_detail(&self) -> String {
        // Same fallbacks as the modal; the server detail wins when present
        self.session_detail()
    }
}

/// Seam between the conversation core and the agent backend
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Create a new chat session and return its id
    async fn start_session(&self) -> Result<String, TransportError>;

    /// Send one user message and wait for the agent's reply
    async fn send_message(
        &self,
        session_id: Option<&str>,
        message: &str,
    ) -> Result<AgentReply, TransportError>;

    /// Close a chat session on the server
    async fn close_session(&self, session_id: &str) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_detail_fallbacks() {
        assert_eq!(
            TransportError::server(503).session_detail(),
            "Errore del server (503)"
        );
        assert_eq!(
            TransportError::server_with_detail(500, "Errore nella chat").session_detail(),
            "Errore nella chat"
        );
        assert_eq!(
            TransportError::NoResponse("timeout".into()).session_detail(),
            "Il server non risponde. Verifica la connessione."
        );
        assert_eq!(
            TransportError::Unknown(String::new()).session_detail(),
            "Errore sconosciuto"
        );
        assert_eq!(
            TransportError::Unknown("Session ID non ricevuto".into()).session_detail(),
            "Session ID non ricevuto"
        );
    }

    #[test]
    fn test_status() {
        assert_eq!(TransportError::server(429).status(), Some(429));
        assert_eq!(TransportError::NoResponse("x".into()).status(), None);
    }
}
