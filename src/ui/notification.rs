//! Modal notifications raised at the UI boundary

use crate::api::TransportError;
use serde::{Deserialize, Serialize};

/// Kind of modal, so the front-end knows what acknowledging it means
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// The chat could not start; acknowledging leaves the chat
    SessionFailed,
    /// The backend refused the message (HTTP 429)
    RateLimited,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub subtitle: String,
    pub detail: Option<String>,
}

impl Notification {
    pub fn session_failed(error: &TransportError) -> Self {
        Self {
            kind: NotificationKind::SessionFailed,
            title: "Errore di Connessione".to_string(),
            subtitle: "Non è stato possibile creare la sessione di chat.".to_string(),
            detail: Some(error.session_detail()),
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            kind: NotificationKind::RateLimited,
            title: "Attenzione!".to_string(),
            subtitle: "Limite token raggiunto. Riprova più tardi.".to_string(),
            detail: None,
        }
    }

    /// Whether acknowledging this notification ends the chat
    pub fn leaves_chat(&self) -> bool {
        matches!(self.kind, NotificationKind::SessionFailed)
    }
}
