pub mod api;
pub mod audio;
pub mod conversation;
pub mod integration;
pub mod messages;
pub mod orchestrator;
pub mod session;
pub mod ui;

use api::TransportError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum HoldlineError {
    #[error("Session creation failed: {0}")]
    SessionCreation(TransportError),

    #[error("Agent returned an empty reply")]
    EmptyReply,

    #[error("Rate limit reached")]
    RateLimited,

    #[error("Send failed: {0}")]
    Send(TransportError),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<std::io::Error> for HoldlineError {
    fn from(e: std::io::Error) -> Self {
        HoldlineError::IOError(e.to_string())
    }
}

impl HoldlineError {
    /// Classify a failed send. A 429 is reported to the UI as a rate limit
    /// instead of an inline message.
    pub fn from_send_failure(error: TransportError) -> Self {
        if error.status() == Some(429) {
            HoldlineError::RateLimited
        } else {
            HoldlineError::Send(error)
        }
    }

    /// Check if the conversation can continue after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The chat cannot start without a session
            HoldlineError::SessionCreation(_) => false,
            // Server contract violations reset to idle
            HoldlineError::EmptyReply => true,
            HoldlineError::RateLimited => true,
            HoldlineError::Send(_) => true,
            // Losing the stored id only costs a new session
            HoldlineError::SessionStore(_) => true,
            // The chat keeps working without sound
            HoldlineError::AudioDeviceError(_) => true,
            HoldlineError::AudioProcessingError(_) => true,
            HoldlineError::IOError(_) => false,
            HoldlineError::ConfigError(_) => false,
            HoldlineError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            HoldlineError::SessionCreation(e) => e.session_detail(),
            HoldlineError::EmptyReply => {
                "Il server ha restituito una risposta vuota.".to_string()
            }
            HoldlineError::RateLimited => {
                "Limite token raggiunto. Riprova più tardi.".to_string()
            }
            HoldlineError::Send(e) => e.inline_detail(),
            HoldlineError::SessionStore(_) => {
                "Impossibile salvare la sessione locale.".to_string()
            }
            HoldlineError::AudioDeviceError(_) => {
                "Audio device error. Please check your speakers.".to_string()
            }
            HoldlineError::AudioProcessingError(_) => {
                "Audio processing failed. The chat continues without sound.".to_string()
            }
            HoldlineError::IOError(_) => "File system error occurred.".to_string(),
            HoldlineError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            HoldlineError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, HoldlineError>;
