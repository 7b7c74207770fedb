//! Terminal rendering of the conversation
//!
//! Turns snapshots into text lines. Nothing here writes to stdout, so the
//! binary decides where the lines go and tests can inspect them.

use super::Notification;
use crate::conversation::{ConversationSnapshot, ConversationState};
use crate::messages::{Author, Message};
use std::collections::HashSet;
use uuid::Uuid;

const BAR_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const METER_BARS: usize = 4;

/// Tracks which messages were already printed
#[derive(Debug, Default)]
pub struct TerminalView {
    seen: HashSet<Uuid>,
    last_state: ConversationState,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines for messages not rendered yet. Placeholders are skipped and
    /// picked up by the typing indicator instead.
    pub fn new_message_lines(&mut self, snapshot: &ConversationSnapshot) -> Vec<String> {
        snapshot
            .messages
            .iter()
            .filter(|m| !m.is_placeholder)
            .filter(|m| self.seen.insert(m.id))
            .map(format_message)
            .collect()
    }

    /// Status line for a state change, or `None` when the state is unchanged
    pub fn state_line(&mut self, state: ConversationState) -> Option<String> {
        if state == self.last_state {
            return None;
        }
        self.last_state = state;
        match state {
            ConversationState::AwaitingReply => Some("  ...".to_string()),
            ConversationState::OnHold | ConversationState::Transferring => {
                indicator_label(state).map(|label| format!("  ~ {}", label))
            }
            ConversationState::Idle => None,
        }
    }

    /// Hold/transfer indicator with a live meter, `None` outside those states
    pub fn indicator(&self, spectrum: &[u8]) -> Option<String> {
        indicator_label(self.last_state)
            .map(|label| format!("  {} {}", spectrum_bar(spectrum), label))
    }

    pub fn forget(&mut self) {
        self.seen.clear();
        self.last_state = ConversationState::Idle;
    }
}

fn indicator_label(state: ConversationState) -> Option<&'static str> {
    match state {
        ConversationState::OnHold => Some("In attesa..."),
        ConversationState::Transferring => Some("Trasferimento in corso..."),
        _ => None,
    }
}

fn format_message(message: &Message) -> String {
    match message.author {
        Author::User => format!("> {}", message.text),
        Author::Agent if message.funny_personality => format!("Agente (:D): {}", message.text),
        Author::Agent => format!("Agente: {}", message.text),
    }
}

/// Modal rendered as a boxed block of lines
pub fn render_notification(notification: &Notification) -> Vec<String> {
    let mut lines = vec![
        format!("[!] {}", notification.title),
        format!("    {}", notification.subtitle),
    ];
    if let Some(detail) = &notification.detail {
        lines.push(format!("    Dettaglio: {}", detail));
    }
    lines
}

/// Fold the analyser bins into a small bar meter
pub fn spectrum_bar(spectrum: &[u8]) -> String {
    if spectrum.is_empty() {
        return BAR_GLYPHS[0].to_string().repeat(METER_BARS);
    }

    let band = spectrum.len().div_ceil(METER_BARS);
    spectrum
        .chunks(band)
        .map(|chunk| {
            let mean = chunk.iter().map(|&v| v as usize).sum::<usize>() / chunk.len();
            BAR_GLYPHS[(mean * BAR_GLYPHS.len() / 256).min(BAR_GLYPHS.len() - 1)]
        })
        .chain(std::iter::repeat(BAR_GLYPHS[0]))
        .take(METER_BARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationController;

    #[test]
    fn test_messages_printed_once() {
        let controller = ConversationController::new();
        let mut view = TerminalView::new();

        controller.send_user_message("ciao").unwrap();
        let lines = view.new_message_lines(&controller.snapshot());
        assert_eq!(lines, vec!["> ciao".to_string()]);

        controller.append_agent_message("Buongiorno", true);
        let lines = view.new_message_lines(&controller.snapshot());
        assert_eq!(lines, vec!["Agente: Buongiorno".to_string()]);

        assert!(view.new_message_lines(&controller.snapshot()).is_empty());
    }

    #[test]
    fn test_state_lines() {
        let mut view = TerminalView::new();
        assert!(view.state_line(ConversationState::Idle).is_none());
        assert_eq!(
            view.state_line(ConversationState::OnHold).as_deref(),
            Some("  ~ In attesa...")
        );
        assert!(view.state_line(ConversationState::OnHold).is_none());
        assert!(view.indicator(&[0; 128]).unwrap().ends_with("In attesa..."));

        view.state_line(ConversationState::Transferring);
        assert!(view
            .indicator(&[])
            .unwrap()
            .ends_with("Trasferimento in corso..."));

        view.state_line(ConversationState::Idle);
        assert!(view.indicator(&[255; 128]).is_none());
    }

    #[test]
    fn test_notification_lines() {
        let lines = render_notification(&Notification::rate_limited());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[!] Attenzione!");

        let failed = Notification::session_failed(&crate::api::TransportError::server(503));
        let lines = render_notification(&failed);
        assert_eq!(lines[2], "    Dettaglio: Errore del server (503)");
    }

    #[test]
    fn test_spectrum_bar() {
        assert_eq!(spectrum_bar(&[]), "▁▁▁▁");
        assert_eq!(spectrum_bar(&[0; 128]).chars().count(), 4);

        let mut bins = vec![0u8; 128];
        bins[..32].fill(255);
        assert_eq!(spectrum_bar(&bins), "█▁▁▁");
    }
}
