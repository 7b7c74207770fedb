//! Reply timelines
//!
//! A timeline is the finite list of conversation mutations one server reply
//! (or one failure) produces, each tagged with its offset from the moment
//! the reply arrived. Planning is pure; running a timeline is the
//! scheduler's job.

use crate::api::AgentReply;
use crate::conversation::{ConversationState, Effect};
use crate::ui::Notification;
use crate::{HoldlineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const HOLD_MESSAGE: &str = "Ti metto in attesa...";
pub const TRANSFER_MESSAGE: &str = "Ti sto trasferendo ad un operatore, attendi...";
pub const HOLD_RESUME_MESSAGE: &str = "Eccomi, dove eravamo rimasti?";
pub const OPERATOR_CONNECTED_MESSAGE: &str = "Operatore connesso. Come posso aiutarti?";

/// Delays of the simulated call-center experience
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// From reply arrival to the first agent message
    pub reply_delay_ms: u64,
    /// Time spent on hold, counted from the first-stage message
    pub hold_duration_ms: u64,
    /// Time spent being transferred, counted from the first-stage message
    pub transfer_duration_ms: u64,
    /// From a failed send to the inline error message
    pub error_delay_ms: u64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            reply_delay_ms: 600,
            hold_duration_ms: 10_000,
            transfer_duration_ms: 25_000,
            error_delay_ms: 1_000,
        }
    }
}

impl TimelineConfig {
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    pub fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.hold_duration_ms)
    }

    pub fn transfer_duration(&self) -> Duration {
        Duration::from_millis(self.transfer_duration_ms)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }

    pub fn with_hold_duration(mut self, duration: Duration) -> Self {
        self.hold_duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_transfer_duration(mut self, duration: Duration) -> Self {
        self.transfer_duration_ms = duration.as_millis() as u64;
        self
    }
}

/// Effects applied together at one offset
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub at: Duration,
    pub effects: Vec<Effect>,
}

impl Step {
    pub fn new(at: Duration, effects: Vec<Effect>) -> Self {
        Self { at, effects }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    steps: Vec<Step>,
}

impl Timeline {
    pub fn new(mut steps: Vec<Step>) -> Self {
        steps.sort_by_key(|s| s.at);
        Self { steps }
    }

    /// Plan the mutations for one reply.
    ///
    /// Fails with `EmptyReply` when the reply has no content and no flag.
    pub fn for_reply(reply: &AgentReply, config: &TimelineConfig) -> Result<Self> {
        if reply.is_empty_violation() {
            return Err(HoldlineError::EmptyReply);
        }

        let mut steps = Vec::with_capacity(3);
        if let Some(funny) = reply.funny_personality {
            steps.push(Step::new(Duration::ZERO, vec![Effect::SetPersonality(funny)]));
        }

        let first = config.reply_delay();
        // The backend never sets both flags; hold wins if it ever does
        if reply.waiting {
            steps.push(Step::new(
                first,
                vec![
                    Effect::replace_placeholder(HOLD_MESSAGE),
                    Effect::SetState(ConversationState::OnHold),
                ],
            ));
            steps.push(Step::new(
                first + config.hold_duration(),
                vec![
                    Effect::append_agent(HOLD_RESUME_MESSAGE),
                    Effect::SetState(ConversationState::Idle),
                ],
            ));
        } else if reply.transfer {
            steps.push(Step::new(
                first,
                vec![
                    Effect::replace_placeholder(TRANSFER_MESSAGE),
                    Effect::SetState(ConversationState::Transferring),
                ],
            ));
            steps.push(Step::new(
                first + config.transfer_duration(),
                vec![
                    Effect::append_agent(OPERATOR_CONNECTED_MESSAGE),
                    Effect::SetState(ConversationState::Idle),
                ],
            ));
        } else {
            steps.push(Step::new(
                first,
                vec![
                    Effect::replace_placeholder(reply.display_content()),
                    Effect::SetState(ConversationState::Idle),
                ],
            ));
        }

        Ok(Self::new(steps))
    }

    /// Plan the recovery from a failed send cycle
    pub fn for_failure(error: &HoldlineError, config: &TimelineConfig) -> Self {
        match error {
            HoldlineError::RateLimited => Self::new(vec![Step::new(
                Duration::ZERO,
                vec![
                    Effect::RemovePlaceholders,
                    Effect::SetState(ConversationState::Idle),
                    Effect::Notify(Notification::rate_limited()),
                ],
            )]),
            HoldlineError::EmptyReply => Self::reset(),
            HoldlineError::Send(transport) => {
                Self::inline_error(transport.inline_detail(), config.error_delay())
            }
            other => Self::inline_error(other.user_message(), config.error_delay()),
        }
    }

    /// Drop the placeholder and go back to `Idle`, with no agent message
    pub fn reset() -> Self {
        Self::new(vec![Step::new(
            Duration::ZERO,
            vec![
                Effect::RemovePlaceholders,
                Effect::SetState(ConversationState::Idle),
            ],
        )])
    }

    fn inline_error(text: String, delay: Duration) -> Self {
        Self::new(vec![Step::new(
            delay,
            vec![
                Effect::replace_placeholder(text),
                Effect::SetState(ConversationState::Idle),
            ],
        )])
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Offset of the last step
    pub fn duration(&self) -> Duration {
        self.steps.last().map(|s| s.at).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TransportError;

    fn config() -> TimelineConfig {
        TimelineConfig::default()
    }

    #[test]
    fn test_normal_reply() {
        let timeline = Timeline::for_reply(&AgentReply::text("Sì\n*, certo"), &config()).unwrap();
        assert_eq!(timeline.len(), 1);

        let step = &timeline.steps()[0];
        assert_eq!(step.at, Duration::from_millis(600));
        assert_eq!(
            step.effects,
            vec![
                Effect::replace_placeholder("Sì, certo"),
                Effect::SetState(ConversationState::Idle),
            ]
        );
    }

    #[test]
    fn test_hold_reply() {
        let timeline = Timeline::for_reply(&AgentReply::hold("attenda"), &config()).unwrap();
        let steps = timeline.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].at, Duration::from_millis(600));
        assert!(steps[0]
            .effects
            .contains(&Effect::SetState(ConversationState::OnHold)));
        assert!(steps[0]
            .effects
            .contains(&Effect::replace_placeholder(HOLD_MESSAGE)));
        assert_eq!(steps[1].at, Duration::from_millis(10_600));
        assert!(steps[1]
            .effects
            .contains(&Effect::append_agent(HOLD_RESUME_MESSAGE)));
        assert_eq!(timeline.duration(), Duration::from_millis(10_600));
    }

    #[test]
    fn test_transfer_reply() {
        let timeline = Timeline::for_reply(&AgentReply::transfer(""), &config()).unwrap();
        let steps = timeline.steps();
        assert_eq!(steps.len(), 2);
        assert!(steps[0]
            .effects
            .contains(&Effect::SetState(ConversationState::Transferring)));
        assert_eq!(steps[1].at, Duration::from_millis(25_600));
        assert!(steps[1]
            .effects
            .contains(&Effect::append_agent(OPERATOR_CONNECTED_MESSAGE)));
    }

    #[test]
    fn test_personality_applied_on_arrival() {
        let reply = AgentReply::text("ok").with_personality(true);
        let timeline = Timeline::for_reply(&reply, &config()).unwrap();
        assert_eq!(timeline.steps()[0].at, Duration::ZERO);
        assert_eq!(
            timeline.steps()[0].effects,
            vec![Effect::SetPersonality(true)]
        );
    }

    #[test]
    fn test_empty_reply_is_error() {
        let result = Timeline::for_reply(&AgentReply::text(""), &config());
        assert!(matches!(result, Err(HoldlineError::EmptyReply)));

        let recovery = Timeline::for_failure(&HoldlineError::EmptyReply, &config());
        assert_eq!(recovery.len(), 1);
        assert!(!recovery.steps()[0]
            .effects
            .iter()
            .any(|e| matches!(e, Effect::AppendAgent { .. })));
    }

    #[test]
    fn test_rate_limit_has_no_inline_message() {
        let timeline = Timeline::for_failure(&HoldlineError::RateLimited, &config());
        let effects = &timeline.steps()[0].effects;
        assert_eq!(timeline.steps()[0].at, Duration::ZERO);
        assert!(effects.contains(&Effect::RemovePlaceholders));
        assert!(effects.contains(&Effect::Notify(Notification::rate_limited())));
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::AppendAgent { .. })));
    }

    #[test]
    fn test_generic_failure_inline_message() {
        let error = HoldlineError::Send(TransportError::server_with_detail(
            500,
            "Errore temporaneo del server. Riprova tra poco.",
        ));
        let timeline = Timeline::for_failure(&error, &config());
        let step = &timeline.steps()[0];
        assert_eq!(step.at, Duration::from_millis(1_000));
        assert_eq!(
            step.effects[0],
            Effect::replace_placeholder("Errore temporaneo del server. Riprova tra poco.")
        );
        assert_eq!(step.effects[1], Effect::SetState(ConversationState::Idle));
    }

    #[test]
    fn test_no_response_failure_fallback_text() {
        let error = HoldlineError::Send(TransportError::NoResponse("timed out".into()));
        let timeline = Timeline::for_failure(&error, &config());
        assert_eq!(
            timeline.steps()[0].effects[0],
            Effect::replace_placeholder("Il server non risponde. Verifica la connessione.")
        );
    }

    #[test]
    fn test_custom_durations() {
        let config = TimelineConfig::default().with_hold_duration(Duration::from_secs(2));
        let timeline = Timeline::for_reply(&AgentReply::hold("x"), &config).unwrap();
        assert_eq!(timeline.duration(), Duration::from_millis(2_600));
    }
}
