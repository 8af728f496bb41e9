//! Observable view of a voice session.

use std::time::Duration;

use guarddesk_core::error::VoiceError;
use guarddesk_core::types::{
    Offering, PriceEstimate, ProposedAction, ServiceDetails, ServiceRequestRef, SessionState,
};
use guarddesk_providers::DialogueReply;

/// Everything a UI needs to render the session, published after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Last recognized or typed user utterance.
    pub transcript: Option<String>,
    /// Last successfully parsed reply.
    pub reply: Option<DialogueReply>,
    /// Service-request slots gathered across the conversation.
    pub service_details: Option<ServiceDetails>,
    /// Offerings to display, set when the assistant asks to show packages.
    pub packages: Vec<Offering>,
    pub price_estimate: Option<PriceEstimate>,
    /// The assistant asked for contact details.
    pub info_requested: bool,
    /// Mutation awaiting the user's confirmation.
    pub pending_action: Option<ProposedAction>,
    /// Reference of the last filed service request.
    pub request_ref: Option<ServiceRequestRef>,
    /// Text currently being spoken.
    pub speaking_text: Option<String>,
    /// Length of the speech being played, once known.
    pub speech_duration: Option<Duration>,
    pub error: Option<VoiceError>,
    pub history_len: usize,
}

impl SessionSnapshot {
    /// User-visible error message, if any. Control errors are never shown.
    pub fn error_message(&self) -> Option<String> {
        self.error
            .as_ref()
            .filter(|e| e.is_user_facing())
            .map(ToString::to_string)
    }
}

/// Overlay newly extracted slots onto what is already known.
pub(crate) fn merge_details(current: Option<ServiceDetails>, update: ServiceDetails) -> ServiceDetails {
    let Some(current) = current else {
        return update;
    };
    ServiceDetails {
        service_type: update.service_type.or(current.service_type),
        num_guards: update.num_guards.or(current.num_guards),
        start_date: update.start_date.or(current.start_date),
        end_date: update.end_date.or(current.end_date),
        shift_type: update.shift_type.or(current.shift_type),
        location: update.location.or(current.location),
        notes: update.notes.or(current.notes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_known_slots() {
        let first = ServiceDetails {
            num_guards: Some(2),
            location: Some("DHA Phase 5".into()),
            ..Default::default()
        };
        let second = ServiceDetails {
            num_guards: Some(3),
            start_date: Some("2026-10-17".into()),
            ..Default::default()
        };
        let merged = merge_details(Some(first), second);
        assert_eq!(merged.num_guards, Some(3));
        assert_eq!(merged.location.as_deref(), Some("DHA Phase 5"));
        assert_eq!(merged.start_date.as_deref(), Some("2026-10-17"));
    }

    #[test]
    fn test_error_message_is_display_text() {
        let snapshot = SessionSnapshot {
            error: Some(VoiceError::NoAudio),
            ..Default::default()
        };
        assert_eq!(snapshot.error_message().as_deref(), Some("No audio detected."));
        assert_eq!(SessionSnapshot::default().error_message(), None);

        let busy = SessionSnapshot {
            error: Some(VoiceError::Busy),
            ..Default::default()
        };
        assert_eq!(busy.error_message(), None);
    }
}
