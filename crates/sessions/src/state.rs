use {
    carlink_common::{ParticipantId, Tag},
    tokio::time::Instant,
};

/// Where a participant is in the registration flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStep {
    AwaitingPhone,
    AwaitingPlate { phone: String },
    AwaitingAllowDirect { phone: String, tag: Tag },
}

/// One side's view of a two-party dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub peer: ParticipantId,
    /// This participant's own plate, when known.
    pub local_tag: Option<Tag>,
    /// The peer's plate, when known.
    pub peer_tag: Option<Tag>,
}

impl Dialog {
    pub fn new(peer: ParticipantId, local_tag: Option<Tag>, peer_tag: Option<Tag>) -> Self {
        Self {
            peer,
            local_tag,
            peer_tag,
        }
    }
}

/// Per-participant session state.
///
/// The termination variants keep the full [`Dialog`] so a declined or
/// expired handshake restores it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Registering(RegistrationStep),
    /// Waiting for the plate to look up.
    Searching,
    /// Paired by this participant's search; nothing relayed yet.
    AwaitingFirstMessage(Dialog),
    InDialog(Dialog),
    /// Asked to end the dialog; waiting for the peer's answer.
    TerminationRequested { dialog: Dialog, deadline: Instant },
    /// The peer asked to end the dialog; waiting for our answer.
    AwaitingTerminationAck { dialog: Dialog, deadline: Instant },
}

impl SessionState {
    /// The dialog of any paired variant.
    pub fn dialog(&self) -> Option<&Dialog> {
        match self {
            Self::AwaitingFirstMessage(dialog)
            | Self::InDialog(dialog)
            | Self::TerminationRequested { dialog, .. }
            | Self::AwaitingTerminationAck { dialog, .. } => Some(dialog),
            Self::Idle | Self::Registering(_) | Self::Searching => None,
        }
    }

    pub fn peer(&self) -> Option<ParticipantId> {
        self.dialog().map(|d| d.peer)
    }

    /// Whether this state holds a pairing with another participant.
    pub fn is_paired(&self) -> bool {
        self.dialog().is_some()
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Registering(_) => "registering",
            Self::Searching => "searching",
            Self::AwaitingFirstMessage(_) => "awaiting_first_message",
            Self::InDialog(_) => "in_dialog",
            Self::TerminationRequested { .. } => "termination_requested",
            Self::AwaitingTerminationAck { .. } => "awaiting_termination_ack",
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaired_states_have_no_peer() {
        for state in [
            SessionState::Idle,
            SessionState::Searching,
            SessionState::Registering(RegistrationStep::AwaitingPhone),
        ] {
            assert!(!state.is_paired());
            assert_eq!(state.peer(), None);
        }
    }

    #[test]
    fn paired_states_expose_peer() {
        let dialog = Dialog::new(ParticipantId(2), None, Some(Tag::parse("AB1").unwrap()));
        let deadline = Instant::now();
        for state in [
            SessionState::AwaitingFirstMessage(dialog.clone()),
            SessionState::InDialog(dialog.clone()),
            SessionState::TerminationRequested {
                dialog: dialog.clone(),
                deadline,
            },
            SessionState::AwaitingTerminationAck {
                dialog: dialog.clone(),
                deadline,
            },
        ] {
            assert!(state.is_paired(), "{}", state.name());
            assert_eq!(state.peer(), Some(ParticipantId(2)));
            assert_eq!(state.dialog(), Some(&dialog));
        }
    }
}
