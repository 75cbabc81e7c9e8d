//! Message forwarding between paired participants.

use {
    carlink_channels::Keyboard,
    carlink_common::ParticipantId,
    carlink_sessions::{Dialog, SessionState},
    tracing::{debug, error, info},
};

use crate::{prompts, service::PairingService};

/// Result of [`PairingService::forward`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Delivered; both sides are `InDialog`.
    Delivered { peer: ParticipantId },
    /// Sender is not in a dialog; nothing done.
    NotInDialog,
    /// Peer could not be reached; both sides `Idle`.
    DeliveryFailed { peer: ParticipantId },
    /// Peer did not name the sender; pairing torn down.
    InvariantViolation { peer: ParticipantId },
}

enum Check {
    Ready(Dialog),
    NotInDialog,
    Broken(ParticipantId),
}

impl PairingService {
    /// Forward `text` from `sender` to their peer. One delivery attempt.
    pub async fn forward(&self, sender: ParticipantId, text: &str) -> RelayOutcome {
        let check = self.sessions.transact(|t| {
            let dialog = match t.directory.get(sender) {
                SessionState::AwaitingFirstMessage(dialog) | SessionState::InDialog(dialog) => {
                    dialog.clone()
                },
                _ => return Check::NotInDialog,
            };
            if !t.is_consistent_pair(sender, dialog.peer) {
                t.force_unpair(sender, dialog.peer);
                return Check::Broken(dialog.peer);
            }
            Check::Ready(dialog)
        });

        let dialog = match check {
            Check::Ready(dialog) => dialog,
            Check::NotInDialog => {
                self.notify(sender, prompts::NOT_IN_DIALOG, Some(Keyboard::MainMenu))
                    .await;
                return RelayOutcome::NotInDialog;
            },
            Check::Broken(peer) => {
                error!(participant = %sender, %peer, "relay found a broken pairing, reset");
                self.notify(sender, prompts::DIALOG_RESET, Some(Keyboard::MainMenu))
                    .await;
                return RelayOutcome::InvariantViolation { peer };
            },
        };
        let peer = dialog.peer;

        let body = prompts::relayed(dialog.local_tag.as_ref(), text);
        if self.deliver(peer, &body, None).await {
            self.sessions.transact(|t| {
                if !t.is_mutual(sender, peer) {
                    return;
                }
                let awaiting = SessionState::AwaitingFirstMessage(dialog.clone());
                t.compare_and_set(sender, &awaiting, SessionState::InDialog(dialog.clone()));
                // The searcher may still be waiting when the target speaks first.
                if let SessionState::AwaitingFirstMessage(peer_dialog) = t.directory.get(peer) {
                    let peer_dialog = peer_dialog.clone();
                    t.directory.set(peer, SessionState::InDialog(peer_dialog));
                }
            });
            debug!(participant = %sender, %peer, "relayed");
            self.notify(sender, prompts::DELIVERED, None).await;
            return RelayOutcome::Delivered { peer };
        }

        info!(participant = %sender, %peer, "relay failed, ending dialog");
        self.sessions.transact(|t| {
            if t.is_mutual(sender, peer) {
                t.reset_pair(sender, peer);
            }
        });
        self.notify(peer, prompts::PEER_GONE, Some(Keyboard::MainMenu))
            .await;
        self.notify(sender, prompts::DELIVERY_FAILED, Some(Keyboard::MainMenu))
            .await;
        RelayOutcome::DeliveryFailed { peer }
    }
}
