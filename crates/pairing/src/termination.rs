//! Two-phase end-of-dialog handshake.
//!
//! `request` opens a pending entry keyed by the initiator; the peer answers
//! with `confirm` (both `Idle`) or `decline` (both back to `InDialog`). An
//! unanswered request is rolled back by [`PairingService::sweep_once`].

use {
    carlink_channels::Keyboard,
    carlink_common::ParticipantId,
    carlink_sessions::{PendingTermination, SessionState},
    tokio::time::Instant,
    tracing::{error, info, warn},
};

use crate::{prompts, service::PairingService};

/// Result of [`PairingService::request_termination`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Peer prompted; handshake pending until `deadline`.
    Requested {
        peer: ParticipantId,
        deadline: Instant,
    },
    /// Requester is still waiting to send the first message.
    FirstMessageRequired,
    /// A request from this participant is already pending.
    AlreadyPending,
    /// Requester is not in a dialog.
    NotInDialog,
    /// Prompt could not be delivered; both `Idle`.
    PeerUnreachable { peer: ParticipantId },
    /// The pairing was inconsistent and has been reset.
    InvariantViolation { peer: ParticipantId },
}

/// Result of an answer from the acking side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Dialog ended; both `Idle`.
    Confirmed { initiator: ParticipantId },
    /// Dialog continues; both `InDialog`.
    Declined { initiator: ParticipantId },
    /// Not a yes/no answer; prompt repeated, nothing changed.
    Reprompted,
    /// No request is waiting for this participant's answer.
    NoPendingRequest,
    /// The handshake was inconsistent and has been reset.
    InvariantViolation { initiator: ParticipantId },
}

enum Open {
    Opened {
        peer: ParticipantId,
        deadline: Instant,
    },
    Rejected(RequestOutcome),
}

enum Close {
    Closed(ParticipantId),
    NoPending,
    Broken(ParticipantId),
}

impl PairingService {
    /// Ask the peer to end the dialog.
    pub async fn request_termination(&self, initiator: ParticipantId) -> RequestOutcome {
        let timeout = self.config.handshake_timeout;
        let open = self.sessions.transact(|t| {
            let dialog = match t.directory.get(initiator) {
                SessionState::InDialog(dialog) => dialog.clone(),
                SessionState::AwaitingFirstMessage(_) => {
                    return Open::Rejected(RequestOutcome::FirstMessageRequired);
                },
                SessionState::TerminationRequested { .. } => {
                    return Open::Rejected(RequestOutcome::AlreadyPending);
                },
                _ => return Open::Rejected(RequestOutcome::NotInDialog),
            };
            let peer = dialog.peer;
            if !t.is_consistent_pair(initiator, peer) {
                t.force_unpair(initiator, peer);
                return Open::Rejected(RequestOutcome::InvariantViolation { peer });
            }
            // A searcher who has not written yet is still a valid peer; a
            // decline or timeout puts it in `InDialog`.
            let Some(peer_dialog) = t.directory.get(peer).dialog().cloned() else {
                return Open::Rejected(RequestOutcome::InvariantViolation { peer });
            };

            let deadline = Instant::now() + timeout;
            t.pending
                .insert(initiator, PendingTermination { peer, deadline });
            t.directory
                .set(initiator, SessionState::TerminationRequested { dialog, deadline });
            t.directory.set(peer, SessionState::AwaitingTerminationAck {
                dialog: peer_dialog,
                deadline,
            });
            Open::Opened { peer, deadline }
        });

        let (peer, deadline) = match open {
            Open::Opened { peer, deadline } => (peer, deadline),
            Open::Rejected(outcome) => {
                let text = match &outcome {
                    RequestOutcome::FirstMessageRequired => prompts::FIRST_MESSAGE_FIRST,
                    RequestOutcome::AlreadyPending => prompts::CONFIRMATION_PENDING,
                    RequestOutcome::InvariantViolation { peer } => {
                        error!(participant = %initiator, %peer, "termination request on a broken pairing, reset");
                        prompts::DIALOG_RESET
                    },
                    _ => prompts::NOT_IN_DIALOG,
                };
                self.notify(initiator, text, None).await;
                return outcome;
            },
        };

        if !self
            .deliver(peer, prompts::CONFIRM_END, Some(Keyboard::YesNo))
            .await
        {
            warn!(participant = %initiator, %peer, "termination prompt not delivered, ending dialog");
            self.sessions.transact(|t| {
                if t.pending.names(initiator, peer) {
                    t.reset_pair(initiator, peer);
                }
            });
            self.notify(initiator, prompts::PEER_UNREACHABLE, Some(Keyboard::MainMenu))
                .await;
            return RequestOutcome::PeerUnreachable { peer };
        }

        info!(participant = %initiator, %peer, "termination requested");
        self.notify(initiator, prompts::CONFIRMATION_PENDING, Some(Keyboard::Remove))
            .await;
        RequestOutcome::Requested { peer, deadline }
    }

    /// Handle free text from a participant in `AwaitingTerminationAck`.
    pub async fn answer_termination(&self, responder: ParticipantId, text: &str) -> AnswerOutcome {
        match prompts::parse_answer(text) {
            Some(true) => self.confirm_termination(responder).await,
            Some(false) => self.decline_termination(responder).await,
            None => {
                let waiting = matches!(
                    self.sessions.state(responder),
                    SessionState::AwaitingTerminationAck { .. }
                );
                if !waiting {
                    return AnswerOutcome::NoPendingRequest;
                }
                self.notify(responder, prompts::CONFIRM_END, Some(Keyboard::YesNo))
                    .await;
                AnswerOutcome::Reprompted
            },
        }
    }

    /// Accept the request: both participants go `Idle`.
    pub async fn confirm_termination(&self, responder: ParticipantId) -> AnswerOutcome {
        let close = self.sessions.transact(|t| {
            let Some(initiator) = acking_initiator(t.directory.get(responder)) else {
                return Close::NoPending;
            };
            if !t.pending.names(initiator, responder) {
                t.force_unpair(responder, initiator);
                return Close::Broken(initiator);
            }
            t.pending.remove(initiator);
            t.directory.set(initiator, SessionState::Idle);
            t.directory.set(responder, SessionState::Idle);
            Close::Closed(initiator)
        });

        match close {
            Close::Closed(initiator) => {
                info!(participant = %responder, %initiator, "dialog ended by agreement");
                self.notify(initiator, prompts::DIALOG_ENDED, Some(Keyboard::MainMenu))
                    .await;
                self.notify(responder, prompts::DIALOG_ENDED, Some(Keyboard::MainMenu))
                    .await;
                AnswerOutcome::Confirmed { initiator }
            },
            Close::NoPending => AnswerOutcome::NoPendingRequest,
            Close::Broken(initiator) => self.report_broken(responder, initiator).await,
        }
    }

    /// Reject the request: both participants return to `InDialog`.
    pub async fn decline_termination(&self, responder: ParticipantId) -> AnswerOutcome {
        let close = self.sessions.transact(|t| {
            let Some(initiator) = acking_initiator(t.directory.get(responder)) else {
                return Close::NoPending;
            };
            if !t.pending.names(initiator, responder) {
                t.force_unpair(responder, initiator);
                return Close::Broken(initiator);
            }
            t.pending.remove(initiator);
            t.restore_dialogs(initiator, responder);
            Close::Closed(initiator)
        });

        match close {
            Close::Closed(initiator) => {
                info!(participant = %responder, %initiator, "termination declined");
                self.notify(initiator, prompts::END_DECLINED, Some(Keyboard::EndDialog))
                    .await;
                self.notify(responder, prompts::CONTINUING, Some(Keyboard::EndDialog))
                    .await;
                AnswerOutcome::Declined { initiator }
            },
            Close::NoPending => AnswerOutcome::NoPendingRequest,
            Close::Broken(initiator) => self.report_broken(responder, initiator).await,
        }
    }

    /// Roll back every handshake whose deadline is at or before `now`.
    /// Returns the `(initiator, peer)` pairs that expired.
    pub async fn sweep_once(&self, now: Instant) -> Vec<(ParticipantId, ParticipantId)> {
        let (expired, broken) = self.sessions.transact(|t| {
            let mut expired = Vec::new();
            let mut broken = Vec::new();
            for (initiator, entry) in t.pending.take_expired(now) {
                let intact = matches!(
                    t.directory.get(initiator),
                    SessionState::TerminationRequested { dialog, .. } if dialog.peer == entry.peer
                ) && acking_initiator(t.directory.get(entry.peer)) == Some(initiator);
                if intact {
                    t.restore_dialogs(initiator, entry.peer);
                    expired.push((initiator, entry.peer));
                } else {
                    t.force_unpair(initiator, entry.peer);
                    broken.push((initiator, entry.peer));
                }
            }
            (expired, broken)
        });

        for (initiator, peer) in &broken {
            error!(participant = %initiator, %peer, "expired handshake did not match the directory, reset");
        }
        for &(initiator, peer) in &expired {
            info!(participant = %initiator, %peer, "termination request timed out");
            self.notify(initiator, prompts::NO_CONFIRMATION, Some(Keyboard::EndDialog))
                .await;
            self.notify(peer, prompts::NO_CONFIRMATION, Some(Keyboard::EndDialog))
                .await;
        }
        expired
    }

    async fn report_broken(&self, responder: ParticipantId, initiator: ParticipantId) -> AnswerOutcome {
        error!(participant = %responder, %initiator, "termination answer without a pending request, reset");
        self.notify(responder, prompts::DIALOG_RESET, Some(Keyboard::MainMenu))
            .await;
        AnswerOutcome::InvariantViolation { initiator }
    }
}

fn acking_initiator(state: &SessionState) -> Option<ParticipantId> {
    match state {
        SessionState::AwaitingTerminationAck { dialog, .. } => Some(dialog.peer),
        _ => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::Harness,
        std::time::Duration,
    };

    const A: ParticipantId = ParticipantId(1);
    const B: ParticipantId = ParticipantId(2);

    #[tokio::test(start_paused = true)]
    async fn request_opens_handshake() {
        let h = Harness::new();
        h.in_dialog(A, B).await;

        let outcome = h.service.request_termination(A).await;
        let RequestOutcome::Requested { peer, deadline } = outcome else {
            panic!("unexpected {outcome:?}");
        };
        assert_eq!(peer, B);
        assert_eq!(deadline, Instant::now() + Duration::from_secs(300));
        assert!(matches!(h.state(A), SessionState::TerminationRequested { .. }));
        assert!(matches!(h.state(B), SessionState::AwaitingTerminationAck { .. }));
        assert_eq!(h.service.sessions.pending_len(), 1);
        assert_eq!(h.outbound.last_to(B).unwrap().keyboard, Some(Keyboard::YesNo));
        h.assert_consistent();
    }

    #[tokio::test]
    async fn searcher_must_write_before_ending() {
        let h = Harness::new();
        h.register(B, "AB123", false).await;
        h.set(A, SessionState::Searching);
        h.service.search(A, "AB123").await.unwrap();

        assert_eq!(
            h.service.request_termination(A).await,
            RequestOutcome::FirstMessageRequired
        );
        assert_eq!(h.service.sessions.pending_len(), 0);
        h.assert_consistent();
    }

    #[tokio::test]
    async fn target_can_end_before_searcher_writes() {
        let h = Harness::new();
        h.register(B, "AB123", false).await;
        h.set(A, SessionState::Searching);
        h.service.search(A, "AB123").await.unwrap();

        let outcome = h.service.request_termination(B).await;
        assert!(matches!(outcome, RequestOutcome::Requested { peer, .. } if peer == A));
        assert!(matches!(
            h.state(A),
            SessionState::AwaitingTerminationAck { ref dialog, .. } if dialog.peer == B
        ));
        h.assert_consistent();

        assert_eq!(
            h.service.answer_termination(A, "no").await,
            AnswerOutcome::Declined { initiator: B }
        );
        assert!(matches!(h.state(A), SessionState::InDialog(ref d) if d.peer == B));
        assert!(matches!(h.state(B), SessionState::InDialog(ref d) if d.peer == A));
        h.assert_consistent();
    }

    #[tokio::test]
    async fn repeated_request_is_pending() {
        let h = Harness::new();
        h.in_dialog(A, B).await;
        h.service.request_termination(A).await;
        assert_eq!(
            h.service.request_termination(A).await,
            RequestOutcome::AlreadyPending
        );
        assert_eq!(h.service.sessions.pending_len(), 1);
    }

    #[tokio::test]
    async fn unreachable_peer_ends_dialog() {
        let h = Harness::new();
        h.in_dialog(A, B).await;
        h.outbound.set_unreachable(B);

        assert_eq!(
            h.service.request_termination(A).await,
            RequestOutcome::PeerUnreachable { peer: B }
        );
        assert_eq!(h.state(A), SessionState::Idle);
        assert_eq!(h.state(B), SessionState::Idle);
        assert_eq!(h.service.sessions.pending_len(), 0);
    }

    #[tokio::test]
    async fn confirm_ends_dialog() {
        let h = Harness::new();
        h.in_dialog(A, B).await;
        h.service.request_termination(A).await;

        assert_eq!(
            h.service.answer_termination(B, "Да").await,
            AnswerOutcome::Confirmed { initiator: A }
        );
        assert_eq!(h.state(A), SessionState::Idle);
        assert_eq!(h.state(B), SessionState::Idle);
        assert_eq!(h.service.sessions.pending_len(), 0);
        assert_eq!(h.outbound.last_to(A).unwrap().text, prompts::DIALOG_ENDED);
    }

    #[tokio::test]
    async fn decline_restores_dialogs() {
        let h = Harness::new();
        h.in_dialog(A, B).await;
        let before_a = h.state(A);
        let before_b = h.state(B);
        h.service.request_termination(A).await;

        assert_eq!(
            h.service.answer_termination(B, "no").await,
            AnswerOutcome::Declined { initiator: A }
        );
        assert_eq!(h.state(A), before_a);
        assert_eq!(h.state(B), before_b);
        assert_eq!(h.service.sessions.pending_len(), 0);
    }

    #[tokio::test]
    async fn malformed_answers_change_nothing() {
        let h = Harness::new();
        h.in_dialog(A, B).await;
        h.service.request_termination(A).await;
        let a = h.state(A);
        let b = h.state(B);

        for _ in 0..3 {
            assert_eq!(
                h.service.answer_termination(B, "what?").await,
                AnswerOutcome::Reprompted
            );
        }
        assert_eq!(h.state(A), a);
        assert_eq!(h.state(B), b);
        assert_eq!(h.service.sessions.pending_len(), 1);
    }

    #[tokio::test]
    async fn answer_without_request() {
        let h = Harness::new();
        h.in_dialog(A, B).await;
        assert_eq!(
            h.service.confirm_termination(B).await,
            AnswerOutcome::NoPendingRequest
        );
        assert!(matches!(h.state(B), SessionState::InDialog(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_rolls_back_only_expired() {
        let h = Harness::new();
        h.in_dialog(A, B).await;
        let before_a = h.state(A);
        h.service.request_termination(A).await;
        h.outbound.clear();

        assert!(h.service.sweep_once(Instant::now()).await.is_empty());
        assert_eq!(h.service.sessions.pending_len(), 1);

        tokio::time::advance(Duration::from_secs(300)).await;
        let expired = h.service.sweep_once(Instant::now()).await;
        assert_eq!(expired, vec![(A, B)]);
        assert_eq!(h.state(A), before_a);
        assert!(matches!(h.state(B), SessionState::InDialog(_)));
        assert_eq!(h.service.sessions.pending_len(), 0);
        assert_eq!(h.outbound.texts_to(A), vec![prompts::NO_CONFIRMATION]);
        assert_eq!(h.outbound.texts_to(B), vec![prompts::NO_CONFIRMATION]);
        h.assert_consistent();
    }

    #[tokio::test(start_paused = true)]
    async fn late_answer_after_timeout_is_ignored() {
        let h = Harness::new();
        h.in_dialog(A, B).await;
        h.service.request_termination(A).await;
        tokio::time::advance(Duration::from_secs(301)).await;
        h.service.sweep_once(Instant::now()).await;

        assert_eq!(
            h.service.confirm_termination(B).await,
            AnswerOutcome::NoPendingRequest
        );
        assert!(matches!(h.state(A), SessionState::InDialog(_)));
        h.assert_consistent();
    }
}
