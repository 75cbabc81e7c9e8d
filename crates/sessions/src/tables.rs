use std::sync::Mutex;

use {
    carlink_common::{ParticipantId, Tag},
    tracing::debug,
};

use crate::{
    directory::SessionDirectory,
    error::PairingViolation,
    pending::PendingTerminations,
    state::{Dialog, SessionState},
};

/// The directory and the pending set, mutated together.
#[derive(Debug, Default)]
pub struct SessionTables {
    pub directory: SessionDirectory,
    pub pending: PendingTerminations,
}

impl SessionTables {
    /// Whether `a` and `b` currently name each other as peer.
    pub fn is_mutual(&self, a: ParticipantId, b: ParticipantId) -> bool {
        self.directory.get(a).peer() == Some(b) && self.directory.get(b).peer() == Some(a)
    }

    /// Pair `requester` (who searched) with `target` (who owns `target_tag`).
    pub fn pair(
        &mut self,
        requester: ParticipantId,
        requester_tag: Option<Tag>,
        target: ParticipantId,
        target_tag: Tag,
    ) {
        self.directory.set(
            requester,
            SessionState::AwaitingFirstMessage(Dialog::new(
                target,
                requester_tag.clone(),
                Some(target_tag.clone()),
            )),
        );
        self.directory.set(
            target,
            SessionState::InDialog(Dialog::new(requester, Some(target_tag), requester_tag)),
        );
        debug!(%requester, %target, "paired");
    }

    /// Return both participants to `Idle` and drop any handshake between them.
    pub fn reset_pair(&mut self, a: ParticipantId, b: ParticipantId) {
        for (initiator, peer) in [(a, b), (b, a)] {
            if self.pending.names(initiator, peer) {
                self.pending.remove(initiator);
            }
        }
        self.directory.set(a, SessionState::Idle);
        self.directory.set(b, SessionState::Idle);
        debug!(%a, %b, "pair reset to idle");
    }

    /// Put both sides of a pairing back into `InDialog`, keeping each
    /// side's dialog. Used when a termination handshake is declined or
    /// expires.
    pub fn restore_dialogs(&mut self, a: ParticipantId, b: ParticipantId) {
        for id in [a, b] {
            if let Some(dialog) = self.directory.get(id).dialog().cloned() {
                self.directory.set(id, SessionState::InDialog(dialog));
            }
        }
    }

    /// Whether `a` and `b` are paired with each other in compatible phases.
    pub fn is_consistent_pair(&self, a: ParticipantId, b: ParticipantId) -> bool {
        a != b
            && self.is_mutual(a, b)
            && phases_compatible(self.directory.get(a), self.directory.get(b))
    }

    /// Replace the state of `id` only if it still equals `expected`.
    pub fn compare_and_set(
        &mut self,
        id: ParticipantId,
        expected: &SessionState,
        next: SessionState,
    ) -> bool {
        if self.directory.get(id) != expected {
            return false;
        }
        self.directory.set(id, next);
        true
    }

    /// Tear down a pairing found inconsistent. `id` always ends `Idle`; `peer`
    /// does too unless it is consistently paired with a third participant.
    pub fn force_unpair(&mut self, id: ParticipantId, peer: ParticipantId) {
        let peer_elsewhere = self
            .directory
            .get(peer)
            .peer()
            .is_some_and(|other| other != id && self.is_consistent_pair(peer, other));
        for (initiator, other) in [(id, peer), (peer, id)] {
            if self.pending.names(initiator, other) {
                self.pending.remove(initiator);
            }
        }
        if self.pending.get(id).is_some() {
            self.pending.remove(id);
        }
        self.directory.set(id, SessionState::Idle);
        if !peer_elsewhere {
            self.directory.set(peer, SessionState::Idle);
        }
    }

    /// Every broken pairing or pending-set invariant, empty when consistent.
    pub fn violations(&self) -> Vec<PairingViolation> {
        let mut violations = Vec::new();

        for (id, state) in self.directory.iter() {
            let Some(peer) = state.peer() else {
                continue;
            };
            if peer == id {
                violations.push(PairingViolation::SelfPaired { participant: id });
                continue;
            }
            let peer_state = self.directory.get(peer);
            if peer_state.peer() != Some(id) {
                violations.push(PairingViolation::Asymmetric {
                    participant: id,
                    peer,
                });
                continue;
            }
            if !phases_compatible(state, peer_state) {
                violations.push(PairingViolation::MismatchedPhase {
                    participant: id,
                    state: state.name(),
                    peer,
                    peer_state: peer_state.name(),
                });
            }
            if matches!(state, SessionState::TerminationRequested { .. })
                && !self.pending.names(id, peer)
            {
                violations.push(PairingViolation::MissingPending { initiator: id });
            }
        }

        for (initiator, entry) in self.pending.iter() {
            let requested = matches!(
                self.directory.get(initiator),
                SessionState::TerminationRequested { dialog, .. } if dialog.peer == entry.peer
            );
            let acking = matches!(
                self.directory.get(entry.peer),
                SessionState::AwaitingTerminationAck { dialog, .. } if dialog.peer == initiator
            );
            if !requested || !acking {
                violations.push(PairingViolation::DanglingPending { initiator });
            }
        }

        violations
    }
}

fn phases_compatible(state: &SessionState, peer_state: &SessionState) -> bool {
    use SessionState::*;
    matches!(
        (state, peer_state),
        (AwaitingFirstMessage(_), InDialog(_))
            | (InDialog(_), AwaitingFirstMessage(_))
            | (InDialog(_), InDialog(_))
            | (TerminationRequested { .. }, AwaitingTerminationAck { .. })
            | (AwaitingTerminationAck { .. }, TerminationRequested { .. })
    )
}

/// Serialized access to [`SessionTables`].
///
/// A `std::sync::Mutex`: every critical section is synchronous and the lock
/// is never held across `.await`.
#[derive(Debug, Default)]
pub struct Sessions {
    tables: Mutex<SessionTables>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the tables.
    pub fn transact<R>(&self, f: impl FnOnce(&mut SessionTables) -> R) -> R {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut tables)
    }

    /// Current state of `id` (a copy).
    pub fn state(&self, id: ParticipantId) -> SessionState {
        self.transact(|t| t.directory.get(id).clone())
    }

    pub fn pending_len(&self) -> usize {
        self.transact(|t| t.pending.len())
    }

    pub fn violations(&self) -> Vec<PairingViolation> {
        self.transact(|t| t.violations())
    }
}
