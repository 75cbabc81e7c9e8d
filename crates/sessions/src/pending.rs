use std::collections::HashMap;

use {carlink_common::ParticipantId, tokio::time::Instant};

/// An open end-of-dialog request, keyed by its initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTermination {
    pub peer: ParticipantId,
    pub deadline: Instant,
}

/// Initiator → open request.
#[derive(Debug, Default)]
pub struct PendingTerminations {
    entries: HashMap<ParticipantId, PendingTermination>,
}

impl PendingTerminations {
    pub fn insert(&mut self, initiator: ParticipantId, entry: PendingTermination) {
        self.entries.insert(initiator, entry);
    }

    pub fn get(&self, initiator: ParticipantId) -> Option<&PendingTermination> {
        self.entries.get(&initiator)
    }

    pub fn remove(&mut self, initiator: ParticipantId) -> Option<PendingTermination> {
        self.entries.remove(&initiator)
    }

    /// Whether the entry keyed by `initiator` names `peer` as the acking side.
    pub fn names(&self, initiator: ParticipantId, peer: ParticipantId) -> bool {
        self.entries
            .get(&initiator)
            .is_some_and(|entry| entry.peer == peer)
    }

    /// Remove and return every entry whose deadline is at or before `now`.
    pub fn take_expired(&mut self, now: Instant) -> Vec<(ParticipantId, PendingTermination)> {
        let expired: Vec<ParticipantId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(initiator, _)| *initiator)
            .collect();
        expired
            .into_iter()
            .filter_map(|initiator| self.entries.remove(&initiator).map(|e| (initiator, e)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticipantId, &PendingTermination)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }
}
