use std::collections::HashMap;

use carlink_common::ParticipantId;

use crate::state::SessionState;

static IDLE: SessionState = SessionState::Idle;

/// Participant → state. Absent participants are `Idle`.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    states: HashMap<ParticipantId, SessionState>,
}

impl SessionDirectory {
    pub fn get(&self, id: ParticipantId) -> &SessionState {
        self.states.get(&id).unwrap_or(&IDLE)
    }

    /// Replace the state of `id`. Setting `Idle` drops the entry.
    pub fn set(&mut self, id: ParticipantId, state: SessionState) {
        if state == SessionState::Idle {
            self.states.remove(&id);
        } else {
            self.states.insert(id, state);
        }
    }

    /// Number of participants not in `Idle`.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticipantId, &SessionState)> {
        self.states.iter().map(|(id, state)| (*id, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_is_idle() {
        let dir = SessionDirectory::default();
        assert_eq!(dir.get(ParticipantId(1)), &SessionState::Idle);
    }

    #[test]
    fn set_replaces_and_idle_removes() {
        let mut dir = SessionDirectory::default();
        dir.set(ParticipantId(1), SessionState::Searching);
        assert_eq!(dir.get(ParticipantId(1)), &SessionState::Searching);
        assert_eq!(dir.len(), 1);

        dir.set(ParticipantId(1), SessionState::Idle);
        assert!(dir.is_empty());
        assert_eq!(dir.get(ParticipantId(1)), &SessionState::Idle);
    }
}
