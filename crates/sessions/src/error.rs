use {carlink_common::ParticipantId, thiserror::Error};

/// A broken pairing or pending-set invariant.
///
/// These must not occur while every mutation goes through
/// [`crate::Sessions::transact`]; detecting one is a bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingViolation {
    #[error("{participant} is paired with itself")]
    SelfPaired { participant: ParticipantId },

    #[error("{participant} names {peer} as peer but {peer} does not name {participant}")]
    Asymmetric {
        participant: ParticipantId,
        peer: ParticipantId,
    },

    #[error("{participant} is {state} but {peer} is {peer_state}")]
    MismatchedPhase {
        participant: ParticipantId,
        state: &'static str,
        peer: ParticipantId,
        peer_state: &'static str,
    },

    #[error("pending termination for {initiator} does not match the directory")]
    DanglingPending { initiator: ParticipantId },

    #[error("{initiator} requested termination but has no pending entry")]
    MissingPending { initiator: ParticipantId },
}
