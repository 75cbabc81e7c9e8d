//! Pairing core: matchmaking by plate, message relay, and the two-phase
//! end-of-dialog handshake.
//!
//! [`PairingService`] owns the shared session tables and talks to the outside
//! world through the registry and channel traits. It implements
//! [`carlink_channels::InboundSink`], so a channel feeds it directly.
//! [`spawn_sweep`] runs the handshake timeout loop.

pub mod dispatcher;
pub mod error;
pub mod matchmaker;
pub mod prompts;
pub mod registration;
pub mod relay;
pub mod service;
pub mod sweep;
pub mod termination;

#[cfg(test)]
mod testing;

pub use {
    error::{Error, Result},
    matchmaker::SearchOutcome,
    registration::{RegistrationInput, RegistrationOutcome},
    relay::RelayOutcome,
    service::{PairingConfig, PairingService},
    sweep::spawn_sweep,
    termination::{AnswerOutcome, RequestOutcome},
};
