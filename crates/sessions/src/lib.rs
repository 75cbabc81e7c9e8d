//! Volatile pairing state.
//!
//! The [`SessionDirectory`] maps every participant to a [`SessionState`];
//! [`PendingTerminations`] tracks open end-of-dialog handshakes. Both live in
//! one [`SessionTables`] behind the [`Sessions`] mutex so that a change to
//! two participants is observed all at once. Nothing here is persisted: a
//! restart returns everybody to `Idle`.

pub mod directory;
pub mod error;
pub mod pending;
pub mod state;
pub mod tables;

pub use {
    directory::SessionDirectory,
    error::PairingViolation,
    pending::{PendingTermination, PendingTerminations},
    state::{Dialog, RegistrationStep, SessionState},
    tables::{SessionTables, Sessions},
};
