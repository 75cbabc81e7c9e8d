//! Shared types, error definitions, and utilities used across all carlink crates.

pub mod error;
pub mod types;

pub use {
    error::{CarlinkError, Error, FromMessage, Result},
    types::{ParticipantId, Tag},
};
