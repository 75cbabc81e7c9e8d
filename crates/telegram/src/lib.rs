//! Telegram channel for carlink.
//!
//! Implements `ChannelPlugin` with teloxide: a manual `getUpdates` polling
//! loop feeds private text and contact messages into the pairing core, and
//! `TelegramOutbound` delivers replies with reply keyboards.

pub mod bot;
pub mod config;
pub mod error;
pub mod handlers;
pub mod outbound;
pub mod plugin;
pub mod state;

pub use {
    config::TelegramAccountConfig,
    error::{Error, Result},
    outbound::TelegramOutbound,
    plugin::TelegramPlugin,
};
