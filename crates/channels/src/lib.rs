//! Channel plugin system.
//!
//! The pairing core only needs "send text" and "receive text". A channel
//! (Telegram today) implements [`ChannelOutbound`] for delivery and feeds
//! inbound events into an [`InboundSink`]. Keyboards are presentation hints
//! a channel may render or ignore.

pub mod error;
pub mod keyboard;
pub mod memory;
pub mod plugin;

pub use {
    error::{Error, Result},
    keyboard::{Button, ButtonKind, Keyboard},
    plugin::{ChannelOutbound, ChannelPlugin, InboundKind, InboundMessage, InboundSink},
};
