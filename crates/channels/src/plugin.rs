use std::sync::Arc;

use {async_trait::async_trait, carlink_common::ParticipantId};

use crate::{Result, keyboard::Keyboard};

// ── Inbound ─────────────────────────────────────────────────────────────────

/// What the participant sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// Plain text, including tapped keyboard buttons and `/commands`.
    Text(String),
    /// A shared phone contact. `owner` is the platform identity the contact
    /// belongs to, when the channel knows it.
    Contact {
        phone: String,
        owner: Option<ParticipantId>,
    },
}

/// A single inbound event from a participant.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub from: ParticipantId,
    /// Platform handle (e.g. Telegram `@username`), without the `@`.
    pub username: Option<String>,
    pub kind: InboundKind,
}

impl InboundMessage {
    pub fn text(from: ParticipantId, text: impl Into<String>) -> Self {
        Self {
            from,
            username: None,
            kind: InboundKind::Text(text.into()),
        }
    }
}

/// Receives inbound events from a channel. The pairing dispatcher provides
/// the concrete implementation.
#[async_trait]
pub trait InboundSink: Send + Sync {
    /// Process one inbound event to completion.
    async fn dispatch(&self, message: InboundMessage);
}

// ── Outbound ────────────────────────────────────────────────────────────────

/// Send messages to a participant.
///
/// A returned error means the message was not delivered; callers treat it as
/// the participant being unreachable.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, to: ParticipantId, text: &str) -> Result<()>;

    /// Send with a reply keyboard. Channels without keyboards fall back to
    /// plain text.
    async fn send_with_keyboard(
        &self,
        to: ParticipantId,
        text: &str,
        keyboard: Keyboard,
    ) -> Result<()> {
        let _ = keyboard;
        self.send_text(to, text).await
    }
}

// ── Plugin ──────────────────────────────────────────────────────────────────

/// Core channel plugin trait. Each messaging platform implements this.
#[async_trait]
pub trait ChannelPlugin: Send + Sync {
    /// Channel identifier (e.g. "telegram").
    fn id(&self) -> &str;

    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Connect and start delivering inbound events to `sink`.
    async fn start(
        &mut self,
        config: serde_json::Value,
        sink: Arc<dyn InboundSink>,
    ) -> anyhow::Result<()>;

    /// Stop receiving events. Outbound sends fail afterwards.
    async fn stop(&mut self) -> anyhow::Result<()>;

    /// Shared outbound sender for the core.
    fn outbound(&self) -> Arc<dyn ChannelOutbound>;
}
