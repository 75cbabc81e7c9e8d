//! In-memory channel for tests and local wiring.
//!
//! Records every delivered message and fails sends to participants marked
//! unreachable.

use std::{collections::HashSet, sync::Mutex};

use {async_trait::async_trait, carlink_common::ParticipantId, tracing::debug};

use crate::{Error, Result, keyboard::Keyboard, plugin::ChannelOutbound};

/// A message accepted by [`MemoryOutbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: ParticipantId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

/// Outbound sink backed by a `Vec`. No network.
#[derive(Default)]
pub struct MemoryOutbound {
    sent: Mutex<Vec<SentMessage>>,
    unreachable: Mutex<HashSet<ParticipantId>>,
}

impl MemoryOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every further send to `id` fail.
    pub fn set_unreachable(&self, id: ParticipantId) {
        self.unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id);
    }

    pub fn set_reachable(&self, id: ParticipantId) {
        self.unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Every message delivered so far, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Texts delivered to `id`, oldest first.
    pub fn texts_to(&self, id: ParticipantId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.to == id)
            .map(|m| m.text.clone())
            .collect()
    }

    /// The most recent message delivered to `id`.
    pub fn last_to(&self, id: ParticipantId) -> Option<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|m| m.to == id)
            .cloned()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn record(&self, to: ParticipantId, text: &str, keyboard: Option<Keyboard>) -> Result<()> {
        let blocked = self
            .unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&to);
        if blocked {
            debug!(participant = %to, "memory outbound: dropping send to unreachable participant");
            return Err(Error::unreachable(to, "marked unreachable"));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                to,
                text: text.to_string(),
                keyboard,
            });
        Ok(())
    }
}

#[async_trait]
impl ChannelOutbound for MemoryOutbound {
    async fn send_text(&self, to: ParticipantId, text: &str) -> Result<()> {
        self.record(to, text, None)
    }

    async fn send_with_keyboard(
        &self,
        to: ParticipantId,
        text: &str,
        keyboard: Keyboard,
    ) -> Result<()> {
        self.record(to, text, Some(keyboard))
    }
}
