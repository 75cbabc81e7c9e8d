use std::sync::Arc;

use {
    carlink_channels::{InboundKind, InboundMessage, InboundSink},
    carlink_common::ParticipantId,
    teloxide::types::{Message, User},
    tracing::debug,
};

/// Turn a Telegram message into an inbound event.
///
/// Only private chats with a human sender are accepted. Text and shared
/// contacts are understood; everything else is dropped.
pub fn extract_inbound(msg: &Message) -> Option<InboundMessage> {
    if !msg.chat.is_private() {
        return None;
    }
    let user = msg.from.as_ref().filter(|u| !u.is_bot)?;
    let from = participant_id(user)?;

    let kind = if let Some(text) = msg.text() {
        InboundKind::Text(text.to_string())
    } else if let Some(contact) = msg.contact() {
        InboundKind::Contact {
            phone: contact.phone_number.clone(),
            owner: contact
                .user_id
                .and_then(|id| i64::try_from(id.0).ok())
                .map(ParticipantId),
        }
    } else {
        return None;
    };

    Some(InboundMessage {
        from,
        username: user.username.clone(),
        kind,
    })
}

fn participant_id(user: &User) -> Option<ParticipantId> {
    i64::try_from(user.id.0).ok().map(ParticipantId)
}

/// Handle a single inbound Telegram message (called from the polling loop).
pub async fn handle_message(msg: Message, sink: &Arc<dyn InboundSink>) {
    match extract_inbound(&msg) {
        Some(inbound) => {
            debug!(participant = %inbound.from, "dispatching telegram message");
            sink.dispatch(inbound).await;
        },
        None => debug!(chat_id = msg.chat.id.0, "ignoring unsupported telegram message"),
    }
}
