use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    carlink_channels::{ButtonKind, ChannelOutbound, Error as ChannelError, Keyboard},
    carlink_common::ParticipantId,
    teloxide::{
        ApiError, RequestError,
        payloads::SendMessageSetters,
        prelude::*,
        types::{ButtonRequest, ChatId, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup},
    },
    tracing::{debug, warn},
};

use crate::{Error, Result, state::BotSlot};

/// Telegram rejects longer messages.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Outbound message sender for Telegram.
#[derive(Clone)]
pub struct TelegramOutbound {
    pub(crate) slot: BotSlot,
}

impl TelegramOutbound {
    pub fn new(slot: BotSlot) -> Self {
        Self { slot }
    }

    fn get_bot(&self) -> Result<Bot> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .map(|s| s.bot.clone())
            .ok_or_else(|| Error::message("telegram bot is not running"))
    }

    async fn send(
        &self,
        to: ParticipantId,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> carlink_channels::Result<()> {
        let bot = self
            .get_bot()
            .map_err(|e| ChannelError::unavailable(e.to_string()))?;
        let chat_id = ChatId(to.0);
        let chunks = chunk_text(text, TELEGRAM_MAX_MESSAGE_LEN);
        let last = chunks.len().saturating_sub(1);

        debug!(participant = %to, text_len = text.len(), chunk_count = chunks.len(), "telegram outbound send");

        for (i, chunk) in chunks.iter().enumerate() {
            let markup = if i == last { markup.clone() } else { None };
            run_with_retry_after(to, "send message", || {
                let mut req = bot.send_message(chat_id, chunk.as_str());
                if let Some(markup) = markup.clone() {
                    req = req.reply_markup(markup);
                }
                async move { req.await }
            })
            .await
            .map_err(|e| channel_error(to, e))?;
        }
        Ok(())
    }
}

/// Run a Telegram request, honouring `RetryAfter` up to a fixed number of
/// times. Any other error is returned immediately.
pub(crate) async fn run_with_retry_after<T, F, Fut>(
    to: ParticipantId,
    operation: &'static str,
    mut request: F,
) -> std::result::Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RequestError>>,
{
    let mut retries = 0usize;

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };

                if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                    warn!(
                        participant = %to,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit persisted after retries"
                    );
                    return Err(err);
                }

                retries += 1;
                warn!(
                    participant = %to,
                    operation,
                    retries,
                    max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

/// Errors that mean the user will never get our messages.
fn is_unreachable_error(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Api(
            ApiError::BotBlocked
                | ApiError::UserDeactivated
                | ApiError::ChatNotFound
                | ApiError::CantInitiateConversation
                | ApiError::BotKicked
        )
    )
}

fn channel_error(to: ParticipantId, error: RequestError) -> ChannelError {
    if is_unreachable_error(&error) {
        ChannelError::unreachable(to, error)
    } else {
        ChannelError::external("telegram send", error)
    }
}

/// Render a keyboard hint as a Telegram reply markup.
pub fn reply_markup(keyboard: Keyboard) -> ReplyMarkup {
    if keyboard == Keyboard::Remove {
        return ReplyMarkup::KeyboardRemove(KeyboardRemove::new());
    }
    let rows: Vec<Vec<KeyboardButton>> = keyboard
        .rows()
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|button| match button.kind {
                    ButtonKind::Text => KeyboardButton::new(button.label),
                    ButtonKind::RequestContact => {
                        KeyboardButton::new(button.label).request(ButtonRequest::Contact)
                    },
                })
                .collect()
        })
        .collect();
    let mut markup = KeyboardMarkup::new(rows).resize_keyboard();
    if keyboard.one_time() {
        markup = markup.one_time_keyboard();
    }
    ReplyMarkup::Keyboard(markup)
}

/// Split `text` into pieces of at most `max_chars` characters, preferring to
/// break at a newline, then at a space.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let window_end = remaining
            .char_indices()
            .nth(max_chars)
            .map_or(remaining.len(), |(idx, _)| idx);
        if window_end == remaining.len() {
            chunks.push(remaining.to_string());
            break;
        }
        let window = &remaining[..window_end];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&idx| idx > 0)
            .unwrap_or(window_end);
        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start_matches(['\n', ' ']);
    }
    chunks
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send_text(&self, to: ParticipantId, text: &str) -> carlink_channels::Result<()> {
        self.send(to, text, None).await
    }

    async fn send_with_keyboard(
        &self,
        to: ParticipantId,
        text: &str,
        keyboard: Keyboard,
    ) -> carlink_channels::Result<()> {
        self.send(to, text, Some(reply_markup(keyboard))).await
    }
}
