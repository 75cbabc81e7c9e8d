use std::{sync::Arc, time::Duration};

use {
    carlink_channels::InboundSink,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    config::TelegramAccountConfig,
    handlers,
    state::{BotSlot, BotState},
};

/// Commands offered in the Telegram client's autocomplete.
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Register your plate"),
        BotCommand::new("search", "Find a car owner by plate"),
        BotCommand::new("end", "End the current dialog"),
        BotCommand::new("cancel", "Cancel the current step"),
    ]
}

/// Connect the bot and start polling.
///
/// Spawns a background task that feeds updates into `sink` until the
/// returned `CancellationToken` is cancelled.
pub async fn start_polling(
    config: TelegramAccountConfig,
    slot: BotSlot,
    sink: Arc<dyn InboundSink>,
) -> Result<CancellationToken> {
    // Client timeout must exceed the long-polling timeout so the HTTP client
    // doesn't abort the request before Telegram responds.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    let me = bot.get_me().await?;
    let bot_username = me.username.clone();

    // Delete any existing webhook so long polling works.
    bot.delete_webhook().send().await?;

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?bot_username, "telegram bot connected (webhook cleared)");

    let cancel = CancellationToken::new();
    let poll_timeout = config.poll_timeout_secs;
    let backoff = Duration::from_secs(config.error_backoff_secs);
    {
        let mut slot = slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(BotState {
            bot: bot.clone(),
            bot_username,
            config,
            cancel: cancel.clone(),
        });
    }

    let loop_cancel = cancel.clone();
    tokio::spawn(async move {
        poll_loop(bot, poll_timeout, backoff, sink, loop_cancel).await;
    });

    Ok(cancel)
}

async fn poll_loop(
    bot: Bot,
    poll_timeout: u32,
    backoff: Duration,
    sink: Arc<dyn InboundSink>,
    cancel: CancellationToken,
) {
    info!("starting telegram manual polling loop");
    let mut offset: i32 = 0;

    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = bot
                .get_updates()
                .offset(offset)
                .timeout(poll_timeout)
                .allowed_updates(vec![AllowedUpdate::Message])
                .send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    match update.kind {
                        UpdateKind::Message(msg) => handlers::handle_message(msg, &sink).await,
                        other => debug!("ignoring non-message update: {other:?}"),
                    }
                }
            },
            Err(e) => {
                if is_conflict(&e) {
                    warn!(
                        "telegram polling stopped: another instance is already running with this token"
                    );
                    cancel.cancel();
                    break;
                }

                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(backoff) => {},
                }
            },
        }
    }

    info!("telegram polling stopped");
}

fn is_conflict(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::TerminatedByOtherGetUpdates))
}
