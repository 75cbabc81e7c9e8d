use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;

use crate::config::TelegramAccountConfig;

/// The running bot, shared between the polling loop and the outbound sender.
/// `None` until the plugin is started and after it is stopped.
pub type BotSlot = Arc<RwLock<Option<BotState>>>;

/// Runtime state of a connected bot.
pub struct BotState {
    pub bot: teloxide::Bot,
    pub bot_username: Option<String>,
    pub config: TelegramAccountConfig,
    pub cancel: CancellationToken,
}
