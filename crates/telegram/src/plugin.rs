use std::sync::{Arc, RwLock};

use {
    anyhow::Result,
    async_trait::async_trait,
    carlink_channels::{ChannelOutbound, ChannelPlugin, InboundSink},
    tracing::{info, warn},
};

use crate::{
    bot, config::TelegramAccountConfig, outbound::TelegramOutbound, state::BotSlot,
};

/// Telegram channel plugin.
pub struct TelegramPlugin {
    slot: BotSlot,
    outbound: Arc<TelegramOutbound>,
}

impl TelegramPlugin {
    pub fn new() -> Self {
        let slot: BotSlot = Arc::new(RwLock::new(None));
        let outbound = Arc::new(TelegramOutbound::new(Arc::clone(&slot)));
        Self { slot, outbound }
    }

    /// `@username` of the connected bot.
    pub fn bot_username(&self) -> Option<String> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().and_then(|s| s.bot_username.clone())
    }

    pub fn is_running(&self) -> bool {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().is_some_and(|s| !s.cancel.is_cancelled())
    }
}

impl Default for TelegramPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelPlugin for TelegramPlugin {
    fn id(&self) -> &str {
        "telegram"
    }

    fn name(&self) -> &str {
        "Telegram"
    }

    async fn start(&mut self, config: serde_json::Value, sink: Arc<dyn InboundSink>) -> Result<()> {
        let tg_config: TelegramAccountConfig = serde_json::from_value(config)?;

        if !tg_config.has_token() {
            return Err(anyhow::anyhow!("telegram bot token is required"));
        }
        if self.is_running() {
            return Err(anyhow::anyhow!("telegram bot is already running"));
        }

        info!("starting telegram channel");
        bot::start_polling(tg_config, Arc::clone(&self.slot), sink).await?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let state = {
            let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };

        match state {
            Some(state) => {
                info!("stopping telegram channel");
                state.cancel.cancel();
            },
            None => warn!("telegram channel was not running"),
        }
        Ok(())
    }

    fn outbound(&self) -> Arc<dyn ChannelOutbound> {
        Arc::clone(&self.outbound) as Arc<dyn ChannelOutbound>
    }
}
