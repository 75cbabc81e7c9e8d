use std::{sync::Arc, time::Duration};

use {
    carlink_channels::{ChannelOutbound, Keyboard},
    carlink_common::ParticipantId,
    carlink_registry::{ExternalResolver, RegistryStore},
    carlink_sessions::Sessions,
    tracing::{debug, warn},
};

/// Handshake timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingConfig {
    /// How long the peer has to answer an end-of-dialog request.
    pub handshake_timeout: Duration,
    /// How often the sweep looks for expired requests.
    pub sweep_interval: Duration,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

/// Matchmaking, relay, termination and registration over shared session
/// tables.
///
/// Every operation follows the same discipline: take the session lock,
/// validate and mutate, release it, do I/O, then re-lock to settle if the
/// I/O outcome matters. The lock is never held across `.await`.
pub struct PairingService {
    pub(crate) sessions: Arc<Sessions>,
    pub(crate) store: Arc<dyn RegistryStore>,
    pub(crate) resolver: Arc<dyn ExternalResolver>,
    pub(crate) outbound: Arc<dyn ChannelOutbound>,
    pub(crate) config: PairingConfig,
}

impl PairingService {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        resolver: Arc<dyn ExternalResolver>,
        outbound: Arc<dyn ChannelOutbound>,
        config: PairingConfig,
    ) -> Arc<Self> {
        Self::with_sessions(Arc::new(Sessions::new()), store, resolver, outbound, config)
    }

    pub fn with_sessions(
        sessions: Arc<Sessions>,
        store: Arc<dyn RegistryStore>,
        resolver: Arc<dyn ExternalResolver>,
        outbound: Arc<dyn ChannelOutbound>,
        config: PairingConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions,
            store,
            resolver,
            outbound,
            config,
        })
    }

    pub fn sessions(&self) -> &Arc<Sessions> {
        &self.sessions
    }

    pub fn config(&self) -> PairingConfig {
        self.config
    }

    /// Send and report whether it was delivered.
    pub(crate) async fn deliver(
        &self,
        to: ParticipantId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> bool {
        let result = match keyboard {
            Some(keyboard) => self.outbound.send_with_keyboard(to, text, keyboard).await,
            None => self.outbound.send_text(to, text).await,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                debug!(participant = %to, error = %e, "delivery failed");
                false
            },
        }
    }

    /// Send where the outcome does not change any state.
    pub(crate) async fn notify(&self, to: ParticipantId, text: &str, keyboard: Option<Keyboard>) {
        if !self.deliver(to, text, keyboard).await {
            warn!(participant = %to, "best-effort notice not delivered");
        }
    }
}
