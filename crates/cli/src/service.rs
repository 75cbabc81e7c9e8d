//! `carlink run`: wire the registry, resolver, pairing core and Telegram
//! channel together and run until Ctrl-C.

use std::sync::Arc;

use {
    anyhow::{Context, Result},
    carlink_channels::{ChannelPlugin, InboundSink},
    carlink_config::CarlinkConfig,
    carlink_pairing::{PairingConfig, PairingService, spawn_sweep},
    carlink_registry::{ExternalResolver, HttpResolver, NoopResolver, SqliteRegistryStore},
    carlink_telegram::TelegramPlugin,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

fn build_resolver(config: &CarlinkConfig) -> Result<Arc<dyn ExternalResolver>> {
    let resolver = &config.resolver;
    match (resolver.enabled, resolver.base_url.as_deref()) {
        (true, Some(base_url)) => {
            info!(base_url, "external resolver enabled");
            let http = HttpResolver::new(base_url, resolver.api_key.clone(), resolver.timeout())
                .context("failed to build external resolver client")?;
            Ok(Arc::new(http))
        },
        (true, None) => {
            warn!("resolver enabled without base_url, external lookups disabled");
            Ok(Arc::new(NoopResolver))
        },
        (false, _) => Ok(Arc::new(NoopResolver)),
    }
}

fn pairing_config(config: &CarlinkConfig) -> PairingConfig {
    PairingConfig {
        handshake_timeout: config.handshake.timeout(),
        sweep_interval: config.handshake.sweep_interval(),
    }
}

pub async fn run(config: CarlinkConfig) -> Result<()> {
    let store = SqliteRegistryStore::new(
        &config.registry.database_url,
        config.registry.max_connections,
    )
    .await
    .context("failed to open registry database")?;
    info!("registry database ready");

    let resolver = build_resolver(&config)?;

    let mut telegram = TelegramPlugin::new();
    let service = PairingService::new(
        Arc::new(store),
        resolver,
        telegram.outbound(),
        pairing_config(&config),
    );

    let cancel = CancellationToken::new();
    let sweep = spawn_sweep(Arc::clone(&service), cancel.clone());

    let sink: Arc<dyn InboundSink> = Arc::clone(&service) as Arc<dyn InboundSink>;
    if let Err(e) = telegram.start(config.telegram.clone(), sink).await {
        cancel.cancel();
        let _ = sweep.await;
        return Err(e.context("failed to start telegram channel"));
    }
    info!(bot = ?telegram.bot_username(), "carlink running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down");

    telegram.stop().await?;
    cancel.cancel();
    if let Err(e) = sweep.await {
        warn!(error = %e, "sweep task ended abnormally");
    }

    let open = service.sessions().transact(|t| t.directory.len());
    info!(open_sessions = open, "stopped; in-flight sessions dropped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, carlink_config::ResolverConfig, std::time::Duration};

    #[test]
    fn pairing_config_follows_handshake_section() {
        let mut config = CarlinkConfig::default();
        config.handshake.timeout_secs = 120;
        config.handshake.sweep_interval_secs = 5;
        assert_eq!(pairing_config(&config), PairingConfig {
            handshake_timeout: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(5),
        });
    }

    #[test]
    fn resolver_defaults_to_noop() {
        assert!(build_resolver(&CarlinkConfig::default()).is_ok());

        let config = CarlinkConfig {
            resolver: ResolverConfig {
                enabled: true,
                base_url: Some("http://127.0.0.1:9/".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(build_resolver(&config).is_ok());
    }
}
