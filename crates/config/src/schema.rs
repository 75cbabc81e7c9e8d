//! Config schema types (telegram, registry, resolver, handshake).

use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CarlinkConfig {
    /// Telegram bot settings, parsed by the telegram crate
    /// (`TelegramAccountConfig`).
    pub telegram: serde_json::Value,
    pub registry: RegistryConfig,
    pub resolver: ResolverConfig,
    pub handshake: HandshakeConfig,
}

impl std::fmt::Debug for CarlinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarlinkConfig")
            .field("telegram", &"[REDACTED]")
            .field("registry", &self.registry)
            .field("resolver", &self.resolver)
            .field("handshake", &self.handshake)
            .finish()
    }
}

impl CarlinkConfig {
    /// The configured bot token, if any (empty string counts as unset).
    pub fn telegram_token(&self) -> Option<&str> {
        self.telegram
            .get("token")
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.is_empty())
    }
}

/// Local plate registry (SQLite).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// sqlx connection URL. Defaults to `sqlite://carlink.db?mode=rwc`.
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://carlink.db?mode=rwc".into(),
            max_connections: 5,
        }
    }
}

/// External plate lookup service, consulted when the local registry misses.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub enabled: bool,
    /// Base URL; lookups hit `{base_url}/plates/{tag}`.
    pub base_url: Option<String>,
    /// Sent as a bearer token when set.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Termination handshake timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HandshakeConfig {
    /// How long the peer has to confirm or decline an end-of-dialog request.
    pub timeout_secs: u64,
    /// How often the sweep scans for unanswered requests.
    pub sweep_interval_secs: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            sweep_interval_secs: 10,
        }
    }
}

impl HandshakeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CarlinkConfig::default();
        assert_eq!(cfg.handshake.timeout(), Duration::from_secs(300));
        assert_eq!(cfg.handshake.sweep_interval(), Duration::from_secs(10));
        assert!(!cfg.resolver.enabled);
        assert!(cfg.telegram_token().is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: CarlinkConfig = toml::from_str(
            r#"
            [telegram]
            token = "123:ABC"

            [handshake]
            timeout_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.telegram_token(), Some("123:ABC"));
        assert_eq!(cfg.handshake.timeout_secs, 60);
        assert_eq!(cfg.handshake.sweep_interval_secs, 10);
        assert_eq!(cfg.registry.max_connections, 5);
    }

    #[test]
    fn resolver_debug_redacts_api_key() {
        let cfg = ResolverConfig {
            api_key: Some(Secret::new("hunter2".into())),
            ..Default::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }
}
