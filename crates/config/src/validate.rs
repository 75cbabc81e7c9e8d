//! Semantic validation of a loaded [`CarlinkConfig`].

use crate::schema::CarlinkConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "handshake.timeout_secs"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Check a config for values the service cannot run with.
pub fn validate(config: &CarlinkConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.telegram_token().is_none() {
        result.push(
            Severity::Error,
            "telegram.token",
            "bot token is required (set it in the config or via BOT_TOKEN)",
        );
    }

    if config.registry.database_url.trim().is_empty() {
        result.push(Severity::Error, "registry.database_url", "must not be empty");
    }
    if config.registry.max_connections == 0 {
        result.push(Severity::Error, "registry.max_connections", "must be at least 1");
    }

    if config.resolver.enabled {
        match config.resolver.base_url.as_deref() {
            None | Some("") => result.push(
                Severity::Error,
                "resolver.base_url",
                "resolver is enabled but has no base_url",
            ),
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => result
                .push(
                    Severity::Error,
                    "resolver.base_url",
                    format!("expected an http(s) URL, got {url:?}"),
                ),
            Some(url) if url.starts_with("http://") && config.resolver.api_key.is_some() => result
                .push(
                    Severity::Warning,
                    "resolver.api_key",
                    "API key will be sent over plain http",
                ),
            Some(_) => {},
        }
        if config.resolver.timeout_secs == 0 {
            result.push(Severity::Error, "resolver.timeout_secs", "must be at least 1");
        }
    }

    if config.handshake.timeout_secs == 0 {
        result.push(Severity::Error, "handshake.timeout_secs", "must be at least 1");
    }
    if config.handshake.sweep_interval_secs == 0 {
        result.push(
            Severity::Error,
            "handshake.sweep_interval_secs",
            "must be at least 1",
        );
    } else if config.handshake.sweep_interval_secs > config.handshake.timeout_secs {
        result.push(
            Severity::Warning,
            "handshake.sweep_interval_secs",
            "sweep runs less often than the handshake deadline; unanswered requests may linger",
        );
    }

    result
}
