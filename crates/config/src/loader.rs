use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::CarlinkConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "carlink.toml",
    "carlink.yaml",
    "carlink.yml",
    "carlink.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<CarlinkConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./carlink.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/carlink/carlink.{toml,yaml,yml,json}` (user-global)
///
/// Returns `CarlinkConfig::default()` if no config file is found or the file
/// fails to parse. Environment overrides are applied either way.
pub fn discover_and_load() -> (CarlinkConfig, Option<PathBuf>) {
    let path = find_config_file();
    let mut config = match &path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                CarlinkConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            CarlinkConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    (config, path)
}

/// Override config values from well-known environment variables.
///
/// `BOT_TOKEN` sets the Telegram token, `CARLINK_DATABASE_URL` the registry
/// database and `CARLINK_RESOLVER_URL` enables the external resolver.
pub fn apply_env_overrides(config: &mut CarlinkConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut CarlinkConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(token) = lookup("BOT_TOKEN") {
        if !config.telegram.is_object() {
            config.telegram = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(obj) = config.telegram.as_object_mut() {
            obj.insert("token".into(), serde_json::Value::String(token));
        }
    }
    if let Some(url) = lookup("CARLINK_DATABASE_URL") {
        config.registry.database_url = url;
    }
    if let Some(url) = lookup("CARLINK_RESOLVER_URL") {
        config.resolver.enabled = true;
        config.resolver.base_url = Some(url);
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/carlink/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "carlink").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<CarlinkConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carlink.toml");
        std::fs::write(
            &path,
            r#"
            [telegram]
            token = "abc"

            [registry]
            database_url = "sqlite::memory:"
            "#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.telegram_token(), Some("abc"));
        assert_eq!(cfg.registry.database_url, "sqlite::memory:");
    }

    #[test]
    fn loads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carlink.yaml");
        std::fs::write(&path, "handshake:\n  timeout_secs: 42\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.handshake.timeout_secs, 42);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carlink.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = CarlinkConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            "BOT_TOKEN" => Some("999:XYZ".into()),
            "CARLINK_RESOLVER_URL" => Some("https://plates.example".into()),
            "CARLINK_DATABASE_URL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.telegram_token(), Some("999:XYZ"));
        assert!(cfg.resolver.enabled);
        assert_eq!(cfg.resolver.base_url.as_deref(), Some("https://plates.example"));
        // Empty values are ignored.
        assert_eq!(cfg.registry.database_url, "sqlite://carlink.db?mode=rwc");
    }
}
