//! Config loading for the binary and `carlink check-config`.

use std::path::{Path, PathBuf};

use {
    anyhow::{Result, bail},
    carlink_config::{CarlinkConfig, Severity, ValidationResult, validate},
    tracing::{error, warn},
};

/// Load the config from `explicit` or by discovery. Env overrides apply
/// in both cases.
pub fn load(explicit: Option<&Path>) -> Result<(CarlinkConfig, Option<PathBuf>)> {
    match explicit {
        Some(path) => {
            let mut config = carlink_config::load_config(path)?;
            carlink_config::apply_env_overrides(&mut config);
            Ok((config, Some(path.to_path_buf())))
        },
        None => Ok(carlink_config::discover_and_load()),
    }
}

/// Log warnings and refuse to start on errors.
pub fn ensure_valid(config: &CarlinkConfig) -> Result<()> {
    let result = validate(config);
    for diagnostic in &result.diagnostics {
        match diagnostic.severity {
            Severity::Error => error!(path = %diagnostic.path, "{}", diagnostic.message),
            Severity::Warning => warn!(path = %diagnostic.path, "{}", diagnostic.message),
        }
    }
    if result.has_errors() {
        bail!(
            "invalid configuration ({} error(s)); run `carlink check-config` for details",
            error_count(&result)
        );
    }
    Ok(())
}

pub fn check_config(config: &CarlinkConfig, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => println!("config: {}", path.display()),
        None => println!("config: none found, using defaults and environment"),
    }

    let result = validate(config);
    print!("{}", render(&result));

    if result.has_errors() {
        bail!("{} error(s) found", error_count(&result));
    }
    Ok(())
}

fn render(result: &ValidationResult) -> String {
    if result.diagnostics.is_empty() {
        return "ok: no problems found\n".to_string();
    }
    result
        .diagnostics
        .iter()
        .map(|d| format!("{d}\n"))
        .collect()
}

fn error_count(result: &ValidationResult) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::io::Write};

    #[test]
    fn explicit_file_is_loaded() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[telegram]\ntoken = \"123:abc\"\n\n[handshake]\ntimeout_secs = 60"
        )
        .unwrap();

        let (config, path) = load(Some(file.path())).unwrap();
        assert_eq!(path.as_deref(), Some(file.path()));
        assert_eq!(config.handshake.timeout_secs, 60);
        assert!(config.telegram_token().is_some());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(load(Some(Path::new("/nonexistent/carlink.toml"))).is_err());
    }

    #[test]
    fn render_lists_diagnostics() {
        let result = validate(&CarlinkConfig::default());
        let text = render(&result);
        assert!(result.has_errors());
        assert!(text.contains("telegram"));
        assert!(error_count(&result) >= 1);
    }
}
