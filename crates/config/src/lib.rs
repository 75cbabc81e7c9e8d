//! Configuration loading, validation, and env substitution.
//!
//! Config files: `carlink.toml`, `carlink.yaml`, or `carlink.json`
//! Searched in `./` then `~/.config/carlink/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all
//! string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{CarlinkConfig, HandshakeConfig, RegistryConfig, ResolverConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
