//! Configuration loading, validation and env substitution.
//!
//! Config files: `murmur.toml`, `murmur.yaml`, `murmur.yml` or `murmur.json`,
//! searched in `./` then the user config directory (`~/.config/murmur/` on
//! Linux).
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{MurmurConfig, TelegramConfig, WhisperConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
