use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::MurmurConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["murmur.toml", "murmur.yaml", "murmur.yml", "murmur.json"];

/// Environment variable that overrides `telegram.token`.
pub const TOKEN_ENV: &str = "MURMUR_TELEGRAM_TOKEN";
/// Environment variable that overrides `telegram.api_url`.
pub const API_URL_ENV: &str = "MURMUR_TELEGRAM_API_URL";

/// Load config from the given path (any supported format), then apply
/// environment overrides.
pub fn load_config(path: &Path) -> anyhow::Result<MurmurConfig> {
    let value = load_config_value(path)?;
    let config: MurmurConfig = serde_json::from_value(value)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
    Ok(apply_env_overrides(config))
}

/// Read and parse a config file into a generic value, with `${VAR}`
/// placeholders substituted.
pub fn load_config_value(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config_value(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./murmur.{toml,yaml,yml,json}`
/// 2. `<user config dir>/murmur.{toml,yaml,yml,json}`
///
/// Falls back to defaults (plus environment overrides) when no file is found
/// or the file cannot be loaded.
pub fn discover_and_load() -> MurmurConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    apply_env_overrides(MurmurConfig::default())
}

/// Find the first config file in the standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// The user-global config directory, e.g. `~/.config/murmur/`.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "murmur").map(|d| d.config_dir().to_path_buf())
}

/// Apply `MURMUR_*` environment variables on top of file values.
pub fn apply_env_overrides(config: MurmurConfig) -> MurmurConfig {
    apply_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_overrides_with(
    mut config: MurmurConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> MurmurConfig {
    if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
        config.telegram.token = Some(Secret::new(token));
    }
    if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
        config.telegram.api_url = Some(url);
    }
    config
}

fn parse_config_value(raw: &str, path: &Path) -> anyhow::Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(raw)?;
            // An empty YAML document parses as null.
            if v.is_null() {
                return Ok(serde_json::Value::Object(serde_json::Map::new()));
            }
            Ok(serde_json::to_value(v)?)
        },
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
