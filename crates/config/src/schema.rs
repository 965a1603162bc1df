//! Config schema.

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

/// Root of `murmur.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MurmurConfig {
    pub telegram: TelegramConfig,
    pub whisper: WhisperConfig,
}

/// Bot API connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather. Usually supplied as `${MURMUR_TELEGRAM_TOKEN}`.
    pub token: Option<Secret<String>>,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u32,
    /// HTTP client timeout; must exceed the poll timeout.
    pub request_timeout_secs: u64,
    /// Override for the Bot API base URL (local Bot API servers, tests).
    pub api_url: Option<String>,
}

impl TelegramConfig {
    /// The token, if set and not blank.
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
            .filter(|t| !t.trim().is_empty())
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            poll_timeout_secs: 30,
            request_timeout_secs: 45,
            api_url: None,
        }
    }
}

/// Relay limits and housekeeping.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// Lifetime of a whisper from creation.
    pub ttl_secs: u64,
    /// Longest accepted whisper, in characters.
    pub max_length: usize,
    /// Longest whisper revealed in an alert; longer ones are sent as messages.
    pub alert_max_length: usize,
    /// Minimum spacing between two reveals by the same user.
    pub view_cooldown_secs: u64,
    /// Maximum whispers listed in the inbox.
    pub inbox_limit: usize,
    /// Characters of whisper text shown in an inbox entry.
    pub preview_length: usize,
    /// How often expired whispers are purged in the background.
    pub sweep_interval_secs: u64,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3 * 60 * 60,
            max_length: 1000,
            alert_max_length: 170,
            view_cooldown_secs: 5,
            inbox_limit: 50,
            preview_length: 50,
            sweep_interval_secs: 300,
        }
    }
}
