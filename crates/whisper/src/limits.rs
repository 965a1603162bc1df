use std::time::Duration;

use murmur_config::WhisperConfig;

/// How long a whisper lives after creation.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// Maximum whisper length in characters.
pub const DEFAULT_MAX_LENGTH: usize = 1000;

/// Longest text still shown as an inline alert.
pub const DEFAULT_ALERT_MAX_LENGTH: usize = 170;

/// Minimum gap between two admitted reveals by the same user.
pub const DEFAULT_VIEW_COOLDOWN: Duration = Duration::from_secs(5);

/// Maximum number of inbox entries returned for one query.
pub const DEFAULT_INBOX_LIMIT: usize = 50;

/// Characters of text shown in an inbox preview.
pub const DEFAULT_PREVIEW_LENGTH: usize = 50;

/// Runtime limits of the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayLimits {
    pub ttl: Duration,
    pub max_length: usize,
    pub alert_max_length: usize,
    pub view_cooldown: Duration,
    pub inbox_limit: usize,
    pub preview_length: usize,
}

impl Default for RelayLimits {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_length: DEFAULT_MAX_LENGTH,
            alert_max_length: DEFAULT_ALERT_MAX_LENGTH,
            view_cooldown: DEFAULT_VIEW_COOLDOWN,
            inbox_limit: DEFAULT_INBOX_LIMIT,
            preview_length: DEFAULT_PREVIEW_LENGTH,
        }
    }
}

impl From<&WhisperConfig> for RelayLimits {
    fn from(cfg: &WhisperConfig) -> Self {
        Self {
            ttl: Duration::from_secs(cfg.ttl_secs),
            max_length: cfg.max_length,
            alert_max_length: cfg.alert_max_length,
            view_cooldown: Duration::from_secs(cfg.view_cooldown_secs),
            inbox_limit: cfg.inbox_limit,
            preview_length: cfg.preview_length,
        }
    }
}
