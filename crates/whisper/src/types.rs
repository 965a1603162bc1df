use std::{
    fmt,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};

/// Stable identity of a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque whisper identifier (hyphenated UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WhisperId(String);

impl WhisperId {
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WhisperId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for WhisperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pending whisper held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whisper {
    pub id: WhisperId,
    pub sender_id: UserId,
    /// Resolved recipient; `None` until resolved at creation or bound on the
    /// first matching-handle reveal.
    pub recipient_id: Option<UserId>,
    /// Lower-cased handle without the `@` marker.
    pub recipient_handle: String,
    pub text: String,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl Whisper {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: SystemTime) -> Duration {
        self.expires_at.duration_since(now).unwrap_or_default()
    }

    /// Whether this whisper belongs in the inbox of `user_id` / `handle`.
    pub(crate) fn is_addressed_to(&self, user_id: UserId, handle: Option<&str>) -> bool {
        match self.recipient_id {
            Some(id) => id == user_id,
            None => handle.is_some_and(|h| normalize_handle(h) == self.recipient_handle),
        }
    }
}

/// Lower-case a handle and drop a leading `@`.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}
