//! Messaging-surface shapes and the outbound delivery seam.

use async_trait::async_trait;

use crate::{error::Result, types::UserId};

/// Callback payload prefix of the "view whisper" button.
pub const REVEAL_TOKEN_PREFIX: &str = "whisper_view_";

/// How long clients may cache a suggestion batch.
pub const SUGGESTION_CACHE_SECS: u32 = 1;

/// One entry of an inline suggestion list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub id: String,
    pub title: String,
    pub description: String,
    /// HTML message posted when the suggestion is picked.
    pub body_html: String,
    /// Reveal token for a "view" button, if the card carries one.
    pub reveal_token: Option<String>,
}

/// Answer to an addressing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionBatch {
    pub results: Vec<Suggestion>,
    pub cache_time_secs: u32,
    /// Results depend on who asked and must not be shared across users.
    pub personal: bool,
}

impl SuggestionBatch {
    pub fn new(results: Vec<Suggestion>) -> Self {
        Self {
            results,
            cache_time_secs: SUGGESTION_CACHE_SECS,
            personal: true,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Short ephemeral answer to a reveal action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    /// Modal alert instead of a transient toast.
    pub show_alert: bool,
}

impl Notice {
    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            show_alert: true,
        }
    }

    pub fn toast(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            show_alert: false,
        }
    }
}

/// Where a long whisper is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTarget {
    /// The chat the reveal button was pressed in.
    Chat(i64),
    /// A private chat with the requester.
    Direct(UserId),
}

/// Outbound message delivery provided by the platform binding.
#[async_trait]
pub trait RevealTransport: Send + Sync {
    /// Send an HTML message. Fails when the target is unreachable, e.g. the
    /// user never opened a private chat with the bot.
    async fn send_html(&self, target: DeliveryTarget, html: &str) -> Result<()>;
}

/// Build the reveal token for a whisper id.
pub fn reveal_token(whisper_id: &str) -> String {
    format!("{REVEAL_TOKEN_PREFIX}{whisper_id}")
}

/// Extract the whisper id from a reveal token.
pub fn parse_reveal_token(token: &str) -> Option<&str> {
    token
        .strip_prefix(REVEAL_TOKEN_PREFIX)
        .filter(|id| !id.is_empty())
}
