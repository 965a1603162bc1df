//! Inline suggestion cards.
//!
//! Titles and descriptions are plain text; bodies are Telegram-style HTML.

use std::time::Duration;

use crate::{
    error::CreateError,
    presenter::escape_html,
    transport::{Suggestion, reveal_token},
    types::Whisper,
};

pub fn usage_hint() -> Suggestion {
    Suggestion {
        id: "help_hint".into(),
        title: "💡 Send a whisper".into(),
        description: "Type: your text @recipient".into(),
        body_html: "💡 <b>How to send a whisper:</b>\n\n\
                    Type your text followed by the recipient's username:\n\n\
                    <i>your text @recipient</i>\n\n\
                    Example: <i>Hi! How are you? @username</i>\n\n\
                    📩 The whisper is posted to the chat with a button to view it."
            .into(),
        reveal_token: None,
    }
}

pub fn format_error(self_handle: &str) -> Suggestion {
    Suggestion {
        id: "parse_error".into(),
        title: "⚠️ Format error".into(),
        description: "Check the format: @bot text @recipient".into(),
        body_html: format!(
            "⚠️ Invalid format. Use: @{} your text @recipient",
            escape_html(self_handle)
        ),
        reveal_token: None,
    }
}

pub fn format_help(self_handle: &str) -> Suggestion {
    let handle = escape_html(self_handle);
    Suggestion {
        id: "help".into(),
        title: "💡 Whisper format".into(),
        description: format!("Use: @{self_handle} your text @recipient"),
        body_html: format!(
            "💡 To send a whisper, use the format:\n@{handle} your text @recipient\n\n\
             Example: @{handle} Hi! @username"
        ),
        reveal_token: None,
    }
}

/// Card posted by the sender; its button reveals the whisper.
pub fn whisper_card(whisper_id: &str, sender_label: &str, recipient: &str) -> Suggestion {
    Suggestion {
        id: whisper_id.to_string(),
        title: "📩 Send whisper".into(),
        description: format!("Whispered message for @{recipient}"),
        body_html: format!(
            "📩 <b>Whispered message</b>\n\nFrom: {}\nTo: @{}\n\n\
             Press the button below to view the message",
            escape_html(sender_label),
            escape_html(recipient)
        ),
        reveal_token: Some(reveal_token(whisper_id)),
    }
}

/// Advisory card for a refused creation.
pub fn creation_failed(error: &CreateError, recipient: &str) -> Suggestion {
    let handle = escape_html(recipient);
    let body_html = match error {
        CreateError::SelfAddressed => "⚠️ You can't send a whisper to yourself.".to_string(),
        CreateError::BotRecipient => format!("⚠️ Can't send a whisper to bot @{handle}"),
        CreateError::TooLong { max, .. } => {
            format!("⚠️ The whisper is too long, the limit is {max} characters.")
        },
        CreateError::EmptyText | CreateError::EmptyRecipient => {
            format!("⚠️ Couldn't send the whisper to @{handle}.")
        },
    };
    Suggestion {
        id: "error".into(),
        title: "⚠️ Error".into(),
        description: format!("Couldn't send the whisper to @{recipient}"),
        body_html,
        reveal_token: None,
    }
}

/// Inbox entry for a pending whisper.
pub fn inbox_card(
    whisper: &Whisper,
    sender_label: &str,
    preview_length: usize,
    remaining: Duration,
) -> Suggestion {
    Suggestion {
        id: whisper.id.to_string(),
        title: format!("📩 Whisper from {sender_label}"),
        description: format!(
            "{} (left: {})",
            preview(&whisper.text, preview_length),
            format_remaining(remaining)
        ),
        body_html: "📩 You have a whisper. Press the button below to view it.".into(),
        reveal_token: Some(reveal_token(whisper.id.as_str())),
    }
}

/// First `max_chars` characters, with an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

/// `"{h}h {m}m"`, or `"{m}m"` under an hour.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
