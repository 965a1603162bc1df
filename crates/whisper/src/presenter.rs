//! Rendering of revealed whispers and reveal notices.

use crate::{transport::DeliveryTarget, types::Whisper};

/// Label used when neither a handle nor a name can be resolved.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Longest alert text Telegram accepts, in characters.
pub const ALERT_TEXT_LIMIT: usize = 200;

/// How a revealed whisper reaches the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reveal {
    /// Short enough for an inline alert; plain text.
    Alert(String),
    /// Full HTML message to send out of band.
    Deliver { html: String },
}

/// Render `whisper` for its sender or recipient.
///
/// `counterpart` names the other party: the recipient when `is_sender`, the
/// sender otherwise. Texts up to `alert_max_length` become an alert unless the
/// heading pushes the alert past [`ALERT_TEXT_LIMIT`]; then they are delivered.
pub fn present(
    whisper: &Whisper,
    is_sender: bool,
    counterpart: &str,
    alert_max_length: usize,
) -> Reveal {
    let counterpart = if counterpart.trim().is_empty() {
        UNKNOWN_LABEL
    } else {
        counterpart
    };

    if whisper.text.chars().count() <= alert_max_length {
        let alert = format!("📩 {}:\n\n{}", heading(is_sender, counterpart), whisper.text);
        if alert.chars().count() <= ALERT_TEXT_LIMIT {
            return Reveal::Alert(alert);
        }
    }

    let heading = escape_html(&heading(is_sender, counterpart));
    Reveal::Deliver {
        html: format!("📩 <b>{heading}</b>\n\n{}", escape_html(&whisper.text)),
    }
}

fn heading(is_sender: bool, counterpart: &str) -> String {
    if is_sender {
        format!("Your whisper for {counterpart}")
    } else {
        format!("Whisper from {counterpart}")
    }
}

/// Acknowledgment shown after a long whisper was delivered.
pub fn delivered_notice(target: DeliveryTarget) -> &'static str {
    match target {
        DeliveryTarget::Chat(_) => "✅ Whisper sent to the chat",
        DeliveryTarget::Direct(_) => "✅ Whisper sent to your private messages",
    }
}

pub const DELIVERY_FAILED_NOTICE: &str =
    "⚠️ Couldn't send the whisper. Open a private chat with me first.";
pub const NOT_FOUND_NOTICE: &str = "⚠️ Whisper not found or expired";
pub const NO_ACCESS_NOTICE: &str = "⚠️ You don't have access to this whisper";
pub const GENERIC_ERROR_NOTICE: &str = "⚠️ Something went wrong while opening the whisper";

pub fn cooldown_notice(remaining_secs: u64) -> String {
    format!("⏳ Please wait {remaining_secs} seconds before viewing again")
}

/// Escape text for Telegram HTML parse mode.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
