//! Addressing-string parser.
//!
//! Accepts free text such as `@mybot see you at 8 @bob` or `see you at 8 @bob`
//! and splits it into the message text and the recipient handle. Only the last
//! `@` is significant, so the message itself may contain markers.

/// Marker that introduces a handle.
pub const MARKER: char = '@';

/// Punctuation trimmed from the end of a recipient handle.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

/// Message text and recipient handle, both non-empty.
///
/// The handle keeps the case it was typed in; the store normalizes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addressed {
    pub text: String,
    pub recipient: String,
}

/// What an addressing request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressQuery {
    /// A whisper to create.
    Whisper(Addressed),
    /// Nothing typed yet.
    Empty,
    /// Just the self-mention: show the requester's pending whispers.
    Inbox,
    /// Starts with the self-mention but has no usable `text @recipient` tail.
    Malformed,
    /// Anything else.
    Unrecognized,
}

/// Parse `raw`, stripping a leading self-mention (`@mybot`, `mybot`, any case)
/// when present.
pub fn parse(raw: &str, self_handle: &str) -> Option<Addressed> {
    let trimmed = raw.trim();
    let remainder = strip_self_mention(trimmed, self_handle).unwrap_or(trimmed);
    split_last_marker(remainder)
}

/// Parse `raw` as-is, without looking for a self-mention.
pub fn parse_bare(raw: &str) -> Option<Addressed> {
    split_last_marker(raw.trim())
}

/// Classify an addressing request.
pub fn classify(raw: &str, self_handle: &str) -> AddressQuery {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return AddressQuery::Empty;
    }
    if let Some(addressed) = parse(trimmed, self_handle) {
        return AddressQuery::Whisper(addressed);
    }
    match strip_self_mention(trimmed, self_handle) {
        Some("") => AddressQuery::Inbox,
        Some(_) => AddressQuery::Malformed,
        None => AddressQuery::Unrecognized,
    }
}

/// Return what follows a leading self-mention, trimmed, or `None` when `input`
/// does not start with one.
///
/// The mention must end at a word boundary, so `mybotanist` is not a mention
/// of `mybot`.
fn strip_self_mention<'a>(input: &'a str, self_handle: &str) -> Option<&'a str> {
    let handle = self_handle.trim().trim_start_matches(MARKER);
    if handle.is_empty() {
        return None;
    }
    let body = input.strip_prefix(MARKER).unwrap_or(input);
    let head = body.get(..handle.len())?;
    if !head.eq_ignore_ascii_case(handle) {
        return None;
    }
    let rest = body.get(handle.len()..)?;
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

fn split_last_marker(input: &str) -> Option<Addressed> {
    let idx = input.rfind(MARKER)?;
    let text = input[..idx].trim();
    let after = input[idx + MARKER.len_utf8()..].trim();
    let recipient = after
        .split_whitespace()
        .next()?
        .trim_end_matches(TRAILING_PUNCTUATION);

    if text.is_empty() || recipient.is_empty() {
        return None;
    }
    Some(Addressed {
        text: text.to_string(),
        recipient: recipient.to_string(),
    })
}
