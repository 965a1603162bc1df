//! Read-time authorization.
//!
//! A whisper created for a handle that could not be resolved is bound to the
//! first requester presenting that handle (trust on first use). There is no
//! proof of handle ownership: if a handle moves to another account before the
//! intended recipient opens the whisper, the new owner can claim it. This is an
//! accepted trade-off of having no persistent user registry.

use crate::types::{UserId, Whisper, normalize_handle};

/// Outcome of [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Sender,
    Recipient,
    Denied,
}

/// Decide whether `requester_id` may read `whisper`.
///
/// Binds `whisper.recipient_id` when an unresolved whisper is claimed through
/// a matching handle; once bound, other accounts with the same handle are
/// denied.
pub fn authorize(
    whisper: &mut Whisper,
    requester_id: UserId,
    requester_handle: Option<&str>,
) -> AccessDecision {
    if whisper.sender_id == requester_id {
        return AccessDecision::Sender;
    }
    match whisper.recipient_id {
        Some(id) if id == requester_id => AccessDecision::Recipient,
        Some(_) => AccessDecision::Denied,
        None => {
            let claims = requester_handle
                .map(normalize_handle)
                .is_some_and(|h| !h.is_empty() && h == whisper.recipient_handle);
            if claims {
                whisper.recipient_id = Some(requester_id);
                AccessDecision::Recipient
            } else {
                AccessDecision::Denied
            }
        },
    }
}
