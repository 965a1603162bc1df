//! User directory seam: handle to identity and identity to profile lookups.

use async_trait::async_trait;

use crate::types::UserId;

/// Result of a directory lookup.
///
/// `Failed` carries the reason for logging only; callers treat it exactly like
/// `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Failed(String),
}

/// A user resolved from a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub is_bot: bool,
}

/// Public profile of a known user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub handle: Option<String>,
    pub display_name: Option<String>,
}

impl Profile {
    /// `@handle`, else the display name, else `None`.
    pub fn label(&self) -> Option<String> {
        if let Some(handle) = self.handle.as_deref().filter(|h| !h.is_empty()) {
            return Some(format!("@{handle}"));
        }
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| n.trim().to_string())
    }
}

/// Identity directory provided by the messaging platform binding.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve a handle (without the `@` marker, case as typed).
    async fn lookup_by_handle(&self, handle: &str) -> Lookup<Identity>;

    /// Fetch the profile of a known identity.
    async fn lookup_by_id(&self, id: UserId) -> Lookup<Profile>;
}
