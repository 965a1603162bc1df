//! User directory backed by update traffic and `getChat`.
//!
//! The Bot API has no user search: a handle only resolves if the user has been
//! seen in an update, or if `getChat` happens to know it.

use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use {
    async_trait::async_trait,
    murmur_whisper::{Directory, Identity, Lookup, Profile, UserId},
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{ChatId, Recipient, User},
    },
    tracing::debug,
};

/// Users remembered before the least recently seen one is forgotten.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct SeenUser {
    is_bot: bool,
    profile: Profile,
    /// Value of `Seen::tick` when the user was last observed.
    last_seen: u64,
}

#[derive(Default)]
struct Seen {
    /// Lower-cased handle to user id.
    by_handle: HashMap<String, UserId>,
    by_id: HashMap<UserId, SeenUser>,
    tick: u64,
}

impl Seen {
    fn forget_handle(&mut self, handle: &str, id: UserId) {
        let key = handle.to_lowercase();
        if self.by_handle.get(&key) == Some(&id) {
            self.by_handle.remove(&key);
        }
    }

    fn evict_oldest(&mut self) {
        let Some(oldest) = self
            .by_id
            .iter()
            .min_by_key(|(_, u)| u.last_seen)
            .map(|(id, _)| *id)
        else {
            return;
        };
        if let Some(handle) = self.by_id.remove(&oldest).and_then(|u| u.profile.handle) {
            self.forget_handle(&handle, oldest);
        }
    }
}

/// Bounded to `capacity` users; the least recently seen is evicted first.
pub struct TelegramDirectory {
    bot: Bot,
    capacity: usize,
    seen: RwLock<Seen>,
}

impl TelegramDirectory {
    pub fn new(bot: Bot) -> Self {
        Self::with_capacity(bot, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(bot: Bot, capacity: usize) -> Self {
        Self {
            bot,
            capacity: capacity.max(1),
            seen: RwLock::new(Seen::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Seen> {
        self.seen.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Seen> {
        self.seen.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a user observed in an update.
    pub fn remember(&self, user: &User) {
        let id = UserId(user.id.0);
        let profile = Profile {
            handle: user.username.clone(),
            display_name: Some(user.full_name()).filter(|n| !n.trim().is_empty()),
        };
        let mut seen = self.write();
        seen.tick += 1;
        let last_seen = seen.tick;
        let previous = seen.by_id.get(&id).and_then(|u| u.profile.handle.clone());
        match previous {
            // Handles can move between accounts; drop the stale mapping.
            Some(previous) => seen.forget_handle(&previous, id),
            None if !seen.by_id.contains_key(&id) && seen.by_id.len() >= self.capacity => {
                seen.evict_oldest();
            },
            None => {},
        }
        if let Some(handle) = &user.username {
            seen.by_handle.insert(handle.to_lowercase(), id);
        }
        seen.by_id.insert(id, SeenUser {
            is_bot: user.is_bot,
            profile,
            last_seen,
        });
    }

    pub fn known_users(&self) -> usize {
        self.read().by_id.len()
    }

    fn cached_by_handle(&self, handle: &str) -> Option<Identity> {
        let seen = self.read();
        let id = *seen.by_handle.get(&handle.to_lowercase())?;
        let user = seen.by_id.get(&id)?;
        Some(Identity {
            id,
            is_bot: user.is_bot,
        })
    }
}

#[async_trait]
impl Directory for TelegramDirectory {
    async fn lookup_by_handle(&self, handle: &str) -> Lookup<Identity> {
        if let Some(identity) = self.cached_by_handle(handle) {
            return Lookup::Found(identity);
        }

        match self
            .bot
            .get_chat(Recipient::ChannelUsername(format!("@{handle}")))
            .await
        {
            Ok(chat) if chat.is_private() => match u64::try_from(chat.id.0) {
                Ok(id) => Lookup::Found(Identity {
                    id: UserId(id),
                    // Telegram requires bot usernames to end in "bot".
                    is_bot: chat
                        .username()
                        .is_some_and(|u| u.to_lowercase().ends_with("bot")),
                }),
                Err(_) => Lookup::NotFound,
            },
            Ok(_) => {
                debug!(handle, "handle belongs to a group or channel");
                Lookup::NotFound
            },
            Err(e) if is_not_found(&e) => Lookup::NotFound,
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }

    async fn lookup_by_id(&self, id: UserId) -> Lookup<Profile> {
        if let Some(user) = self.read().by_id.get(&id) {
            return Lookup::Found(user.profile.clone());
        }
        let Ok(chat_id) = i64::try_from(id.0) else {
            return Lookup::NotFound;
        };

        match self.bot.get_chat(ChatId(chat_id)).await {
            Ok(chat) => Lookup::Found(Profile {
                handle: chat.username().map(str::to_string),
                display_name: chat.first_name().map(str::to_string),
            }),
            Err(e) if is_not_found(&e) => Lookup::NotFound,
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }
}

fn is_not_found(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Api(ApiError::ChatNotFound | ApiError::UserNotFound)
    )
}
