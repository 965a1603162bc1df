//! In-memory whisper table.
//!
//! The map sits behind a `std::sync::Mutex` because every operation on it is a
//! synchronous lookup; directory calls happen before the lock is taken and the
//! guard is never held across `.await`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::SystemTime,
};

use {
    murmur_common::{Clock, epoch_secs},
    tracing::{debug, info, warn},
};

use crate::{
    access::{self, AccessDecision},
    directory::{Directory, Identity, Lookup},
    error::{CreateError, RevealError},
    limits::RelayLimits,
    types::{UserId, Whisper, WhisperId, normalize_handle},
};

/// Store of pending whispers.
pub struct WhisperStore {
    limits: RelayLimits,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn Directory>,
    whispers: Mutex<HashMap<WhisperId, Whisper>>,
}

impl WhisperStore {
    pub fn new(limits: RelayLimits, clock: Arc<dyn Clock>, directory: Arc<dyn Directory>) -> Self {
        Self {
            limits,
            clock,
            directory,
            whispers: Mutex::new(HashMap::new()),
        }
    }

    pub fn limits(&self) -> &RelayLimits {
        &self.limits
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WhisperId, Whisper>> {
        self.whispers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a whisper from `sender_id` to `recipient_handle`.
    ///
    /// The recipient is resolved through the directory on a best-effort basis:
    /// unknown handles and lookup failures store the whisper unresolved, to be
    /// bound on the first matching-handle reveal.
    pub async fn create(
        &self,
        sender_id: UserId,
        recipient_handle: &str,
        text: &str,
    ) -> Result<WhisperId, CreateError> {
        let len = text.chars().count();
        if len > self.limits.max_length {
            return Err(CreateError::TooLong {
                len,
                max: self.limits.max_length,
            });
        }
        if text.trim().is_empty() {
            return Err(CreateError::EmptyText);
        }
        let handle = normalize_handle(recipient_handle);
        if handle.is_empty() {
            return Err(CreateError::EmptyRecipient);
        }

        let recipient_id = match self.resolve_recipient(recipient_handle, &handle).await {
            Some(identity) if identity.is_bot => return Err(CreateError::BotRecipient),
            Some(identity) if identity.id == sender_id => return Err(CreateError::SelfAddressed),
            Some(identity) => Some(identity.id),
            None => None,
        };

        let now = self.clock.now();
        let whisper = Whisper {
            id: WhisperId::generate(),
            sender_id,
            recipient_id,
            recipient_handle: handle,
            text: text.to_string(),
            created_at: now,
            expires_at: now + self.limits.ttl,
        };
        let id = whisper.id.clone();

        info!(
            whisper_id = %id,
            %sender_id,
            resolved = recipient_id.is_some(),
            len,
            expires_at = epoch_secs(whisper.expires_at),
            "whisper created"
        );
        self.lock().insert(id.clone(), whisper);
        Ok(id)
    }

    /// Try the handle as typed, then lower-cased.
    async fn resolve_recipient(&self, as_typed: &str, normalized: &str) -> Option<Identity> {
        let as_typed = as_typed.trim().trim_start_matches('@');
        let mut variants = vec![as_typed];
        if normalized != as_typed {
            variants.push(normalized);
        }

        for variant in variants {
            match self.directory.lookup_by_handle(variant).await {
                Lookup::Found(identity) => return Some(identity),
                Lookup::NotFound => {
                    debug!(handle = variant, "recipient handle not in directory");
                },
                Lookup::Failed(reason) => {
                    warn!(handle = variant, %reason, "recipient lookup failed, storing unresolved");
                },
            }
        }
        None
    }

    /// Fetch a live whisper; an expired one is evicted and reported absent.
    pub fn get(&self, id: &WhisperId) -> Option<Whisper> {
        let now = self.clock.now();
        let mut whispers = self.lock();
        sweep_locked(&mut whispers, now);
        whispers.get(id).cloned()
    }

    /// Look up `id` and authorize `requester_id` in one step.
    ///
    /// Runs under a single lock so two accounts racing to claim the same
    /// unresolved whisper cannot both be bound.
    pub fn open(
        &self,
        id: &WhisperId,
        requester_id: UserId,
        requester_handle: Option<&str>,
    ) -> Result<(Whisper, AccessDecision), RevealError> {
        let now = self.clock.now();
        let mut whispers = self.lock();
        sweep_locked(&mut whispers, now);

        let whisper = whispers.get_mut(id).ok_or(RevealError::NotFound)?;
        let was_unresolved = whisper.recipient_id.is_none();
        match access::authorize(whisper, requester_id, requester_handle) {
            AccessDecision::Denied => {
                debug!(whisper_id = %id, %requester_id, "reveal denied");
                Err(RevealError::Denied)
            },
            decision => {
                if was_unresolved && whisper.recipient_id.is_some() {
                    info!(whisper_id = %id, %requester_id, "recipient bound by handle");
                }
                Ok((whisper.clone(), decision))
            },
        }
    }

    /// Live whispers addressed to `user_id`, or to `handle` while unresolved,
    /// most recent first.
    pub fn list_for(&self, user_id: UserId, handle: Option<&str>) -> Vec<Whisper> {
        let now = self.clock.now();
        let mut whispers = self.lock();
        sweep_locked(&mut whispers, now);

        let mut found: Vec<Whisper> = whispers
            .values()
            .filter(|w| w.is_addressed_to(user_id, handle))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }

    /// Remove every expired whisper and return how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = sweep_locked(&mut self.lock(), now);
        if removed > 0 {
            debug!(removed, "expired whispers swept");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sweep_locked(whispers: &mut HashMap<WhisperId, Whisper>, now: SystemTime) -> usize {
    let before = whispers.len();
    whispers.retain(|_, w| !w.is_expired(now));
    before - whispers.len()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod tests {
    use std::{sync::Mutex as StdMutex, time::Duration};

    use {async_trait::async_trait, murmur_common::ManualClock};

    use super::*;
    use crate::directory::Profile;

    /// Directory backed by a fixed table; handles are matched exactly.
    #[derive(Default)]
    pub(crate) struct FakeDirectory {
        pub users: Vec<(String, Identity, Profile)>,
        pub failing: bool,
        pub handle_queries: StdMutex<Vec<String>>,
    }

    impl FakeDirectory {
        pub fn with_user(mut self, handle: &str, id: u64, is_bot: bool) -> Self {
            self.users.push((
                handle.to_string(),
                Identity {
                    id: UserId(id),
                    is_bot,
                },
                Profile {
                    handle: Some(handle.to_string()),
                    display_name: None,
                },
            ));
            self
        }
    }

    #[async_trait]
    impl Directory for FakeDirectory {
        async fn lookup_by_handle(&self, handle: &str) -> Lookup<Identity> {
            self.handle_queries
                .lock()
                .unwrap()
                .push(handle.to_string());
            if self.failing {
                return Lookup::Failed("directory offline".into());
            }
            self.users
                .iter()
                .find(|(h, ..)| h == handle)
                .map_or(Lookup::NotFound, |(_, identity, _)| {
                    Lookup::Found(identity.clone())
                })
        }

        async fn lookup_by_id(&self, id: UserId) -> Lookup<Profile> {
            if self.failing {
                return Lookup::Failed("directory offline".into());
            }
            self.users
                .iter()
                .find(|(_, identity, _)| identity.id == id)
                .map_or(Lookup::NotFound, |(.., profile)| {
                    Lookup::Found(profile.clone())
                })
        }
    }

    fn store_with(directory: FakeDirectory) -> (WhisperStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch_secs(1_700_000_000));
        let store = WhisperStore::new(
            RelayLimits::default(),
            clock.clone(),
            Arc::new(directory),
        );
        (store, clock)
    }

    const TTL: Duration = Duration::from_secs(3 * 60 * 60);

    #[tokio::test]
    async fn length_boundary() {
        let (store, _) = store_with(FakeDirectory::default());
        let at_limit = "a".repeat(1000);
        let over = "a".repeat(1001);

        assert!(store.create(UserId(1), "bob", &at_limit).await.is_ok());
        assert_eq!(
            store.create(UserId(1), "bob", &over).await,
            Err(CreateError::TooLong {
                len: 1001,
                max: 1000
            })
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn length_counts_characters_not_bytes() {
        let (store, _) = store_with(FakeDirectory::default());
        let text = "ж".repeat(1000);
        assert!(store.create(UserId(1), "bob", &text).await.is_ok());
    }

    #[tokio::test]
    async fn empty_fields_are_rejected() {
        let (store, _) = store_with(FakeDirectory::default());
        assert_eq!(
            store.create(UserId(1), "bob", "   ").await,
            Err(CreateError::EmptyText)
        );
        assert_eq!(
            store.create(UserId(1), "@", "hi").await,
            Err(CreateError::EmptyRecipient)
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn self_addressed_fails() {
        let (store, _) = store_with(FakeDirectory::default().with_user("me", 1, false));
        assert_eq!(
            store.create(UserId(1), "me", "note to self").await,
            Err(CreateError::SelfAddressed)
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn bot_recipient_fails() {
        let (store, _) = store_with(FakeDirectory::default().with_user("helperbot", 9, true));
        assert_eq!(
            store.create(UserId(1), "HelperBot", "hi").await,
            Err(CreateError::BotRecipient)
        );
    }

    #[tokio::test]
    async fn resolved_recipient_is_stored() {
        let (store, _) = store_with(FakeDirectory::default().with_user("bob", 2, false));
        let id = store.create(UserId(1), "@Bob", "hi").await.unwrap();
        let w = store.get(&id).unwrap();
        assert_eq!(w.recipient_id, Some(UserId(2)));
        assert_eq!(w.recipient_handle, "bob");
        assert_eq!(w.expires_at, w.created_at + TTL);
    }

    #[tokio::test]
    async fn handle_tried_as_typed_then_lowercased() {
        let dir = Arc::new(FakeDirectory::default());
        let store = WhisperStore::new(
            RelayLimits::default(),
            Arc::new(ManualClock::at_epoch_secs(0)),
            dir.clone(),
        );

        store.create(UserId(1), "@Bob", "hi").await.unwrap();
        assert_eq!(*dir.handle_queries.lock().unwrap(), vec![
            "Bob".to_string(),
            "bob".to_string()
        ]);

        // Already lower-case: a single lookup.
        store.create(UserId(1), "carol", "hi").await.unwrap();
        assert_eq!(dir.handle_queries.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn lookup_failure_degrades_to_unresolved() {
        let dir = FakeDirectory {
            failing: true,
            ..Default::default()
        };
        let (store, _) = store_with(dir);
        let id = store.create(UserId(1), "Bob", "hi").await.unwrap();
        let w = store.get(&id).unwrap();
        assert_eq!(w.recipient_id, None);
        assert_eq!(w.recipient_handle, "bob");
    }

    #[tokio::test]
    async fn ttl_boundary() {
        let (store, clock) = store_with(FakeDirectory::default());
        let id = store.create(UserId(1), "bob", "hi").await.unwrap();

        clock.advance(TTL - Duration::from_millis(1));
        assert!(store.get(&id).is_some());

        clock.advance(Duration::from_millis(1));
        assert!(store.get(&id).is_none());
        // Evicted, not just hidden.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn reads_do_not_consume() {
        let (store, _) = store_with(FakeDirectory::default().with_user("bob", 2, false));
        let id = store.create(UserId(1), "bob", "same text").await.unwrap();
        for _ in 0..3 {
            let (w, decision) = store.open(&id, UserId(2), None).unwrap();
            assert_eq!(decision, AccessDecision::Recipient);
            assert_eq!(w.text, "same text");
        }
    }

    #[tokio::test]
    async fn open_distinguishes_nothing_about_missing_whispers() {
        let (store, clock) = store_with(FakeDirectory::default());
        let id = store.create(UserId(1), "bob", "hi").await.unwrap();

        assert_eq!(
            store.open(&WhisperId::from("nope"), UserId(1), None),
            Err(RevealError::NotFound)
        );
        clock.advance(TTL);
        assert_eq!(store.open(&id, UserId(1), None), Err(RevealError::NotFound));
    }

    #[tokio::test]
    async fn open_binds_first_claimant_only() {
        let (store, _) = store_with(FakeDirectory::default());
        let id = store.create(UserId(1), "bob", "hi").await.unwrap();

        assert_eq!(
            store.open(&id, UserId(2), Some("Bob")).map(|(_, d)| d),
            Ok(AccessDecision::Recipient)
        );
        assert_eq!(store.get(&id).unwrap().recipient_id, Some(UserId(2)));
        assert_eq!(
            store.open(&id, UserId(3), Some("bob")).map(|(_, d)| d),
            Err(RevealError::Denied)
        );
    }

    #[tokio::test]
    async fn list_for_matches_id_and_unresolved_handle() {
        let dir = FakeDirectory::default().with_user("carol", 3, false);
        let (store, clock) = store_with(dir);

        let by_id = store.create(UserId(1), "carol", "first").await.unwrap();
        clock.advance(Duration::from_secs(1));
        let by_handle = store.create(UserId(1), "Dave", "second").await.unwrap();
        clock.advance(Duration::from_secs(1));
        let newest = store.create(UserId(4), "carol", "third").await.unwrap();
        store.create(UserId(1), "erin", "other").await.unwrap();

        let ids: Vec<WhisperId> = store
            .list_for(UserId(3), None)
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, vec![newest.clone(), by_id.clone()]);

        // Handle only matters for unresolved whispers.
        let ids: Vec<WhisperId> = store
            .list_for(UserId(5), Some("DAVE"))
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, vec![by_handle.clone()]);
        assert!(store.list_for(UserId(5), Some("carol")).is_empty());
        assert!(store.list_for(UserId(5), None).is_empty());
    }

    #[tokio::test]
    async fn list_for_skips_expired() {
        let (store, clock) = store_with(FakeDirectory::default().with_user("bob", 2, false));
        store.create(UserId(1), "bob", "old").await.unwrap();
        clock.advance(TTL - Duration::from_secs(10));
        store.create(UserId(1), "bob", "new").await.unwrap();
        clock.advance(Duration::from_secs(10));

        let texts: Vec<String> = store
            .list_for(UserId(2), None)
            .into_iter()
            .map(|w| w.text)
            .collect();
        assert_eq!(texts, vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn sweep_counts_removed() {
        let (store, clock) = store_with(FakeDirectory::default());
        store.create(UserId(1), "a", "1").await.unwrap();
        store.create(UserId(1), "b", "2").await.unwrap();
        clock.advance(Duration::from_secs(60));
        store.create(UserId(1), "c", "3").await.unwrap();

        assert_eq!(store.sweep_expired(), 0);
        clock.advance(TTL - Duration::from_secs(60));
        assert_eq!(store.sweep_expired(), 2);
        assert_eq!(store.len(), 1);
    }
}
