//! Request handling on top of the store, cooldown gate and presenter.
//!
//! [`WhisperRelay`] turns platform-neutral addressing and reveal requests into
//! suggestion batches and notices. Every failure is folded into a neutral
//! answer here; nothing propagates to the platform binding.

use std::sync::Arc;

use {
    murmur_common::Clock,
    tracing::{debug, info, warn},
};

use crate::{
    access::AccessDecision,
    cards,
    cooldown::{Admission, CooldownGate},
    directory::{Directory, Lookup},
    error::{CreateError, RevealError},
    limits::RelayLimits,
    parser::{self, AddressQuery, Addressed},
    presenter::{self, Reveal, UNKNOWN_LABEL},
    store::WhisperStore,
    transport::{DeliveryTarget, Notice, RevealTransport, SuggestionBatch, parse_reveal_token},
    types::{UserId, Whisper, WhisperId},
};

/// Free text typed into the inline suggestion box.
#[derive(Debug, Clone)]
pub struct AddressRequest {
    pub raw: String,
    pub requester_id: UserId,
    pub requester_handle: Option<String>,
}

/// A press of a "view whisper" button.
#[derive(Debug, Clone)]
pub struct RevealRequest {
    pub token: String,
    pub requester_id: UserId,
    pub requester_handle: Option<String>,
    /// Chat the button lives in, when the platform reports one.
    pub chat_id: Option<i64>,
}

/// The whisper relay: one per bot identity.
pub struct WhisperRelay {
    self_handle: String,
    limits: RelayLimits,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn Directory>,
    store: WhisperStore,
    cooldown: CooldownGate,
}

impl WhisperRelay {
    pub fn new(
        self_handle: impl Into<String>,
        limits: RelayLimits,
        clock: Arc<dyn Clock>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        let store = WhisperStore::new(limits.clone(), Arc::clone(&clock), Arc::clone(&directory));
        let cooldown = CooldownGate::new(limits.view_cooldown, Arc::clone(&clock));
        Self {
            self_handle: self_handle.into(),
            limits,
            clock,
            directory,
            store,
            cooldown,
        }
    }

    pub fn self_handle(&self) -> &str {
        &self.self_handle
    }

    pub fn store(&self) -> &WhisperStore {
        &self.store
    }

    /// Drop expired whispers; called from the periodic sweep task.
    pub fn sweep_expired(&self) -> usize {
        self.store.sweep_expired()
    }

    /// Answer an addressing request with suggestion cards.
    pub async fn handle_address(&self, req: &AddressRequest) -> SuggestionBatch {
        match parser::classify(&req.raw, &self.self_handle) {
            AddressQuery::Whisper(addressed) => self.create_whisper(req, addressed).await,
            AddressQuery::Empty => SuggestionBatch::new(vec![cards::usage_hint()]),
            AddressQuery::Inbox => self.inbox(req).await,
            AddressQuery::Malformed => {
                SuggestionBatch::new(vec![cards::format_error(&self.self_handle)])
            },
            AddressQuery::Unrecognized => {
                SuggestionBatch::new(vec![cards::format_help(&self.self_handle)])
            },
        }
    }

    async fn create_whisper(&self, req: &AddressRequest, addressed: Addressed) -> SuggestionBatch {
        let Addressed { text, recipient } = addressed;
        match self.store.create(req.requester_id, &recipient, &text).await {
            Ok(id) => {
                let sender = self.label_for(req.requester_id).await;
                let sender = sender
                    .or_else(|| req.requester_handle.as_deref().map(|h| format!("@{h}")))
                    .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
                SuggestionBatch::new(vec![cards::whisper_card(
                    id.as_str(),
                    &sender,
                    &recipient,
                )])
            },
            Err(CreateError::TooLong { len, max }) => {
                debug!(requester_id = %req.requester_id, len, max, "whisper too long");
                SuggestionBatch::empty()
            },
            Err(e) => {
                info!(requester_id = %req.requester_id, reason = %e, "whisper refused");
                SuggestionBatch::new(vec![cards::creation_failed(&e, &recipient)])
            },
        }
    }

    async fn inbox(&self, req: &AddressRequest) -> SuggestionBatch {
        let handle = match req.requester_handle.clone() {
            Some(h) => Some(h),
            None => self.handle_of(req.requester_id).await,
        };
        let pending = self.store.list_for(req.requester_id, handle.as_deref());
        if pending.is_empty() {
            return SuggestionBatch::empty();
        }

        let now = self.clock.now();
        let mut results = Vec::new();
        for whisper in pending.iter().take(self.limits.inbox_limit) {
            let sender = self
                .label_for(whisper.sender_id)
                .await
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
            results.push(cards::inbox_card(
                whisper,
                &sender,
                self.limits.preview_length,
                whisper.remaining(now),
            ));
        }
        SuggestionBatch::new(results)
    }

    /// Answer a reveal action. Returns `None` when the token is not a whisper
    /// token, so the binding can answer with an empty acknowledgment.
    pub async fn handle_reveal(
        &self,
        req: &RevealRequest,
        transport: &dyn RevealTransport,
    ) -> Option<Notice> {
        let raw_id = parse_reveal_token(&req.token)?;

        if let Admission::Wait { remaining_secs } = self.cooldown.admit(req.requester_id) {
            return Some(Notice::alert(presenter::cooldown_notice(remaining_secs)));
        }

        let id = WhisperId::from(raw_id);
        let handle = self.claim_handle(&id, req).await;

        let (whisper, decision) = match self.store.open(&id, req.requester_id, handle.as_deref()) {
            Ok(opened) => opened,
            Err(RevealError::NotFound) => {
                return Some(Notice::alert(presenter::NOT_FOUND_NOTICE));
            },
            Err(RevealError::Denied) => {
                info!(whisper_id = %id, requester_id = %req.requester_id, "reveal refused");
                return Some(Notice::alert(presenter::NO_ACCESS_NOTICE));
            },
        };

        let is_sender = decision == AccessDecision::Sender;
        let counterpart = if is_sender {
            self.recipient_label(&whisper).await
        } else {
            self.label_for(whisper.sender_id)
                .await
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
        };

        match presenter::present(
            &whisper,
            is_sender,
            &counterpart,
            self.limits.alert_max_length,
        ) {
            Reveal::Alert(text) => Some(Notice::alert(text)),
            Reveal::Deliver { html } => {
                let target = req
                    .chat_id
                    .map_or(DeliveryTarget::Direct(req.requester_id), DeliveryTarget::Chat);
                match transport.send_html(target, &html).await {
                    Ok(()) => Some(Notice::toast(presenter::delivered_notice(target))),
                    Err(e) => {
                        warn!(
                            whisper_id = %id,
                            requester_id = %req.requester_id,
                            ?target,
                            error = %e,
                            "whisper delivery failed"
                        );
                        Some(Notice::alert(presenter::DELIVERY_FAILED_NOTICE))
                    },
                }
            },
        }
    }

    /// Handle the requester presents for lazy binding. Only looked up in the
    /// directory when the platform did not supply one and the whisper is still
    /// unresolved.
    async fn claim_handle(&self, id: &WhisperId, req: &RevealRequest) -> Option<String> {
        if req.requester_handle.is_some() {
            return req.requester_handle.clone();
        }
        match self.store.get(id) {
            Some(w) if w.recipient_id.is_none() => self.handle_of(req.requester_id).await,
            _ => None,
        }
    }

    async fn recipient_label(&self, whisper: &Whisper) -> String {
        let resolved = match whisper.recipient_id {
            Some(id) => self.label_for(id).await,
            None => None,
        };
        resolved.unwrap_or_else(|| format!("@{}", whisper.recipient_handle))
    }

    async fn label_for(&self, id: UserId) -> Option<String> {
        match self.directory.lookup_by_id(id).await {
            Lookup::Found(profile) => profile.label(),
            Lookup::NotFound => None,
            Lookup::Failed(reason) => {
                debug!(user_id = %id, %reason, "profile lookup failed");
                None
            },
        }
    }

    async fn handle_of(&self, id: UserId) -> Option<String> {
        match self.directory.lookup_by_id(id).await {
            Lookup::Found(profile) => profile.handle,
            Lookup::NotFound => None,
            Lookup::Failed(reason) => {
                debug!(user_id = %id, %reason, "handle lookup failed");
                None
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use {async_trait::async_trait, murmur_common::ManualClock};

    use super::*;
    use crate::{error::Error, store::tests::FakeDirectory};

    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<(DeliveryTarget, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl RevealTransport for FakeTransport {
        async fn send_html(&self, target: DeliveryTarget, html: &str) -> crate::Result<()> {
            if self.fail {
                return Err(Error::message("bot can't initiate conversation with a user"));
            }
            self.sent.lock().unwrap().push((target, html.to_string()));
            Ok(())
        }
    }

    fn relay(directory: FakeDirectory) -> (WhisperRelay, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch_secs(1_700_000_000));
        let relay = WhisperRelay::new(
            "mybot",
            RelayLimits::default(),
            clock.clone(),
            Arc::new(directory),
        );
        (relay, clock)
    }

    fn address(raw: &str, requester: u64, handle: Option<&str>) -> AddressRequest {
        AddressRequest {
            raw: raw.into(),
            requester_id: UserId(requester),
            requester_handle: handle.map(str::to_string),
        }
    }

    fn reveal(token: &str, requester: u64, handle: Option<&str>) -> RevealRequest {
        RevealRequest {
            token: token.into(),
            requester_id: UserId(requester),
            requester_handle: handle.map(str::to_string),
            chat_id: None,
        }
    }

    async fn create(relay: &WhisperRelay, raw: &str, sender: u64) -> String {
        let batch = relay.handle_address(&address(raw, sender, Some("alice"))).await;
        assert_eq!(batch.results.len(), 1);
        batch.results[0]
            .reveal_token
            .clone()
            .expect("whisper card carries a reveal token")
    }

    #[tokio::test]
    async fn unresolved_handle_is_claimed_by_first_matching_user() {
        let (relay, clock) = relay(FakeDirectory::default().with_user("alice", 1, false));
        let transport = FakeTransport::default();

        let token = create(&relay, "@mybot hello there @bob", 1).await;
        let id = parse_reveal_token(&token).unwrap();
        let stored = relay.store().get(&WhisperId::from(id)).unwrap();
        assert_eq!(stored.recipient_id, None);
        assert_eq!(stored.recipient_handle, "bob");

        let notice = relay
            .handle_reveal(&reveal(&token, 2, Some("Bob")), &transport)
            .await
            .unwrap();
        assert!(notice.show_alert);
        assert_eq!(notice.text, "📩 Whisper from @alice:\n\nhello there");
        assert_eq!(
            relay.store().get(&WhisperId::from(id)).unwrap().recipient_id,
            Some(UserId(2))
        );

        clock.advance(Duration::from_secs(1));
        let notice = relay
            .handle_reveal(&reveal(&token, 3, Some("bob")), &transport)
            .await
            .unwrap();
        assert_eq!(notice.text, presenter::NO_ACCESS_NOTICE);
        assert!(!notice.text.contains("hello"));
    }

    #[tokio::test]
    async fn repeated_reveals_return_same_text_until_expiry() {
        let (relay, clock) = relay(
            FakeDirectory::default()
                .with_user("alice", 1, false)
                .with_user("bob", 2, false),
        );
        let transport = FakeTransport::default();
        let token = create(&relay, "see you at 8 @bob", 1).await;

        for _ in 0..3 {
            let notice = relay
                .handle_reveal(&reveal(&token, 2, None), &transport)
                .await
                .unwrap();
            assert!(notice.text.ends_with("see you at 8"));
            clock.advance(Duration::from_secs(5));
        }

        clock.advance(Duration::from_secs(3 * 60 * 60));
        let notice = relay
            .handle_reveal(&reveal(&token, 2, None), &transport)
            .await
            .unwrap();
        assert_eq!(notice.text, presenter::NOT_FOUND_NOTICE);
    }

    #[tokio::test]
    async fn cooldown_runs_before_lookup() {
        let (relay, clock) = relay(FakeDirectory::default());
        let transport = FakeTransport::default();

        let first = relay
            .handle_reveal(&reveal("whisper_view_missing", 9, None), &transport)
            .await
            .unwrap();
        assert_eq!(first.text, presenter::NOT_FOUND_NOTICE);

        clock.advance(Duration::from_secs(2));
        let second = relay
            .handle_reveal(&reveal("whisper_view_missing", 9, None), &transport)
            .await
            .unwrap();
        assert_eq!(second.text, presenter::cooldown_notice(3));

        clock.advance(Duration::from_secs(3));
        let third = relay
            .handle_reveal(&reveal("whisper_view_missing", 9, None), &transport)
            .await
            .unwrap();
        assert_eq!(third.text, presenter::NOT_FOUND_NOTICE);
    }

    #[tokio::test]
    async fn foreign_tokens_are_ignored() {
        let (relay, _) = relay(FakeDirectory::default());
        let transport = FakeTransport::default();
        assert!(
            relay
                .handle_reveal(&reveal("model_switch:1", 9, None), &transport)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn long_whisper_is_delivered_to_chat_or_direct() {
        let (relay, _) = relay(FakeDirectory::default().with_user("bob", 2, false));
        let transport = FakeTransport::default();
        let text = "z".repeat(200);
        let token = create(&relay, &format!("{text} @bob"), 1).await;

        let mut in_chat = reveal(&token, 2, None);
        in_chat.chat_id = Some(-1001);
        let notice = relay.handle_reveal(&in_chat, &transport).await.unwrap();
        assert!(!notice.show_alert);
        assert_eq!(notice.text, presenter::delivered_notice(DeliveryTarget::Chat(-1001)));

        // Sender reveal from an inline message: no chat, goes to DM.
        let notice = relay
            .handle_reveal(&reveal(&token, 1, None), &transport)
            .await
            .unwrap();
        assert_eq!(
            notice.text,
            presenter::delivered_notice(DeliveryTarget::Direct(UserId(1)))
        );

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, DeliveryTarget::Chat(-1001));
        assert!(sent[0].1.contains(&text));
        assert!(sent[1].1.starts_with("📩 <b>Your whisper for @bob</b>"));
    }

    #[tokio::test]
    async fn delivery_failure_is_an_advisory_and_keeps_the_whisper() {
        let (relay, clock) = relay(FakeDirectory::default().with_user("bob", 2, false));
        let failing = FakeTransport {
            fail: true,
            ..Default::default()
        };
        let token = create(&relay, &format!("{} @bob", "q".repeat(300)), 1).await;

        let notice = relay
            .handle_reveal(&reveal(&token, 2, None), &failing)
            .await
            .unwrap();
        assert!(notice.show_alert);
        assert_eq!(notice.text, presenter::DELIVERY_FAILED_NOTICE);

        clock.advance(Duration::from_secs(5));
        let working = FakeTransport::default();
        let notice = relay
            .handle_reveal(&reveal(&token, 2, None), &working)
            .await
            .unwrap();
        assert!(!notice.show_alert);
        assert_eq!(working.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claimant_handle_falls_back_to_directory() {
        // Handles match exactly here, so "dave" does not resolve "Dave".
        let (relay, _) = relay(
            FakeDirectory::default()
                .with_user("Dave", 4, false)
                .with_user("carol", 3, false),
        );
        let transport = FakeTransport::default();
        let token = create(&relay, "hi @dave", 1).await;
        let id = WhisperId::from(parse_reveal_token(&token).unwrap());
        assert_eq!(relay.store().get(&id).unwrap().recipient_id, None);

        let notice = relay
            .handle_reveal(&reveal(&token, 3, None), &transport)
            .await
            .unwrap();
        assert_eq!(notice.text, presenter::NO_ACCESS_NOTICE);
        assert_eq!(relay.store().get(&id).unwrap().recipient_id, None);

        let notice = relay
            .handle_reveal(&reveal(&token, 4, None), &transport)
            .await
            .unwrap();
        assert!(notice.text.ends_with("hi"));
        assert_eq!(relay.store().get(&id).unwrap().recipient_id, Some(UserId(4)));
    }

    #[tokio::test]
    async fn self_addressed_whisper_gets_advisory_card() {
        let (relay, _) = relay(FakeDirectory::default().with_user("alice", 1, false));
        let batch = relay
            .handle_address(&address("note @alice", 1, Some("alice")))
            .await;
        assert_eq!(batch.results.len(), 1);
        assert_eq!(batch.results[0].id, "error");
        assert!(relay.store().is_empty());
    }

    #[tokio::test]
    async fn too_long_whisper_answers_empty() {
        let (relay, _) = relay(FakeDirectory::default());
        let raw = format!("{} @bob", "x".repeat(1001));
        let batch = relay.handle_address(&address(&raw, 1, None)).await;
        assert!(batch.results.is_empty());
        assert!(relay.store().is_empty());
    }

    #[tokio::test]
    async fn help_cards_for_non_whispers() {
        let (relay, _) = relay(FakeDirectory::default());
        let ids = |batch: SuggestionBatch| -> Vec<String> {
            batch.results.into_iter().map(|s| s.id).collect()
        };
        assert_eq!(ids(relay.handle_address(&address("", 1, None)).await), vec![
            "help_hint"
        ]);
        assert_eq!(
            ids(relay.handle_address(&address("@mybot hi", 1, None)).await),
            vec!["parse_error"]
        );
        assert_eq!(
            ids(relay.handle_address(&address("hi there", 1, None)).await),
            vec!["help"]
        );
    }

    #[tokio::test]
    async fn inbox_lists_pending_whispers_newest_first() {
        let (relay, clock) = relay(
            FakeDirectory::default()
                .with_user("alice", 1, false)
                .with_user("bob", 2, false),
        );
        create(&relay, "first @bob", 1).await;
        clock.advance(Duration::from_secs(60));
        create(&relay, "second @bob", 1).await;
        create(&relay, "unrelated @carol", 1).await;

        let batch = relay.handle_address(&address("@mybot", 2, None)).await;
        let descriptions: Vec<&str> = batch
            .results
            .iter()
            .map(|s| s.description.as_str())
            .collect();
        assert_eq!(descriptions, vec![
            "second (left: 3h 0m)",
            "first (left: 2h 59m)"
        ]);
        assert!(
            batch
                .results
                .iter()
                .all(|s| s.title == "📩 Whisper from @alice")
        );

        // The handle-matching path for unresolved whispers.
        let batch = relay.handle_address(&address("mybot", 7, Some("Carol"))).await;
        assert_eq!(batch.results.len(), 1);
    }

    #[tokio::test]
    async fn inbox_is_capped() {
        let limits = RelayLimits {
            inbox_limit: 2,
            ..Default::default()
        };
        let relay = WhisperRelay::new(
            "mybot",
            limits,
            Arc::new(ManualClock::at_epoch_secs(0)),
            Arc::new(FakeDirectory::default().with_user("bob", 2, false)),
        );
        for n in 0..4 {
            create(&relay, &format!("note {n} @bob"), 1).await;
        }
        let batch = relay.handle_address(&address("@mybot", 2, None)).await;
        assert_eq!(batch.results.len(), 2);
    }
}
