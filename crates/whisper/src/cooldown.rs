//! Per-reader rate limiting of reveal attempts.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use {murmur_common::Clock, tracing::debug};

use crate::types::UserId;

/// Result of [`CooldownGate::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Denied; whole seconds until the window reopens, always at least 1.
    Wait { remaining_secs: u64 },
}

/// Tracks the last admitted reveal of every user.
pub struct CooldownGate {
    window: Duration,
    clock: Arc<dyn Clock>,
    last_views: Mutex<HashMap<UserId, SystemTime>>,
}

impl CooldownGate {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            last_views: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or deny a reveal by `user_id`.
    ///
    /// Denials leave the stored timestamp untouched, so hammering the button
    /// does not extend the wait.
    pub fn admit(&self, user_id: UserId) -> Admission {
        let now = self.clock.now();
        let mut last_views = self.last_views.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(last) = last_views.get(&user_id) {
            let elapsed = now.duration_since(*last).unwrap_or_default();
            if elapsed < self.window {
                let remaining_secs = ceil_secs(self.window - elapsed).max(1);
                debug!(%user_id, remaining_secs, "reveal rate limited");
                return Admission::Wait { remaining_secs };
            }
        }

        last_views.insert(user_id, now);
        let stale_after = self.window * 2;
        last_views.retain(|_, last| now.duration_since(*last).unwrap_or_default() <= stale_after);
        Admission::Allowed
    }

    /// Number of users currently tracked.
    pub fn tracked(&self) -> usize {
        self.last_views
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
