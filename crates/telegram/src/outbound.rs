use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    murmur_whisper::{DeliveryTarget, RevealTransport, error::Context},
    teloxide::{
        RequestError,
        payloads::SendMessageSetters,
        prelude::*,
        types::{ChatId, ParseMode},
    },
    tracing::{debug, warn},
};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Sends revealed whispers that are too long for an alert.
pub struct TelegramOutbound {
    pub(crate) bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn send_with_retry<T, F, Fut>(
        &self,
        chat_id: i64,
        operation: &'static str,
        mut request: F,
    ) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

#[async_trait]
impl RevealTransport for TelegramOutbound {
    async fn send_html(&self, target: DeliveryTarget, html: &str) -> murmur_whisper::Result<()> {
        let chat_id = chat_id_for(target)?;
        self.send_with_retry(chat_id.0, "send_message", || {
            self.bot
                .send_message(chat_id, html)
                .parse_mode(ParseMode::Html)
                .send()
        })
        .await
        .map_err(|e| murmur_whisper::Error::external("telegram sendMessage", e))?;
        debug!(chat_id = chat_id.0, "whisper delivered");
        Ok(())
    }
}

fn chat_id_for(target: DeliveryTarget) -> murmur_whisper::Result<ChatId> {
    match target {
        DeliveryTarget::Chat(id) => Ok(ChatId(id)),
        DeliveryTarget::Direct(user) => i64::try_from(user.0)
            .map(ChatId)
            .context("user id out of range"),
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}
