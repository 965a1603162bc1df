use std::{sync::Arc, time::Duration};

use {
    murmur_common::SystemClock,
    murmur_config::MurmurConfig,
    murmur_whisper::{RelayLimits, WhisperRelay},
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    directory::TelegramDirectory, error::Context, handlers, outbound::TelegramOutbound,
    state::RelayState,
};

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Connect to the Bot API and build the relay state.
pub async fn connect(config: &MurmurConfig) -> anyhow::Result<RelayState> {
    let token = config
        .telegram
        .token()
        .context("telegram.token is not set")?;

    // The client timeout must outlast the long-poll timeout or every poll aborts.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(config.telegram.request_timeout_secs))
        .build()?;
    let mut bot = Bot::with_client(token, client);
    if let Some(url) = &config.telegram.api_url {
        bot = bot.set_api_url(reqwest::Url::parse(url)?);
    }

    let me = bot.get_me().await?;
    let bot_username = me
        .username
        .clone()
        .context("bot account has no username; inline mode needs one")?;

    // Delete any existing webhook so long polling works.
    bot.delete_webhook().send().await?;
    info!(username = %bot_username, "telegram bot connected (webhook cleared)");

    Ok(build_state(bot, bot_username, config))
}

/// Wire the relay and its Telegram-backed directory and transport.
pub fn build_state(bot: Bot, bot_username: String, config: &MurmurConfig) -> RelayState {
    let directory = Arc::new(TelegramDirectory::new(bot.clone()));
    let relay = Arc::new(WhisperRelay::new(
        bot_username,
        RelayLimits::from(&config.whisper),
        Arc::new(SystemClock),
        directory.clone(),
    ));
    RelayState {
        outbound: Arc::new(TelegramOutbound::new(bot.clone())),
        bot,
        relay,
        directory,
        cancel: CancellationToken::new(),
    }
}

/// Connect and start polling.
///
/// Spawns the polling loop and the expiry sweeper; both run until the
/// returned `CancellationToken` is cancelled. The token is also cancelled when
/// another instance takes over the bot token.
pub async fn start_polling(config: &MurmurConfig) -> anyhow::Result<CancellationToken> {
    let state = Arc::new(connect(config).await?);
    let cancel = state.cancel.clone();

    spawn_sweeper(
        Arc::clone(&state.relay),
        Duration::from_secs(config.whisper.sweep_interval_secs.max(1)),
        cancel.clone(),
    );

    let poll_timeout = config.telegram.poll_timeout_secs;
    tokio::spawn(async move {
        info!("starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let result = tokio::select! {
                _ = state.cancel.cancelled() => break,
                result = state
                    .bot
                    .get_updates()
                    .offset(offset)
                    .timeout(poll_timeout)
                    .allowed_updates(vec![
                        AllowedUpdate::Message,
                        AllowedUpdate::InlineQuery,
                        AllowedUpdate::CallbackQuery,
                    ])
                    .send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        spawn_dispatch(update, &state);
                    }
                },
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    warn!("telegram polling stopped: another instance is running with this token");
                    state.cancel.cancel();
                    break;
                },
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                },
            }
        }
        info!("telegram polling stopped");
    });

    Ok(cancel)
}

/// Handle `update` on its own task so a slow reveal never holds up the poll
/// loop or other users' requests.
pub fn spawn_dispatch(update: Update, state: &Arc<RelayState>) -> tokio::task::JoinHandle<()> {
    let state = Arc::clone(state);
    tokio::spawn(async move { dispatch_update(update, &state).await })
}

/// Route one update to its handler. Errors are logged, never propagated, so
/// one bad update cannot stall the loop.
pub async fn dispatch_update(update: Update, state: &RelayState) {
    match update.kind {
        UpdateKind::InlineQuery(query) => {
            debug!(user_id = query.from.id.0, "received inline query");
            if let Err(e) = handlers::handle_inline_query(query, state).await {
                error!(error = %e, "error handling inline query");
            }
        },
        UpdateKind::CallbackQuery(query) => {
            debug!(user_id = query.from.id.0, "received callback query");
            if let Err(e) = handlers::handle_callback_query(query, state).await {
                error!(error = %e, "error handling callback query");
            }
        },
        UpdateKind::Message(msg) => handlers::handle_message(&msg, state),
        other => {
            debug!("ignoring update: {other:?}");
        },
    }
}

/// Periodically drop expired whispers until `cancel` fires.
pub fn spawn_sweeper(
    relay: Arc<WhisperRelay>,
    every: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = relay.sweep_expired();
                    if removed > 0 {
                        info!(removed, remaining = relay.store().len(), "swept expired whispers");
                    }
                },
            }
        }
    })
}
