use std::sync::Arc;

use {murmur_whisper::WhisperRelay, tokio_util::sync::CancellationToken};

use crate::{directory::TelegramDirectory, outbound::TelegramOutbound};

/// Runtime state shared by the polling loop and the handlers.
pub struct RelayState {
    pub bot: teloxide::Bot,
    pub relay: Arc<WhisperRelay>,
    /// Remembers users seen in updates so handles resolve without `getChat`.
    pub directory: Arc<TelegramDirectory>,
    pub outbound: Arc<TelegramOutbound>,
    pub cancel: CancellationToken,
}
