use {murmur_common::FromMessage, thiserror::Error};

/// Collaborator failures (directory lookups, message delivery).
#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

murmur_common::impl_context!();

/// Why a whisper could not be created. No state is touched in any case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    #[error("whisper text is empty")]
    EmptyText,

    #[error("recipient handle is empty")]
    EmptyRecipient,

    #[error("whisper is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("recipient resolves to the sender")]
    SelfAddressed,

    #[error("recipient is a bot account")]
    BotRecipient,
}

/// Why a reveal was refused by the store.
///
/// The variants deliberately carry nothing about the whisper itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RevealError {
    /// Never existed or already expired; the two are indistinguishable.
    #[error("whisper not found or expired")]
    NotFound,

    #[error("no access to this whisper")]
    Denied,
}
