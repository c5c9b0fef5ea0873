use std::error::Error as StdError;

/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed channel errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid channel input: {message}")]
    InvalidInput { message: String },

    /// The configured plugin URL could not be parsed.
    #[error("invalid target url `{url}`: {source}")]
    InvalidTargetUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A response was due but `set_destination_window` was never called.
    #[error("no destination window bound for response channel `{channel}`")]
    DestinationNotBound { channel: String },

    /// The request handler failed instead of returning an `(result, error)` pair.
    #[error("request handler failed: {source}")]
    Handler {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The destination window no longer exists.
    #[error("window `{origin}` is closed")]
    WindowClosed { origin: String },

    /// Posting a message failed.
    #[error("post message failed: {context}: {source}")]
    Post {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// No response arrived before the client's deadline.
    #[error("call `{method}` timed out after {after_ms}ms")]
    Timeout { method: String, after_ms: u64 },

    /// The pending call was dropped before a response arrived.
    #[error("call `{method}` was cancelled")]
    Cancelled { method: String },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn handler(source: anyhow::Error) -> Self {
        Self::Handler {
            source: source.into(),
        }
    }

    #[must_use]
    pub fn post(context: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Post {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
