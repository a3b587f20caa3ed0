//! Error types for chanlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! daemon-level failures are all captured here. The resolver converts these
//! into structured failure results at its public boundary.

/// The error type for all chanlib operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (socket bind, multicast join, send failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (truncated TLV item, malformed status packet).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for the daemon.
    #[error("timeout waiting for response")]
    Timeout,

    /// The requested operation is not supported by this adapter.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Caller input failed validation (bad frequency, missing identifier).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The daemon refused or failed to honor a request.
    #[error("command rejected: {0}")]
    Rejected(String),

    /// No channel matched the lookup.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a failed create attempt may be retried at an alternate
    /// frequency under the collision policy.
    ///
    /// Input validation errors, lookups, unsupported operations and
    /// cancellation are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Protocol(_)
                | Error::Timeout
                | Error::Rejected(_)
                | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
