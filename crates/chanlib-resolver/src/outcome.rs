//! Result types returned across the resolver's public boundary.
//!
//! `get_or_create` and `remove` never return `chanlib_core::Error`; they
//! return plain data ([`ResolvedChannel`] / [`Removed`] on success,
//! [`ResolveFailure`] otherwise) so callers can serialize either side
//! without matching on error variants.

use std::fmt;
use std::net::IpAddr;

use chanlib_core::error::Error;
use chanlib_core::{ChannelRecord, ControlMetrics};

/// How a channel was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveMode {
    /// A matching channel was already active; no command was sent.
    Existing,
    /// Created and confirmed at the requested frequency.
    Created,
    /// Created and confirmed at a collision-offset frequency.
    CreatedFallback,
    /// Acknowledged by the daemon but not seen before the confirmation
    /// timeout. The identifier may be unknown.
    Requested,
}

impl ResolveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveMode::Existing => "existing",
            ResolveMode::Created => "created",
            ResolveMode::CreatedFallback => "created_fallback",
            ResolveMode::Requested => "requested",
        }
    }

    /// Whether the channel was active before this call.
    pub fn existed(&self) -> bool {
        matches!(self, ResolveMode::Existing)
    }
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful get-or-create result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChannel {
    /// The matched or created channel. For [`ResolveMode::Requested`] this
    /// is the record the request should produce.
    pub record: ChannelRecord,
    pub mode: ResolveMode,
    /// Attempts made, counting the first (1 = no collision retry).
    pub attempts: u32,
    /// Frequency the caller originally asked for.
    pub requested_frequency_hz: f64,
    /// Control link counters from the last attempt that opened one.
    pub metrics: Option<ControlMetrics>,
}

impl ResolvedChannel {
    pub fn ssrc(&self) -> Option<u32> {
        self.record.ssrc
    }
}

/// Why an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Malformed spec or missing remove target.
    InvalidInput,
    /// No channel matched a remove-by-frequency request.
    NotFound,
    /// The daemon refused the command.
    CommandRejected,
    /// A create was issued but never observed or acknowledged in time.
    ConfirmationTimeout,
    /// The collision retry budget was spent.
    RetriesExhausted,
    /// The caller cancelled the operation.
    Cancelled,
    /// The control link could not be used.
    Unavailable,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::NotFound => "not_found",
            FailureKind::CommandRejected => "command_rejected",
            FailureKind::ConfirmationTimeout => "confirmation_timeout",
            FailureKind::RetriesExhausted => "retries_exhausted",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Unavailable => "unavailable",
        }
    }

    /// Classify a library error.
    pub fn of(error: &Error) -> Self {
        match error {
            Error::InvalidInput(_) => FailureKind::InvalidInput,
            Error::NotFound(_) => FailureKind::NotFound,
            Error::Rejected(_) | Error::Protocol(_) => FailureKind::CommandRejected,
            Error::Timeout => FailureKind::ConfirmationTimeout,
            Error::Cancelled => FailureKind::Cancelled,
            Error::Transport(_) | Error::Unsupported(_) | Error::Io(_) => FailureKind::Unavailable,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure of a resolver operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveFailure {
    pub kind: FailureKind,
    /// Human-readable summary.
    pub message: String,
    /// Text of the last underlying error, if any.
    pub last_error: Option<String>,
    /// Frequency the caller asked for, when the operation had one.
    pub frequency_hz: Option<f64>,
    /// Attempts made before giving up.
    pub attempts: u32,
}

impl ResolveFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        ResolveFailure {
            kind,
            message: message.into(),
            last_error: None,
            frequency_hz: None,
            attempts: 0,
        }
    }

    /// Failure derived from an error, keeping its text as `last_error`.
    pub fn from_error(error: &Error) -> Self {
        ResolveFailure {
            last_error: Some(error.to_string()),
            ..ResolveFailure::new(FailureKind::of(error), error.to_string())
        }
    }

    pub fn frequency(mut self, frequency_hz: f64) -> Self {
        self.frequency_hz = Some(frequency_hz);
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ResolveFailure {}

/// Result of [`get_or_create`](crate::ChannelResolver::get_or_create).
pub type ResolveOutcome = std::result::Result<ResolvedChannel, ResolveFailure>;

/// What to remove.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveTarget {
    /// A known channel identifier; no discovery is needed.
    Identifier(u32),
    /// The channel nearest `frequency_hz` within `tolerance_hz`.
    Frequency {
        frequency_hz: f64,
        tolerance_hz: f64,
        /// Restrict the lookup to channels sending to this address.
        destination: Option<IpAddr>,
    },
}

/// Successful remove result.
#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub ssrc: u32,
    /// `Some(true)` if a follow-up discovery pass no longer saw the channel,
    /// `Some(false)` if it still did, `None` if no check was made.
    pub confirmed: Option<bool>,
    pub metrics: Option<ControlMetrics>,
}

/// Result of [`remove`](crate::ChannelResolver::remove).
pub type RemoveOutcome = std::result::Result<Removed, ResolveFailure>;
