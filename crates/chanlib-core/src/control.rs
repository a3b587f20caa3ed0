//! Control channel traits for daemon commands.
//!
//! A [`ControlChannel`] issues create/remove requests (and optionally
//! status queries) against the daemon. Connections are scoped: the
//! resolver asks a [`ControlConnector`] for a fresh channel at the start of
//! an operation and closes it before returning, so no connection state is
//! shared between calls.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{ChannelRecord, ChannelSpec};

/// What the daemon told us about a create request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateReceipt {
    /// The channel identifier, if the caller pre-assigned one or the
    /// daemon reported the one it chose.
    pub identifier: Option<u32>,
    /// Whether the daemon explicitly acknowledged the request.
    ///
    /// A datagram that was merely sent is not acknowledged.
    pub acknowledged: bool,
}

/// Counters reported by a control channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlMetrics {
    /// Commands written to the control link.
    pub commands_sent: u64,
    /// Commands the daemon acknowledged.
    pub acknowledgements: u64,
    /// Commands that failed to send.
    pub send_errors: u64,
    /// Status packets received on the control link.
    pub status_received: u64,
}

/// Asynchronous command link to the daemon.
#[async_trait]
pub trait ControlChannel: Send {
    /// Request a channel matching `spec`.
    ///
    /// When `identifier` is `Some`, the caller pre-assigned it and the
    /// daemon should use it. When `None`, the adapter either picks one or
    /// leaves it to the daemon; the receipt says which.
    async fn create(&mut self, spec: &ChannelSpec, identifier: Option<u32>) -> Result<CreateReceipt>;

    /// Request removal of the channel with `identifier`.
    ///
    /// Success means the command was accepted for delivery; it does not
    /// guarantee the channel is gone.
    async fn remove(&mut self, identifier: u32) -> Result<()>;

    /// Ask the daemon for every active channel over the control link.
    ///
    /// Not every deployment answers status queries; the default reports
    /// the operation as unsupported.
    async fn query(&mut self, duration: Duration) -> Result<HashMap<u32, ChannelRecord>> {
        let _ = duration;
        Err(Error::Unsupported("status query over control link".into()))
    }

    /// Counters for diagnostics, if the adapter keeps any.
    fn metrics(&self) -> Option<ControlMetrics> {
        None
    }

    /// Release the connection. Later calls should fail.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for per-operation [`ControlChannel`] connections.
#[async_trait]
pub trait ControlConnector: Send + Sync {
    /// Open a control connection to `target`.
    async fn connect(&self, target: &str) -> Result<Box<dyn ControlChannel>>;
}
