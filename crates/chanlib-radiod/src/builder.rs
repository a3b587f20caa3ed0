//! RadiodBuilder -- shared settings for the radiod adapters.
//!
//! One builder configures the multicast listener, the control-query source
//! and the control connector so they agree on port, interface and timing.
//!
//! # Example
//!
//! ```
//! use chanlib_radiod::RadiodBuilder;
//! use std::time::Duration;
//!
//! let radiod = RadiodBuilder::new()
//!     .interface(Some("192.168.0.161".parse().unwrap()))
//!     .ack_window(Duration::from_millis(800));
//! let source = radiod.multicast_source();
//! let connector = radiod.connector();
//! ```

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::control::{RadiodConnector, SsrcPolicy};
use crate::multicast::MulticastSource;
use crate::query::ControlQuerySource;

/// Default radiod status/command port.
pub const DEFAULT_STATUS_PORT: u16 = 5006;

/// Default multicast TTL for command packets.
pub const DEFAULT_TTL: u32 = 1;

/// Default time to wait for a command acknowledgement.
pub const DEFAULT_ACK_WINDOW: Duration = Duration::from_millis(500);

/// Default bound on status host name resolution.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(3);

/// Settings shared by every radiod adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiodSettings {
    /// Port used when the status host does not name one.
    pub status_port: u16,
    /// Local interface for multicast join and send.
    pub interface: Option<Ipv4Addr>,
    /// Multicast TTL for commands.
    pub ttl: u32,
    /// How long `create` waits for the daemon to echo the command tag.
    pub ack_window: Duration,
    /// Bound on resolving the status host name.
    pub resolve_timeout: Duration,
    /// What to do when `create` is called without an SSRC.
    pub ssrc_policy: SsrcPolicy,
}

impl Default for RadiodSettings {
    fn default() -> Self {
        RadiodSettings {
            status_port: DEFAULT_STATUS_PORT,
            interface: None,
            ttl: DEFAULT_TTL,
            ack_window: DEFAULT_ACK_WINDOW,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            ssrc_policy: SsrcPolicy::default(),
        }
    }
}

/// Fluent builder for the radiod adapters.
#[derive(Debug, Clone, Default)]
pub struct RadiodBuilder {
    settings: RadiodSettings,
}

impl RadiodBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status port used when the host has none (default: 5006).
    pub fn status_port(mut self, port: u16) -> Self {
        self.settings.status_port = port;
        self
    }

    /// Set the local interface for multicast (default: any).
    pub fn interface(mut self, interface: Option<Ipv4Addr>) -> Self {
        self.settings.interface = interface;
        self
    }

    /// Set the command multicast TTL (default: 1).
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.settings.ttl = ttl;
        self
    }

    /// Set the acknowledgement window for commands (default: 500ms).
    pub fn ack_window(mut self, window: Duration) -> Self {
        self.settings.ack_window = window;
        self
    }

    /// Set the host name resolution timeout (default: 3s).
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.settings.resolve_timeout = timeout;
        self
    }

    /// Set the SSRC policy for creates without an identifier (default: random).
    pub fn ssrc_policy(mut self, policy: SsrcPolicy) -> Self {
        self.settings.ssrc_policy = policy;
        self
    }

    pub fn settings(&self) -> &RadiodSettings {
        &self.settings
    }

    /// Discovery source listening to the status multicast group.
    pub fn multicast_source(&self) -> MulticastSource {
        MulticastSource::new(self.settings.clone())
    }

    /// Discovery source that polls over the control link.
    pub fn query_source(&self) -> ControlQuerySource {
        ControlQuerySource::new(self.connector())
    }

    /// Per-operation control connections.
    pub fn connector(&self) -> RadiodConnector {
        RadiodConnector::new(self.settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = RadiodSettings::default();
        assert_eq!(s.status_port, 5006);
        assert_eq!(s.ttl, 1);
        assert_eq!(s.ack_window, Duration::from_millis(500));
        assert_eq!(s.ssrc_policy, SsrcPolicy::Random);
    }

    #[test]
    fn setters() {
        let b = RadiodBuilder::new()
            .status_port(6006)
            .interface(Some(Ipv4Addr::new(10, 0, 0, 2)))
            .ttl(4)
            .ssrc_policy(SsrcPolicy::Daemon);
        assert_eq!(b.settings().status_port, 6006);
        assert_eq!(b.settings().interface, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(b.settings().ttl, 4);
        assert_eq!(b.connector().settings().ssrc_policy, SsrcPolicy::Daemon);
    }
}
