//! Discovery source trait.
//!
//! A [`DiscoverySource`] reports the channels a daemon currently has
//! active. Implementations exist for the radiod multicast status stream and
//! for status queries over the control link (both in `chanlib-radiod`), and
//! for scripted tests (`chanlib-test-harness`).
//!
//! The aggregator treats a failed listen and an empty successful listen the
//! same way: "no data from this source". Sources should still return `Err`
//! for transport problems so the reason can be reported.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::snapshot::DiscoveryStrategy;
use crate::types::ChannelRecord;

/// Asynchronous source of observed channels.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// The strategy tag for snapshots produced by this source.
    fn strategy(&self) -> DiscoveryStrategy;

    /// Collect active channels from `target` for up to `duration`.
    ///
    /// `target` is a daemon host or selector (e.g. `"hf-status.local"`).
    /// `interface` names the local IPv4 interface to receive on, when the
    /// transport needs one. Implementations must return within roughly
    /// `duration` plus their own resolution timeouts.
    async fn listen(
        &self,
        target: &str,
        duration: Duration,
        interface: Option<Ipv4Addr>,
    ) -> Result<HashMap<u32, ChannelRecord>>;
}
