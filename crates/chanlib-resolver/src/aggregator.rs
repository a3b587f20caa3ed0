//! Discovery aggregation over an ordered list of sources.
//!
//! The aggregator tries each configured [`DiscoverySource`] in priority
//! order. A source that errors or yields nothing (after the destination
//! filter) hands over to the next one; the first non-empty result wins and
//! is tagged with that source's strategy. When every source comes up empty
//! the result is an empty snapshot with a reason, never an error: a remote
//! client on another multicast domain legitimately sees nothing.
//!
//! With `merge_sources` enabled, every successful source is consulted and
//! the results are merged by identifier, later sources winning.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use chanlib_core::error::{Error, Result};
use chanlib_core::{DiscoverySnapshot, DiscoverySource};

/// Extra time a source gets beyond its listen window before it is abandoned.
const SOURCE_GRACE: Duration = Duration::from_secs(5);

/// Parameters for one discovery pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRequest {
    target: String,
    listen: Duration,
    interface: Option<Ipv4Addr>,
    destination: Option<IpAddr>,
}

impl DiscoveryRequest {
    /// A request against `target` listening for `listen`.
    ///
    /// A zero listen window is rejected.
    pub fn new(target: &str, listen: Duration) -> Result<Self> {
        if listen.is_zero() {
            return Err(Error::InvalidInput("listen duration must be positive".into()));
        }
        Ok(DiscoveryRequest {
            target: target.to_string(),
            listen,
            interface: None,
            destination: None,
        })
    }

    /// Receive on a specific local interface.
    pub fn interface(mut self, interface: Option<Ipv4Addr>) -> Self {
        self.interface = interface;
        self
    }

    /// Keep only channels whose output goes to `destination`.
    pub fn destination(mut self, destination: Option<IpAddr>) -> Self {
        self.destination = destination;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn listen(&self) -> Duration {
        self.listen
    }
}

/// Ordered discovery strategies with a uniform result shape.
#[derive(Default)]
pub struct DiscoveryAggregator {
    sources: Vec<Box<dyn DiscoverySource>>,
    merge_sources: bool,
}

impl DiscoveryAggregator {
    /// An aggregator with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source at the lowest priority.
    pub fn push(&mut self, source: Box<dyn DiscoverySource>) {
        self.sources.push(source);
    }

    /// Builder-style [`push`](Self::push).
    pub fn with_source(mut self, source: Box<dyn DiscoverySource>) -> Self {
        self.push(source);
        self
    }

    /// Merge every successful source instead of stopping at the first hit.
    pub fn merge_sources(mut self, merge: bool) -> Self {
        self.merge_sources = merge;
        self
    }

    /// Number of configured sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Run one discovery pass.
    pub async fn discover(&self, request: &DiscoveryRequest) -> DiscoverySnapshot {
        if self.sources.is_empty() {
            return DiscoverySnapshot::empty("no discovery source configured");
        }

        let mut notes: Vec<String> = Vec::new();
        let mut failures = 0usize;
        let mut merged: Option<DiscoverySnapshot> = None;

        for source in &self.sources {
            let strategy = source.strategy();
            tracing::debug!(
                strategy = %strategy,
                target = %request.target,
                listen_ms = request.listen.as_millis() as u64,
                "Trying discovery source"
            );

            let listen = source.listen(&request.target, request.listen, request.interface);
            let budget = request.listen.saturating_add(SOURCE_GRACE);
            let outcome = match tokio::time::timeout(budget, listen).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout),
            };

            let records = match outcome {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(strategy = %strategy, error = %e, "Discovery source failed");
                    failures += 1;
                    notes.push(format!("{strategy}: {e}"));
                    continue;
                }
            };

            let raw_count = records.len();
            let mut snapshot = DiscoverySnapshot::from_records(strategy, records);
            if let Some(addr) = request.destination {
                snapshot.retain_destination(addr);
            }
            tracing::debug!(
                strategy = %strategy,
                raw = raw_count,
                kept = snapshot.len(),
                "Discovery source returned"
            );

            if snapshot.is_empty() {
                notes.push(format!("{strategy}: no channels"));
                continue;
            }

            if !self.merge_sources {
                return snapshot;
            }
            match merged.as_mut() {
                Some(m) => m.merge(snapshot),
                None => merged = Some(snapshot),
            }
        }

        if let Some(snapshot) = merged {
            return snapshot;
        }

        let headline = if failures == self.sources.len() {
            "discovery not available (remote client or network issue)"
        } else {
            "no channels discovered (may be remote client)"
        };
        let reason = format!("{headline}: {}", notes.join("; "));
        tracing::debug!(reason = %reason, "Discovery returned no channels");
        DiscoverySnapshot::empty(reason)
    }
}
