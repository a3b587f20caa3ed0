//! ChannelResolverBuilder -- fluent builder for [`ChannelResolver`].
//!
//! Collects the discovery strategy list, the control connector and the
//! tunables before anything touches the network.
//!
//! # Example
//!
//! ```
//! use chanlib_core::{ChannelSpec, DiscoveryStrategy};
//! use chanlib_resolver::ChannelResolverBuilder;
//! use chanlib_test_harness::{MockConnector, MockDaemon, MockDiscoverySource};
//!
//! # async fn example() -> chanlib_core::Result<()> {
//! let daemon = MockDaemon::new();
//! let resolver = ChannelResolverBuilder::new("hf-status.local")
//!     .source(MockDiscoverySource::from_daemon(DiscoveryStrategy::Multicast, daemon.clone()))
//!     .connector(MockConnector::new(daemon))
//!     .build()?;
//!
//! let spec = ChannelSpec::at(10_000_000.0)?;
//! let channel = resolver.get_or_create(&spec).await;
//! # Ok(())
//! # }
//! ```

use std::net::Ipv4Addr;
use std::time::Duration;

use chanlib_core::error::{Error, Result};
use chanlib_core::{ControlConnector, DiscoverySource};

use crate::aggregator::DiscoveryAggregator;
use crate::options::{CollisionPolicy, CollisionTrigger, IdentifierPolicy, ResolverOptions};
use crate::reconcile::ChannelResolver;

/// Fluent builder for [`ChannelResolver`].
///
/// Sources are tried in the order they are added.
pub struct ChannelResolverBuilder {
    target: String,
    sources: Vec<Box<dyn DiscoverySource>>,
    connector: Option<Box<dyn ControlConnector>>,
    options: ResolverOptions,
}

impl ChannelResolverBuilder {
    /// Start a builder for the daemon reachable as `target` (status host
    /// name or address).
    pub fn new(target: &str) -> Self {
        ChannelResolverBuilder {
            target: target.to_string(),
            sources: Vec::new(),
            connector: None,
            options: ResolverOptions::default(),
        }
    }

    /// Append a discovery source at the lowest priority.
    pub fn source<S: DiscoverySource + 'static>(self, source: S) -> Self {
        self.boxed_source(Box::new(source))
    }

    /// Append an already boxed discovery source.
    pub fn boxed_source(mut self, source: Box<dyn DiscoverySource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Set the control connector. Required.
    pub fn connector<C: ControlConnector + 'static>(mut self, connector: C) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    /// Replace all tunables at once.
    pub fn options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Local IPv4 interface for multicast reception.
    pub fn interface(mut self, interface: Option<Ipv4Addr>) -> Self {
        self.options.interface = interface;
        self
    }

    /// Listen window for each discovery pass (default: 2 s).
    pub fn listen_duration(mut self, duration: Duration) -> Self {
        self.options.listen_duration = duration;
        self
    }

    /// Frequency matching tolerance in Hz (default: 1.0).
    pub fn tolerance_hz(mut self, tolerance_hz: f64) -> Self {
        self.options.tolerance_hz = tolerance_hz;
        self
    }

    /// Time allowed for a created channel to appear (default: 10 s).
    pub fn confirm_timeout(mut self, timeout: Duration) -> Self {
        self.options.confirm_timeout = timeout;
        self
    }

    /// Pause between confirmation polls (default: 500 ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    /// Collision retry policy (default: +100 Hz on round hundreds, 3 retries).
    pub fn collision(mut self, policy: CollisionPolicy) -> Self {
        self.options.collision = policy;
        self
    }

    /// Who picks identifiers for new channels (default: daemon).
    pub fn identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.options.identifier_policy = policy;
        self
    }

    /// Merge all successful discovery sources (default: false).
    pub fn merge_sources(mut self, merge: bool) -> Self {
        self.options.merge_sources = merge;
        self
    }

    /// Check with one discovery pass that removed channels are gone
    /// (default: false).
    pub fn confirm_removal(mut self, confirm: bool) -> Self {
        self.options.confirm_removal = confirm;
        self
    }

    /// Validate the configuration and build the resolver.
    pub fn build(self) -> Result<ChannelResolver> {
        let connector = self.connector.ok_or_else(|| {
            Error::InvalidInput("connector is required: call .connector() before .build()".into())
        })?;
        validate(&self.options)?;

        let mut aggregator = DiscoveryAggregator::new().merge_sources(self.options.merge_sources);
        for source in self.sources {
            aggregator.push(source);
        }

        Ok(ChannelResolver::new(self.target, aggregator, connector, self.options))
    }
}

fn validate(options: &ResolverOptions) -> Result<()> {
    if options.listen_duration.is_zero() {
        return Err(Error::InvalidInput("listen duration must be positive".into()));
    }
    if options.poll_interval.is_zero() {
        return Err(Error::InvalidInput("poll interval must be positive".into()));
    }
    if !options.tolerance_hz.is_finite() || options.tolerance_hz < 0.0 {
        return Err(Error::InvalidInput(format!(
            "tolerance must be a non-negative number of Hz, got {}",
            options.tolerance_hz
        )));
    }
    let policy = &options.collision;
    let retries_possible = policy.max_retries > 0 && policy.trigger != CollisionTrigger::Never;
    if retries_possible && !(policy.offset_hz.is_finite() && policy.offset_hz > 0.0) {
        return Err(Error::InvalidInput(format!(
            "collision offset must be a positive number of Hz, got {}",
            policy.offset_hz
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlib_core::DiscoveryStrategy;
    use chanlib_test_harness::{MockConnector, MockDaemon, MockDiscoverySource};

    fn connector() -> MockConnector {
        MockConnector::new(MockDaemon::new())
    }

    #[test]
    fn connector_is_required() {
        let err = ChannelResolverBuilder::new("radiod")
            .source(MockDiscoverySource::new(DiscoveryStrategy::Multicast))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn zero_listen_rejected() {
        let err = ChannelResolverBuilder::new("radiod")
            .connector(connector())
            .listen_duration(Duration::ZERO)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn negative_offset_rejected_only_when_retrying() {
        let bad = CollisionPolicy {
            offset_hz: -100.0,
            ..CollisionPolicy::default()
        };
        assert!(ChannelResolverBuilder::new("radiod")
            .connector(connector())
            .collision(bad)
            .build()
            .is_err());

        let off = CollisionPolicy {
            offset_hz: -100.0,
            ..CollisionPolicy::disabled()
        };
        assert!(ChannelResolverBuilder::new("radiod")
            .connector(connector())
            .collision(off)
            .build()
            .is_ok());
    }

    #[test]
    fn setters_reach_options() {
        let resolver = ChannelResolverBuilder::new("radiod")
            .connector(connector())
            .source(MockDiscoverySource::new(DiscoveryStrategy::Multicast))
            .source(MockDiscoverySource::new(DiscoveryStrategy::ControlQuery))
            .tolerance_hz(5.0)
            .confirm_timeout(Duration::from_secs(3))
            .identifier_policy(IdentifierPolicy::ClientAssigned)
            .confirm_removal(true)
            .build()
            .unwrap();
        let o = resolver.options();
        assert_eq!(o.tolerance_hz, 5.0);
        assert_eq!(o.confirm_timeout, Duration::from_secs(3));
        assert_eq!(o.identifier_policy, IdentifierPolicy::ClientAssigned);
        assert!(o.confirm_removal);
        assert_eq!(resolver.source_count(), 2);
        assert_eq!(resolver.target(), "radiod");
    }

    #[test]
    fn boxed_sources_keep_order() {
        let chosen: Vec<Box<dyn DiscoverySource>> = vec![
            Box::new(MockDiscoverySource::new(DiscoveryStrategy::ControlQuery)),
            Box::new(MockDiscoverySource::new(DiscoveryStrategy::Multicast)),
        ];
        let builder = chosen
            .into_iter()
            .fold(ChannelResolverBuilder::new("radiod"), |b, s| b.boxed_source(s));
        let resolver = builder.connector(connector()).build().unwrap();
        assert_eq!(resolver.source_count(), 2);
    }
}
