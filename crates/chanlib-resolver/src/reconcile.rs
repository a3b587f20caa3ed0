//! Reconciliation of desired against observed channel state.
//!
//! [`ChannelResolver`] owns the discovery strategy list and a control
//! connector. Every public call starts from a fresh discovery pass and
//! holds no state afterwards.
//!
//! get-or-create runs as a bounded loop over attempts:
//!
//! 1. discover + match; a hit returns `existing` without sending anything
//! 2. connect, send create, poll discovery until the channel shows up or
//!    the confirmation deadline passes; the connection is closed on every
//!    path out of the attempt
//! 3. a retryable failure at a frequency the collision policy covers moves
//!    the next attempt to `previous + offset_hz`, up to `max_retries` times
//!
//! An acknowledged create that never shows up in discovery is reported as
//! `requested`, not as a failure.

use std::net::IpAddr;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use chanlib_core::error::{Error, Result};
use chanlib_core::{
    ChannelRecord, ChannelSpec, ControlChannel, ControlConnector, ControlMetrics,
    DiscoverySnapshot,
};

use crate::aggregator::{DiscoveryAggregator, DiscoveryRequest};
use crate::matcher::{find_identified, find_match, MatchCriteria};
use crate::options::{IdentifierPolicy, ResolverOptions};
use crate::outcome::{
    FailureKind, RemoveOutcome, RemoveTarget, Removed, ResolveFailure, ResolveMode,
    ResolveOutcome, ResolvedChannel,
};

/// Draw a random channel identifier.
///
/// Never returns 0 (unassigned) or `u32::MAX` (radiod's "all channels").
pub fn random_ssrc() -> u32 {
    rand::rng().random_range(1..u32::MAX)
}

/// One attempt's successful result.
struct Confirmed {
    record: ChannelRecord,
    mode: ResolveMode,
    metrics: Option<ControlMetrics>,
}

/// The channel resolution engine.
///
/// `Send + Sync`; share it behind an `Arc` if several tasks need it. Calls
/// are not coordinated with each other.
pub struct ChannelResolver {
    target: String,
    aggregator: DiscoveryAggregator,
    connector: Box<dyn ControlConnector>,
    options: ResolverOptions,
}

impl ChannelResolver {
    pub(crate) fn new(
        target: String,
        aggregator: DiscoveryAggregator,
        connector: Box<dyn ControlConnector>,
        options: ResolverOptions,
    ) -> Self {
        ChannelResolver {
            target,
            aggregator,
            connector,
            options,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Number of configured discovery sources.
    pub fn source_count(&self) -> usize {
        self.aggregator.len()
    }

    /// Run one discovery pass.
    ///
    /// Only a zero `listen` window is an error; unreachable or silent
    /// sources produce an empty snapshot with a reason.
    pub async fn discover(
        &self,
        destination: Option<IpAddr>,
        listen: Duration,
    ) -> Result<DiscoverySnapshot> {
        let request = DiscoveryRequest::new(&self.target, listen)?
            .interface(self.options.interface)
            .destination(destination);
        Ok(self.aggregator.discover(&request).await)
    }

    /// Find or create a channel for `spec` using the configured tolerance
    /// and retry budget.
    pub async fn get_or_create(&self, spec: &ChannelSpec) -> ResolveOutcome {
        let token = CancellationToken::new();
        self.get_or_create_with(
            spec,
            self.options.tolerance_hz,
            self.options.collision.max_retries,
            &token,
        )
        .await
    }

    /// Find or create a channel for `spec`.
    ///
    /// At most `1 + max_retries` create commands are sent. Cancelling
    /// `cancel` ends the call with [`FailureKind::Cancelled`] at the next
    /// discovery pass or poll pause.
    pub async fn get_or_create_with(
        &self,
        spec: &ChannelSpec,
        tolerance_hz: f64,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> ResolveOutcome {
        let requested = spec.frequency_hz();
        let tolerance_hz = tolerance_hz.max(0.0);
        let policy = self.options.collision;

        let mut current = spec.clone();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if cancel.is_cancelled() {
                return Err(cancelled(requested, attempts - 1));
            }

            tracing::debug!(
                attempt = attempts,
                frequency_hz = current.frequency_hz(),
                preset = current.preset(),
                sample_rate = current.sample_rate(),
                "Resolving channel"
            );

            let error = match self.attempt(&current, tolerance_hz, cancel).await {
                Ok(confirmed) => {
                    let mode = match confirmed.mode {
                        ResolveMode::Created if attempts > 1 => ResolveMode::CreatedFallback,
                        mode => mode,
                    };
                    tracing::debug!(
                        ssrc = ?confirmed.record.ssrc,
                        frequency_hz = confirmed.record.frequency_hz,
                        mode = %mode,
                        attempts,
                        "Channel resolved"
                    );
                    return Ok(ResolvedChannel {
                        record: confirmed.record,
                        mode,
                        attempts,
                        requested_frequency_hz: requested,
                        metrics: confirmed.metrics,
                    });
                }
                Err(e) => e,
            };

            if !error.is_retryable() || !policy.applies_to(current.frequency_hz()) {
                return Err(ResolveFailure::from_error(&error)
                    .frequency(requested)
                    .attempts(attempts));
            }

            if attempts > max_retries {
                let message = format!(
                    "no channel after {attempts} attempts starting at {requested} Hz: {error}"
                );
                let mut failure = ResolveFailure::new(
                    if attempts > 1 {
                        FailureKind::RetriesExhausted
                    } else {
                        FailureKind::of(&error)
                    },
                    message,
                )
                .frequency(requested)
                .attempts(attempts);
                failure.last_error = Some(error.to_string());
                return Err(failure);
            }

            let next = current.frequency_hz() + policy.offset_hz;
            tracing::warn!(
                attempt = attempts,
                frequency_hz = current.frequency_hz(),
                next_frequency_hz = next,
                error = %error,
                "Create failed, retrying at offset frequency"
            );
            current = match current.with_frequency(next) {
                Ok(spec) => spec,
                Err(e) => {
                    return Err(ResolveFailure::from_error(&e)
                        .frequency(requested)
                        .attempts(attempts))
                }
            };
        }
    }

    /// One pass of match, create and confirm for a single frequency.
    async fn attempt(
        &self,
        spec: &ChannelSpec,
        tolerance_hz: f64,
        cancel: &CancellationToken,
    ) -> Result<Confirmed> {
        let criteria = MatchCriteria::for_spec(spec, tolerance_hz);
        let destination = Some(spec.destination().addr);

        let snapshot = self
            .discover_cancellable(destination, self.options.listen_duration, cancel)
            .await?;
        if let Some(rec) = find_match(&snapshot, &criteria) {
            return Ok(Confirmed {
                record: rec.clone(),
                mode: ResolveMode::Existing,
                metrics: None,
            });
        }
        if let Some(reason) = snapshot.reason() {
            tracing::debug!(reason = %reason, "No existing channel visible");
        }

        let mut control = self.connector.connect(&self.target).await?;
        let result = self
            .create_and_confirm(control.as_mut(), spec, &criteria, cancel)
            .await;
        let metrics = control.metrics();
        if let Err(e) = control.close().await {
            tracing::warn!(error = %e, "Failed to close control connection");
        }

        result.map(|(record, mode)| Confirmed {
            record,
            mode,
            metrics,
        })
    }

    async fn create_and_confirm(
        &self,
        control: &mut dyn ControlChannel,
        spec: &ChannelSpec,
        criteria: &MatchCriteria,
        cancel: &CancellationToken,
    ) -> Result<(ChannelRecord, ResolveMode)> {
        let identifier = match self.options.identifier_policy {
            IdentifierPolicy::ClientAssigned => Some(random_ssrc()),
            IdentifierPolicy::DaemonAssigned => None,
        };

        let receipt = control.create(spec, identifier).await?;
        tracing::debug!(
            ssrc = ?receipt.identifier,
            acknowledged = receipt.acknowledged,
            frequency_hz = spec.frequency_hz(),
            "Create sent"
        );

        let destination = Some(spec.destination().addr);
        let deadline = deadline_after(self.options.confirm_timeout);
        let mut polls = 0u32;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            polls += 1;
            let listen = self.options.listen_duration.min(remaining);
            let snapshot = self.discover_cancellable(destination, listen, cancel).await?;

            let found = match receipt.identifier {
                Some(ssrc) => {
                    find_identified(&snapshot, ssrc, spec.frequency_hz(), criteria.tolerance_hz)
                }
                None => find_match(&snapshot, criteria),
            };
            if let Some(rec) = found {
                tracing::debug!(ssrc = ?rec.ssrc, polls, "Created channel confirmed");
                return Ok((rec.clone(), ResolveMode::Created));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.options.poll_interval.min(remaining)) => {}
            }
        }

        if receipt.acknowledged {
            tracing::warn!(
                ssrc = ?receipt.identifier,
                frequency_hz = spec.frequency_hz(),
                polls,
                "Create acknowledged but channel not seen before timeout"
            );
            return Ok((
                ChannelRecord::from_spec(spec, receipt.identifier),
                ResolveMode::Requested,
            ));
        }

        tracing::debug!(frequency_hz = spec.frequency_hz(), polls, "Create not confirmed");
        Err(Error::Timeout)
    }

    async fn discover_cancellable(
        &self,
        destination: Option<IpAddr>,
        listen: Duration,
        cancel: &CancellationToken,
    ) -> Result<DiscoverySnapshot> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            snapshot = self.discover(destination, listen) => snapshot,
        }
    }

    /// Remove a channel by identifier, or by the frequency it is tuned to.
    ///
    /// Success means the control link accepted the command. A frequency
    /// with no matching channel fails with [`FailureKind::NotFound`].
    pub async fn remove(&self, target: &RemoveTarget) -> RemoveOutcome {
        let ssrc = match target {
            RemoveTarget::Identifier(ssrc) => *ssrc,
            RemoveTarget::Frequency {
                frequency_hz,
                tolerance_hz,
                destination,
            } => self
                .lookup_for_removal(*frequency_hz, *tolerance_hz, *destination)
                .await
                .map_err(|e| ResolveFailure::from_error(&e).frequency(*frequency_hz))?,
        };
        if ssrc == 0 {
            return Err(ResolveFailure::new(
                FailureKind::InvalidInput,
                "channel identifier must be non-zero",
            ));
        }

        let mut control = self
            .connector
            .connect(&self.target)
            .await
            .map_err(|e| ResolveFailure::from_error(&e))?;
        let result = control.remove(ssrc).await;
        let metrics = control.metrics();
        if let Err(e) = control.close().await {
            tracing::warn!(error = %e, "Failed to close control connection");
        }
        result.map_err(|e| ResolveFailure::from_error(&e))?;
        tracing::debug!(ssrc, "Remove sent");

        let confirmed = if self.options.confirm_removal {
            Some(self.confirm_removed(ssrc).await)
        } else {
            None
        };

        Ok(Removed {
            ssrc,
            confirmed,
            metrics,
        })
    }

    async fn lookup_for_removal(
        &self,
        frequency_hz: f64,
        tolerance_hz: f64,
        destination: Option<IpAddr>,
    ) -> Result<u32> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "frequency must be a positive number of Hz, got {frequency_hz}"
            )));
        }
        let snapshot = self
            .discover(destination, self.options.listen_duration)
            .await?;
        let criteria = MatchCriteria::new(frequency_hz, tolerance_hz);
        find_match(&snapshot, &criteria)
            .and_then(|rec| rec.ssrc)
            .ok_or_else(|| {
                let mut msg = format!("no channel within {tolerance_hz} Hz of {frequency_hz} Hz");
                if let Some(reason) = snapshot.reason() {
                    msg.push_str(&format!(" ({reason})"));
                }
                Error::NotFound(msg)
            })
    }

    /// Whether one discovery pass no longer shows `ssrc` as open.
    async fn confirm_removed(&self, ssrc: u32) -> bool {
        let gone = match self.discover(None, self.options.listen_duration).await {
            Ok(snapshot) => snapshot.get(ssrc).map_or(true, ChannelRecord::is_closed),
            Err(_) => false,
        };
        if !gone {
            tracing::warn!(ssrc, "Channel still visible after remove");
        }
        gone
    }
}

/// `Instant::now() + after`, saturating at roughly thirty years out.
fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

fn cancelled(frequency_hz: f64, attempts: u32) -> ResolveFailure {
    ResolveFailure::from_error(&Error::Cancelled)
        .frequency(frequency_hz)
        .attempts(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ChannelResolverBuilder;
    use crate::options::{CollisionPolicy, CollisionTrigger};
    use chanlib_core::{ConnectorQuerySource, Destination, DiscoveryStrategy};
    use chanlib_test_harness::{
        CreateBehavior, MockCommand, MockConnector, MockDaemon, MockDiscoverySource,
    };

    fn builder(daemon: &MockDaemon) -> ChannelResolverBuilder {
        ChannelResolverBuilder::new("hf-status.local")
            .source(MockDiscoverySource::from_daemon(
                DiscoveryStrategy::Multicast,
                daemon.clone(),
            ))
            .connector(MockConnector::new(daemon.clone()))
            .listen_duration(Duration::from_millis(200))
            .poll_interval(Duration::from_millis(100))
            .confirm_timeout(Duration::from_secs(2))
    }

    fn resolver(daemon: &MockDaemon) -> ChannelResolver {
        builder(daemon).build().unwrap()
    }

    fn existing(ssrc: u32, freq: f64) -> ChannelRecord {
        let spec = ChannelSpec::at(freq).unwrap();
        ChannelRecord::from_spec(&spec, Some(ssrc))
    }

    #[test]
    fn random_ssrc_avoids_reserved_values() {
        for _ in 0..10_000 {
            let id = random_ssrc();
            assert_ne!(id, 0);
            assert_ne!(id, u32::MAX);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn get_or_create_is_idempotent() {
        let daemon = MockDaemon::new();
        let r = resolver(&daemon);
        let spec = ChannelSpec::at(9_500_000.0).unwrap();

        let first = r.get_or_create(&spec).await.unwrap();
        assert_eq!(first.mode, ResolveMode::Created);
        assert_eq!(first.attempts, 1);
        assert!(first.ssrc().is_some());
        assert!(first.metrics.is_some());

        let second = r.get_or_create(&spec).await.unwrap();
        assert_eq!(second.mode, ResolveMode::Existing);
        assert_eq!(second.ssrc(), first.ssrc());
        assert!(second.metrics.is_none());

        assert_eq!(daemon.create_frequencies(), vec![9_500_000.0]);
        assert_eq!(daemon.connections(), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_confirm_timeout_does_not_overflow() {
        let daemon = MockDaemon::new();
        let r = builder(&daemon)
            .confirm_timeout(Duration::from_secs_f64(1e19))
            .build()
            .unwrap();
        let spec = ChannelSpec::at(14_074_000.0).unwrap();
        let got = r.get_or_create(&spec).await.unwrap();
        assert_eq!(got.mode, ResolveMode::Created);
    }

    #[tokio::test]
    async fn deadline_saturates() {
        assert!(deadline_after(Duration::MAX) > Instant::now());
    }

    /// Multicast hears nothing; only the control link answers.
    fn query_only(daemon: &MockDaemon) -> ChannelResolverBuilder {
        daemon.set_visible(false);
        daemon.set_answers_queries(true);
        builder(daemon).source(ConnectorQuerySource::new(MockConnector::new(daemon.clone())))
    }

    #[tokio::test(start_paused = true)]
    async fn control_query_covers_silent_multicast() {
        let daemon = MockDaemon::new();
        daemon.add_channel(existing(0xCAFE, 10_000_000.0));
        let r = query_only(&daemon).build().unwrap();

        let snap = r.discover(None, Duration::from_millis(200)).await.unwrap();
        assert_eq!(snap.strategy(), DiscoveryStrategy::ControlQuery);
        assert!(snap.get(0xCAFE).is_some());

        let got = r.get_or_create(&ChannelSpec::at(10_000_000.0).unwrap()).await.unwrap();
        assert_eq!(got.mode, ResolveMode::Existing);
        assert_eq!(got.ssrc(), Some(0xCAFE));
        assert!(daemon.create_frequencies().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn control_query_confirms_created_channel() {
        let daemon = MockDaemon::new();
        let r = query_only(&daemon).build().unwrap();

        let got = r.get_or_create(&ChannelSpec::at(15_000_000.0).unwrap()).await.unwrap();
        assert_eq!(got.mode, ResolveMode::Created);
        assert_eq!(daemon.create_frequencies(), vec![15_000_000.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn merged_sources_prefer_later_report() {
        let daemon = MockDaemon::new();
        daemon.set_answers_queries(true);
        let mut fresh = existing(0xCAFE, 10_000_000.0);
        fresh.preset = "usb".into();
        daemon.add_channel(fresh);

        let mut stale = existing(0xCAFE, 10_000_000.0);
        stale.preset = "am".into();
        let r = ChannelResolverBuilder::new("hf-status.local")
            .source(
                MockDiscoverySource::new(DiscoveryStrategy::Multicast)
                    .with_channels(vec![stale, existing(0xBEEF, 7_000_000.0)]),
            )
            .source(ConnectorQuerySource::new(MockConnector::new(daemon.clone())))
            .connector(MockConnector::new(daemon.clone()))
            .merge_sources(true)
            .build()
            .unwrap();

        let snap = r.discover(None, Duration::from_millis(200)).await.unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.strategy(), DiscoveryStrategy::Multicast);
        assert_eq!(snap.get(0xCAFE).unwrap().preset, "usb");
        assert!(snap.get(0xBEEF).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn existing_match_sends_nothing() {
        let daemon = MockDaemon::new();
        daemon.add_channel(existing(0xBEEF, 7_074_000.0));
        let r = resolver(&daemon);

        let spec = ChannelSpec::at(7_074_000.4).unwrap();
        let got = r.get_or_create(&spec).await.unwrap();
        assert_eq!(got.mode, ResolveMode::Existing);
        assert_eq!(got.ssrc(), Some(0xBEEF));
        assert!(daemon.commands().is_empty());
        assert_eq!(daemon.connections(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn existing_on_other_destination_is_ignored() {
        let daemon = MockDaemon::new();
        let mut other = existing(0xBEEF, 7_074_000.0);
        other.destination = Some("239.9.9.9:5004".parse::<Destination>().unwrap());
        daemon.add_channel(other);
        let r = resolver(&daemon);

        let got = r.get_or_create(&ChannelSpec::at(7_074_000.0).unwrap()).await.unwrap();
        assert_eq!(got.mode, ResolveMode::Created);
        assert_ne!(got.ssrc(), Some(0xBEEF));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_discovery_proceeds_to_create() {
        let daemon = MockDaemon::new();
        let r = ChannelResolverBuilder::new("hf-status.local")
            .source(
                MockDiscoverySource::new(DiscoveryStrategy::Multicast)
                    .with_error(Error::Transport("remote client".into())),
            )
            .connector(MockConnector::new(daemon.clone()))
            .poll_interval(Duration::from_millis(100))
            .confirm_timeout(Duration::from_secs(1))
            .build()
            .unwrap();

        let got = r.get_or_create(&ChannelSpec::at(5_000_000.0).unwrap()).await.unwrap();
        assert_eq!(daemon.create_frequencies(), vec![5_000_000.0]);
        // Acknowledged with an identifier, but never visible.
        assert_eq!(got.mode, ResolveMode::Requested);
        assert!(got.ssrc().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledged_but_unseen_is_requested() {
        let daemon = MockDaemon::new();
        daemon.set_behavior(CreateBehavior::AcknowledgeOnly);
        let r = resolver(&daemon);

        let got = r.get_or_create(&ChannelSpec::at(10_000_000.0).unwrap()).await.unwrap();
        assert_eq!(got.mode, ResolveMode::Requested);
        assert_eq!(got.ssrc(), None);
        assert_eq!(got.record.frequency_hz, 10_000_000.0);
        assert_eq!(daemon.create_frequencies().len(), 1);
        assert_eq!(daemon.connections(), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn daemon_assigned_identifier_recovered_by_attributes() {
        let daemon = MockDaemon::new();
        daemon.set_report_identifier(false);
        let r = resolver(&daemon);

        let got = r.get_or_create(&ChannelSpec::at(3_330_000.0).unwrap()).await.unwrap();
        assert_eq!(got.mode, ResolveMode::Created);
        assert_eq!(got.ssrc(), Some(0x1000));
    }

    #[tokio::test(start_paused = true)]
    async fn client_assigned_identifier_is_sent() {
        let daemon = MockDaemon::new();
        let r = builder(&daemon)
            .identifier_policy(IdentifierPolicy::ClientAssigned)
            .build()
            .unwrap();

        let got = r.get_or_create(&ChannelSpec::at(3_330_000.0).unwrap()).await.unwrap();
        let sent = match &daemon.commands()[0] {
            MockCommand::Create { identifier, .. } => *identifier,
            other => panic!("unexpected command {other:?}"),
        };
        assert!(sent.is_some());
        assert_eq!(got.ssrc(), sent);
    }

    #[tokio::test(start_paused = true)]
    async fn collision_retries_are_bounded() {
        let daemon = MockDaemon::new();
        daemon.set_behavior(CreateBehavior::Silent);
        let r = resolver(&daemon);

        let failure = r
            .get_or_create(&ChannelSpec::at(10_000_000.0).unwrap())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::RetriesExhausted);
        assert_eq!(failure.attempts, 4);
        assert_eq!(failure.frequency_hz, Some(10_000_000.0));
        assert!(failure.last_error.is_some());
        assert_eq!(
            daemon.create_frequencies(),
            vec![10_000_000.0, 10_000_100.0, 10_000_200.0, 10_000_300.0]
        );
        assert_eq!(daemon.connections(), (4, 4));
    }

    #[tokio::test(start_paused = true)]
    async fn collision_fallback_after_rejection() {
        let daemon = MockDaemon::new();
        daemon.set_behavior_at(10_000_000.0, CreateBehavior::Reject("frequency in use".into()));
        let r = resolver(&daemon);

        let got = r.get_or_create(&ChannelSpec::at(10_000_000.0).unwrap()).await.unwrap();
        assert_eq!(got.mode, ResolveMode::CreatedFallback);
        assert_eq!(got.attempts, 2);
        assert_eq!(got.requested_frequency_hz, 10_000_000.0);
        assert_eq!(got.record.frequency_hz, 10_000_100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_attempt_rechecks_existing() {
        let daemon = MockDaemon::new();
        daemon.set_behavior_at(10_000_000.0, CreateBehavior::Reject("frequency in use".into()));
        daemon.add_channel(existing(0x77, 10_000_100.0));
        let r = resolver(&daemon);

        let got = r.get_or_create(&ChannelSpec::at(10_000_000.0).unwrap()).await.unwrap();
        assert_eq!(got.mode, ResolveMode::Existing);
        assert_eq!(got.ssrc(), Some(0x77));
        assert_eq!(got.attempts, 2);
        assert_eq!(daemon.create_frequencies(), vec![10_000_000.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn off_grid_rejection_is_not_retried() {
        let daemon = MockDaemon::new();
        daemon.set_behavior(CreateBehavior::Reject("no free demodulators".into()));
        let r = resolver(&daemon);

        let failure = r
            .get_or_create(&ChannelSpec::at(14_074_001.0).unwrap())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::CommandRejected);
        assert_eq!(failure.attempts, 1);
        assert_eq!(daemon.create_frequencies().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_policy_reports_underlying_kind() {
        let daemon = MockDaemon::new();
        daemon.set_behavior(CreateBehavior::Silent);
        let r = builder(&daemon).collision(CollisionPolicy::disabled()).build().unwrap();

        let failure = r
            .get_or_create(&ChannelSpec::at(10_000_000.0).unwrap())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::ConfirmationTimeout);
        assert_eq!(daemon.create_frequencies().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn always_trigger_with_explicit_budget() {
        let daemon = MockDaemon::new();
        daemon.set_behavior(CreateBehavior::Silent);
        let r = builder(&daemon)
            .collision(CollisionPolicy {
                offset_hz: 50.0,
                trigger: CollisionTrigger::Always,
                max_retries: 3,
            })
            .build()
            .unwrap();

        let token = CancellationToken::new();
        let spec = ChannelSpec::at(7_000_010.0).unwrap();
        let failure = r.get_or_create_with(&spec, 1.0, 1, &token).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::RetriesExhausted);
        assert_eq!(daemon.create_frequencies(), vec![7_000_010.0, 7_000_060.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_is_unavailable() {
        let daemon = MockDaemon::new();
        daemon.fail_connect("host unreachable");
        let r = resolver(&daemon);

        let failure = r
            .get_or_create(&ChannelSpec::at(14_074_001.0).unwrap())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Unavailable);
        assert!(failure.message.contains("host unreachable"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_poll_and_closes_connection() {
        let daemon = MockDaemon::new();
        daemon.set_behavior(CreateBehavior::Silent);
        let r = builder(&daemon)
            .confirm_timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let spec = ChannelSpec::at(10_000_000.0).unwrap();
        let failure = r.get_or_create_with(&spec, 1.0, 3, &token).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(daemon.create_frequencies().len(), 1);
        assert_eq!(daemon.connections(), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_sends_nothing() {
        let daemon = MockDaemon::new();
        let r = resolver(&daemon);
        let token = CancellationToken::new();
        token.cancel();
        let spec = ChannelSpec::at(10_000_000.0).unwrap();
        let failure = r.get_or_create_with(&spec, 1.0, 3, &token).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(failure.attempts, 0);
        assert!(daemon.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remove_by_frequency_without_match_is_not_found() {
        let daemon = MockDaemon::new();
        daemon.add_channel(existing(5, 7_000_000.0));
        let r = resolver(&daemon);

        let failure = r
            .remove(&RemoveTarget::Frequency {
                frequency_hz: 7_100_000.0,
                tolerance_hz: 1.0,
                destination: None,
            })
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert_eq!(failure.frequency_hz, Some(7_100_000.0));
        assert!(daemon.commands().is_empty());
        assert_eq!(daemon.connections(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_by_frequency_resolves_identifier() {
        let daemon = MockDaemon::new();
        daemon.add_channel(existing(0x42, 7_000_000.0));
        let r = builder(&daemon).confirm_removal(true).build().unwrap();

        let removed = r
            .remove(&RemoveTarget::Frequency {
                frequency_hz: 7_000_000.5,
                tolerance_hz: 1.0,
                destination: None,
            })
            .await
            .unwrap();
        assert_eq!(removed.ssrc, 0x42);
        assert_eq!(removed.confirmed, Some(true));
        assert_eq!(daemon.commands(), vec![MockCommand::Remove(0x42)]);
        assert_eq!(daemon.channel(0x42).unwrap().frequency_hz, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_by_identifier_skips_discovery() {
        let daemon = MockDaemon::new();
        let source = MockDiscoverySource::new(DiscoveryStrategy::Multicast);
        let calls = source.call_counter();
        let r = ChannelResolverBuilder::new("hf-status.local")
            .source(source)
            .connector(MockConnector::new(daemon.clone()))
            .build()
            .unwrap();

        let removed = r.remove(&RemoveTarget::Identifier(99)).await.unwrap();
        assert_eq!(removed.ssrc, 99);
        assert_eq!(removed.confirmed, None);
        assert!(removed.metrics.is_some());
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_failure_still_closes_connection() {
        let daemon = MockDaemon::new();
        daemon.fail_removes("unknown ssrc");
        let r = resolver(&daemon);

        let failure = r.remove(&RemoveTarget::Identifier(12)).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::CommandRejected);
        assert_eq!(daemon.connections(), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_rejects_bad_targets() {
        let daemon = MockDaemon::new();
        let r = resolver(&daemon);
        let zero = r.remove(&RemoveTarget::Identifier(0)).await.unwrap_err();
        assert_eq!(zero.kind, FailureKind::InvalidInput);
        let negative = r
            .remove(&RemoveTarget::Frequency {
                frequency_hz: -1.0,
                tolerance_hz: 1.0,
                destination: None,
            })
            .await
            .unwrap_err();
        assert_eq!(negative.kind, FailureKind::InvalidInput);
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_removal_only_warns() {
        let daemon = MockDaemon::new();
        let r = ChannelResolverBuilder::new("hf-status.local")
            .source(
                MockDiscoverySource::new(DiscoveryStrategy::Multicast)
                    .with_channels(vec![existing(0x42, 7_000_000.0)]),
            )
            .connector(MockConnector::new(daemon.clone()))
            .confirm_removal(true)
            .build()
            .unwrap();

        let removed = r.remove(&RemoveTarget::Identifier(0x42)).await.unwrap();
        assert_eq!(removed.confirmed, Some(false));
    }

    #[tokio::test]
    async fn discover_passes_through_reason() {
        let daemon = MockDaemon::new();
        daemon.set_visible(false);
        let r = resolver(&daemon);
        let snap = r.discover(None, Duration::from_millis(10)).await.unwrap();
        assert!(snap.is_empty());
        assert!(snap.reason().unwrap().contains("multicast: no channels"));
        assert!(r.discover(None, Duration::ZERO).await.is_err());
    }
}
