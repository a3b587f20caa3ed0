//! In-memory daemon model shared by the mock collaborators.
//!
//! A [`MockDaemon`] holds the channel table that [`MockDiscoverySource`]
//! reports and [`MockControlChannel`] mutates. Behavior is configured per
//! daemon (and optionally per frequency) so tests can script collisions,
//! silent drops, and acknowledged-but-never-visible channels.
//!
//! [`MockDiscoverySource`]: crate::MockDiscoverySource
//! [`MockControlChannel`]: crate::MockControlChannel

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chanlib_core::error::{Error, Result};
use chanlib_core::{ChannelRecord, ChannelSpec, CreateReceipt};

/// First identifier handed out when the daemon assigns one.
const FIRST_DAEMON_SSRC: u32 = 0x1000;

/// How the daemon answers a create request.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateBehavior {
    /// Acknowledge and add the channel to the table.
    Materialize,
    /// Acknowledge, but the channel never shows up.
    AcknowledgeOnly,
    /// No acknowledgement and no channel.
    Silent,
    /// Refuse with the given message.
    Reject(String),
}

/// A command received by the daemon.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    /// A create request.
    Create {
        /// Requested frequency in Hz.
        frequency_hz: f64,
        /// Identifier supplied by the caller, if any.
        identifier: Option<u32>,
    },
    /// A remove request.
    Remove(u32),
}

#[derive(Debug)]
struct DaemonState {
    channels: BTreeMap<u32, ChannelRecord>,
    behavior: CreateBehavior,
    overrides: Vec<(f64, CreateBehavior)>,
    report_identifier: bool,
    next_ssrc: u32,
    visible: bool,
    answers_queries: bool,
    remove_error: Option<String>,
    connect_error: Option<String>,
    commands: Vec<MockCommand>,
    opened: usize,
    closed: usize,
}

impl Default for DaemonState {
    fn default() -> Self {
        DaemonState {
            channels: BTreeMap::new(),
            behavior: CreateBehavior::Materialize,
            overrides: Vec::new(),
            report_identifier: true,
            next_ssrc: FIRST_DAEMON_SSRC,
            visible: true,
            answers_queries: false,
            remove_error: None,
            connect_error: None,
            commands: Vec::new(),
            opened: 0,
            closed: 0,
        }
    }
}

/// Shared, cloneable handle to an in-memory daemon.
#[derive(Debug, Clone, Default)]
pub struct MockDaemon {
    inner: Arc<Mutex<DaemonState>>,
}

impl MockDaemon {
    /// A daemon with no channels that materializes every create.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DaemonState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pre-populate a channel. Records without an identifier are ignored.
    pub fn add_channel(&self, record: ChannelRecord) {
        if let Some(ssrc) = record.ssrc {
            self.state().channels.insert(ssrc, record);
        }
    }

    /// Set the default create behavior.
    pub fn set_behavior(&self, behavior: CreateBehavior) {
        self.state().behavior = behavior;
    }

    /// Override the create behavior for one frequency (matched to 0.5 Hz).
    pub fn set_behavior_at(&self, frequency_hz: f64, behavior: CreateBehavior) {
        self.state().overrides.push((frequency_hz, behavior));
    }

    /// Whether a daemon-chosen identifier is reported back in the receipt.
    pub fn set_report_identifier(&self, report: bool) {
        self.state().report_identifier = report;
    }

    /// Whether discovery sources backed by this daemon can see anything.
    pub fn set_visible(&self, visible: bool) {
        self.state().visible = visible;
    }

    /// Whether the control link answers status queries.
    pub fn set_answers_queries(&self, answers: bool) {
        self.state().answers_queries = answers;
    }

    /// Make every remove fail with `Error::Rejected(msg)`.
    pub fn fail_removes(&self, msg: &str) {
        self.state().remove_error = Some(msg.to_string());
    }

    /// Make every connect fail with `Error::Transport(msg)`.
    pub fn fail_connect(&self, msg: &str) {
        self.state().connect_error = Some(msg.to_string());
    }

    /// All commands received so far, in order.
    pub fn commands(&self) -> Vec<MockCommand> {
        self.state().commands.clone()
    }

    /// Frequencies of all create commands, in order.
    pub fn create_frequencies(&self) -> Vec<f64> {
        self.state()
            .commands
            .iter()
            .filter_map(|c| match c {
                MockCommand::Create { frequency_hz, .. } => Some(*frequency_hz),
                MockCommand::Remove(_) => None,
            })
            .collect()
    }

    /// `(opened, closed)` control connection counts.
    pub fn connections(&self) -> (usize, usize) {
        let s = self.state();
        (s.opened, s.closed)
    }

    /// Current record for `ssrc`, regardless of visibility.
    pub fn channel(&self, ssrc: u32) -> Option<ChannelRecord> {
        self.state().channels.get(&ssrc).cloned()
    }

    /// The channel table as seen by multicast-style discovery.
    pub fn visible_channels(&self) -> HashMap<u32, ChannelRecord> {
        let s = self.state();
        if !s.visible {
            return HashMap::new();
        }
        s.channels.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    pub(crate) fn open_connection(&self) -> Result<()> {
        let mut s = self.state();
        if let Some(msg) = &s.connect_error {
            return Err(Error::Transport(msg.clone()));
        }
        s.opened += 1;
        Ok(())
    }

    pub(crate) fn close_connection(&self) {
        self.state().closed += 1;
    }

    pub(crate) fn handle_create(
        &self,
        spec: &ChannelSpec,
        identifier: Option<u32>,
    ) -> Result<CreateReceipt> {
        let mut s = self.state();
        s.commands.push(MockCommand::Create {
            frequency_hz: spec.frequency_hz(),
            identifier,
        });

        let behavior = s
            .overrides
            .iter()
            .find(|(f, _)| (f - spec.frequency_hz()).abs() < 0.5)
            .map(|(_, b)| b.clone())
            .unwrap_or_else(|| s.behavior.clone());

        match behavior {
            CreateBehavior::Reject(msg) => Err(Error::Rejected(msg)),
            CreateBehavior::Silent => Ok(CreateReceipt {
                identifier,
                acknowledged: false,
            }),
            CreateBehavior::AcknowledgeOnly => Ok(CreateReceipt {
                identifier,
                acknowledged: true,
            }),
            CreateBehavior::Materialize => {
                let ssrc = match identifier {
                    Some(id) => id,
                    None => {
                        let id = s.next_ssrc;
                        s.next_ssrc += 1;
                        id
                    }
                };
                s.channels
                    .insert(ssrc, ChannelRecord::from_spec(spec, Some(ssrc)));
                let reported = identifier.is_some() || s.report_identifier;
                Ok(CreateReceipt {
                    identifier: reported.then_some(ssrc),
                    acknowledged: true,
                })
            }
        }
    }

    pub(crate) fn handle_remove(&self, ssrc: u32) -> Result<()> {
        let mut s = self.state();
        s.commands.push(MockCommand::Remove(ssrc));
        if let Some(msg) = &s.remove_error {
            return Err(Error::Rejected(msg.clone()));
        }
        // radiod marks the channel closing by zeroing its frequency.
        if let Some(rec) = s.channels.get_mut(&ssrc) {
            rec.frequency_hz = 0.0;
        }
        Ok(())
    }

    pub(crate) fn handle_query(&self) -> Result<HashMap<u32, ChannelRecord>> {
        let s = self.state();
        if !s.answers_queries {
            return Err(Error::Unsupported("status query over control link".into()));
        }
        Ok(s.channels.iter().map(|(k, v)| (*k, v.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_assigns_sequential_identifiers() {
        let d = MockDaemon::new();
        let spec = ChannelSpec::at(7_000_000.0).unwrap();
        let r1 = d.handle_create(&spec, None).unwrap();
        let r2 = d.handle_create(&spec, None).unwrap();
        assert_eq!(r1.identifier, Some(FIRST_DAEMON_SSRC));
        assert_eq!(r2.identifier, Some(FIRST_DAEMON_SSRC + 1));
        assert_eq!(d.visible_channels().len(), 2);
    }

    #[test]
    fn unreported_identifier_still_materializes() {
        let d = MockDaemon::new();
        d.set_report_identifier(false);
        let spec = ChannelSpec::at(7_000_000.0).unwrap();
        let r = d.handle_create(&spec, None).unwrap();
        assert_eq!(r.identifier, None);
        assert!(r.acknowledged);
        assert!(d.channel(FIRST_DAEMON_SSRC).is_some());
    }

    #[test]
    fn per_frequency_override() {
        let d = MockDaemon::new();
        d.set_behavior_at(10_000_000.0, CreateBehavior::Reject("busy".into()));
        let blocked = ChannelSpec::at(10_000_000.0).unwrap();
        let free = ChannelSpec::at(10_000_100.0).unwrap();
        assert!(matches!(d.handle_create(&blocked, None), Err(Error::Rejected(_))));
        assert!(d.handle_create(&free, Some(5)).is_ok());
        assert_eq!(d.create_frequencies(), vec![10_000_000.0, 10_000_100.0]);
    }

    #[test]
    fn remove_zeroes_frequency() {
        let d = MockDaemon::new();
        let spec = ChannelSpec::at(7_000_000.0).unwrap();
        d.handle_create(&spec, Some(42)).unwrap();
        d.handle_remove(42).unwrap();
        assert_eq!(d.channel(42).unwrap().frequency_hz, 0.0);
        assert_eq!(d.commands().last(), Some(&MockCommand::Remove(42)));
    }

    #[test]
    fn invisible_daemon_hides_channels() {
        let d = MockDaemon::new();
        d.add_channel(ChannelRecord {
            ssrc: Some(1),
            frequency_hz: 1e6,
            ..ChannelRecord::default()
        });
        d.set_visible(false);
        assert!(d.visible_channels().is_empty());
        assert!(d.handle_query().is_err());
        d.set_answers_queries(true);
        assert_eq!(d.handle_query().unwrap().len(), 1);
    }
}
