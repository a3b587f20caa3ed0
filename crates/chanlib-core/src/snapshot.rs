//! The result of one discovery pass.
//!
//! A [`DiscoverySnapshot`] maps channel identifiers to observed records and
//! remembers which strategy produced it. An empty snapshot may carry a
//! human-readable reason; emptiness is a normal outcome, not an error.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::IpAddr;

use crate::types::ChannelRecord;

/// Which discovery strategy produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryStrategy {
    /// No strategy produced data.
    None,
    /// The daemon's periodic multicast status broadcast.
    Multicast,
    /// A status query over the control link.
    ControlQuery,
}

impl DiscoveryStrategy {
    /// Stable lowercase name used in CLI output and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryStrategy::None => "none",
            DiscoveryStrategy::Multicast => "multicast",
            DiscoveryStrategy::ControlQuery => "control-query",
        }
    }
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier -> record mapping from one discovery pass.
///
/// Channels are kept in a `BTreeMap` so iteration is ordered by identifier,
/// which the matcher relies on for deterministic tie-breaking.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverySnapshot {
    channels: BTreeMap<u32, ChannelRecord>,
    strategy: DiscoveryStrategy,
    reason: Option<String>,
}

impl DiscoverySnapshot {
    /// An empty snapshot produced by `strategy`.
    pub fn new(strategy: DiscoveryStrategy) -> Self {
        DiscoverySnapshot {
            channels: BTreeMap::new(),
            strategy,
            reason: None,
        }
    }

    /// An empty snapshot explaining why nothing was found.
    pub fn empty(reason: impl Into<String>) -> Self {
        DiscoverySnapshot {
            channels: BTreeMap::new(),
            strategy: DiscoveryStrategy::None,
            reason: Some(reason.into()),
        }
    }

    /// Build a snapshot from a source's raw output.
    ///
    /// The map key is authoritative: each record's `ssrc` is overwritten
    /// with the key it was stored under.
    pub fn from_records(strategy: DiscoveryStrategy, records: HashMap<u32, ChannelRecord>) -> Self {
        let mut snap = DiscoverySnapshot::new(strategy);
        for (ssrc, mut record) in records {
            record.ssrc = Some(ssrc);
            snap.channels.insert(ssrc, record);
        }
        snap
    }

    /// Insert or replace a record. Records without an identifier are ignored.
    ///
    /// Returns `true` if the record was stored.
    pub fn insert(&mut self, record: ChannelRecord) -> bool {
        match record.ssrc {
            Some(ssrc) => {
                self.channels.insert(ssrc, record);
                true
            }
            None => false,
        }
    }

    /// Merge `newer` into this snapshot by identifier; `newer` wins on conflict.
    ///
    /// The strategy tag is kept unless this snapshot had none. A reason is
    /// cleared once the merged snapshot holds any channel.
    pub fn merge(&mut self, newer: DiscoverySnapshot) {
        if self.strategy == DiscoveryStrategy::None {
            self.strategy = newer.strategy;
        }
        self.channels.extend(newer.channels);
        if !self.channels.is_empty() {
            self.reason = None;
        }
    }

    /// Keep only records whose output destination address equals `addr`.
    ///
    /// Records with no known destination are dropped.
    pub fn retain_destination(&mut self, addr: IpAddr) {
        self.channels
            .retain(|_, rec| rec.destination.is_some_and(|d| d.has_addr(addr)));
    }

    pub fn strategy(&self) -> DiscoveryStrategy {
        self.strategy
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn get(&self, ssrc: u32) -> Option<&ChannelRecord> {
        self.channels.get(&ssrc)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Iterate `(ssrc, record)` pairs in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ChannelRecord)> {
        self.channels.iter().map(|(k, v)| (*k, v))
    }

    /// Iterate records in ascending identifier order.
    pub fn records(&self) -> impl Iterator<Item = &ChannelRecord> {
        self.channels.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Destination;

    fn rec(ssrc: u32, freq: f64) -> ChannelRecord {
        ChannelRecord {
            ssrc: Some(ssrc),
            frequency_hz: freq,
            preset: "am".into(),
            sample_rate: 12_000,
            ..ChannelRecord::default()
        }
    }

    #[test]
    fn strategy_names() {
        assert_eq!(DiscoveryStrategy::None.to_string(), "none");
        assert_eq!(DiscoveryStrategy::Multicast.to_string(), "multicast");
        assert_eq!(DiscoveryStrategy::ControlQuery.to_string(), "control-query");
    }

    #[test]
    fn empty_snapshot_carries_reason() {
        let snap = DiscoverySnapshot::empty("remote client, multicast unreachable");
        assert!(snap.is_empty());
        assert_eq!(snap.strategy(), DiscoveryStrategy::None);
        assert_eq!(snap.reason(), Some("remote client, multicast unreachable"));
    }

    #[test]
    fn from_records_uses_key_as_identifier() {
        let mut raw = HashMap::new();
        raw.insert(42, ChannelRecord { ssrc: None, ..rec(0, 7e6) });
        let snap = DiscoverySnapshot::from_records(DiscoveryStrategy::Multicast, raw);
        assert_eq!(snap.get(42).unwrap().ssrc, Some(42));
    }

    #[test]
    fn insert_ignores_unidentified_records() {
        let mut snap = DiscoverySnapshot::new(DiscoveryStrategy::Multicast);
        assert!(!snap.insert(ChannelRecord::default()));
        assert!(snap.insert(rec(1, 1e6)));
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn merge_newer_wins_by_identifier() {
        let mut older = DiscoverySnapshot::new(DiscoveryStrategy::Multicast);
        older.insert(rec(1, 1_000_000.0));
        older.insert(rec(2, 2_000_000.0));

        let mut newer = DiscoverySnapshot::new(DiscoveryStrategy::ControlQuery);
        newer.insert(rec(2, 2_500_000.0));
        newer.insert(rec(3, 3_000_000.0));

        older.merge(newer);
        assert_eq!(older.len(), 3);
        assert_eq!(older.get(2).unwrap().frequency_hz, 2_500_000.0);
        assert_eq!(older.strategy(), DiscoveryStrategy::Multicast);
    }

    #[test]
    fn merge_into_empty_takes_strategy_and_clears_reason() {
        let mut base = DiscoverySnapshot::empty("nothing yet");
        let mut newer = DiscoverySnapshot::new(DiscoveryStrategy::ControlQuery);
        newer.insert(rec(9, 9e6));
        base.merge(newer);
        assert_eq!(base.strategy(), DiscoveryStrategy::ControlQuery);
        assert_eq!(base.reason(), None);
    }

    #[test]
    fn retain_destination_filters_by_address() {
        let a: Destination = "239.1.2.100:5004".parse().unwrap();
        let b: Destination = "239.9.9.9:5004".parse().unwrap();
        let mut snap = DiscoverySnapshot::new(DiscoveryStrategy::Multicast);
        snap.insert(ChannelRecord { destination: Some(a), ..rec(1, 1e6) });
        snap.insert(ChannelRecord { destination: Some(b), ..rec(2, 1e6) });
        snap.insert(rec(3, 1e6));

        snap.retain_destination(a.addr);
        let ids: Vec<u32> = snap.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn iteration_is_ordered_by_identifier() {
        let mut snap = DiscoverySnapshot::new(DiscoveryStrategy::Multicast);
        for id in [30, 10, 20] {
            snap.insert(rec(id, 1e6));
        }
        let ids: Vec<u32> = snap.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }
}
