//! Channel matching against a discovery snapshot.
//!
//! Pure functions, no I/O. Candidates are filtered in this order:
//!
//! 1. closed channels (frequency <= 0) are dropped
//! 2. if a preset filter is given, records with another preset are dropped
//!    (case-insensitive)
//! 3. if a sample-rate filter is given, records with another rate are dropped
//!
//! Among the survivors, the record closest to the desired frequency wins,
//! provided it lies within the tolerance. Equal distances resolve to the
//! lowest identifier, because snapshots iterate in identifier order and a
//! later candidate must be strictly closer to replace an earlier one.

use chanlib_core::{ChannelRecord, ChannelSpec, DiscoverySnapshot};

/// What to look for in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCriteria {
    /// Desired frequency in Hz.
    pub frequency_hz: f64,
    /// Maximum allowed `|frequency - desired|` in Hz.
    pub tolerance_hz: f64,
    /// Required preset, if any.
    pub preset: Option<String>,
    /// Required sample rate, if any.
    pub sample_rate: Option<u32>,
}

impl MatchCriteria {
    /// Match by frequency only. Negative or NaN tolerances become zero.
    pub fn new(frequency_hz: f64, tolerance_hz: f64) -> Self {
        MatchCriteria {
            frequency_hz,
            tolerance_hz: tolerance_hz.max(0.0),
            preset: None,
            sample_rate: None,
        }
    }

    /// Match a spec's frequency, preset, and sample rate.
    pub fn for_spec(spec: &ChannelSpec, tolerance_hz: f64) -> Self {
        MatchCriteria::new(spec.frequency_hz(), tolerance_hz)
            .preset(spec.preset())
            .sample_rate(spec.sample_rate())
    }

    /// Require a preset.
    pub fn preset(mut self, preset: &str) -> Self {
        self.preset = Some(preset.to_string());
        self
    }

    /// Require a sample rate.
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Whether `record` passes the closed/preset/rate filters.
    pub fn admits(&self, record: &ChannelRecord) -> bool {
        if record.is_closed() {
            return false;
        }
        if let Some(preset) = &self.preset {
            if !record.preset.eq_ignore_ascii_case(preset) {
                return false;
            }
        }
        if let Some(rate) = self.sample_rate {
            if record.sample_rate != rate {
                return false;
            }
        }
        true
    }

    /// Distance from the desired frequency, if within tolerance.
    fn distance(&self, record: &ChannelRecord) -> Option<f64> {
        let diff = (record.frequency_hz - self.frequency_hz).abs();
        (diff <= self.tolerance_hz).then_some(diff)
    }
}

/// Records that pass the filters and lie within tolerance, in identifier order.
pub fn candidates<'a, 'c>(
    snapshot: &'a DiscoverySnapshot,
    criteria: &'c MatchCriteria,
) -> impl Iterator<Item = &'a ChannelRecord> + 'c
where
    'a: 'c,
{
    snapshot
        .records()
        .filter(move |rec| criteria.admits(rec) && criteria.distance(rec).is_some())
}

/// The best match for `criteria`, or `None`.
///
/// Ties keep the earlier candidate, so the lowest identifier wins.
pub fn find_match<'a>(
    snapshot: &'a DiscoverySnapshot,
    criteria: &MatchCriteria,
) -> Option<&'a ChannelRecord> {
    let mut best: Option<(f64, &ChannelRecord)> = None;
    for rec in candidates(snapshot, criteria) {
        let diff = (rec.frequency_hz - criteria.frequency_hz).abs();
        match best {
            Some((best_diff, _)) if best_diff <= diff => {}
            _ => best = Some((diff, rec)),
        }
    }
    best.map(|(_, rec)| rec)
}

/// Confirm a channel by identifier: present, open, and within tolerance of
/// `frequency_hz`.
pub fn find_identified<'a>(
    snapshot: &'a DiscoverySnapshot,
    ssrc: u32,
    frequency_hz: f64,
    tolerance_hz: f64,
) -> Option<&'a ChannelRecord> {
    let rec = snapshot.get(ssrc)?;
    let within = (rec.frequency_hz - frequency_hz).abs() <= tolerance_hz.max(0.0);
    (!rec.is_closed() && within).then_some(rec)
}
