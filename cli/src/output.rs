// JSON result envelopes written to stdout.
//
// Every command prints exactly one object with a `success` field. serde_json
// writes non-finite floats as `null`.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use chanlib::resolver::{FailureKind, Removed, ResolveFailure, ResolvedChannel};
use chanlib::{ChannelRecord, ControlMetrics, DiscoverySnapshot};

#[derive(Debug, Serialize)]
pub struct MetricsJson {
    pub commands_sent: u64,
    pub acknowledgements: u64,
    pub send_errors: u64,
    pub status_received: u64,
}

impl From<ControlMetrics> for MetricsJson {
    fn from(m: ControlMetrics) -> Self {
        MetricsJson {
            commands_sent: m.commands_sent,
            acknowledgements: m.acknowledgements,
            send_errors: m.send_errors,
            status_received: m.status_received,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelJson {
    pub ssrc: Option<u32>,
    pub preset: String,
    pub frequency_hz: f64,
    pub frequency_mhz: f64,
    pub sample_rate: u32,
    pub snr: Option<f32>,
    pub multicast_address: Option<String>,
    pub port: Option<u16>,
}

impl From<&ChannelRecord> for ChannelJson {
    fn from(rec: &ChannelRecord) -> Self {
        ChannelJson {
            ssrc: rec.ssrc,
            preset: rec.preset.clone(),
            frequency_hz: rec.frequency_hz,
            frequency_mhz: rec.frequency_hz / 1e6,
            sample_rate: rec.sample_rate,
            snr: rec.snr_db,
            multicast_address: rec.destination.map(|d| d.addr.to_string()),
            port: rec.destination.map(|d| d.port),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiscoverJson {
    pub success: bool,
    pub strategy: &'static str,
    pub multicast_address: String,
    pub channel_count: usize,
    pub channels: BTreeMap<u32, ChannelJson>,
    pub channels_by_freq: BTreeMap<i64, ChannelJson>,
    /// Distinct RTP destination addresses, sorted.
    pub addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DiscoverJson {
    pub fn new(snapshot: &DiscoverySnapshot, multicast_address: String) -> Self {
        let mut channels = BTreeMap::new();
        let mut channels_by_freq = BTreeMap::new();
        let mut addresses = BTreeSet::new();

        for (ssrc, rec) in snapshot.iter() {
            let json = ChannelJson::from(rec);
            if let Some(dest) = rec.destination {
                addresses.insert(dest.addr.to_string());
            }
            if rec.frequency_hz.is_finite() {
                channels_by_freq.insert(rec.frequency_hz.round() as i64, json.clone());
            }
            channels.insert(ssrc, json);
        }

        let note = if snapshot.is_empty() {
            Some(
                snapshot
                    .reason()
                    .unwrap_or("no channels discovered (may be remote client)")
                    .to_string(),
            )
        } else {
            None
        };

        DiscoverJson {
            success: true,
            strategy: snapshot.strategy().as_str(),
            multicast_address,
            channel_count: channels.len(),
            channels,
            channels_by_freq,
            addresses: addresses.into_iter().collect(),
            note,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResolvedJson {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    pub frequency_hz: f64,
    pub requested_frequency_hz: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multicast_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub sample_rate: u32,
    pub preset: String,
    pub mode: &'static str,
    pub existed: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsJson>,
}

impl ResolvedJson {
    pub fn new(channel: &ResolvedChannel, include_metrics: bool) -> Self {
        let rec = &channel.record;
        ResolvedJson {
            success: true,
            ssrc: rec.ssrc,
            frequency_hz: rec.frequency_hz,
            requested_frequency_hz: channel.requested_frequency_hz,
            multicast_address: rec.destination.map(|d| d.addr.to_string()),
            port: rec.destination.map(|d| d.port),
            sample_rate: rec.sample_rate,
            preset: rec.preset.clone(),
            mode: channel.mode.as_str(),
            existed: channel.mode.existed(),
            attempts: channel.attempts,
            metrics: metrics(channel.metrics, include_metrics),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RemovedJson {
    pub success: bool,
    pub ssrc: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsJson>,
}

impl RemovedJson {
    pub fn new(removed: &Removed, include_metrics: bool) -> Self {
        RemovedJson {
            success: true,
            ssrc: removed.ssrc,
            confirmed: removed.confirmed,
            metrics: metrics(removed.metrics, include_metrics),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FailureJson {
    pub success: bool,
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl FailureJson {
    pub fn new(kind: FailureKind, error: impl Into<String>) -> Self {
        FailureJson {
            success: false,
            error: error.into(),
            kind: kind.as_str(),
            last_error: None,
            frequency_hz: None,
            attempts: None,
        }
    }
}

impl From<&ResolveFailure> for FailureJson {
    fn from(f: &ResolveFailure) -> Self {
        FailureJson {
            success: false,
            error: f.message.clone(),
            kind: f.kind.as_str(),
            last_error: f.last_error.clone(),
            frequency_hz: f.frequency_hz,
            attempts: (f.attempts > 0).then_some(f.attempts),
        }
    }
}

fn metrics(m: Option<ControlMetrics>, include: bool) -> Option<MetricsJson> {
    if include {
        m.map(MetricsJson::from)
    } else {
        None
    }
}
