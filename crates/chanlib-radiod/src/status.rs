//! radiod status packet decoding.
//!
//! A status packet describes one channel. [`decode_status`] pulls out the
//! fields the resolver cares about and ignores everything else, so newer
//! daemons with extra tags still decode.

use std::net::SocketAddr;

use bytes::Bytes;

use chanlib_core::error::Result;
use chanlib_core::{snr_db, ChannelRecord, Destination};

use crate::tlv::{self, Encoder, PacketType};

/// Fields of interest from one status packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub ssrc: Option<u32>,
    /// Echo of the command tag this packet answers, if any.
    pub command_tag: Option<u32>,
    pub frequency_hz: Option<f64>,
    pub preset: Option<String>,
    pub sample_rate: Option<u32>,
    pub destination: Option<SocketAddr>,
    pub low_edge_hz: Option<f32>,
    pub high_edge_hz: Option<f32>,
    pub baseband_power_db: Option<f32>,
    pub noise_density_db: Option<f32>,
    pub gain_db: Option<f32>,
    pub agc_enable: Option<bool>,
}

impl StatusUpdate {
    /// SNR in dB: baseband power over noise integrated across the filter
    /// bandwidth. `None` unless every input is present and finite.
    pub fn snr_db(&self) -> Option<f32> {
        let bandwidth = self.high_edge_hz? - self.low_edge_hz?;
        snr_db(self.baseband_power_db?, self.noise_density_db?, bandwidth)
    }

    /// Channel record for this update; `None` without an SSRC.
    pub fn to_record(&self) -> Option<ChannelRecord> {
        let ssrc = self.ssrc?;
        Some(ChannelRecord {
            ssrc: Some(ssrc),
            frequency_hz: self.frequency_hz.unwrap_or(0.0),
            preset: self.preset.clone().unwrap_or_default(),
            sample_rate: self.sample_rate.unwrap_or(0),
            snr_db: self.snr_db(),
            destination: self.destination.map(Destination::from),
        })
    }

    /// Encode as a status packet, the way radiod reports a channel.
    pub fn encode(&self) -> Bytes {
        let mut enc = Encoder::new(PacketType::Status);
        if let Some(tag) = self.command_tag {
            enc = enc.int(tlv::COMMAND_TAG, u64::from(tag));
        }
        if let Some(ssrc) = self.ssrc {
            enc = enc.int(tlv::OUTPUT_SSRC, u64::from(ssrc));
        }
        if let Some(f) = self.frequency_hz {
            enc = enc.double(tlv::RADIO_FREQUENCY, f);
        }
        if let Some(p) = &self.preset {
            enc = enc.string(tlv::PRESET, p);
        }
        if let Some(rate) = self.sample_rate {
            enc = enc.int(tlv::OUTPUT_SAMPRATE, u64::from(rate));
        }
        if let Some(dest) = self.destination {
            enc = enc.socket(tlv::OUTPUT_DATA_DEST_SOCKET, dest);
        }
        for (tag, value) in [
            (tlv::LOW_EDGE, self.low_edge_hz),
            (tlv::HIGH_EDGE, self.high_edge_hz),
            (tlv::BASEBAND_POWER, self.baseband_power_db),
            (tlv::NOISE_DENSITY, self.noise_density_db),
            (tlv::GAIN, self.gain_db),
        ] {
            if let Some(v) = value {
                enc = enc.float(tag, v);
            }
        }
        if let Some(agc) = self.agc_enable {
            enc = enc.bool(tlv::AGC_ENABLE, agc);
        }
        enc.finish()
    }
}

/// Decode a datagram from the status group.
///
/// Command packets (ours or other clients') yield `Ok(None)`.
pub fn decode_status(data: &[u8]) -> Result<Option<StatusUpdate>> {
    let (kind, items) = tlv::decode(data)?;
    if kind != PacketType::Status {
        return Ok(None);
    }

    let mut update = StatusUpdate::default();
    for item in items {
        let v = item.value;
        match item.tag {
            tlv::COMMAND_TAG => update.command_tag = Some(tlv::as_u32(v)?),
            tlv::OUTPUT_SSRC => update.ssrc = Some(tlv::as_u32(v)?),
            tlv::RADIO_FREQUENCY => update.frequency_hz = Some(tlv::as_double(v)?),
            tlv::PRESET => update.preset = Some(tlv::as_string(v)?),
            tlv::OUTPUT_SAMPRATE => update.sample_rate = Some(tlv::as_u32(v)?),
            tlv::OUTPUT_DATA_DEST_SOCKET => update.destination = Some(tlv::as_socket(v)?),
            tlv::LOW_EDGE => update.low_edge_hz = Some(tlv::as_float(v)?),
            tlv::HIGH_EDGE => update.high_edge_hz = Some(tlv::as_float(v)?),
            tlv::BASEBAND_POWER => update.baseband_power_db = Some(tlv::as_float(v)?),
            tlv::NOISE_DENSITY => update.noise_density_db = Some(tlv::as_float(v)?),
            tlv::GAIN => update.gain_db = Some(tlv::as_float(v)?),
            tlv::AGC_ENABLE => update.agc_enable = Some(tlv::as_bool(v)?),
            _ => {}
        }
    }
    Ok(Some(update))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_update() -> StatusUpdate {
        StatusUpdate {
            ssrc: Some(10_000),
            command_tag: None,
            frequency_hz: Some(10_000_000.0),
            preset: Some("am".into()),
            sample_rate: Some(12_000),
            destination: Some("239.1.2.100:5004".parse().unwrap()),
            low_edge_hz: Some(-5_000.0),
            high_edge_hz: Some(5_000.0),
            baseband_power_db: Some(-30.0),
            noise_density_db: Some(-80.0),
            gain_db: Some(30.0),
            agc_enable: Some(false),
        }
    }

    #[test]
    fn decodes_channel_fields() {
        let update = decode_status(&full_update().encode()).unwrap().unwrap();
        assert_eq!(update, full_update());

        let rec = update.to_record().unwrap();
        assert_eq!(rec.ssrc, Some(10_000));
        assert_eq!(rec.preset, "am");
        assert_eq!(rec.destination.unwrap().to_string(), "239.1.2.100:5004");
        // -30 - (-80 + 40) = 10 dB
        assert!((rec.snr_db.unwrap() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn snr_needs_every_input() {
        let mut update = full_update();
        update.noise_density_db = None;
        assert_eq!(update.snr_db(), None);
        assert_eq!(update.to_record().unwrap().snr_db, None);
    }

    #[test]
    fn command_packets_are_ignored() {
        let cmd = Encoder::new(PacketType::Command)
            .int(tlv::OUTPUT_SSRC, 5)
            .double(tlv::RADIO_FREQUENCY, 0.0)
            .finish();
        assert_eq!(decode_status(&cmd).unwrap(), None);
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let pkt = Encoder::new(PacketType::Status)
            .int(tlv::OUTPUT_SSRC, 7)
            .string(250, "future field")
            .double(tlv::RADIO_FREQUENCY, 7_074_000.0)
            .finish();
        let update = decode_status(&pkt).unwrap().unwrap();
        assert_eq!(update.ssrc, Some(7));
        assert_eq!(update.frequency_hz, Some(7_074_000.0));
    }

    #[test]
    fn record_requires_ssrc() {
        let update = StatusUpdate {
            frequency_hz: Some(1e6),
            ..StatusUpdate::default()
        };
        assert!(update.to_record().is_none());
    }

    #[test]
    fn closing_channel_decodes_as_closed() {
        let update = StatusUpdate {
            ssrc: Some(3),
            frequency_hz: Some(0.0),
            ..StatusUpdate::default()
        };
        let rec = decode_status(&update.encode()).unwrap().unwrap().to_record().unwrap();
        assert!(rec.is_closed());
    }
}
