//! radiod command packet builders.
//!
//! Each builder returns a complete command packet. The command tag is
//! chosen by the caller so replies can be paired with the request.

use bytes::Bytes;

use chanlib_core::ChannelSpec;

use crate::tlv::{self, Encoder, PacketType};

/// Create (or retune) the channel `ssrc` to match `spec`.
///
/// Without an SSRC the daemon picks one and reports it in its reply.
pub fn encode_create(spec: &ChannelSpec, ssrc: Option<u32>, command_tag: u32) -> Bytes {
    let mut enc = Encoder::new(PacketType::Command).int(tlv::COMMAND_TAG, u64::from(command_tag));
    if let Some(ssrc) = ssrc {
        enc = enc.int(tlv::OUTPUT_SSRC, u64::from(ssrc));
    }
    enc.string(tlv::PRESET, spec.preset())
        .int(tlv::OUTPUT_SAMPRATE, u64::from(spec.sample_rate()))
        .socket(tlv::OUTPUT_DATA_DEST_SOCKET, spec.destination().into())
        .bool(tlv::AGC_ENABLE, spec.agc_enable())
        .float(tlv::GAIN, spec.gain_db() as f32)
        .double(tlv::RADIO_FREQUENCY, spec.frequency_hz())
        .finish()
}

/// Remove the channel `ssrc` by tuning it to 0 Hz.
pub fn encode_remove(ssrc: u32, command_tag: u32) -> Bytes {
    Encoder::new(PacketType::Command)
        .int(tlv::COMMAND_TAG, u64::from(command_tag))
        .int(tlv::OUTPUT_SSRC, u64::from(ssrc))
        .double(tlv::RADIO_FREQUENCY, 0.0)
        .finish()
}

/// Ask every channel to report its status.
pub fn encode_poll(command_tag: u32) -> Bytes {
    Encoder::new(PacketType::Command)
        .int(tlv::COMMAND_TAG, u64::from(command_tag))
        .int(tlv::OUTPUT_SSRC, u64::from(tlv::ALL_CHANNELS))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::{as_bool, as_double, as_float, as_socket, as_string, as_u32, decode};

    fn find<'a>(items: &'a [tlv::Item<'a>], tag: u8) -> Option<&'a [u8]> {
        items.iter().find(|i| i.tag == tag).map(|i| i.value)
    }

    #[test]
    fn create_carries_spec() {
        let spec = ChannelSpec::at(9_650_000.0).unwrap().with_gain(12.0).with_agc(true);
        let pkt = encode_create(&spec, Some(0xABCD), 77);
        let (kind, items) = decode(&pkt).unwrap();

        assert_eq!(kind, PacketType::Command);
        assert_eq!(as_u32(find(&items, tlv::COMMAND_TAG).unwrap()).unwrap(), 77);
        assert_eq!(as_u32(find(&items, tlv::OUTPUT_SSRC).unwrap()).unwrap(), 0xABCD);
        assert_eq!(as_double(find(&items, tlv::RADIO_FREQUENCY).unwrap()).unwrap(), 9_650_000.0);
        assert_eq!(as_string(find(&items, tlv::PRESET).unwrap()).unwrap(), "am");
        assert_eq!(as_u32(find(&items, tlv::OUTPUT_SAMPRATE).unwrap()).unwrap(), 12_000);
        assert_eq!(
            as_socket(find(&items, tlv::OUTPUT_DATA_DEST_SOCKET).unwrap()).unwrap(),
            "239.1.2.100:5004".parse().unwrap()
        );
        assert!(as_bool(find(&items, tlv::AGC_ENABLE).unwrap()).unwrap());
        assert_eq!(as_float(find(&items, tlv::GAIN).unwrap()).unwrap(), 12.0);
    }

    #[test]
    fn create_without_ssrc_omits_tag() {
        let spec = ChannelSpec::at(9_650_000.0).unwrap();
        let pkt = encode_create(&spec, None, 1);
        let (_, items) = decode(&pkt).unwrap();
        assert!(find(&items, tlv::OUTPUT_SSRC).is_none());
    }

    #[test]
    fn remove_zeroes_frequency() {
        let pkt = encode_remove(42, 9);
        let (_, items) = decode(&pkt).unwrap();
        assert_eq!(as_u32(find(&items, tlv::OUTPUT_SSRC).unwrap()).unwrap(), 42);
        assert_eq!(as_double(find(&items, tlv::RADIO_FREQUENCY).unwrap()).unwrap(), 0.0);
    }

    #[test]
    fn poll_addresses_all_channels() {
        let pkt = encode_poll(5);
        let (_, items) = decode(&pkt).unwrap();
        assert_eq!(
            as_u32(find(&items, tlv::OUTPUT_SSRC).unwrap()).unwrap(),
            tlv::ALL_CHANNELS
        );
    }
}
