//! radiod TLV packet encoding and decoding.
//!
//! Status and command packets share one layout:
//!
//! ```text
//! <type> { <tag> <length> <value> } <EOL>
//! ```
//!
//! - `type` is one byte: `0` status, `1` command
//! - `length` is one byte when below `0x80`; otherwise `0x80 | n` followed by
//!   `n` big-endian length bytes
//! - integers are big-endian with leading zero bytes stripped, so zero has
//!   length 0
//! - `f32`/`f64` values travel as their IEEE bit patterns, encoded as integers
//! - sockets are 4 or 16 address bytes followed by a 2-byte port
//!
//! All encoding/decoding in this module is pure -- no I/O is performed.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::{BufMut, Bytes, BytesMut};

use chanlib_core::error::{Error, Result};

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// End of packet.
pub const EOL: u8 = 0;
/// Caller-chosen tag echoed in the daemon's reply.
pub const COMMAND_TAG: u8 = 1;
/// RTP output destination socket.
pub const OUTPUT_DATA_DEST_SOCKET: u8 = 17;
/// Channel identifier (RTP SSRC).
pub const OUTPUT_SSRC: u8 = 18;
/// Output sample rate in Hz.
pub const OUTPUT_SAMPRATE: u8 = 20;
/// Tuned frequency in Hz (double). Zero removes the channel.
pub const RADIO_FREQUENCY: u8 = 33;
/// Filter low edge in Hz (float).
pub const LOW_EDGE: u8 = 39;
/// Filter high edge in Hz (float).
pub const HIGH_EDGE: u8 = 40;
/// Baseband power in dB (float).
pub const BASEBAND_POWER: u8 = 46;
/// Noise spectral density in dB/Hz (float).
pub const NOISE_DENSITY: u8 = 47;
/// AGC on/off.
pub const AGC_ENABLE: u8 = 62;
/// Manual gain in dB (float).
pub const GAIN: u8 = 68;
/// Demodulation preset name.
pub const PRESET: u8 = 85;

/// SSRC value that addresses every channel in a poll.
pub const ALL_CHANNELS: u32 = u32::MAX;

/// Packet direction byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Status,
    Command,
}

impl PacketType {
    fn byte(self) -> u8 {
        match self {
            PacketType::Status => 0,
            PacketType::Command => 1,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(PacketType::Status),
            1 => Ok(PacketType::Command),
            other => Err(Error::Protocol(format!("unknown packet type {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Builder for one TLV packet.
#[derive(Debug)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Start a packet of the given type.
    pub fn new(kind: PacketType) -> Self {
        let mut buf = BytesMut::with_capacity(128);
        buf.put_u8(kind.byte());
        Encoder { buf }
    }

    fn put_item(&mut self, tag: u8, value: &[u8]) {
        self.buf.put_u8(tag);
        put_length(&mut self.buf, value.len());
        self.buf.put_slice(value);
    }

    /// Unsigned integer, leading zero bytes stripped.
    pub fn int(mut self, tag: u8, value: u64) -> Self {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        self.put_item(tag, &bytes[skip..]);
        self
    }

    pub fn bool(self, tag: u8, value: bool) -> Self {
        self.int(tag, u64::from(value))
    }

    pub fn float(self, tag: u8, value: f32) -> Self {
        self.int(tag, u64::from(value.to_bits()))
    }

    pub fn double(self, tag: u8, value: f64) -> Self {
        self.int(tag, value.to_bits())
    }

    pub fn string(mut self, tag: u8, value: &str) -> Self {
        self.put_item(tag, value.as_bytes());
        self
    }

    pub fn socket(mut self, tag: u8, addr: SocketAddr) -> Self {
        let mut value = Vec::with_capacity(18);
        match addr.ip() {
            IpAddr::V4(v4) => value.extend_from_slice(&v4.octets()),
            IpAddr::V6(v6) => value.extend_from_slice(&v6.octets()),
        }
        value.extend_from_slice(&addr.port().to_be_bytes());
        self.put_item(tag, &value);
        self
    }

    /// Append `EOL` and return the finished packet.
    pub fn finish(mut self) -> Bytes {
        self.buf.put_u8(EOL);
        self.buf.freeze()
    }
}

fn put_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    buf.put_u8(0x80 | significant.len() as u8);
    buf.put_slice(significant);
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// One decoded item; `value` borrows from the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Split a packet into its type and items.
///
/// Stops at `EOL` or the end of the buffer. A length that runs past the
/// buffer is a [`Error::Protocol`].
pub fn decode(data: &[u8]) -> Result<(PacketType, Vec<Item<'_>>)> {
    let (&first, mut rest) = data
        .split_first()
        .ok_or_else(|| Error::Protocol("empty packet".into()))?;
    let kind = PacketType::from_byte(first)?;

    let mut items = Vec::new();
    while let Some((&tag, after_tag)) = rest.split_first() {
        if tag == EOL {
            break;
        }
        let (len, after_len) = read_length(after_tag, tag)?;
        if after_len.len() < len {
            return Err(Error::Protocol(format!(
                "tag {tag}: value needs {len} bytes, {} left",
                after_len.len()
            )));
        }
        let (value, next) = after_len.split_at(len);
        items.push(Item { tag, value });
        rest = next;
    }
    Ok((kind, items))
}

fn read_length(data: &[u8], tag: u8) -> Result<(usize, &[u8])> {
    let (&first, rest) = data
        .split_first()
        .ok_or_else(|| Error::Protocol(format!("tag {tag}: missing length")))?;
    if first & 0x80 == 0 {
        return Ok((usize::from(first), rest));
    }
    let n = usize::from(first & 0x7F);
    if n == 0 || n > 4 || rest.len() < n {
        return Err(Error::Protocol(format!("tag {tag}: bad extended length")));
    }
    let len = rest[..n]
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
    Ok((len, &rest[n..]))
}

/// Big-endian unsigned integer of up to 8 bytes.
pub fn as_int(value: &[u8]) -> Result<u64> {
    if value.len() > 8 {
        return Err(Error::Protocol(format!(
            "integer of {} bytes does not fit in 64 bits",
            value.len()
        )));
    }
    Ok(value.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

pub fn as_u32(value: &[u8]) -> Result<u32> {
    let v = as_int(value)?;
    u32::try_from(v).map_err(|_| Error::Protocol(format!("value {v} does not fit in 32 bits")))
}

pub fn as_bool(value: &[u8]) -> Result<bool> {
    Ok(as_int(value)? != 0)
}

/// A float; an 8-byte value is read as a double and narrowed.
pub fn as_float(value: &[u8]) -> Result<f32> {
    if value.len() > 4 {
        return Ok(as_double(value)? as f32);
    }
    Ok(f32::from_bits(as_int(value)? as u32))
}

/// A double; a value of 4 bytes or fewer is read as a float and widened.
pub fn as_double(value: &[u8]) -> Result<f64> {
    if value.len() <= 4 {
        return Ok(f64::from(f32::from_bits(as_int(value)? as u32)));
    }
    Ok(f64::from_bits(as_int(value)?))
}

pub fn as_string(value: &[u8]) -> Result<String> {
    String::from_utf8(value.to_vec()).map_err(|_| Error::Protocol("string is not valid UTF-8".into()))
}

pub fn as_socket(value: &[u8]) -> Result<SocketAddr> {
    match value.len() {
        6 => {
            let ip = Ipv4Addr::new(value[0], value[1], value[2], value[3]);
            let port = u16::from_be_bytes([value[4], value[5]]);
            Ok(SocketAddr::new(IpAddr::V4(ip), port))
        }
        18 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&value[..16]);
            let port = u16::from_be_bytes([value[16], value[17]]);
            Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        n => Err(Error::Protocol(format!("socket value of {n} bytes"))),
    }
}
