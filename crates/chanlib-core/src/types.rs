//! Core types used throughout chanlib.
//!
//! [`ChannelSpec`] is what the caller wants; [`ChannelRecord`] is what
//! discovery saw. The resolver compares the two and never mutates either.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default demodulation preset for new channels.
pub const DEFAULT_PRESET: &str = "am";

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 12_000;

/// Default RTP destination group for created channels.
pub const DEFAULT_RTP_DESTINATION: Ipv4Addr = Ipv4Addr::new(239, 1, 2, 100);

/// Default RTP destination port.
pub const DEFAULT_RTP_PORT: u16 = 5004;

/// Default manual gain in dB.
pub const DEFAULT_GAIN_DB: f64 = 30.0;

/// Output destination of a channel's RTP stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Destination {
    /// Destination address (usually a multicast group).
    pub addr: IpAddr,
    /// Destination UDP port.
    pub port: u16,
}

impl Destination {
    /// Create a destination from an address and port.
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Destination { addr, port }
    }

    /// Whether this destination uses the given address, regardless of port.
    pub fn has_addr(&self, addr: IpAddr) -> bool {
        self.addr == addr
    }
}

impl Default for Destination {
    fn default() -> Self {
        Destination {
            addr: IpAddr::V4(DEFAULT_RTP_DESTINATION),
            port: DEFAULT_RTP_PORT,
        }
    }
}

impl From<SocketAddr> for Destination {
    fn from(sa: SocketAddr) -> Self {
        Destination::new(sa.ip(), sa.port())
    }
}

impl From<Destination> for SocketAddr {
    fn from(d: Destination) -> Self {
        SocketAddr::new(d.addr, d.port)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddr::new(self.addr, self.port))
    }
}

/// Error returned when a string cannot be parsed into a [`Destination`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDestinationError(String);

impl fmt::Display for ParseDestinationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid destination: {}", self.0)
    }
}

impl std::error::Error for ParseDestinationError {}

impl FromStr for Destination {
    type Err = ParseDestinationError;

    /// Accepts `addr:port`, `[v6]:port`, or a bare address (port 5004).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(sa) = s.parse::<SocketAddr>() {
            return Ok(sa.into());
        }
        s.parse::<IpAddr>()
            .map(|addr| Destination::new(addr, DEFAULT_RTP_PORT))
            .map_err(|_| ParseDestinationError(s.to_string()))
    }
}

/// Desired channel state supplied by the caller.
///
/// Fields are private so a spec cannot change once handed to the
/// resolver. Collision retries derive a new spec via
/// [`with_frequency`](ChannelSpec::with_frequency).
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    frequency_hz: f64,
    preset: String,
    sample_rate: u32,
    destination: Destination,
    gain_db: f64,
    agc_enable: bool,
}

impl ChannelSpec {
    /// Create a validated spec.
    ///
    /// The preset is normalized to lowercase. Gain defaults to
    /// [`DEFAULT_GAIN_DB`] and AGC is off.
    pub fn new(
        frequency_hz: f64,
        preset: &str,
        sample_rate: u32,
        destination: Destination,
    ) -> Result<Self> {
        validate_frequency(frequency_hz)?;
        let preset = preset.trim().to_ascii_lowercase();
        if preset.is_empty() {
            return Err(Error::InvalidInput("preset must not be empty".into()));
        }
        if sample_rate == 0 {
            return Err(Error::InvalidInput("sample rate must be positive".into()));
        }
        Ok(ChannelSpec {
            frequency_hz,
            preset,
            sample_rate,
            destination,
            gain_db: DEFAULT_GAIN_DB,
            agc_enable: false,
        })
    }

    /// Spec with default preset, sample rate, and destination.
    pub fn at(frequency_hz: f64) -> Result<Self> {
        Self::new(
            frequency_hz,
            DEFAULT_PRESET,
            DEFAULT_SAMPLE_RATE,
            Destination::default(),
        )
    }

    /// Set the manual gain in dB.
    pub fn with_gain(mut self, gain_db: f64) -> Self {
        self.gain_db = gain_db;
        self
    }

    /// Enable or disable AGC.
    pub fn with_agc(mut self, enable: bool) -> Self {
        self.agc_enable = enable;
        self
    }

    /// Derive a new spec identical to this one except for the frequency.
    pub fn with_frequency(&self, frequency_hz: f64) -> Result<Self> {
        validate_frequency(frequency_hz)?;
        Ok(ChannelSpec {
            frequency_hz,
            ..self.clone()
        })
    }

    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    pub fn preset(&self) -> &str {
        &self.preset
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }

    pub fn agc_enable(&self) -> bool {
        self.agc_enable
    }
}

fn validate_frequency(frequency_hz: f64) -> Result<()> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "frequency must be a positive number of Hz, got {frequency_hz}"
        )));
    }
    Ok(())
}

/// A channel as observed by discovery.
///
/// `ssrc` is the daemon's identifier. It is `None` only for channels that
/// were requested but whose identifier has not been observed yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelRecord {
    /// Daemon-assigned channel identifier (RTP SSRC).
    pub ssrc: Option<u32>,
    /// Tuned frequency in Hz. Zero or negative means closing/closed.
    pub frequency_hz: f64,
    /// Demodulation preset (e.g. "am", "usb", "iq"). Empty when unknown.
    pub preset: String,
    /// Output sample rate in Hz. Zero when unknown.
    pub sample_rate: u32,
    /// Signal-to-noise estimate in dB, when the daemon reported enough to compute it.
    pub snr_db: Option<f32>,
    /// RTP output destination, when known.
    pub destination: Option<Destination>,
}

impl ChannelRecord {
    /// Whether the daemon has marked this channel for removal.
    pub fn is_closed(&self) -> bool {
        self.frequency_hz.is_nan() || self.frequency_hz <= 0.0
    }

    /// Build the record a freshly requested channel is expected to produce.
    pub fn from_spec(spec: &ChannelSpec, ssrc: Option<u32>) -> Self {
        ChannelRecord {
            ssrc,
            frequency_hz: spec.frequency_hz(),
            preset: spec.preset().to_string(),
            sample_rate: spec.sample_rate(),
            snr_db: None,
            destination: Some(spec.destination()),
        }
    }
}
