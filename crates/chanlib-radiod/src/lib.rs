//! chanlib-radiod: radiod adapter for chanlib.
//!
//! Implements the `chanlib-core` discovery and control traits on top of
//! radiod's TLV status/command protocol:
//!
//! - [`tlv`] -- packet framing and value encodings
//! - [`status`] / [`command`] -- status decoding and command builders
//! - [`MulticastSource`] -- listens to the status multicast group
//! - [`ControlQuerySource`] -- polls channel status over the control link
//! - [`RadiodConnector`] / [`RadiodControl`] -- create and remove channels
//! - [`RadiodBuilder`] -- shared settings for all of the above

pub mod builder;
pub mod command;
pub mod control;
pub mod multicast;
pub mod query;
pub mod status;
pub mod tlv;

pub use builder::{RadiodBuilder, RadiodSettings, DEFAULT_STATUS_PORT};
pub use control::{RadiodConnector, RadiodControl, SsrcPolicy};
pub use multicast::{resolve_status_address, MulticastSource};
pub use query::ControlQuerySource;
pub use status::{decode_status, StatusUpdate};
