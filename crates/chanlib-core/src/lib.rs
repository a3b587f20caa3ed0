//! chanlib-core: Core traits, types, and error definitions for chanlib.
//!
//! This crate defines the daemon-agnostic abstractions the channel
//! resolution engine is written against. Applications and adapters depend
//! on these types without pulling in the resolver or any transport code.
//!
//! # Key types
//!
//! - [`ChannelSpec`] -- desired channel state supplied by the caller
//! - [`ChannelRecord`] -- a channel observed by discovery
//! - [`DiscoverySnapshot`] -- one discovery pass, tagged with its strategy
//! - [`DiscoverySource`] -- capability that lists active channels
//! - [`ConnectorQuerySource`] -- discovery through a control connection
//! - [`ControlChannel`] / [`ControlConnector`] -- capability that creates and
//!   removes channels, acquired per operation
//! - [`Error`] / [`Result`] -- error handling

pub mod control;
pub mod error;
pub mod helpers;
pub mod query;
pub mod snapshot;
pub mod source;
pub mod types;

// Re-export key types at crate root for ergonomic `use chanlib_core::*`.
pub use control::{ControlChannel, ControlConnector, ControlMetrics, CreateReceipt};
pub use error::{Error, Result};
pub use helpers::{format_freq_mhz, snr_db};
pub use query::ConnectorQuerySource;
pub use snapshot::{DiscoverySnapshot, DiscoveryStrategy};
pub use source::DiscoverySource;
pub use types::*;
