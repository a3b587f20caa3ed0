//! chanlib-test-harness: Test utilities and mock collaborators for chanlib.
//!
//! - [`MockDaemon`] -- an in-memory stand-in for radiod whose channel table
//!   is shared by the mocks below, so a created channel becomes visible to
//!   discovery exactly as configured
//! - [`MockDiscoverySource`] -- scripted or daemon-backed [`DiscoverySource`](chanlib_core::DiscoverySource)
//! - [`MockConnector`] / [`MockControlChannel`] -- daemon-backed
//!   [`ControlChannel`](chanlib_core::ControlChannel) with a command log
//! - [`MockUdpResponder`] -- a loopback UDP peer that answers datagrams
//!   through a caller-supplied handler, for adapter-level tests

pub mod mock_control;
pub mod mock_daemon;
pub mod mock_source;
pub mod mock_udp;

pub use mock_control::{MockConnector, MockControlChannel};
pub use mock_daemon::{CreateBehavior, MockCommand, MockDaemon};
pub use mock_source::{CallCounter, MockDiscoverySource};
pub use mock_udp::MockUdpResponder;
