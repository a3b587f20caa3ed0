//! chanlib-resolver: channel resolution engine.
//!
//! Turns "I want a channel at this frequency" into a live daemon channel,
//! reusing an existing one when it can:
//!
//! - [`aggregator`] -- runs discovery sources in priority order and
//!   normalizes the result into one [`DiscoverySnapshot`](chanlib_core::DiscoverySnapshot)
//! - [`matcher`] -- picks the best record for a frequency, preset and rate
//! - [`reconcile`] -- [`ChannelResolver`], the get-or-create and remove
//!   state machine with bounded collision retries
//! - [`builder`] / [`options`] -- configuration
//!
//! The engine is written against the `DiscoverySource` and
//! `ControlConnector` traits in `chanlib-core` and never depends on a
//! concrete daemon adapter.

pub mod aggregator;
pub mod builder;
pub mod matcher;
pub mod options;
pub mod outcome;
pub mod reconcile;

pub use aggregator::{DiscoveryAggregator, DiscoveryRequest};
pub use builder::ChannelResolverBuilder;
pub use matcher::{find_match, MatchCriteria};
pub use options::{CollisionPolicy, CollisionTrigger, IdentifierPolicy, ResolverOptions};
pub use outcome::{
    FailureKind, RemoveOutcome, RemoveTarget, Removed, ResolveFailure, ResolveMode,
    ResolveOutcome, ResolvedChannel,
};
pub use reconcile::{random_ssrc, ChannelResolver};

// `ChannelResolver` is shared across tasks behind an `Arc`.
#[allow(dead_code)]
fn assert_send_sync() {
    fn check<T: Send + Sync>() {}
    check::<ChannelResolver>();
}
