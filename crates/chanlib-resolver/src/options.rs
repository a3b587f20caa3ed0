//! Resolver configuration.
//!
//! [`ResolverOptions`] carries every tunable of the resolution engine with
//! defaults taken from field use against radiod. [`CollisionPolicy`]
//! replaces the old "retry at +100 Hz when the frequency is a round
//! hundred" rule with explicit, bounded, configurable behavior.

use std::net::Ipv4Addr;
use std::time::Duration;

/// Default listen window for one discovery pass.
pub const DEFAULT_LISTEN_DURATION: Duration = Duration::from_secs(2);

/// Default matching tolerance in Hz.
pub const DEFAULT_TOLERANCE_HZ: f64 = 1.0;

/// Default time allowed for a created channel to appear in discovery.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between confirmation polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default collision frequency offset in Hz.
pub const DEFAULT_COLLISION_OFFSET_HZ: f64 = 100.0;

/// Default number of collision retries after the first attempt.
pub const DEFAULT_MAX_COLLISION_RETRIES: u32 = 3;

/// When a failed create should be retried at an offset frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionTrigger {
    /// Retry only when the attempted frequency, rounded to whole Hz, is an
    /// exact multiple of the given step.
    MultipleOf(u64),
    /// Retry after any retryable failure.
    Always,
    /// Never retry.
    Never,
}

/// Bounded retry-at-offset policy for create collisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionPolicy {
    /// Added to the previous attempt's frequency on each retry.
    pub offset_hz: f64,
    /// Which attempts qualify for a retry.
    pub trigger: CollisionTrigger,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
}

impl CollisionPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        CollisionPolicy {
            trigger: CollisionTrigger::Never,
            max_retries: 0,
            ..CollisionPolicy::default()
        }
    }

    /// Whether a failed attempt at `frequency_hz` qualifies for a retry.
    pub fn applies_to(&self, frequency_hz: f64) -> bool {
        match self.trigger {
            CollisionTrigger::Always => true,
            CollisionTrigger::Never => false,
            CollisionTrigger::MultipleOf(0) => false,
            CollisionTrigger::MultipleOf(step) => {
                let rounded = frequency_hz.round();
                rounded > 0.0 && (rounded as u64) % step == 0
            }
        }
    }
}

impl Default for CollisionPolicy {
    fn default() -> Self {
        CollisionPolicy {
            offset_hz: DEFAULT_COLLISION_OFFSET_HZ,
            trigger: CollisionTrigger::MultipleOf(100),
            max_retries: DEFAULT_MAX_COLLISION_RETRIES,
        }
    }
}

/// Who chooses the identifier of a new channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierPolicy {
    /// The resolver draws a random identifier and sends it with the request.
    ClientAssigned,
    /// The control adapter or the daemon picks it; the resolver recovers it
    /// from the receipt or from discovery.
    #[default]
    DaemonAssigned,
}

/// Tunables for [`ChannelResolver`](crate::ChannelResolver).
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Local IPv4 interface for multicast reception.
    pub interface: Option<Ipv4Addr>,
    /// Listen window for one discovery pass.
    pub listen_duration: Duration,
    /// Frequency matching tolerance in Hz.
    pub tolerance_hz: f64,
    /// Overall time allowed for a created channel to appear.
    pub confirm_timeout: Duration,
    /// Pause between confirmation polls.
    pub poll_interval: Duration,
    /// Retry-at-offset behavior for failed creates.
    pub collision: CollisionPolicy,
    /// Who assigns identifiers for new channels.
    pub identifier_policy: IdentifierPolicy,
    /// Merge all successful discovery sources instead of stopping at the
    /// first non-empty one.
    pub merge_sources: bool,
    /// After a remove, run one discovery pass and log if the channel is
    /// still visible. Never changes the result.
    pub confirm_removal: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            interface: None,
            listen_duration: DEFAULT_LISTEN_DURATION,
            tolerance_hz: DEFAULT_TOLERANCE_HZ,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            collision: CollisionPolicy::default(),
            identifier_policy: IdentifierPolicy::default(),
            merge_sources: false,
            confirm_removal: false,
        }
    }
}
