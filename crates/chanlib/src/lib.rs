//! # chanlib -- Channel Resolution for radiod
//!
//! `chanlib` turns "I want a channel at this frequency" into a live
//! channel on a ka9q-radio `radiod` daemon. It discovers the channels the
//! daemon already has, reuses one that matches, and otherwise creates a new
//! one and waits for it to appear.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chanlib::ChannelSpec;
//! use chanlib::resolver::ResolverOptions;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = chanlib::radiod_resolver("hf-status.local", ResolverOptions::default())?;
//!     let spec = ChannelSpec::at(9_650_000.0)?;
//!     match resolver.get_or_create(&spec).await {
//!         Ok(channel) => println!("SSRC {:?} ({})", channel.ssrc(), channel.mode),
//!         Err(failure) => eprintln!("{failure}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                  | Purpose                                          |
//! |------------------------|--------------------------------------------------|
//! | `chanlib-core`         | Traits, channel types, errors                    |
//! | `chanlib-resolver`     | Discovery aggregation, matching, get-or-create   |
//! | `chanlib-radiod`       | radiod TLV codec, status listener, control link  |
//! | **`chanlib`**          | This facade crate -- re-exports everything       |
//!
//! The resolver only sees the [`DiscoverySource`] and [`ControlConnector`]
//! traits, so other daemons (or test doubles) plug in the same way.
//!
//! ## Feature Flags
//!
//! | Feature  | Enables                              | Default |
//! |----------|--------------------------------------|---------|
//! | `radiod` | [`radiod`] module and constructors   | yes     |

pub use chanlib_core::*;

/// Discovery aggregation, matching and reconciliation.
pub mod resolver {
    pub use chanlib_resolver::*;
}

/// radiod adapters.
///
/// Provides [`MulticastSource`](radiod::MulticastSource),
/// [`ControlQuerySource`](radiod::ControlQuerySource) and
/// [`RadiodConnector`](radiod::RadiodConnector), configured through
/// [`RadiodBuilder`](radiod::RadiodBuilder).
#[cfg(feature = "radiod")]
pub mod radiod {
    pub use chanlib_radiod::*;
}

/// Resolver for the radiod instance at `host`, discovering channels from
/// the status multicast group.
#[cfg(feature = "radiod")]
pub fn radiod_resolver(
    host: &str,
    options: resolver::ResolverOptions,
) -> Result<resolver::ChannelResolver> {
    let radiod = radiod::RadiodBuilder::new().interface(options.interface);
    radiod_resolver_with(host, options, &radiod, false)
}

/// Resolver for `host` using explicit adapter settings.
///
/// With `control_query`, a status poll over the control link runs as the
/// secondary discovery strategy after the multicast listener.
#[cfg(feature = "radiod")]
pub fn radiod_resolver_with(
    host: &str,
    options: resolver::ResolverOptions,
    radiod: &radiod::RadiodBuilder,
    control_query: bool,
) -> Result<resolver::ChannelResolver> {
    let mut builder = resolver::ChannelResolverBuilder::new(host)
        .options(options)
        .source(radiod.multicast_source())
        .connector(radiod.connector());
    if control_query {
        builder = builder.source(radiod.query_source());
    }
    builder.build()
}
