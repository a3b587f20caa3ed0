// chanlib -- command-line front end for the channel resolution engine.
//
// Discovers, finds-or-creates, and removes channels on a radiod instance.
// Every invocation prints exactly one JSON object on stdout; logs go to
// stderr.
//
// Usage:
//   chanlib --radiod-host hf-status.local discover --duration 3
//   chanlib --radiod-host hf-status.local get-or-create --frequency 9650000
//   chanlib --radiod-host hf-status.local get-or-create --frequency 14074000 --preset usb
//   chanlib --radiod-host hf-status.local remove --ssrc 12345
//   chanlib --radiod-host hf-status.local remove --frequency 9650000

mod output;

use std::net::{IpAddr, Ipv4Addr};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chanlib::radiod::{resolve_status_address, RadiodBuilder};
use chanlib::resolver::{ChannelResolver, FailureKind, RemoveTarget, ResolverOptions};
use chanlib::{ChannelSpec, Destination};

use output::{DiscoverJson, FailureJson, RemovedJson, ResolvedJson};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Find, create, and remove radiod channels.
#[derive(Parser, Debug)]
#[command(name = "chanlib", version, about)]
struct Cli {
    /// radiod status host (name, address, or address:port).
    #[arg(long)]
    radiod_host: String,

    /// Local IPv4 interface for multicast (default: any).
    #[arg(long)]
    interface: Option<Ipv4Addr>,

    /// RTP destination address: created channels send here, and discover
    /// and remove only consider channels already sending here.
    #[arg(long, env = "SWL_RTP_DESTINATION", default_value = "239.1.2.100")]
    rtp_destination: IpAddr,

    /// RTP destination port for created channels.
    #[arg(long, env = "SWL_RTP_PORT", default_value_t = 5004)]
    rtp_port: u16,

    /// Include control-link counters in the result.
    #[arg(long)]
    include_metrics: bool,

    /// Also poll radiod over the control link when multicast finds nothing.
    #[arg(long)]
    control_query: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List active channels.
    Discover {
        /// Listen window in seconds.
        #[arg(long, default_value_t = 3.0)]
        duration: f64,
    },

    /// Reuse a matching channel or create one.
    GetOrCreate {
        /// Frequency in hertz (e.g. 9650000).
        #[arg(long)]
        frequency: f64,

        /// Demodulation preset.
        #[arg(long, default_value = "am")]
        preset: String,

        /// Output sample rate in Hz.
        #[arg(long, default_value_t = 12_000)]
        sample_rate: u32,

        /// Manual gain in dB.
        #[arg(long, default_value_t = 30.0)]
        gain: f64,

        /// Enable AGC.
        #[arg(long)]
        agc_enable: bool,

        /// Frequency match tolerance in Hz.
        #[arg(long, default_value_t = 1.0)]
        tolerance: f64,

        /// Alternate frequencies to try after a failed create.
        #[arg(long, default_value_t = 3)]
        max_retries: u32,

        /// Seconds to wait for a new channel to appear.
        #[arg(long, default_value_t = 10.0)]
        timeout: f64,
    },

    /// Remove a channel by SSRC or by frequency.
    Remove {
        /// Channel SSRC.
        #[arg(long, conflicts_with = "frequency")]
        ssrc: Option<u32>,

        /// Frequency in hertz of the channel to remove.
        #[arg(long)]
        frequency: Option<f64>,

        /// Frequency match tolerance in Hz.
        #[arg(long, default_value_t = 1.0)]
        tolerance: f64,

        /// Check with one discovery pass that the channel is gone.
        #[arg(long)]
        confirm: bool,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn seconds(value: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| {
            anyhow::Error::from(chanlib::Error::InvalidInput(format!(
                "{what} must be a positive number of seconds, got {value}"
            )))
        })
}

fn radiod(cli: &Cli) -> RadiodBuilder {
    RadiodBuilder::new().interface(cli.interface)
}

fn resolver(cli: &Cli, options: ResolverOptions) -> Result<ChannelResolver> {
    chanlib::radiod_resolver_with(&cli.radiod_host, options, &radiod(cli), cli.control_query)
        .context("invalid resolver configuration")
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("failed to encode result")
}

/// Envelope for errors that escaped a command.
fn failure_from(e: &anyhow::Error) -> Value {
    let kind = e
        .downcast_ref::<chanlib::Error>()
        .map(FailureKind::of)
        .unwrap_or(FailureKind::InvalidInput);
    serde_json::to_value(FailureJson::new(kind, format!("{e:#}")))
        .unwrap_or_else(|_| serde_json::json!({ "success": false }))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_discover(cli: &Cli, duration: f64) -> Result<Value> {
    let listen = seconds(duration, "duration")?;
    let options = ResolverOptions {
        interface: cli.interface,
        listen_duration: listen,
        ..ResolverOptions::default()
    };
    let resolver = resolver(cli, options)?;

    let settings = radiod(cli).settings().clone();
    let resolved =
        resolve_status_address(&cli.radiod_host, settings.status_port, settings.resolve_timeout)
            .await;
    let multicast_address = match resolved {
        Ok(addr) => addr.ip().to_string(),
        Err(e) => {
            tracing::warn!(host = %cli.radiod_host, error = %e, "Status host did not resolve");
            "unknown".to_string()
        }
    };

    let snapshot = resolver.discover(Some(cli.rtp_destination), listen).await?;
    to_json(&DiscoverJson::new(&snapshot, multicast_address))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_get_or_create(
    cli: &Cli,
    frequency: f64,
    preset: &str,
    sample_rate: u32,
    gain: f64,
    agc_enable: bool,
    tolerance: f64,
    max_retries: u32,
    timeout: f64,
) -> Result<Value> {
    let destination = Destination::new(cli.rtp_destination, cli.rtp_port);
    let spec = match ChannelSpec::new(frequency, preset, sample_rate, destination) {
        Ok(spec) => spec.with_gain(gain).with_agc(agc_enable),
        Err(e) => {
            let mut failure = FailureJson::new(FailureKind::of(&e), e.to_string());
            failure.frequency_hz = Some(frequency);
            return to_json(&failure);
        }
    };

    let mut options = ResolverOptions {
        interface: cli.interface,
        confirm_timeout: seconds(timeout, "timeout")?,
        tolerance_hz: tolerance,
        ..ResolverOptions::default()
    };
    options.collision.max_retries = max_retries;
    let resolver = resolver(cli, options)?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let outcome = resolver
        .get_or_create_with(&spec, tolerance, max_retries, &cancel)
        .await;
    ctrl_c.abort();

    match outcome {
        Ok(channel) => to_json(&ResolvedJson::new(&channel, cli.include_metrics)),
        Err(failure) => {
            let mut json = FailureJson::from(&failure);
            if json.frequency_hz.is_none() {
                json.frequency_hz = Some(frequency);
            }
            to_json(&json)
        }
    }
}

async fn cmd_remove(
    cli: &Cli,
    ssrc: Option<u32>,
    frequency: Option<f64>,
    tolerance: f64,
    confirm: bool,
) -> Result<Value> {
    let target = match (ssrc, frequency) {
        (Some(ssrc), _) => RemoveTarget::Identifier(ssrc),
        (None, Some(frequency_hz)) => RemoveTarget::Frequency {
            frequency_hz,
            tolerance_hz: tolerance,
            destination: Some(cli.rtp_destination),
        },
        (None, None) => {
            return to_json(&FailureJson::new(
                FailureKind::InvalidInput,
                "must provide either --ssrc or --frequency",
            ));
        }
    };

    let options = ResolverOptions {
        interface: cli.interface,
        confirm_removal: confirm,
        ..ResolverOptions::default()
    };
    let resolver = resolver(cli, options)?;

    match resolver.remove(&target).await {
        Ok(removed) => to_json(&RemovedJson::new(&removed, cli.include_metrics)),
        Err(failure) => to_json(&FailureJson::from(&failure)),
    }
}

async fn run(cli: &Cli) -> Result<Value> {
    match &cli.command {
        Command::Discover { duration } => cmd_discover(cli, *duration).await,
        Command::GetOrCreate {
            frequency,
            preset,
            sample_rate,
            gain,
            agc_enable,
            tolerance,
            max_retries,
            timeout,
        } => {
            cmd_get_or_create(
                cli,
                *frequency,
                preset,
                *sample_rate,
                *gain,
                *agc_enable,
                *tolerance,
                *max_retries,
                *timeout,
            )
            .await
        }
        Command::Remove {
            ssrc,
            frequency,
            tolerance,
            confirm,
        } => cmd_remove(cli, *ssrc, *frequency, *tolerance, *confirm).await,
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match run(&cli).await {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Command failed");
            failure_from(&e)
        }
    };

    println!("{result}");
    if result.get("success").and_then(Value::as_bool) == Some(true) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
