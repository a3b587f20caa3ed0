//! radiod control link.
//!
//! Commands go to the status group (or a unicast control address) as
//! command packets. radiod answers a command by emitting a status packet
//! that echoes the command tag, so [`RadiodControl::create`] waits briefly
//! for that echo and reports it as an acknowledgement. A create whose echo
//! never arrives is still reported, just unacknowledged.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::net::UdpSocket;

use chanlib_core::error::{Error, Result};
use chanlib_core::{
    ChannelRecord, ChannelSpec, ControlChannel, ControlConnector, ControlMetrics, CreateReceipt,
};

use crate::builder::RadiodSettings;
use crate::command::{encode_create, encode_poll, encode_remove};
use crate::multicast::{
    collect_records, deadline_after, open_command_socket, open_status_socket,
    resolve_status_address, RECV_ERROR_BACKOFF,
};
use crate::status::{decode_status, StatusUpdate};
use crate::tlv::ALL_CHANNELS;

/// How `create` handles a request that arrives without an SSRC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SsrcPolicy {
    /// Draw a random SSRC locally and send it with the command.
    #[default]
    Random,
    /// Omit the SSRC and take the one radiod reports back.
    Daemon,
}

/// Random value usable as a command tag or SSRC.
///
/// Never 0 and never the all-channels selector.
fn random_nonzero() -> u32 {
    rand::rng().random_range(1..ALL_CHANNELS)
}

/// One control connection to a radiod instance.
pub struct RadiodControl {
    dest: SocketAddr,
    tx: Option<UdpSocket>,
    /// Group listener; `None` when replies come back on `tx`.
    rx: Option<UdpSocket>,
    settings: RadiodSettings,
    metrics: ControlMetrics,
}

impl RadiodControl {
    /// Address commands are sent to.
    pub fn destination(&self) -> SocketAddr {
        self.dest
    }

    fn tx(&self) -> Result<&UdpSocket> {
        self.tx
            .as_ref()
            .ok_or_else(|| Error::Transport("control channel closed".into()))
    }

    fn status_socket(&self) -> Result<&UdpSocket> {
        match &self.rx {
            Some(rx) => Ok(rx),
            None => self.tx(),
        }
    }

    async fn send(&mut self, packet: &[u8]) -> Result<()> {
        let dest = self.dest;
        let result = self.tx()?.send_to(packet, dest).await;
        match result {
            Ok(_) => {
                self.metrics.commands_sent += 1;
                Ok(())
            }
            Err(e) => {
                self.metrics.send_errors += 1;
                Err(Error::Transport(format!("failed to send command to {dest}: {e}")))
            }
        }
    }

    /// Wait up to `window` for a status packet echoing `tag`.
    async fn await_echo(&mut self, tag: u32, window: Duration) -> Result<Option<StatusUpdate>> {
        let deadline = deadline_after(window);
        let mut buf = vec![0u8; 9000];
        let mut received = 0u64;
        let mut echo = None;

        {
            let socket = self.status_socket()?;
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                let (n, from) =
                    match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
                        Ok(Ok(v)) => v,
                        Ok(Err(e)) => {
                            tracing::debug!(error = %e, "Control recv error");
                            tokio::time::sleep(RECV_ERROR_BACKOFF.min(remaining)).await;
                            continue;
                        }
                        Err(_) => break,
                    };
                match decode_status(&buf[..n]) {
                    Ok(Some(update)) => {
                        received += 1;
                        if update.command_tag == Some(tag) {
                            tracing::trace!(tag, from = %from, "Command echoed");
                            echo = Some(update);
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::trace!(error = %e, from = %from, "Skipping undecodable packet"),
                }
            }
        }

        self.metrics.status_received += received;
        if echo.is_some() {
            self.metrics.acknowledgements += 1;
        }
        Ok(echo)
    }
}

#[async_trait]
impl ControlChannel for RadiodControl {
    async fn create(&mut self, spec: &ChannelSpec, identifier: Option<u32>) -> Result<CreateReceipt> {
        self.tx()?;
        let ssrc = match (identifier, self.settings.ssrc_policy) {
            (Some(ssrc), _) => Some(ssrc),
            (None, SsrcPolicy::Random) => Some(random_nonzero()),
            (None, SsrcPolicy::Daemon) => None,
        };
        if matches!(ssrc, Some(0) | Some(ALL_CHANNELS)) {
            return Err(Error::InvalidInput(format!(
                "SSRC {} is reserved",
                ssrc.unwrap_or_default()
            )));
        }

        let tag = random_nonzero();
        tracing::debug!(
            dest = %self.dest,
            frequency_hz = spec.frequency_hz(),
            preset = spec.preset(),
            ssrc = ?ssrc,
            tag,
            "Sending create"
        );
        self.send(&encode_create(spec, ssrc, tag)).await?;

        let window = self.settings.ack_window;
        match self.await_echo(tag, window).await? {
            Some(update) => Ok(CreateReceipt {
                identifier: update.ssrc.or(ssrc),
                acknowledged: true,
            }),
            None => {
                tracing::debug!(tag, window_ms = window.as_millis() as u64, "Create not echoed");
                Ok(CreateReceipt {
                    identifier: ssrc,
                    acknowledged: false,
                })
            }
        }
    }

    async fn remove(&mut self, identifier: u32) -> Result<()> {
        if identifier == 0 || identifier == ALL_CHANNELS {
            return Err(Error::InvalidInput(format!("SSRC {identifier} is reserved")));
        }
        let tag = random_nonzero();
        tracing::debug!(dest = %self.dest, ssrc = identifier, tag, "Sending remove");
        self.send(&encode_remove(identifier, tag)).await
    }

    async fn query(&mut self, duration: Duration) -> Result<HashMap<u32, ChannelRecord>> {
        let tag = random_nonzero();
        self.send(&encode_poll(tag)).await?;
        let (records, packets) = collect_records(self.status_socket()?, duration).await;
        self.metrics.status_received += packets;
        tracing::debug!(channels = records.len(), packets, "Control query complete");
        Ok(records)
    }

    fn metrics(&self) -> Option<ControlMetrics> {
        Some(self.metrics)
    }

    async fn close(&mut self) -> Result<()> {
        if self.tx.take().is_some() {
            self.rx = None;
            tracing::debug!(dest = %self.dest, metrics = ?self.metrics, "Control channel closed");
        }
        Ok(())
    }
}

/// Opens a [`RadiodControl`] per operation.
#[derive(Debug, Clone, Default)]
pub struct RadiodConnector {
    settings: RadiodSettings,
}

impl RadiodConnector {
    pub fn new(settings: RadiodSettings) -> Self {
        RadiodConnector { settings }
    }

    pub fn settings(&self) -> &RadiodSettings {
        &self.settings
    }

    /// Open a concrete [`RadiodControl`] to `target`.
    pub async fn open(&self, target: &str) -> Result<RadiodControl> {
        let s = &self.settings;
        let dest = resolve_status_address(target, s.status_port, s.resolve_timeout).await?;
        let tx = open_command_socket(dest, s.interface, s.ttl)?;
        // Multicast replies arrive on the group, not on our send socket.
        let rx = if dest.ip().is_multicast() {
            Some(open_status_socket(dest, s.interface)?)
        } else {
            None
        };
        tracing::debug!(dest = %dest, interface = ?s.interface, "Control channel open");
        Ok(RadiodControl {
            dest,
            tx: Some(tx),
            rx,
            settings: s.clone(),
            metrics: ControlMetrics::default(),
        })
    }
}

#[async_trait]
impl ControlConnector for RadiodConnector {
    async fn connect(&self, target: &str) -> Result<Box<dyn ControlChannel>> {
        Ok(Box::new(self.open(target).await?))
    }
}
