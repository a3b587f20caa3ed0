//! Status multicast listener.
//!
//! radiod reports every channel on a status multicast group (default port
//! 5006). [`MulticastSource`] joins that group for one listen window and
//! returns the last status seen for each SSRC. Remote clients outside the
//! multicast domain simply hear nothing, which is reported as an empty
//! result rather than an error.
//!
//! A status host that resolves to a unicast address is bound without a
//! group join, which lets a daemon (or a test peer) send status directly.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use chanlib_core::error::{Error, Result};
use chanlib_core::{ChannelRecord, DiscoverySource, DiscoveryStrategy};

use crate::builder::RadiodSettings;
use crate::status::decode_status;

/// Largest datagram radiod sends.
const MAX_PACKET: usize = 9000;

/// Resolve a status host to a socket address.
///
/// Accepts a literal address, `addr:port`, `host`, or `host:port`. Names go
/// through the system resolver (which handles `.local` where mDNS is
/// configured), bounded by `timeout`. IPv4 results are preferred.
pub async fn resolve_status_address(
    host: &str,
    default_port: u16,
    timeout: Duration,
) -> Result<SocketAddr> {
    let host = host.trim();
    if let Ok(sa) = host.parse::<SocketAddr>() {
        return Ok(sa);
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) => match port.parse::<u16>() {
            Ok(port) => (name, port),
            Err(_) => (host, default_port),
        },
        None => (host, default_port),
    };
    if name.is_empty() {
        return Err(Error::InvalidInput("status host must not be empty".into()));
    }

    let lookup = tokio::net::lookup_host((name, port));
    let addrs: Vec<SocketAddr> = match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(addrs)) => addrs.collect(),
        Ok(Err(e)) => {
            return Err(Error::Transport(format!("failed to resolve {name}: {e}")));
        }
        Err(_) => {
            return Err(Error::Transport(format!(
                "resolving {name} timed out after {}ms",
                timeout.as_millis()
            )));
        }
    };

    let chosen = addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| Error::Transport(format!("{name} resolved to no addresses")))?;
    tracing::debug!(host = %name, addr = %chosen, "Resolved status host");
    Ok(chosen)
}

fn transport(context: &str, e: std::io::Error) -> Error {
    Error::Transport(format!("{context}: {e}"))
}

/// Socket that receives status packets for `group`.
///
/// Multicast groups are joined on `interface` (or any); unicast addresses
/// bind the port on all interfaces.
pub(crate) fn open_status_socket(
    group: SocketAddr,
    interface: Option<Ipv4Addr>,
) -> Result<UdpSocket> {
    let domain = if group.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| transport("failed to create status socket", e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| transport("failed to set SO_REUSEADDR", e))?;

    let bind: SocketAddr = match group.ip() {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, group.port()).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, group.port()).into(),
    };
    socket
        .bind(&bind.into())
        .map_err(|e| transport(&format!("failed to bind status socket on {bind}"), e))?;

    match group.ip() {
        IpAddr::V4(v4) if v4.is_multicast() => {
            let iface = interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
            socket
                .join_multicast_v4(&v4, &iface)
                .map_err(|e| transport(&format!("failed to join {v4} on {iface}"), e))?;
            socket
                .set_multicast_loop_v4(true)
                .map_err(|e| transport("failed to enable multicast loopback", e))?;
        }
        IpAddr::V6(v6) if v6.is_multicast() => {
            socket
                .join_multicast_v6(&v6, 0)
                .map_err(|e| transport(&format!("failed to join {v6}"), e))?;
        }
        _ => {}
    }

    socket
        .set_nonblocking(true)
        .map_err(|e| transport("failed to set non-blocking", e))?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(|e| transport("failed to register status socket", e))
}

/// Socket for sending commands to `dest`.
pub(crate) fn open_command_socket(
    dest: SocketAddr,
    interface: Option<Ipv4Addr>,
    ttl: u32,
) -> Result<UdpSocket> {
    let domain = if dest.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| transport("failed to create command socket", e))?;

    let bind: SocketAddr = match dest.ip() {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    socket
        .bind(&bind.into())
        .map_err(|e| transport("failed to bind command socket", e))?;

    if let IpAddr::V4(v4) = dest.ip() {
        if v4.is_multicast() {
            socket
                .set_multicast_ttl_v4(ttl)
                .map_err(|e| transport("failed to set multicast TTL", e))?;
            socket
                .set_multicast_loop_v4(true)
                .map_err(|e| transport("failed to enable multicast loopback", e))?;
            if let Some(iface) = interface {
                socket
                    .set_multicast_if_v4(&iface)
                    .map_err(|e| transport(&format!("failed to send via {iface}"), e))?;
            }
        }
    }

    socket
        .set_nonblocking(true)
        .map_err(|e| transport("failed to set non-blocking", e))?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(|e| transport("failed to register command socket", e))
}

/// Pause after a failed receive before trying again.
pub(crate) const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// `Instant::now() + after`, saturating at roughly thirty years out.
pub(crate) fn deadline_after(after: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(after)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

/// Collect status packets on `socket` for `window`, last update per SSRC
/// winning. Returns the records and the number of status packets decoded.
pub(crate) async fn collect_records(
    socket: &UdpSocket,
    window: Duration,
) -> (HashMap<u32, ChannelRecord>, u64) {
    let mut records = HashMap::new();
    let mut packets = 0u64;
    let mut buf = vec![0u8; MAX_PACKET];
    let deadline = deadline_after(window);

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) => match decode_status(&buf[..n]) {
                Ok(Some(update)) => {
                    packets += 1;
                    if let Some(rec) = update.to_record() {
                        tracing::trace!(
                            ssrc = ?rec.ssrc,
                            frequency_hz = rec.frequency_hz,
                            from = %from,
                            "Status packet"
                        );
                        if let Some(ssrc) = rec.ssrc {
                            records.insert(ssrc, rec);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::trace!(error = %e, from = %from, "Skipping undecodable packet");
                }
            },
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Status recv error");
                tokio::time::sleep(RECV_ERROR_BACKOFF.min(remaining)).await;
            }
            Err(_) => break,
        }
    }

    (records, packets)
}

/// [`DiscoverySource`] that listens to the radiod status group.
#[derive(Debug, Clone)]
pub struct MulticastSource {
    settings: RadiodSettings,
}

impl MulticastSource {
    pub fn new(settings: RadiodSettings) -> Self {
        MulticastSource { settings }
    }
}

#[async_trait]
impl DiscoverySource for MulticastSource {
    fn strategy(&self) -> DiscoveryStrategy {
        DiscoveryStrategy::Multicast
    }

    async fn listen(
        &self,
        target: &str,
        duration: Duration,
        interface: Option<Ipv4Addr>,
    ) -> Result<HashMap<u32, ChannelRecord>> {
        let group =
            resolve_status_address(target, self.settings.status_port, self.settings.resolve_timeout)
                .await?;
        let interface = interface.or(self.settings.interface);
        let socket = open_status_socket(group, interface)?;

        tracing::debug!(
            group = %group,
            interface = ?interface,
            duration_ms = duration.as_millis() as u64,
            "Listening for radiod status"
        );
        let (records, packets) = collect_records(&socket, duration).await;
        tracing::debug!(channels = records.len(), packets, "Status listen complete");
        Ok(records)
    }
}
