//! Loopback UDP peer for adapter-level tests.
//!
//! [`MockUdpResponder`] binds an ephemeral port on 127.0.0.1 and answers
//! every datagram through a caller-supplied handler. The handler sees the
//! raw bytes and returns zero or more replies, which are sent back to the
//! datagram's source. Every received datagram is recorded.
//!
//! # Example
//!
//! ```
//! use chanlib_test_harness::MockUdpResponder;
//!
//! # async fn example() -> chanlib_core::Result<()> {
//! // Echo every datagram back once.
//! let peer = MockUdpResponder::start(|datagram| vec![datagram.to_vec()]).await?;
//! let addr = peer.addr();
//! // ... point an adapter at `addr` ...
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use chanlib_core::error::{Error, Result};

type Received = Arc<Mutex<Vec<Vec<u8>>>>;

/// A UDP peer that replies through a handler closure.
pub struct MockUdpResponder {
    addr: SocketAddr,
    socket: Arc<UdpSocket>,
    received: Received,
    task: JoinHandle<()>,
}

impl MockUdpResponder {
    /// Bind a loopback socket and start answering datagrams.
    pub async fn start<F>(handler: F) -> Result<Self>
    where
        F: Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock UDP peer: {e}")))?;
        let addr = socket.local_addr()?;
        let socket = Arc::new(socket);
        let received: Received = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let socket = Arc::clone(&socket);
            let received = Arc::clone(&received);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 65_536];
                loop {
                    let (n, from) = match socket.recv_from(&mut buf).await {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::debug!(error = %e, "Mock UDP peer receive failed");
                            continue;
                        }
                    };
                    let datagram = &buf[..n];
                    received
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(datagram.to_vec());
                    for reply in handler(datagram) {
                        if let Err(e) = socket.send_to(&reply, from).await {
                            tracing::debug!(error = %e, peer = %from, "Mock UDP peer send failed");
                        }
                    }
                }
            })
        };

        Ok(MockUdpResponder {
            addr,
            socket,
            received,
            task,
        })
    }

    /// Address the peer is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Copies of every datagram received so far.
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Send an unsolicited datagram from the peer's socket.
    pub async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<()> {
        self.socket.send_to(payload, dest).await?;
        Ok(())
    }

    /// Wait until at least `count` datagrams have arrived.
    ///
    /// Returns [`Error::Timeout`] if they do not arrive within `timeout`.
    pub async fn wait(&self, count: usize, timeout: Duration) -> Result<Vec<Vec<u8>>> {
        let poll = async {
            loop {
                let seen = self.received();
                if seen.len() >= count {
                    return seen;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| Error::Timeout)
    }
}

impl Drop for MockUdpResponder {
    fn drop(&mut self) {
        self.task.abort();
    }
}
