//! Scripted discovery source.
//!
//! [`MockDiscoverySource`] answers `listen` either from a script (queued
//! responses first, then a default) or live from a [`MockDaemon`].

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use chanlib_core::error::{Error, Result};
use chanlib_core::{ChannelRecord, DiscoverySource, DiscoveryStrategy};

use crate::mock_daemon::MockDaemon;

/// Shared count of `listen` calls.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
enum Response {
    Channels(Vec<ChannelRecord>),
    Fail(Error),
}

impl Response {
    fn produce(&self) -> Result<HashMap<u32, ChannelRecord>> {
        match self {
            Response::Channels(records) => Ok(records
                .iter()
                .filter_map(|r| r.ssrc.map(|id| (id, r.clone())))
                .collect()),
            Response::Fail(e) => Err(replicate(e)),
        }
    }
}

/// Rebuild an error value; `Error` is not `Clone` because of `io::Error`.
fn replicate(e: &Error) -> Error {
    match e {
        Error::Transport(s) => Error::Transport(s.clone()),
        Error::Protocol(s) => Error::Protocol(s.clone()),
        Error::Timeout => Error::Timeout,
        Error::Unsupported(s) => Error::Unsupported(s.clone()),
        Error::InvalidInput(s) => Error::InvalidInput(s.clone()),
        Error::Rejected(s) => Error::Rejected(s.clone()),
        Error::NotFound(s) => Error::NotFound(s.clone()),
        Error::Cancelled => Error::Cancelled,
        Error::Io(io) => Error::Io(std::io::Error::new(io.kind(), io.to_string())),
    }
}

#[derive(Debug)]
enum Backing {
    Scripted {
        default: Response,
        queue: Mutex<VecDeque<Response>>,
    },
    Daemon(MockDaemon),
}

/// A [`DiscoverySource`] for tests.
#[derive(Debug)]
pub struct MockDiscoverySource {
    strategy: DiscoveryStrategy,
    backing: Backing,
    delay: Option<Duration>,
    calls: CallCounter,
}

impl MockDiscoverySource {
    /// A scripted source that reports no channels.
    pub fn new(strategy: DiscoveryStrategy) -> Self {
        MockDiscoverySource {
            strategy,
            backing: Backing::Scripted {
                default: Response::Channels(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
            },
            delay: None,
            calls: CallCounter::default(),
        }
    }

    /// A source that reports the daemon's visible channel table.
    pub fn from_daemon(strategy: DiscoveryStrategy, daemon: MockDaemon) -> Self {
        MockDiscoverySource {
            strategy,
            backing: Backing::Daemon(daemon),
            delay: None,
            calls: CallCounter::default(),
        }
    }

    /// Report `records` on every call once the queue is drained.
    pub fn with_channels(mut self, records: Vec<ChannelRecord>) -> Self {
        self.set_default(Response::Channels(records));
        self
    }

    /// Fail with `error` on every call once the queue is drained.
    pub fn with_error(mut self, error: Error) -> Self {
        self.set_default(Response::Fail(error));
        self
    }

    /// Queue a one-shot channel list ahead of the default.
    pub fn then_channels(self, records: Vec<ChannelRecord>) -> Self {
        self.enqueue(Response::Channels(records))
    }

    /// Queue a one-shot failure ahead of the default.
    pub fn then_error(self, error: Error) -> Self {
        self.enqueue(Response::Fail(error))
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle for observing how often `listen` ran.
    pub fn call_counter(&self) -> CallCounter {
        self.calls.clone()
    }

    fn set_default(&mut self, response: Response) {
        if let Backing::Scripted { default, .. } = &mut self.backing {
            *default = response;
        }
    }

    fn enqueue(self, response: Response) -> Self {
        if let Backing::Scripted { queue, .. } = &self.backing {
            queue
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push_back(response);
        }
        self
    }
}

#[async_trait]
impl DiscoverySource for MockDiscoverySource {
    fn strategy(&self) -> DiscoveryStrategy {
        self.strategy
    }

    async fn listen(
        &self,
        target: &str,
        duration: Duration,
        _interface: Option<Ipv4Addr>,
    ) -> Result<HashMap<u32, ChannelRecord>> {
        self.calls.bump();
        tracing::trace!(target = %target, duration_ms = duration.as_millis() as u64, "Mock listen");
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.backing {
            Backing::Daemon(daemon) => Ok(daemon.visible_channels()),
            Backing::Scripted { default, queue } => {
                let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
                match next {
                    Some(response) => response.produce(),
                    None => default.produce(),
                }
            }
        }
    }
}
