//! Daemon-backed control channel and connector.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use chanlib_core::error::{Error, Result};
use chanlib_core::{
    ChannelRecord, ChannelSpec, ControlChannel, ControlConnector, ControlMetrics, CreateReceipt,
};

use crate::mock_daemon::MockDaemon;

/// A [`ControlChannel`] that forwards every command to a [`MockDaemon`].
#[derive(Debug)]
pub struct MockControlChannel {
    daemon: MockDaemon,
    closed: bool,
    metrics: ControlMetrics,
}

impl MockControlChannel {
    pub fn new(daemon: MockDaemon) -> Self {
        MockControlChannel {
            daemon,
            closed: false,
            metrics: ControlMetrics::default(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Transport("control channel closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlChannel for MockControlChannel {
    async fn create(&mut self, spec: &ChannelSpec, identifier: Option<u32>) -> Result<CreateReceipt> {
        self.ensure_open()?;
        self.metrics.commands_sent += 1;
        let receipt = self.daemon.handle_create(spec, identifier)?;
        if receipt.acknowledged {
            self.metrics.acknowledgements += 1;
        }
        Ok(receipt)
    }

    async fn remove(&mut self, identifier: u32) -> Result<()> {
        self.ensure_open()?;
        self.metrics.commands_sent += 1;
        self.daemon.handle_remove(identifier)
    }

    async fn query(&mut self, _duration: Duration) -> Result<HashMap<u32, ChannelRecord>> {
        self.ensure_open()?;
        let records = self.daemon.handle_query()?;
        self.metrics.status_received += records.len() as u64;
        Ok(records)
    }

    fn metrics(&self) -> Option<ControlMetrics> {
        Some(self.metrics)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.daemon.close_connection();
        }
        Ok(())
    }
}

/// A [`ControlConnector`] handing out [`MockControlChannel`]s for one daemon.
#[derive(Debug, Clone)]
pub struct MockConnector {
    daemon: MockDaemon,
}

impl MockConnector {
    pub fn new(daemon: MockDaemon) -> Self {
        MockConnector { daemon }
    }
}

#[async_trait]
impl ControlConnector for MockConnector {
    async fn connect(&self, target: &str) -> Result<Box<dyn ControlChannel>> {
        tracing::trace!(target = %target, "Mock control connect");
        self.daemon.open_connection()?;
        Ok(Box::new(MockControlChannel::new(self.daemon.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_daemon::CreateBehavior;

    #[tokio::test]
    async fn commands_reach_daemon_and_close_is_counted() {
        let daemon = MockDaemon::new();
        let connector = MockConnector::new(daemon.clone());
        let mut ch = connector.connect("radiod.local").await.unwrap();

        let spec = ChannelSpec::at(9_500_000.0).unwrap();
        let receipt = ch.create(&spec, Some(77)).await.unwrap();
        assert_eq!(receipt.identifier, Some(77));
        ch.remove(77).await.unwrap();

        let m = ch.metrics().unwrap();
        assert_eq!(m.commands_sent, 2);
        assert_eq!(m.acknowledgements, 1);

        ch.close().await.unwrap();
        ch.close().await.unwrap();
        assert_eq!(daemon.connections(), (1, 1));
        assert!(ch.create(&spec, None).await.is_err());
    }

    #[tokio::test]
    async fn silent_create_is_not_acknowledged() {
        let daemon = MockDaemon::new();
        daemon.set_behavior(CreateBehavior::Silent);
        let mut ch = MockControlChannel::new(daemon);
        let spec = ChannelSpec::at(9_500_000.0).unwrap();
        let receipt = ch.create(&spec, None).await.unwrap();
        assert!(!receipt.acknowledged);
        assert_eq!(ch.metrics().unwrap().acknowledgements, 0);
    }

    #[tokio::test]
    async fn connect_failure_propagates() {
        let daemon = MockDaemon::new();
        daemon.fail_connect("host unreachable");
        let connector = MockConnector::new(daemon.clone());
        assert!(matches!(connector.connect("x").await, Err(Error::Transport(_))));
        assert_eq!(daemon.connections(), (0, 0));
    }
}
