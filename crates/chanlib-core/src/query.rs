//! Discovery by asking the daemon over a control connection.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

use crate::control::ControlConnector;
use crate::error::Result;
use crate::snapshot::DiscoveryStrategy;
use crate::source::DiscoverySource;
use crate::types::ChannelRecord;

/// [`DiscoverySource`] that opens a control connection, issues a status
/// query and closes the connection again.
///
/// The local interface is the connector's concern; `interface` passed to
/// [`listen`](DiscoverySource::listen) is ignored here.
#[derive(Debug, Clone)]
pub struct ConnectorQuerySource<C> {
    connector: C,
}

impl<C: ControlConnector> ConnectorQuerySource<C> {
    pub fn new(connector: C) -> Self {
        ConnectorQuerySource { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

#[async_trait]
impl<C: ControlConnector> DiscoverySource for ConnectorQuerySource<C> {
    fn strategy(&self) -> DiscoveryStrategy {
        DiscoveryStrategy::ControlQuery
    }

    async fn listen(
        &self,
        target: &str,
        duration: Duration,
        _interface: Option<Ipv4Addr>,
    ) -> Result<HashMap<u32, ChannelRecord>> {
        let mut control = self.connector.connect(target).await?;
        let result = control.query(duration).await;
        if let Err(e) = control.close().await {
            tracing::debug!(error = %e, "Closing query connection failed");
        }
        result
    }
}
