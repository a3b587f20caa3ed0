//! Discovery over the control link.
//!
//! Sends a poll to every channel and collects the status replies. Useful
//! where the status group is not joinable but commands still get through.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

use chanlib_core::error::Result;
use chanlib_core::{ChannelRecord, ConnectorQuerySource, DiscoverySource, DiscoveryStrategy};

use crate::control::RadiodConnector;

/// [`DiscoverySource`] that polls radiod for channel status.
#[derive(Debug, Clone)]
pub struct ControlQuerySource {
    connector: RadiodConnector,
}

impl ControlQuerySource {
    pub fn new(connector: RadiodConnector) -> Self {
        ControlQuerySource { connector }
    }
}

#[async_trait]
impl DiscoverySource for ControlQuerySource {
    fn strategy(&self) -> DiscoveryStrategy {
        DiscoveryStrategy::ControlQuery
    }

    async fn listen(
        &self,
        target: &str,
        duration: Duration,
        interface: Option<Ipv4Addr>,
    ) -> Result<HashMap<u32, ChannelRecord>> {
        let connector = match interface {
            Some(iface) => {
                let mut settings = self.connector.settings().clone();
                settings.interface = Some(iface);
                RadiodConnector::new(settings)
            }
            None => self.connector.clone(),
        };

        ConnectorQuerySource::new(connector)
            .listen(target, duration, interface)
            .await
    }
}
