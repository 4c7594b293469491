//! Wired Ethernet backend.
//!
//! Address assignment is left to the system's DHCP client; the link only
//! watches the carrier and tracks the address the OS picked, so lease
//! renewals show up in the logs.

use super::{Carrier, LinkConfig, NetworkLink, route_address};
use crate::error::{LinkError, LinkResult};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct EthernetLink {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: LinkConfig,
    carrier: Carrier,
    address: watch::Sender<Option<IpAddr>>,
}

impl EthernetLink {
    pub fn new(config: LinkConfig) -> Self {
        let carrier = Carrier::new(&config.sysfs_root, &config.interface);
        let (address, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                carrier,
                address,
            }),
        }
    }

    pub fn interface(&self) -> &str {
        &self.inner.config.interface
    }

    async fn refresh_address(&self) {
        let resolved = match &self.inner.config.route_target {
            Some(target) => route_address(target).await,
            None => None,
        };

        let previous = self.inner.address.send_replace(resolved);
        if previous != resolved {
            match (previous, resolved) {
                (Some(old), Some(new)) => {
                    info!(interface = %self.interface(), %old, %new, "Address changed")
                }
                (None, Some(new)) => info!(interface = %self.interface(), address = %new, "Address acquired"),
                (Some(old), None) => warn!(interface = %self.interface(), %old, "Address lost"),
                (None, None) => {}
            }
        }
    }
}

impl NetworkLink for EthernetLink {
    async fn bring_up(&self) -> LinkResult<()> {
        let config = &self.inner.config;
        info!(interface = %config.interface, "Waiting for Ethernet carrier");

        if !self
            .inner
            .carrier
            .wait_until_up(config.bring_up_attempts, config.poll_interval)
            .await
        {
            warn!(interface = %config.interface, "Ethernet carrier did not come up");
            return Err(LinkError::bring_up_timeout(
                &config.interface,
                config.bring_up_attempts,
            ));
        }

        self.refresh_address().await;
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.inner.carrier.is_up()
    }

    async fn maintain(&self) {
        if self.is_up() {
            self.refresh_address().await;
        } else {
            debug!(interface = %self.interface(), "Skipping upkeep, carrier down");
        }
    }

    fn current_address(&self) -> Option<IpAddr> {
        *self.inner.address.borrow()
    }

    async fn tear_down(&self) {
        self.inner.address.send_replace(None);
        info!(interface = %self.interface(), "Ethernet link released");
    }
}
