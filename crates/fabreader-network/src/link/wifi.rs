//! Wi-Fi station mode backend.
//!
//! Association is delegated to NetworkManager through `nmcli`; the link
//! then waits for the carrier like the wired backend does.

use super::{Carrier, LinkConfig, NetworkLink, route_address};
use crate::error::{LinkError, LinkResult};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const NMCLI: &str = "nmcli";

/// Station credentials. Without an SSID the link assumes association is
/// handled elsewhere and only waits for the carrier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: Option<String>,
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WifiLink {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: LinkConfig,
    credentials: WifiCredentials,
    association_timeout: Duration,
    carrier: Carrier,
    address: watch::Sender<Option<IpAddr>>,
}

impl WifiLink {
    pub fn new(config: LinkConfig, credentials: WifiCredentials) -> Self {
        // Association gets the same budget as the carrier wait.
        let association_timeout = config.poll_interval * config.bring_up_attempts;
        let carrier = Carrier::new(&config.sysfs_root, &config.interface);
        let (address, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                credentials,
                association_timeout,
                carrier,
                address,
            }),
        }
    }

    pub fn interface(&self) -> &str {
        &self.inner.config.interface
    }

    async fn associate(&self, ssid: &str) -> LinkResult<()> {
        let interface = self.interface();
        let mut command = Command::new(NMCLI);
        command.args(["device", "wifi", "connect", ssid]);
        if let Some(passphrase) = &self.inner.credentials.passphrase {
            command.args(["password", passphrase.as_str()]);
        }
        command.args(["ifname", interface]).kill_on_drop(true);

        info!(%interface, %ssid, "Associating");
        let output = tokio::time::timeout(self.inner.association_timeout, command.output())
            .await
            .map_err(|_| LinkError::association(interface, "association timed out"))?
            .map_err(|source| LinkError::Command {
                program: NMCLI.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LinkError::association(interface, stderr.trim()));
        }
        Ok(())
    }
}

impl NetworkLink for WifiLink {
    async fn bring_up(&self) -> LinkResult<()> {
        let config = &self.inner.config;

        if let Some(ssid) = &self.inner.credentials.ssid {
            self.associate(ssid).await?;
        } else {
            debug!(interface = %config.interface, "No SSID configured, waiting for carrier only");
        }

        if !self
            .inner
            .carrier
            .wait_until_up(config.bring_up_attempts, config.poll_interval)
            .await
        {
            warn!(interface = %config.interface, "Wi-Fi carrier did not come up");
            return Err(LinkError::bring_up_timeout(
                &config.interface,
                config.bring_up_attempts,
            ));
        }

        let address = match &config.route_target {
            Some(target) => route_address(target).await,
            None => None,
        };
        self.inner.address.send_replace(address);
        info!(interface = %config.interface, ?address, "Wi-Fi associated");
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.inner.carrier.is_up()
    }

    // The supplicant keeps the association alive on its own.
    async fn maintain(&self) {}

    fn current_address(&self) -> Option<IpAddr> {
        *self.inner.address.borrow()
    }

    async fn tear_down(&self) {
        self.inner.address.send_replace(None);

        let interface = self.interface();
        match Command::new(NMCLI)
            .args(["device", "disconnect", interface])
            .output()
            .await
        {
            Ok(output) if output.status.success() => info!(%interface, "Wi-Fi disconnected"),
            Ok(output) => warn!(
                %interface,
                "Wi-Fi disconnect failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => warn!(%interface, "Failed to run {}: {}", NMCLI, e),
        }
    }
}
