//! Physical network link abstraction.
//!
//! Exactly one backend is compiled into the binary: Ethernet or Wi-Fi
//! station mode, selected with the `ethernet` / `wifi` cargo features. The
//! [`mock`] backend is always available for tests.
//!
//! All methods take `&self`: backends are cheap handles over shared state,
//! so the orchestrator and the [`LinkSupervisor`](crate::LinkSupervisor)
//! can each hold a clone.

#![allow(async_fn_in_trait)]

mod carrier;
#[cfg(feature = "ethernet")]
pub mod ethernet;
pub mod mock;
#[cfg(feature = "wifi")]
pub mod wifi;

pub use carrier::Carrier;

use crate::error::LinkResult;
use fabreader_core::constants::{LINK_BRING_UP_ATTEMPTS, LINK_BRING_UP_POLL_MS, ROUTE_LOOKUP_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Network transport underneath the session.
pub trait NetworkLink: Clone + Send + Sync + 'static {
    /// Establish link-layer connectivity.
    ///
    /// Blocks until the link is up or the backend's bounded retries are
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns a [`LinkError`](crate::LinkError) when the link did not come
    /// up. Callers retry after a backoff.
    async fn bring_up(&self) -> LinkResult<()>;

    /// Cheap, non-blocking health check.
    fn is_up(&self) -> bool;

    /// Backend-specific periodic upkeep.
    async fn maintain(&self);

    /// Local address, meaningful only while [`is_up`](NetworkLink::is_up).
    fn current_address(&self) -> Option<IpAddr>;

    /// Release the link.
    async fn tear_down(&self);
}

/// Settings shared by the hardware backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Interface name, e.g. `eth0` or `wlan0`.
    pub interface: String,

    /// Root of the sysfs mount used for carrier checks.
    pub sysfs_root: PathBuf,

    /// Carrier polls per bring-up.
    pub bring_up_attempts: u32,

    /// Spacing between carrier polls.
    #[serde(with = "fabreader_core::duration_ms")]
    pub poll_interval: Duration,

    /// Host and port used to pick the local source address. Normally the
    /// session server.
    pub route_target: Option<(String, u16)>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            sysfs_root: PathBuf::from("/sys"),
            bring_up_attempts: LINK_BRING_UP_ATTEMPTS,
            poll_interval: Duration::from_millis(LINK_BRING_UP_POLL_MS),
            route_target: None,
        }
    }
}

/// Source address the OS would use to reach `target`.
///
/// Connecting a UDP socket only consults the routing table; no packet is
/// sent. Resolving a host name can still stall, so the lookup is bounded.
pub(crate) async fn route_address(target: &(String, u16)) -> Option<IpAddr> {
    let lookup = async {
        let socket = tokio::net::UdpSocket::bind(("0.0.0.0", 0)).await.ok()?;
        socket.connect((target.0.as_str(), target.1)).await.ok()?;
        let ip = socket.local_addr().ok()?.ip();
        (!ip.is_unspecified()).then_some(ip)
    };
    bounded_lookup(Duration::from_millis(ROUTE_LOOKUP_TIMEOUT_MS), lookup).await
}

async fn bounded_lookup(
    limit: Duration,
    lookup: impl Future<Output = Option<IpAddr>>,
) -> Option<IpAddr> {
    match tokio::time::timeout(limit, lookup).await {
        Ok(address) => address,
        Err(_) => {
            warn!(timeout_ms = limit.as_millis() as u64, "Route lookup timed out");
            None
        }
    }
}

/// Enum wrapper over the compiled-in link backends.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyNetworkLink {
    #[cfg(feature = "ethernet")]
    Ethernet(ethernet::EthernetLink),
    #[cfg(feature = "wifi")]
    Wifi(wifi::WifiLink),
    Mock(mock::MockLink),
}

impl AnyNetworkLink {
    /// Short backend name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            #[cfg(feature = "ethernet")]
            Self::Ethernet(_) => "ethernet",
            #[cfg(feature = "wifi")]
            Self::Wifi(_) => "wifi",
            Self::Mock(_) => "mock",
        }
    }
}

impl NetworkLink for AnyNetworkLink {
    async fn bring_up(&self) -> LinkResult<()> {
        match self {
            #[cfg(feature = "ethernet")]
            Self::Ethernet(link) => link.bring_up().await,
            #[cfg(feature = "wifi")]
            Self::Wifi(link) => link.bring_up().await,
            Self::Mock(link) => link.bring_up().await,
        }
    }

    fn is_up(&self) -> bool {
        match self {
            #[cfg(feature = "ethernet")]
            Self::Ethernet(link) => link.is_up(),
            #[cfg(feature = "wifi")]
            Self::Wifi(link) => link.is_up(),
            Self::Mock(link) => link.is_up(),
        }
    }

    async fn maintain(&self) {
        match self {
            #[cfg(feature = "ethernet")]
            Self::Ethernet(link) => link.maintain().await,
            #[cfg(feature = "wifi")]
            Self::Wifi(link) => link.maintain().await,
            Self::Mock(link) => link.maintain().await,
        }
    }

    fn current_address(&self) -> Option<IpAddr> {
        match self {
            #[cfg(feature = "ethernet")]
            Self::Ethernet(link) => link.current_address(),
            #[cfg(feature = "wifi")]
            Self::Wifi(link) => link.current_address(),
            Self::Mock(link) => link.current_address(),
        }
    }

    async fn tear_down(&self) {
        match self {
            #[cfg(feature = "ethernet")]
            Self::Ethernet(link) => link.tear_down().await,
            #[cfg(feature = "wifi")]
            Self::Wifi(link) => link.tear_down().await,
            Self::Mock(link) => link.tear_down().await,
        }
    }
}
