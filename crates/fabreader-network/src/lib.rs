//! Network layer of the FabReader.
//!
//! This crate provides everything between the reader logic and the wire:
//!
//! - **NetworkLink**: the physical transport (Ethernet or Wi-Fi, chosen at
//!   build time through cargo features) plus a mock backend
//! - **LinkSupervisor**: background task publishing link health
//! - **Session**: reconnecting WebSocket message channel to the server,
//!   plus an in-memory mock
//! - **probe_reachability**: best-effort TCP probe run after bring-up
//!
//! # Example
//!
//! ```no_run
//! use fabreader_network::{LinkSupervisor, MockLink, NetworkLink};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (link, _handle) = MockLink::new();
//! link.bring_up().await?;
//!
//! let supervisor = LinkSupervisor::spawn(link, Duration::from_secs(1));
//! let mut health = supervisor.health();
//! assert!(health.wait_until_up(Duration::from_secs(2)).await);
//!
//! supervisor.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod link;
mod probe;
pub mod session;
mod supervisor;

pub use error::{LinkError, LinkResult, SessionError};
pub use link::mock::{MockLink, MockLinkHandle};
pub use link::{AnyNetworkLink, LinkConfig, NetworkLink};
pub use probe::probe_reachability;
pub use session::{
    MockSession, MockSessionHandle, Session, SessionEvent, SessionState, SessionTarget, WsSession,
};
pub use supervisor::{LinkHealth, LinkSupervisor};

#[cfg(feature = "ethernet")]
pub use link::ethernet::EthernetLink;
#[cfg(feature = "wifi")]
pub use link::wifi::{WifiCredentials, WifiLink};
