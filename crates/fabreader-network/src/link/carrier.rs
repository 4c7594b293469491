//! Carrier detection through sysfs.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Reads `<sysfs>/class/net/<iface>/operstate`.
#[derive(Debug, Clone)]
pub struct Carrier {
    operstate: PathBuf,
}

impl Carrier {
    pub fn new(sysfs_root: &Path, interface: &str) -> Self {
        Self {
            operstate: sysfs_root
                .join("class")
                .join("net")
                .join(interface)
                .join("operstate"),
        }
    }

    /// `true` only when the kernel reports the interface as `up`. A missing
    /// interface reads as down.
    pub fn is_up(&self) -> bool {
        match std::fs::read_to_string(&self.operstate) {
            Ok(state) => state.trim() == "up",
            Err(e) => {
                trace!(path = %self.operstate.display(), "operstate unreadable: {}", e);
                false
            }
        }
    }

    /// Poll the carrier up to `attempts` times, `interval` apart.
    pub async fn wait_until_up(&self, attempts: u32, interval: Duration) -> bool {
        for attempt in 1..=attempts {
            if self.is_up() {
                return true;
            }
            debug!(attempt, attempts, "Carrier down, waiting");
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        false
    }
}
