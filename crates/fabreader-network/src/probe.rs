//! One-shot transport reachability probe.

use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Try a plain TCP connect to `host:port` within `timeout`.
///
/// Best effort: the result is only logged by callers and never blocks the
/// session from being attempted.
pub async fn probe_reachability(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => {
            info!(%host, port, "Server reachable");
            true
        }
        Ok(Err(e)) => {
            warn!(%host, port, "Server not reachable: {}", e);
            false
        }
        Err(_) => {
            warn!(%host, port, timeout_ms = timeout.as_millis() as u64, "Reachability probe timed out");
            false
        }
    }
}
