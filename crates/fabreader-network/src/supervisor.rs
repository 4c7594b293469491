//! Background link health monitoring.
//!
//! The supervisor is the only writer of the health flag; the orchestrator
//! only reads it through a [`LinkHealth`]. The flag travels over a
//! `tokio::sync::watch` channel, so readers always see the latest value
//! without locking.

use crate::link::NetworkLink;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Read side of the link health flag.
#[derive(Debug, Clone)]
pub struct LinkHealth {
    rx: watch::Receiver<bool>,
}

impl LinkHealth {
    /// Wrap an existing receiver. Mostly useful in tests that drive the
    /// flag by hand.
    pub fn from_receiver(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Last health value published by the supervisor.
    pub fn is_up(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the supervisor reports the link up, for at most `timeout`.
    ///
    /// Returns `false` on timeout or if the supervisor has stopped.
    pub async fn wait_until_up(&mut self, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, self.rx.wait_for(|up| *up)).await,
            Ok(Ok(_))
        )
    }
}

/// Handle to the running health check task.
#[derive(Debug)]
pub struct LinkSupervisor {
    health: LinkHealth,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LinkSupervisor {
    /// Start polling `link.is_up()` every `interval`.
    ///
    /// The flag starts out `false`; the first poll happens immediately.
    pub fn spawn<L: NetworkLink>(link: L, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(false);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(link, interval, tx, cancel.clone()));

        info!(interval_ms = interval.as_millis() as u64, "Link supervisor started");

        Self {
            health: LinkHealth { rx },
            cancel,
            task,
        }
    }

    pub fn health(&self) -> LinkHealth {
        self.health.clone()
    }

    /// Stop the health check and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Link supervisor task failed: {}", e);
        }
        debug!("Link supervisor stopped");
    }
}

async fn run<L: NetworkLink>(
    link: L,
    interval: Duration,
    tx: watch::Sender<bool>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let up = link.is_up();
                let changed = tx.send_if_modified(|current| {
                    let changed = *current != up;
                    *current = up;
                    changed
                });

                if changed {
                    if up {
                        match link.current_address() {
                            Some(address) => info!(%address, "Network link up"),
                            None => info!("Network link up"),
                        }
                    } else {
                        warn!("Network link lost");
                    }
                }
            }
        }
    }
}
