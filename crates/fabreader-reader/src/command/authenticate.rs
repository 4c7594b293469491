//! Bounded-retry key verification on one application slot.

use super::HandlerOutcome;
use fabreader_core::{CommandLog, Key, KeySlot};
use fabreader_hardware::{AuthCommand, SecureElement};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Authenticate {
    slot: KeySlot,
    key: Key,
    attempts: u32,
    retry_delay: Duration,
}

impl Authenticate {
    pub fn new(slot: KeySlot, key: Key, attempts: u32, retry_delay: Duration) -> Self {
        Self {
            slot,
            key,
            attempts,
            retry_delay,
        }
    }

    /// Try up to `attempts` times, `retry_delay` apart, stopping at the
    /// first success.
    pub async fn execute<S: SecureElement>(
        &self,
        element: &mut S,
        log: &mut CommandLog,
    ) -> HandlerOutcome {
        let slot = self.slot;

        for attempt in 1..=self.attempts {
            match element.authenticate(&self.key, slot, AuthCommand::Aes).await {
                Ok(()) => {
                    info!(%slot, attempt, "Key verified");
                    log.push(format!("Attempt {attempt}: authenticated on slot {slot}"));
                    return HandlerOutcome::success(format!(
                        "Authenticated key slot {slot} on attempt {attempt}"
                    ));
                }
                Err(e) => {
                    debug!(%slot, attempt, "Authentication attempt failed: {}", e);
                    log.push(format!("Attempt {attempt}: {e}"));
                }
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!(%slot, attempts = self.attempts, "Key verification failed");
        HandlerOutcome::failure(format!(
            "Authentication failed on key slot {slot} after {} attempts",
            self.attempts
        ))
    }
}
