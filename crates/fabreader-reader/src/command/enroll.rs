//! Six-key provisioning of a blank or partially enrolled card.
//!
//! The master slot is opened with the default key (blank card) or the
//! master key (enrolled before). A blank card then gets its master key.
//! Each application slot is tried in a fixed order of key changes; a slot
//! that fails every change is recorded and the remaining slots are still
//! attempted.

use super::HandlerOutcome;
use fabreader_core::{CommandLog, Key, KeySet, KeySlot};
use fabreader_hardware::{AuthCommand, SecureElement};
use tracing::{debug, info, warn};

/// One key change to try on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChangeAttempt {
    pub old: Key,
    pub new: Key,
    pub slot: KeySlot,
    /// Log text used when this attempt succeeds.
    pub outcome: &'static str,
}

#[derive(Debug)]
pub struct Enroll {
    keys: KeySet,
}

impl Enroll {
    pub fn new(keys: KeySet) -> Self {
        Self { keys }
    }

    /// Key changes tried on an application slot, in order.
    ///
    /// The second attempt rewrites the slot with its target key. It
    /// succeeds on a slot that already holds that key, and the card gives
    /// no way to tell this apart from any other accepted change.
    pub fn application_attempts(&self, slot: KeySlot) -> Vec<KeyChangeAttempt> {
        let Some((_, new)) = self.keys.application_key(slot) else {
            return Vec::new();
        };
        vec![
            KeyChangeAttempt {
                old: self.keys.default_key,
                new: *new,
                slot,
                outcome: "changed from default key",
            },
            KeyChangeAttempt {
                old: *new,
                new: *new,
                slot,
                outcome: "already set",
            },
        ]
    }

    pub async fn execute<S: SecureElement>(
        &self,
        element: &mut S,
        log: &mut CommandLog,
    ) -> HandlerOutcome {
        let Some(blank) = self.open_master_slot(element, log).await else {
            return HandlerOutcome::failure(
                "Enrollment failed: master key issue (authentication failed)",
            );
        };

        if blank {
            let result = element
                .change_key(&self.keys.default_key, &self.keys.master_key, KeySlot::MASTER)
                .await;
            if let Err(e) = result {
                warn!("Master key change failed: {}", e);
                log.push("Slot 0: change to master key failed");
                return HandlerOutcome::failure(
                    "Enrollment failed: master key issue (key change failed)",
                );
            }
            log.push("Slot 0: changed to master key");
        } else {
            log.push("Slot 0: already enrolled, keeping master key");
        }

        let mut failed = Vec::new();
        for slot in KeySlot::applications() {
            if !self.provision_slot(element, slot, log).await {
                failed.push(slot.to_string());
            }
        }

        if failed.is_empty() {
            info!("Card enrolled");
            HandlerOutcome::success("Card enrolled")
        } else {
            HandlerOutcome::failure(format!(
                "Enrollment failed: application key issue (slots {})",
                failed.join(", ")
            ))
        }
    }

    /// Authenticate on slot 0. Returns `Some(true)` for a blank card,
    /// `Some(false)` for one that already has the master key.
    async fn open_master_slot<S: SecureElement>(
        &self,
        element: &mut S,
        log: &mut CommandLog,
    ) -> Option<bool> {
        let candidates = [
            (&self.keys.default_key, "default key", true),
            (&self.keys.master_key, "master key", false),
        ];

        for (key, name, blank) in candidates {
            match element
                .authenticate(key, KeySlot::MASTER, AuthCommand::Aes)
                .await
            {
                Ok(()) => {
                    log.push(format!("Slot 0: authenticated with {name}"));
                    return Some(blank);
                }
                Err(e) => {
                    debug!("Slot 0 rejected {}: {}", name, e);
                    log.push(format!("Slot 0: {name} rejected"));
                }
            }
        }
        None
    }

    async fn provision_slot<S: SecureElement>(
        &self,
        element: &mut S,
        slot: KeySlot,
        log: &mut CommandLog,
    ) -> bool {
        let name = self
            .keys
            .application_key(slot)
            .map_or("unknown", |(name, _)| name);

        for attempt in self.application_attempts(slot) {
            match element.change_key(&attempt.old, &attempt.new, attempt.slot).await {
                Ok(()) => {
                    log.push(format!("Slot {slot} ({name}): {}", attempt.outcome));
                    return true;
                }
                Err(e) => debug!(%slot, "Key change attempt failed: {}", e),
            }
        }

        warn!(%slot, name, "Application key not provisioned");
        log.push(format!("Slot {slot} ({name}): failed"));
        false
    }
}
