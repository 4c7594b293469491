//! Debounced card presence.
//!
//! Arrival is trusted on the first read. Departure is debounced: a tracked
//! card stays present until every sample for the whole removal timeout has
//! missed it, measured from the first missed sample. Unsupported cards
//! are reported once per stay in the field and never become the tracked
//! card.

use fabreader_core::{CardHandle, CardUid};
use fabreader_hardware::{HardwareError, Result, SecureElement};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// One classified detection sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sample {
    Empty,
    Supported(CardUid),
    Unsupported(CardUid),
}

/// What a sample changed.
#[derive(Debug, Clone)]
pub enum PresenceChange {
    Unchanged,
    /// A supported card was promoted to the tracked card.
    Arrived(CardHandle),
    /// The tracked card was absent for the full removal timeout.
    Departed(CardHandle),
    /// The tracked card timed out while another supported card was in the
    /// field; the new card is tracked right away.
    Replaced {
        previous: CardHandle,
        current: CardHandle,
    },
    /// An unsupported card entered the field.
    Unsupported(CardUid),
}

#[derive(Debug)]
pub struct CardPresenceTracker {
    removal_timeout: Duration,
    detect_timeout: Duration,
    card: Option<CardHandle>,
    /// First sample that missed the tracked card since its last sighting.
    missing_since: Option<Instant>,
    unsupported: Option<CardUid>,
}

impl CardPresenceTracker {
    pub fn new(removal_timeout: Duration, detect_timeout: Duration) -> Self {
        Self {
            removal_timeout,
            detect_timeout,
            card: None,
            missing_since: None,
            unsupported: None,
        }
    }

    /// The tracked card, if any.
    pub fn card(&self) -> Option<&CardHandle> {
        self.card.as_ref()
    }

    /// Forget the tracked card without reporting a departure.
    pub fn clear(&mut self) -> Option<CardHandle> {
        self.unsupported = None;
        self.missing_since = None;
        self.card.take()
    }

    /// Read one sample from the secure element and apply it.
    ///
    /// # Errors
    ///
    /// Propagates hardware faults from detection. A card that leaves the
    /// field between detection and classification counts as an empty
    /// sample.
    pub async fn poll<S: SecureElement>(
        &mut self,
        element: &mut S,
        now: Instant,
    ) -> Result<PresenceChange> {
        let sample = self.read_sample(element).await?;
        Ok(self.observe(sample, now))
    }

    async fn read_sample<S: SecureElement>(&self, element: &mut S) -> Result<Sample> {
        let Some(raw) = element.detect_target(self.detect_timeout).await? else {
            return Ok(Sample::Empty);
        };

        let uid = match CardUid::new(&raw) {
            Ok(uid) => uid,
            Err(e) => {
                warn!(len = raw.len(), "Ignoring target: {}", e);
                return Ok(Sample::Empty);
            }
        };

        match element.is_supported_type().await {
            Ok(true) => Ok(Sample::Supported(uid)),
            Ok(false) => Ok(Sample::Unsupported(uid)),
            Err(HardwareError::NoTarget { message }) => {
                trace!(%uid, %message, "Target left during classification");
                Ok(Sample::Empty)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply a sample taken at `now`.
    pub fn observe(&mut self, sample: Sample, now: Instant) -> PresenceChange {
        if let Some(card) = self.card.as_mut() {
            if matches!(&sample, Sample::Supported(uid) if uid == card.uid()) {
                card.touch(now);
                self.missing_since = None;
                return PresenceChange::Unchanged;
            }

            let missing_for = now.saturating_duration_since(*self.missing_since.get_or_insert(now));
            if missing_for < self.removal_timeout {
                trace!(uid = %card.uid(), missing_ms = missing_for.as_millis() as u64, "Card not seen");
                return PresenceChange::Unchanged;
            }

            let Some(previous) = self.card.take() else {
                return PresenceChange::Unchanged;
            };
            self.missing_since = None;
            debug!(uid = %previous.uid(), "Card departure confirmed");

            return match sample {
                Sample::Supported(uid) => {
                    let current = CardHandle::new(uid, now);
                    self.card = Some(current.clone());
                    PresenceChange::Replaced { previous, current }
                }
                Sample::Unsupported(uid) => {
                    self.unsupported = Some(uid);
                    PresenceChange::Departed(previous)
                }
                Sample::Empty => PresenceChange::Departed(previous),
            };
        }

        match sample {
            Sample::Supported(uid) => {
                self.unsupported = None;
                let card = CardHandle::new(uid, now);
                self.card = Some(card.clone());
                PresenceChange::Arrived(card)
            }
            Sample::Unsupported(uid) => {
                if self.unsupported.as_ref() == Some(&uid) {
                    return PresenceChange::Unchanged;
                }
                self.unsupported = Some(uid.clone());
                PresenceChange::Unsupported(uid)
            }
            Sample::Empty => {
                self.unsupported = None;
                PresenceChange::Unchanged
            }
        }
    }
}
