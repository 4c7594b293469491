//! Mock secure element for testing and development.
//!
//! Emulates a reader IC plus a set of cards, each with a five-slot key
//! store. A [`MockSecureElementHandle`] shares the state with the device so
//! tests (and the emulated card console) can move cards in and out of the
//! field, inject faults and inspect key slots afterwards.

use crate::{
    HardwareError, Result,
    traits::SecureElement,
    types::{AuthCommand, FirmwareInfo},
};
use fabreader_core::{Key, KeySlot, constants::KEY_SLOT_COUNT};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::trace;

/// Key every slot of a fresh card starts with.
pub const FACTORY_KEY: Key = Key::from_array([0u8; 16]);

const DEVICE_NAME: &str = "Mock PN532";

/// Emulated card.
#[derive(Debug, Clone)]
struct MockCard {
    supported: bool,
    keys: [Key; KEY_SLOT_COUNT as usize],
}

impl MockCard {
    fn blank(supported: bool) -> Self {
        Self {
            supported,
            keys: [FACTORY_KEY; KEY_SLOT_COUNT as usize],
        }
    }
}

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    pub probes: u32,
    pub detects: u32,
    pub authentications: u32,
    pub key_changes: u32,
}

impl MockStats {
    /// Calls that reached the card's key store.
    pub fn key_operations(&self) -> u32 {
        self.authentications + self.key_changes
    }
}

#[derive(Debug)]
struct MockState {
    firmware: Option<FirmwareInfo>,
    cards: HashMap<Vec<u8>, MockCard>,
    in_field: Option<Vec<u8>>,
    selected: Option<Vec<u8>>,
    missed_detects: u32,
    refused_authentications: u32,
    refused_key_change_slots: HashSet<u8>,
    last_auth_command: Option<AuthCommand>,
    stats: MockStats,
}

impl MockState {
    fn new() -> Self {
        Self {
            firmware: Some(FirmwareInfo::new(0x32, 1, 6, 0x07)),
            cards: HashMap::new(),
            in_field: None,
            selected: None,
            missed_detects: 0,
            refused_authentications: 0,
            refused_key_change_slots: HashSet::new(),
            last_auth_command: None,
            stats: MockStats::default(),
        }
    }

    fn ensure_responding(&self) -> Result<()> {
        if self.firmware.is_none() {
            return Err(HardwareError::disconnected(DEVICE_NAME));
        }
        Ok(())
    }

    /// The selected card, provided it is still in the field.
    fn selected_card(&mut self) -> Result<&mut MockCard> {
        let uid = match (&self.selected, &self.in_field) {
            (Some(selected), Some(in_field)) if selected == in_field => selected.clone(),
            (Some(_), _) => return Err(HardwareError::no_target("target left the field")),
            (None, _) => return Err(HardwareError::no_target("no target selected")),
        };
        self.cards
            .get_mut(&uid)
            .ok_or_else(|| HardwareError::no_target("target left the field"))
    }
}

/// Mock secure element reader.
///
/// # Examples
///
/// ```
/// use fabreader_hardware::mock::MockSecureElement;
/// use fabreader_hardware::SecureElement;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> fabreader_hardware::Result<()> {
///     let (mut element, handle) = MockSecureElement::new();
///
///     handle.add_card(vec![0x04, 0xAB, 0xCD, 0xEF], true).await;
///     handle.present(&[0x04, 0xAB, 0xCD, 0xEF]).await;
///
///     let uid = element.detect_target(Duration::from_millis(50)).await?;
///     assert_eq!(uid, Some(vec![0x04, 0xAB, 0xCD, 0xEF]));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSecureElement {
    state: Arc<Mutex<MockState>>,
}

impl MockSecureElement {
    /// Create a responding reader with no cards.
    pub fn new() -> (Self, MockSecureElementHandle) {
        let state = Arc::new(Mutex::new(MockState::new()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockSecureElementHandle { state },
        )
    }
}

impl SecureElement for MockSecureElement {
    async fn probe_firmware(&mut self) -> Result<FirmwareInfo> {
        let mut state = self.state.lock().await;
        state.stats.probes += 1;
        state
            .firmware
            .ok_or_else(|| HardwareError::disconnected(DEVICE_NAME))
    }

    // Returns immediately; the timeout only bounds real radio polling.
    async fn detect_target(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock().await;
        state.ensure_responding()?;
        state.stats.detects += 1;

        if state.missed_detects > 0 {
            state.missed_detects -= 1;
            state.selected = None;
            trace!("Injected missed detection");
            return Ok(None);
        }

        state.selected = state.in_field.clone();
        Ok(state.selected.clone())
    }

    async fn is_supported_type(&mut self) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.ensure_responding()?;
        Ok(state.selected_card()?.supported)
    }

    async fn authenticate(&mut self, key: &Key, slot: KeySlot, command: AuthCommand) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_responding()?;
        state.stats.authentications += 1;
        state.last_auth_command = Some(command);

        if state.refused_authentications > 0 {
            state.refused_authentications -= 1;
            return Err(HardwareError::authentication_failed(slot.as_u8()));
        }

        let card = state.selected_card()?;
        if card.keys[usize::from(slot.as_u8())] == *key {
            Ok(())
        } else {
            Err(HardwareError::authentication_failed(slot.as_u8()))
        }
    }

    async fn change_key(&mut self, old: &Key, new: &Key, slot: KeySlot) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_responding()?;
        state.stats.key_changes += 1;

        if state.refused_key_change_slots.contains(&slot.as_u8()) {
            return Err(HardwareError::key_change_failed(slot.as_u8()));
        }

        let card = state.selected_card()?;
        let current = &mut card.keys[usize::from(slot.as_u8())];
        if *current != *old {
            return Err(HardwareError::key_change_failed(slot.as_u8()));
        }
        *current = *new;
        Ok(())
    }
}

/// Handle for controlling a [`MockSecureElement`].
///
/// Clones share the same emulated reader.
#[derive(Debug, Clone)]
pub struct MockSecureElementHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockSecureElementHandle {
    /// Register a blank card (every slot holds [`FACTORY_KEY`]).
    pub async fn add_card(&self, uid: Vec<u8>, supported: bool) {
        self.state
            .lock()
            .await
            .cards
            .insert(uid, MockCard::blank(supported));
    }

    /// Place a card in the field, registering it as a supported blank card
    /// if it is unknown.
    pub async fn present(&self, uid: &[u8]) {
        let mut state = self.state.lock().await;
        state
            .cards
            .entry(uid.to_vec())
            .or_insert_with(|| MockCard::blank(true));
        state.in_field = Some(uid.to_vec());
    }

    /// Take the current card out of the field.
    pub async fn remove(&self) {
        self.state.lock().await.in_field = None;
    }

    pub async fn card_in_field(&self) -> Option<Vec<u8>> {
        self.state.lock().await.in_field.clone()
    }

    /// Make the reader IC stop (or resume) answering.
    pub async fn set_responding(&self, responding: bool) {
        let mut state = self.state.lock().await;
        state.firmware = responding.then(|| FirmwareInfo::new(0x32, 1, 6, 0x07));
    }

    /// Report an empty field for the next `count` detections.
    pub async fn miss_next_detects(&self, count: u32) {
        self.state.lock().await.missed_detects = count;
    }

    /// Refuse the next `count` authentications regardless of key.
    pub async fn refuse_next_authentications(&self, count: u32) {
        self.state.lock().await.refused_authentications = count;
    }

    /// Refuse every key change on `slot`.
    pub async fn refuse_key_changes(&self, slot: u8) {
        self.state
            .lock()
            .await
            .refused_key_change_slots
            .insert(slot);
    }

    /// Overwrite a key slot of a registered card.
    pub async fn set_key(&self, uid: &[u8], slot: u8, key: Key) {
        if let Some(card) = self.state.lock().await.cards.get_mut(uid) {
            if let Some(stored) = card.keys.get_mut(usize::from(slot)) {
                *stored = key;
            }
        }
    }

    /// Read back a key slot of a registered card.
    pub async fn key(&self, uid: &[u8], slot: u8) -> Option<Key> {
        let state = self.state.lock().await;
        state
            .cards
            .get(uid)
            .and_then(|card| card.keys.get(usize::from(slot)).copied())
    }

    pub async fn last_auth_command(&self) -> Option<AuthCommand> {
        self.state.lock().await.last_auth_command
    }

    pub async fn stats(&self) -> MockStats {
        self.state.lock().await.stats
    }

    pub async fn reset_stats(&self) {
        self.state.lock().await.stats = MockStats::default();
    }
}
