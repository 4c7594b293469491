//! Secure element key material.
//!
//! Keys arrive per command from the server and are never persisted by the
//! reader. `Debug` output is redacted so key bytes do not leak into logs.

use crate::{
    Result,
    constants::{FIRST_APP_KEY_SLOT, KEY_LENGTH, KEY_SLOT_COUNT, LAST_APP_KEY_SLOT, MASTER_KEY_SLOT},
    error::Error,
};
use std::fmt;
use subtle::ConstantTimeEq;

/// A 16-byte secure element key.
#[derive(Clone, Copy, Eq)]
pub struct Key([u8; KEY_LENGTH]);

impl Key {
    /// Create a key from a byte slice.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` if the slice is not exactly 16 bytes.
    pub fn new(name: &str, bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| Error::InvalidKey {
            name: name.to_string(),
            reason: format!("expected {KEY_LENGTH} bytes, got {}", bytes.len()),
        })?;
        Ok(Key(array))
    }

    pub const fn from_array(bytes: [u8; KEY_LENGTH]) -> Self {
        Key(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(<redacted>)")
    }
}

/// One of the five key storage locations on the secure element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeySlot(u8);

impl KeySlot {
    /// The card master key slot.
    pub const MASTER: KeySlot = KeySlot(MASTER_KEY_SLOT);

    /// Create any slot 0-4.
    ///
    /// # Errors
    /// Returns `Error::InvalidKeySlot` for values outside 0-4.
    pub fn new(slot: i64) -> Result<Self> {
        u8::try_from(slot)
            .ok()
            .filter(|s| *s < KEY_SLOT_COUNT)
            .map(KeySlot)
            .ok_or(Error::InvalidKeySlot(slot))
    }

    /// Create an application slot 1-4. The master slot is rejected.
    ///
    /// # Errors
    /// Returns `Error::InvalidKeySlot` for values outside 1-4.
    pub fn application(slot: i64) -> Result<Self> {
        let slot = KeySlot::new(slot)?;
        if slot.is_master() {
            return Err(Error::InvalidKeySlot(i64::from(slot.0)));
        }
        Ok(slot)
    }

    /// All application slots in ascending order.
    pub fn applications() -> impl Iterator<Item = KeySlot> {
        (FIRST_APP_KEY_SLOT..=LAST_APP_KEY_SLOT).map(KeySlot)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    pub fn is_master(self) -> bool {
        self.0 == MASTER_KEY_SLOT
    }
}

impl fmt::Display for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The six keys supplied by an enroll command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    pub default_key: Key,
    pub master_key: Key,
    pub auth_key: Key,
    pub read_key: Key,
    pub write_key: Key,
    pub change_key: Key,
}

impl KeySet {
    /// Target key for an application slot: 1 = auth, 2 = read, 3 = write,
    /// 4 = change. Returns `None` for the master slot.
    pub fn application_key(&self, slot: KeySlot) -> Option<(&'static str, &Key)> {
        match slot.as_u8() {
            1 => Some(("authKey", &self.auth_key)),
            2 => Some(("readKey", &self.read_key)),
            3 => Some(("writeKey", &self.write_key)),
            4 => Some(("changeKey", &self.change_key)),
            _ => None,
        }
    }
}
