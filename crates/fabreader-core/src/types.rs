use crate::{
    Result,
    constants::{MAX_UID_LENGTH, MIN_UID_LENGTH},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

/// Card unique identifier (4-7 bytes).
///
/// The textual form is uppercase hexadecimal without separators and is the
/// stable identity used in every protocol message.
///
/// # Security
/// Equality is evaluated in constant time so a command's `uid` cannot be
/// probed byte by byte.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CardUid(Vec<u8>);

impl CardUid {
    /// Create a UID from raw bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardId` if the length is outside 4-7 bytes.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        let len = bytes.len();
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&len) {
            return Err(Error::InvalidCardId(format!(
                "UID must be {MIN_UID_LENGTH}-{MAX_UID_LENGTH} bytes, got {len}"
            )));
        }
        Ok(CardUid(bytes.to_vec()))
    }

    /// Parse a UID from its hexadecimal text form (case-insensitive).
    ///
    /// # Errors
    /// Returns `Error::InvalidCardId` if the text is not an even-length
    /// hexadecimal string of 4-7 bytes.
    pub fn from_hex(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidCardId(format!("Invalid hex UID: {text}")));
        }

        let bytes = (0..text.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&text[i..i + 2], 16))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| Error::InvalidCardId(format!("Invalid hex UID: {text}")))?;

        CardUid::new(&bytes)
    }

    /// Get the raw UID bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Uppercase hexadecimal form, e.g. `04A1B2C3D4E5F6`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }

    /// Number of bytes in the UID.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; an empty UID cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for CardUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardUid::from_hex(s)
    }
}

impl From<CardUid> for String {
    fn from(uid: CardUid) -> Self {
        uid.to_hex()
    }
}

impl TryFrom<String> for CardUid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        CardUid::from_hex(&value)
    }
}

/// Constant-time comparison implementation for CardUid
impl PartialEq for CardUid {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl std::hash::Hash for CardUid {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// The single card currently tracked by the reader.
///
/// Created on the first confirmed detection of a supported card and cleared
/// once its absence is confirmed. At most one handle is live at a time.
#[derive(Debug, Clone)]
pub struct CardHandle {
    uid: CardUid,
    id_text: String,
    detected_at: DateTime<Utc>,
    first_seen_at: Instant,
    last_seen_at: Instant,
}

impl CardHandle {
    /// Create a handle for a card first seen at `now`.
    pub fn new(uid: CardUid, now: Instant) -> Self {
        let id_text = uid.to_hex();
        Self {
            uid,
            id_text,
            detected_at: Utc::now(),
            first_seen_at: now,
            last_seen_at: now,
        }
    }

    pub fn uid(&self) -> &CardUid {
        &self.uid
    }

    /// Uppercase hex identity used in protocol messages.
    pub fn id_text(&self) -> &str {
        &self.id_text
    }

    /// Wall-clock time of the first detection.
    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    pub fn first_seen_at(&self) -> Instant {
        self.first_seen_at
    }

    pub fn last_seen_at(&self) -> Instant {
        self.last_seen_at
    }

    /// Record a successful re-detection.
    pub fn touch(&mut self, now: Instant) {
        self.last_seen_at = now;
    }

    /// Time since the card was first detected.
    pub fn present_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.first_seen_at)
    }

    /// Check whether a command's `uid` addresses this card.
    ///
    /// The comparison is exact against the uppercase hex identity and runs
    /// in constant time.
    pub fn matches(&self, uid_text: &str) -> bool {
        self.id_text.as_bytes().ct_eq(uid_text.as_bytes()).into()
    }
}
