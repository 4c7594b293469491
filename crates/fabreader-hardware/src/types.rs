//! Types exchanged with the secure element reader.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Firmware identity reported by the reader IC during the hardware probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    /// IC model code (e.g. `0x32` for a PN532).
    pub ic: u8,
    pub version: u8,
    pub revision: u8,
    /// Bitmask of supported card families.
    pub support: u8,
}

impl FirmwareInfo {
    pub fn new(ic: u8, version: u8, revision: u8, support: u8) -> Self {
        Self {
            ic,
            version,
            revision,
            support,
        }
    }
}

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PN5{:02X} firmware v{}.{}",
            self.ic, self.version, self.revision
        )
    }
}

/// Authentication command family used to open a session with a key slot.
///
/// Values are the instruction bytes sent to the card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthCommand {
    /// AES-128 authentication.
    #[default]
    Aes,
    /// ISO 3DES authentication.
    Iso,
    /// Legacy DES authentication.
    Legacy,
}

impl AuthCommand {
    pub fn code(self) -> u8 {
        match self {
            AuthCommand::Aes => 0xAA,
            AuthCommand::Iso => 0x1A,
            AuthCommand::Legacy => 0x0A,
        }
    }
}
