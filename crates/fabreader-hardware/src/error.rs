//! Error types for secure element operations.
//!
//! Cryptographic refusals ([`HardwareError::AuthenticationFailed`],
//! [`HardwareError::KeyChangeFailed`]) are recovered by the command
//! handlers' retry and fallback policy. A reader that stops answering
//! ([`HardwareError::Disconnected`]) is a hardware fault.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during secure element operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has stopped responding.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// No target is selected, or the selected target left the field.
    #[error("No target: {message}")]
    NoTarget { message: String },

    /// The card refused authentication with the given key.
    #[error("Authentication failed on key slot {slot}")]
    AuthenticationFailed { slot: u8 },

    /// The card refused to change the key in the given slot.
    #[error("Key change failed on key slot {slot}")]
    KeyChangeFailed { slot: u8 },
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new missing target error.
    pub fn no_target(message: impl Into<String>) -> Self {
        Self::NoTarget {
            message: message.into(),
        }
    }

    pub fn authentication_failed(slot: u8) -> Self {
        Self::AuthenticationFailed { slot }
    }

    pub fn key_change_failed(slot: u8) -> Self {
        Self::KeyChangeFailed { slot }
    }
}
