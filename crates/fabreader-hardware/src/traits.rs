//! Secure element trait definition.
//!
//! The reader talks to exactly one contactless secure element through this
//! trait. Cryptographic exchanges (challenge/response, session key
//! derivation, key diversification) live behind the implementation; callers
//! only see whether the card accepted or refused a key.
//!
//! The trait uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT), so it is not object-safe. Use generics, or the enum wrapper in
//! [`devices`](crate::devices) when a concrete type is needed.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{AuthCommand, FirmwareInfo};
use fabreader_core::{Key, KeySlot};
use std::time::Duration;

/// Contactless secure element reader.
///
/// Operations after [`detect_target`](SecureElement::detect_target) address
/// the target selected by the most recent successful detection.
///
/// # Examples
///
/// ```no_run
/// use fabreader_core::{Key, KeySlot};
/// use fabreader_hardware::{AuthCommand, Result, SecureElement};
/// use std::time::Duration;
///
/// async fn blank_card<S: SecureElement>(se: &mut S, default_key: &Key) -> Result<bool> {
///     if se.detect_target(Duration::from_millis(50)).await?.is_none() {
///         return Ok(false);
///     }
///     Ok(se
///         .authenticate(default_key, KeySlot::MASTER, AuthCommand::Aes)
///         .await
///         .is_ok())
/// }
/// ```
pub trait SecureElement: Send + Sync {
    /// Query the reader IC firmware.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader does not answer, which the reader
    /// treats as a hardware fault.
    async fn probe_firmware(&mut self) -> Result<FirmwareInfo>;

    /// Look for a target in the field for at most `timeout`.
    ///
    /// Returns the target UID when one was found and selects it for the
    /// operations below; returns `Ok(None)` when the field is empty.
    ///
    /// # Errors
    ///
    /// Returns an error on communication failure, not on an empty field.
    async fn detect_target(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Check whether the selected target is a card type the reader can
    /// provision.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::NoTarget`](crate::HardwareError::NoTarget)
    /// when nothing is selected.
    async fn is_supported_type(&mut self) -> Result<bool>;

    /// Authenticate against `slot` of the selected target with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::AuthenticationFailed`](crate::HardwareError::AuthenticationFailed)
    /// when the card refuses the key.
    async fn authenticate(&mut self, key: &Key, slot: KeySlot, command: AuthCommand) -> Result<()>;

    /// Replace the key in `slot`, proving knowledge of `old`.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::KeyChangeFailed`](crate::HardwareError::KeyChangeFailed)
    /// when the card refuses the change.
    async fn change_key(&mut self, old: &Key, new: &Key, slot: KeySlot) -> Result<()>;
}
