//! Enum wrapper for secure element dispatch.
//!
//! Native `async fn` in traits is not object-safe, so instead of
//! `Box<dyn SecureElement>` the reader holds an [`AnySecureElement`] and
//! dispatches by variant at compile time.
//!
//! # Examples
//!
//! ```
//! use fabreader_hardware::devices::AnySecureElement;
//! use fabreader_hardware::mock::MockSecureElement;
//!
//! let (element, _handle) = MockSecureElement::new();
//! let any_element = AnySecureElement::Mock(element);
//! ```

use crate::mock::MockSecureElement;
use crate::traits::SecureElement;
use crate::{AuthCommand, FirmwareInfo, Result};
use fabreader_core::{Key, KeySlot};
use std::time::Duration;

#[derive(Debug)]
#[non_exhaustive]
pub enum AnySecureElement {
    /// Emulated secure element for development and testing.
    Mock(MockSecureElement),
}

impl SecureElement for AnySecureElement {
    async fn probe_firmware(&mut self) -> Result<FirmwareInfo> {
        match self {
            Self::Mock(device) => device.probe_firmware().await,
        }
    }

    async fn detect_target(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Mock(device) => device.detect_target(timeout).await,
        }
    }

    async fn is_supported_type(&mut self) -> Result<bool> {
        match self {
            Self::Mock(device) => device.is_supported_type().await,
        }
    }

    async fn authenticate(&mut self, key: &Key, slot: KeySlot, command: AuthCommand) -> Result<()> {
        match self {
            Self::Mock(device) => device.authenticate(key, slot, command).await,
        }
    }

    async fn change_key(&mut self, old: &Key, new: &Key, slot: KeySlot) -> Result<()> {
        match self {
            Self::Mock(device) => device.change_key(old, new, slot).await,
        }
    }
}

impl From<MockSecureElement> for AnySecureElement {
    fn from(device: MockSecureElement) -> Self {
        Self::Mock(device)
    }
}
