//! Mock device implementations for testing and development.
//!
//! These devices are controlled programmatically through a handle and need
//! no physical hardware.

pub mod secure_element;

pub use secure_element::{FACTORY_KEY, MockSecureElement, MockSecureElementHandle, MockStats};
