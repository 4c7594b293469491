//! Hardware abstraction for the FabReader secure element.
//!
//! The reader needs five capabilities from its card interface: a firmware
//! probe used as a liveness check, target detection with a short timeout,
//! card type classification, key authentication and key change. They are
//! captured by the [`SecureElement`] trait so the reader logic can run
//! against the [`mock::MockSecureElement`] in tests and against a real
//! driver on the device.
//!
//! # Example
//!
//! ```no_run
//! use fabreader_hardware::{Result, SecureElement};
//! use std::time::Duration;
//!
//! async fn card_in_field<S: SecureElement>(se: &mut S) -> Result<Option<Vec<u8>>> {
//!     se.probe_firmware().await?;
//!     se.detect_target(Duration::from_millis(50)).await
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] with a
//! [`HardwareError`].

pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use devices::AnySecureElement;
pub use error::{HardwareError, Result};
pub use traits::SecureElement;
pub use types::{AuthCommand, FirmwareInfo};
