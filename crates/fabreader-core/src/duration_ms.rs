//! Serde adapter storing a `Duration` as whole milliseconds.
//!
//! ```
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct Timing {
//!     #[serde(with = "fabreader_core::duration_ms")]
//!     tick: Duration,
//! }
//!
//! let timing: Timing = serde_json::from_str(r#"{"tick": 20}"#).unwrap();
//! assert_eq!(timing.tick, Duration::from_millis(20));
//! ```

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Saturates at `u64::MAX` milliseconds.
pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}
