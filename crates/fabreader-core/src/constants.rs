//! Core constants for the FabReader session orchestrator.
//!
//! This module centralizes every timing knob, protocol identifier and size
//! limit used by the reader. The reader crate builds its default
//! configuration from these values, so changing one here changes the default
//! behavior everywhere.
//!
//! # Usage
//!
//! ```
//! use fabreader_core::constants::*;
//! use std::time::Duration;
//!
//! let removal = Duration::from_millis(CARD_REMOVAL_TIMEOUT_MS);
//! assert_eq!(removal.as_millis(), 1000);
//! assert_eq!(KEY_LENGTH, 16);
//! ```

// ============================================================================
// Card presence
// ============================================================================

/// Continuous absence required before a tracked card is considered removed.
///
/// Arrival is reported on the first positive read; only departure is
/// debounced.
pub const CARD_REMOVAL_TIMEOUT_MS: u64 = 1000;

/// Hardware timeout passed to a single target detection.
///
/// Kept short so the main loop keeps driving the session while no card is
/// in the field.
pub const DETECT_TIMEOUT_MS: u64 = 50;

/// Maximum card UID length in bytes (7-byte double-size UID).
pub const MAX_UID_LENGTH: usize = 7;

/// Minimum card UID length in bytes (4-byte single-size UID).
pub const MIN_UID_LENGTH: usize = 4;

// ============================================================================
// Status reporting
// ============================================================================

/// Maximum time between two status messages while the session is open.
pub const STATUS_INTERVAL_MS: u64 = 5000;

// ============================================================================
// Network link and session
// ============================================================================

/// Cadence of the background link health check.
pub const LINK_HEALTH_POLL_MS: u64 = 1000;

/// Delay between failed link bring-up rounds.
pub const NETWORK_RETRY_DELAY_MS: u64 = 5000;

/// Number of carrier polls performed by a single link bring-up.
pub const LINK_BRING_UP_ATTEMPTS: u32 = 10;

/// Spacing between carrier polls during link bring-up.
pub const LINK_BRING_UP_POLL_MS: u64 = 1000;

/// Minimum spacing between calls to the link's periodic upkeep.
pub const LINK_MAINTAIN_INTERVAL_MS: u64 = 1000;

/// Upper bound on resolving the route toward the server during upkeep.
pub const ROUTE_LOOKUP_TIMEOUT_MS: u64 = 500;

/// Minimum spacing between two session connect attempts.
pub const SESSION_RECONNECT_INTERVAL_MS: u64 = 5000;

/// Upper bound on the WebSocket opening handshake.
pub const SESSION_HANDSHAKE_TIMEOUT_MS: u64 = 5000;

/// Timeout of the one-shot transport reachability probe.
pub const REACHABILITY_PROBE_TIMEOUT_MS: u64 = 2000;

/// Application path of the reader endpoint on the server.
pub const DEFAULT_SERVER_PATH: &str = "api/fab-reader/ws";

/// Server host, taken from `FABREADER_SERVER_HOST` at build time.
pub const DEFAULT_SERVER_HOST: &str = match option_env!("FABREADER_SERVER_HOST") {
    Some(host) => host,
    None => "127.0.0.1",
};

/// Server port, taken from `FABREADER_SERVER_PORT` at build time.
pub const DEFAULT_SERVER_PORT: u16 = match option_env!("FABREADER_SERVER_PORT") {
    Some(port) => parse_port(port),
    None => 3000,
};

/// Compile-time port parser; a bad value fails the build.
const fn parse_port(text: &str) -> u16 {
    let bytes = text.as_bytes();
    assert!(!bytes.is_empty(), "FABREADER_SERVER_PORT is empty");

    let mut value: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        assert!(digit.is_ascii_digit(), "FABREADER_SERVER_PORT must be decimal");
        value = value * 10 + (digit - b'0') as u32;
        assert!(value <= u16::MAX as u32, "FABREADER_SERVER_PORT out of range");
        i += 1;
    }
    value as u16
}

// ============================================================================
// Main loop and recovery
// ============================================================================

/// Pause at the end of every main loop iteration.
pub const LOOP_TICK_MS: u64 = 20;

/// Settle delay preceding every error recovery attempt.
pub const RECOVERY_SETTLE_MS: u64 = 10_000;

// ============================================================================
// Commands and key material
// ============================================================================

/// Length of every secure element key in bytes (AES-128).
pub const KEY_LENGTH: usize = 16;

/// Number of key slots on the secure element (0 = master, 1-4 = application).
pub const KEY_SLOT_COUNT: u8 = 5;

/// Slot holding the card master key.
pub const MASTER_KEY_SLOT: u8 = 0;

/// First application key slot.
pub const FIRST_APP_KEY_SLOT: u8 = 1;

/// Last application key slot.
pub const LAST_APP_KEY_SLOT: u8 = 4;

/// Capacity of the per-command log returned to the server.
pub const COMMAND_LOG_CAPACITY: usize = 10;

/// Attempts made by the authenticate command before reporting failure.
pub const AUTH_MAX_ATTEMPTS: u32 = 3;

/// Pause between two authenticate attempts.
pub const AUTH_RETRY_DELAY_MS: u64 = 100;

// ============================================================================
// Wire protocol identifiers
// ============================================================================

/// `type` of an inbound command envelope.
pub const MSG_TYPE_COMMAND: &str = "command";

/// `type` of an outbound status envelope.
pub const MSG_TYPE_STATUS: &str = "status";

/// `type` of an outbound command result envelope.
pub const MSG_TYPE_COMMAND_RESULT: &str = "command_result";

/// `type` of an outbound log envelope.
pub const MSG_TYPE_LOG: &str = "log";

/// Prefix of every log line the reader sends to the server.
pub const READER_LOG_PREFIX: &str = "[Reader]";
