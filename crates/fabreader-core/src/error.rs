use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    // Card identity errors
    #[error("Invalid card id: {0}")]
    InvalidCardId(String),

    // Key material errors
    #[error("Invalid key '{name}': {reason}")]
    InvalidKey { name: String, reason: String },

    #[error("Invalid key slot: {0}")]
    InvalidKeySlot(i64),

    // State machine errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
