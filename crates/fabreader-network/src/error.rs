//! Error types for the network link and the session transport.

use thiserror::Error;

pub type LinkResult<T> = std::result::Result<T, LinkError>;

/// Errors raised by a [`NetworkLink`](crate::NetworkLink) backend.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The carrier did not come up within the bounded number of polls.
    #[error("Link {interface} not up after {attempts} attempts")]
    BringUpTimeout { interface: String, attempts: u32 },

    /// Station-mode association was refused or timed out.
    #[error("Association on {interface} failed: {message}")]
    Association { interface: String, message: String },

    /// An external network tool could not be run.
    #[error("Failed to run {program}: {source}")]
    Command {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl LinkError {
    pub fn bring_up_timeout(interface: impl Into<String>, attempts: u32) -> Self {
        Self::BringUpTimeout {
            interface: interface.into(),
            attempts,
        }
    }

    pub fn association(interface: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Association {
            interface: interface.into(),
            message: message.into(),
        }
    }
}

/// Errors raised inside a session connection task.
///
/// They never reach the orchestrator directly: the session turns them into
/// a `Closed` event and logs them.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Handshake timeout after {0}ms")]
    HandshakeTimeout(u64),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("No async runtime available")]
    NoRuntime,
}
