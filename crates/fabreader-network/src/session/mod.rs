//! Reconnecting, message-oriented session to the reader server.
//!
//! A session is a dumb transport: it connects when told, closes when told
//! and reports what happened through [`Session::poll`]. Reconnect cadence
//! belongs to the caller.
//!
//! Every method is synchronous and meant to be called from the reader's
//! main loop. `connect` only starts the handshake; whether it worked is
//! reported later as an [`SessionEvent::Opened`] or
//! [`SessionEvent::Closed`] event.

pub mod mock;
pub mod ws;

pub use mock::{MockSession, MockSessionHandle};
pub use ws::WsSession;

use fabreader_core::constants::{DEFAULT_SERVER_HOST, DEFAULT_SERVER_PATH, DEFAULT_SERVER_PORT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Server endpoint of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTarget {
    pub host: String,
    pub port: u16,
    /// Application path without a leading slash.
    pub path: String,
}

impl SessionTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: DEFAULT_SERVER_PATH.to_string(),
        }
    }

    /// `ws://host:port/path`
    pub fn url(&self) -> String {
        format!(
            "ws://{}:{}/{}",
            self.host,
            self.port,
            self.path.trim_start_matches('/')
        )
    }
}

impl Default for SessionTarget {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT)
    }
}

impl fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Something that happened on the session since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened,
    Closed,
    MessageReceived(String),
    Ping,
    Pong,
}

/// Connection bookkeeping owned by the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub connected: bool,
    pub last_connect_attempt_at: Option<Instant>,
}

/// Reconnecting message channel.
pub trait Session {
    /// Start connecting to `target`, dropping any current connection.
    ///
    /// Returns `false` only if the attempt could not even be started.
    /// `now` is recorded as the attempt time.
    fn connect(&mut self, target: &SessionTarget, now: Instant) -> bool;

    /// Queue a text frame. Fails (returns `false`) when not connected.
    fn send(&mut self, text: &str) -> bool;

    /// Close the current connection locally. No `Closed` event follows.
    fn close(&mut self);

    /// Drain the events received since the last poll, applying them to the
    /// session state.
    fn poll(&mut self) -> Vec<SessionEvent>;

    fn state(&self) -> SessionState;

    fn is_connected(&self) -> bool {
        self.state().connected
    }
}
