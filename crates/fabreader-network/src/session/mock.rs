//! In-memory session for tests and offline runs.

use super::{Session, SessionEvent, SessionState, SessionTarget};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Debug, Default)]
struct Shared {
    pending: VecDeque<SessionEvent>,
    sent: Vec<String>,
    connect_attempts: u32,
    last_target: Option<SessionTarget>,
    auto_open: bool,
    connected: bool,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session whose server side is played by a [`MockSessionHandle`].
///
/// By default every `connect` is answered with an `Opened` event on the
/// next poll.
#[derive(Debug)]
pub struct MockSession {
    state: SessionState,
    shared: Arc<Mutex<Shared>>,
}

impl MockSession {
    pub fn new() -> (Self, MockSessionHandle) {
        let shared = Arc::new(Mutex::new(Shared {
            auto_open: true,
            ..Shared::default()
        }));
        (
            Self {
                state: SessionState::default(),
                shared: Arc::clone(&shared),
            },
            MockSessionHandle { shared },
        )
    }
}

impl Session for MockSession {
    fn connect(&mut self, target: &SessionTarget, now: Instant) -> bool {
        self.close();
        self.state.last_connect_attempt_at = Some(now);

        let mut shared = lock(&self.shared);
        shared.connect_attempts += 1;
        shared.last_target = Some(target.clone());
        if shared.auto_open {
            shared.pending.push_back(SessionEvent::Opened);
        }
        true
    }

    fn send(&mut self, text: &str) -> bool {
        if !self.state.connected {
            return false;
        }
        lock(&self.shared).sent.push(text.to_string());
        true
    }

    fn close(&mut self) {
        self.state.connected = false;
        let mut shared = lock(&self.shared);
        shared.connected = false;
        // Whatever was in flight belonged to the old connection.
        shared.pending.clear();
    }

    fn poll(&mut self) -> Vec<SessionEvent> {
        let mut shared = lock(&self.shared);
        let events: Vec<SessionEvent> = shared.pending.drain(..).collect();
        for event in &events {
            match event {
                SessionEvent::Opened => self.state.connected = true,
                SessionEvent::Closed => self.state.connected = false,
                _ => {}
            }
        }
        shared.connected = self.state.connected;
        events
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

/// Server side of a [`MockSession`]. Clones share state.
#[derive(Debug, Clone)]
pub struct MockSessionHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MockSessionHandle {
    /// Answer future connects with `Opened` (default) or leave them hanging.
    pub fn set_auto_open(&self, auto_open: bool) {
        lock(&self.shared).auto_open = auto_open;
    }

    pub fn open(&self) {
        lock(&self.shared).pending.push_back(SessionEvent::Opened);
    }

    /// Simulate the server dropping the connection.
    pub fn drop_connection(&self) {
        lock(&self.shared).pending.push_back(SessionEvent::Closed);
    }

    /// Deliver a text frame from the server.
    pub fn deliver(&self, text: impl Into<String>) {
        lock(&self.shared)
            .pending
            .push_back(SessionEvent::MessageReceived(text.into()));
    }

    pub fn ping(&self) {
        lock(&self.shared).pending.push_back(SessionEvent::Ping);
    }

    /// Connection state as of the session's last poll or close.
    pub fn is_connected(&self) -> bool {
        lock(&self.shared).connected
    }

    pub fn connect_attempts(&self) -> u32 {
        lock(&self.shared).connect_attempts
    }

    pub fn last_target(&self) -> Option<SessionTarget> {
        lock(&self.shared).last_target.clone()
    }

    /// Frames sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.shared).sent.clone()
    }

    /// Sent frames parsed as JSON; unparseable frames are skipped.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Sent frames of the given `type`, parsed as JSON.
    pub fn sent_of_type(&self, kind: &str) -> Vec<Value> {
        self.sent_json()
            .into_iter()
            .filter(|frame| frame["type"] == kind)
            .collect()
    }

    pub fn clear_sent(&self) {
        lock(&self.shared).sent.clear();
    }
}
