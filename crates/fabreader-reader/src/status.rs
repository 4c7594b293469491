//! Presence status reporting.

use fabreader_core::CardHandle;
use fabreader_network::Session;
use fabreader_protocol::Outbound;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Encode and send one frame. Returns `false` if nothing went out.
pub(crate) fn send_frame<X: Session>(session: &mut X, frame: &Outbound) -> bool {
    let text = match frame.encode() {
        Ok(text) => text,
        Err(e) => {
            error!(kind = frame.kind(), "Failed to encode frame: {}", e);
            return false;
        }
    };
    if !session.send(&text) {
        warn!(kind = frame.kind(), "Frame not sent, session closed");
        return false;
    }
    true
}

/// Sends `status` frames on presence edges and on a fixed interval.
#[derive(Debug)]
pub struct StatusReporter {
    interval: Duration,
    last_sent_at: Option<Instant>,
}

impl StatusReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent_at: None,
        }
    }

    /// Report `card` (or its absence) now.
    ///
    /// No-op while the session is closed.
    pub fn send_status<X: Session>(
        &mut self,
        session: &mut X,
        card: Option<&CardHandle>,
        now: Instant,
    ) -> bool {
        if !session.is_connected() {
            debug!("Skipping status, session not connected");
            return false;
        }

        let uid = card.map(CardHandle::id_text);
        let sent = send_frame(session, &Outbound::status(uid));
        if sent {
            debug!(uid = uid.unwrap_or("none"), "Status sent");
            self.last_sent_at = Some(now);
        }
        sent
    }

    /// Send a status if the interval has elapsed since the last one.
    pub fn send_if_due<X: Session>(
        &mut self,
        session: &mut X,
        card: Option<&CardHandle>,
        now: Instant,
    ) -> bool {
        let due = self
            .last_sent_at
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        due && self.send_status(session, card, now)
    }

    /// Restart the interval, e.g. for a new session.
    pub fn reset(&mut self) {
        self.last_sent_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabreader_core::CardUid;
    use fabreader_network::{MockSession, SessionTarget};
    use serde_json::json;

    fn open_session() -> (MockSession, fabreader_network::MockSessionHandle) {
        let (mut session, handle) = MockSession::new();
        session.connect(&SessionTarget::default(), Instant::now());
        session.poll();
        (session, handle)
    }

    #[test]
    fn test_status_frames() {
        let (mut session, handle) = open_session();
        let mut reporter = StatusReporter::new(Duration::from_secs(5));
        let now = Instant::now();
        let card = CardHandle::new(CardUid::from_hex("04ABCDEF").unwrap(), now);

        assert!(reporter.send_status(&mut session, Some(&card), now));
        assert!(reporter.send_status(&mut session, None, now));

        assert_eq!(
            handle.sent_of_type("status"),
            vec![
                json!({"type": "status", "payload": {"uid": "04ABCDEF"}}),
                json!({"type": "status", "payload": {"uid": null}}),
            ]
        );
    }

    #[test]
    fn test_no_status_while_disconnected() {
        let (mut session, handle) = MockSession::new();
        let mut reporter = StatusReporter::new(Duration::from_secs(5));

        assert!(!reporter.send_status(&mut session, None, Instant::now()));
        assert!(handle.sent().is_empty());
    }

    #[test]
    fn test_send_if_due_respects_interval() {
        let (mut session, handle) = open_session();
        let mut reporter = StatusReporter::new(Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(reporter.send_if_due(&mut session, None, t0));
        assert!(!reporter.send_if_due(&mut session, None, t0 + Duration::from_millis(4999)));
        assert!(reporter.send_if_due(&mut session, None, t0 + Duration::from_secs(5)));
        assert_eq!(handle.sent().len(), 2);

        reporter.reset();
        assert!(reporter.send_if_due(&mut session, None, t0 + Duration::from_secs(6)));
    }
}
