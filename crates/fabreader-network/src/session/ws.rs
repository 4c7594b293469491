//! WebSocket session over `tokio-tungstenite`.
//!
//! Each `connect` spawns one connection task tagged with a generation
//! number. The task owns the socket and talks to the session through two
//! unbounded channels: outbound frames in, tagged events out. Events from a
//! generation other than the current one are dropped in `poll`, so a
//! connection that was replaced or closed can never flip the state.

use super::{Session, SessionEvent, SessionState, SessionTarget};
use crate::error::SessionError;
use fabreader_core::constants::SESSION_HANDSHAKE_TIMEOUT_MS;
use futures::{SinkExt, StreamExt};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, trace, warn};

type TaggedEvent = (u64, SessionEvent);

#[derive(Debug)]
pub struct WsSession {
    state: SessionState,
    generation: u64,
    handshake_timeout: Duration,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    outbound: Option<mpsc::UnboundedSender<WsMessage>>,
}

impl WsSession {
    pub fn new() -> Self {
        Self::with_handshake_timeout(Duration::from_millis(SESSION_HANDSHAKE_TIMEOUT_MS))
    }

    pub fn with_handshake_timeout(handshake_timeout: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: SessionState::default(),
            generation: 0,
            handshake_timeout,
            events_tx,
            events_rx,
            outbound: None,
        }
    }
}

impl Default for WsSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for WsSession {
    fn connect(&mut self, target: &SessionTarget, now: Instant) -> bool {
        self.close();
        self.state.last_connect_attempt_at = Some(now);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("{}", SessionError::NoRuntime);
                return false;
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound = Some(outbound_tx);

        let url = target.url();
        info!(%url, generation = self.generation, "Connecting session");
        runtime.spawn(connection_task(
            url,
            self.generation,
            self.handshake_timeout,
            self.events_tx.clone(),
            outbound_rx,
        ));
        true
    }

    fn send(&mut self, text: &str) -> bool {
        if !self.state.connected {
            warn!("Dropping frame, session not connected");
            return false;
        }
        match &self.outbound {
            Some(outbound) => outbound.send(WsMessage::Text(text.to_string())).is_ok(),
            None => false,
        }
    }

    fn close(&mut self) {
        // Dropping the sender makes the task send a close frame and exit.
        if self.outbound.take().is_some() {
            debug!(generation = self.generation, "Closing session");
        }
        self.generation += 1;
        self.state.connected = false;
    }

    fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok((generation, event)) = self.events_rx.try_recv() {
            if generation != self.generation {
                trace!(generation, current = self.generation, ?event, "Dropping stale event");
                continue;
            }
            match event {
                SessionEvent::Opened => self.state.connected = true,
                SessionEvent::Closed => {
                    self.state.connected = false;
                    self.outbound = None;
                }
                _ => {}
            }
            events.push(event);
        }
        events
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

async fn connection_task(
    url: String,
    generation: u64,
    handshake_timeout: Duration,
    events: mpsc::UnboundedSender<TaggedEvent>,
    mut outbound: mpsc::UnboundedReceiver<WsMessage>,
) {
    let emit = |event: SessionEvent| {
        // The session was dropped; nobody is listening anymore.
        let _ = events.send((generation, event));
    };

    let handshake = tokio::time::timeout(handshake_timeout, connect_async(url.as_str())).await;
    let stream = match handshake {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            warn!(%url, "Session connect failed: {}", SessionError::from(e));
            emit(SessionEvent::Closed);
            return;
        }
        Err(_) => {
            let err = SessionError::HandshakeTimeout(handshake_timeout.as_millis() as u64);
            warn!(%url, "Session connect failed: {}", err);
            emit(SessionEvent::Closed);
            return;
        }
    };

    info!(%url, "Session open");
    emit(SessionEvent::Opened);

    let (mut sink, mut stream) = stream.split();
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        warn!("Session send failed: {}", e);
                        emit(SessionEvent::Closed);
                        return;
                    }
                }
                None => {
                    // Closed locally: no event, the session already moved on.
                    let _ = sink.send(WsMessage::Close(None)).await;
                    debug!(%url, "Session task finished after local close");
                    return;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => emit(SessionEvent::MessageReceived(text)),
                Some(Ok(WsMessage::Ping(_))) => emit(SessionEvent::Ping),
                Some(Ok(WsMessage::Pong(_))) => emit(SessionEvent::Pong),
                Some(Ok(WsMessage::Binary(data))) => {
                    debug!(len = data.len(), "Ignoring binary frame");
                }
                Some(Ok(WsMessage::Frame(_))) => {}
                Some(Ok(WsMessage::Close(frame))) => {
                    info!(%url, ?frame, "Session closed by server");
                    emit(SessionEvent::Closed);
                    return;
                }
                Some(Err(e)) => {
                    warn!(%url, "Session error: {}", e);
                    emit(SessionEvent::Closed);
                    return;
                }
                None => {
                    info!(%url, "Session stream ended");
                    emit(SessionEvent::Closed);
                    return;
                }
            },
        }
    }
}
