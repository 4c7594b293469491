//! Top-level reader loop.
//!
//! [`ReaderOrchestrator`] owns every piece of reader state and is driven
//! one [`step`](ReaderOrchestrator::step) at a time from a single task.
//! Each step first applies the link health rule, then drains the session's
//! events, then runs the work of the current state.
//!
//! The only state shared with another task is the link health flag, which
//! the orchestrator reads through a [`LinkHealth`].

use crate::command::CommandProcessor;
use crate::config::ReaderConfig;
use crate::presence::{CardPresenceTracker, PresenceChange};
use crate::state_machine::{ReaderState, StateMachine};
use crate::status::{StatusReporter, send_frame};
use fabreader_core::constants::READER_LOG_PREFIX;
use fabreader_core::{CardHandle, Result};
use fabreader_hardware::SecureElement;
use fabreader_network::{LinkHealth, NetworkLink, Session, SessionEvent, probe_reachability};
use fabreader_protocol::Outbound;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Current time as a std `Instant`, following tokio's clock so paused-time
/// tests see consistent timestamps.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

pub struct ReaderOrchestrator<S, L, X> {
    config: ReaderConfig,
    machine: StateMachine,
    element: S,
    link: L,
    health: LinkHealth,
    session: X,
    presence: CardPresenceTracker,
    status: StatusReporter,
    commands: CommandProcessor,
    /// Skip the reconnect interval on the next session attempt.
    reconnect_now: bool,
    /// Send a status on the next `WaitingForCard` step of this session.
    initial_status_pending: bool,
    last_maintain_at: Option<Instant>,
}

impl<S, L, X> ReaderOrchestrator<S, L, X>
where
    S: SecureElement,
    L: NetworkLink,
    X: Session,
{
    /// Assemble a reader in the `Init` state.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `config` fails validation.
    pub fn new(config: ReaderConfig, element: S, link: L, health: LinkHealth, session: X) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            presence: CardPresenceTracker::new(config.removal_timeout, config.detect_timeout),
            status: StatusReporter::new(config.status_interval),
            commands: CommandProcessor::new(config.auth_attempts, config.auth_retry_delay),
            config,
            machine: StateMachine::new(),
            element,
            link,
            health,
            session,
            reconnect_now: false,
            initial_status_pending: false,
            last_maintain_at: None,
        })
    }

    pub fn state(&self) -> ReaderState {
        self.machine.current_state()
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.machine
    }

    /// The tracked card, if any.
    pub fn card(&self) -> Option<&CardHandle> {
        self.presence.card()
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn session(&self) -> &X {
        &self.session
    }

    /// Step until `shutdown` fires, then close the session and release the
    /// link.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(server = %self.config.target, "Reader started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.step() => {}
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.loop_tick) => {}
            }
        }

        self.session.close();
        self.link.tear_down().await;
        info!(state = %self.state(), "Reader stopped");
    }

    /// Run one loop iteration.
    pub async fn step(&mut self) {
        self.enforce_link_health();

        for event in self.session.poll() {
            self.handle_session_event(event).await;
        }

        match self.state() {
            ReaderState::Init => self.transition(ReaderState::HardwareInit),
            ReaderState::HardwareInit => self.init_hardware().await,
            ReaderState::NetworkConnecting => self.connect_network().await,
            ReaderState::SessionConnecting => self.connect_session().await,
            ReaderState::WaitingForCard | ReaderState::CardPresent => self.track_card().await,
            // Commands run to completion while their frame is handled.
            ReaderState::ProcessingCommand => {}
            ReaderState::ErrorRecovery => self.recover().await,
        }
    }

    fn transition(&mut self, to: ReaderState) {
        match self.machine.transition_to(to) {
            Ok(Some(transition)) => {
                info!(from = %transition.from, to = %transition.to, "State transition");
            }
            Ok(None) => {}
            Err(e) => {
                error!("{}", e);
                self.enter_error_recovery();
            }
        }
    }

    fn enter_error_recovery(&mut self) {
        let from = self.state();
        self.presence.clear();
        if let Ok(Some(_)) = self.machine.transition_to(ReaderState::ErrorRecovery) {
            warn!(%from, "Entering error recovery");
        }
    }

    /// A lost link outranks whatever the current state is doing.
    fn enforce_link_health(&mut self) {
        let state = self.state();
        if !state.requires_link() || self.health.is_up() {
            return;
        }

        warn!(%state, "Network link down");
        if let Some(card) = self.presence.clear() {
            info!(uid = %card.uid(), "Dropping tracked card");
        }
        self.session.close();
        self.transition(ReaderState::NetworkConnecting);
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        let state = self.state();
        match event {
            SessionEvent::Opened if state == ReaderState::SessionConnecting => {
                info!(server = %self.config.target, "Session established");
                self.status.reset();
                self.initial_status_pending = true;
                self.transition(ReaderState::WaitingForCard);
            }
            SessionEvent::Opened => debug!(%state, "Ignoring session open"),
            SessionEvent::Closed => match state {
                ReaderState::WaitingForCard
                | ReaderState::CardPresent
                | ReaderState::ProcessingCommand => {
                    warn!(%state, "Session closed");
                    self.presence.clear();
                    self.reconnect_now = true;
                    self.transition(ReaderState::SessionConnecting);
                }
                ReaderState::SessionConnecting => debug!("Session attempt failed"),
                _ => debug!(%state, "Ignoring session close"),
            },
            SessionEvent::MessageReceived(text) => self.handle_message(&text).await,
            SessionEvent::Ping => trace!("Ping"),
            SessionEvent::Pong => trace!("Pong"),
        }
    }

    async fn handle_message(&mut self, text: &str) {
        let state = self.state();
        if !matches!(state, ReaderState::WaitingForCard | ReaderState::CardPresent) {
            warn!(%state, "Ignoring inbound frame");
            return;
        }

        let envelope = match self.commands.decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                if let Some(frame) = self.commands.reject(&e) {
                    send_frame(&mut self.session, &frame);
                }
                return;
            }
        };

        self.transition(ReaderState::ProcessingCommand);
        self.send_log(&format!(
            "Executing {} for {}",
            envelope.command, envelope.uid
        ));

        let result = self
            .commands
            .execute(&envelope, self.presence.card(), &mut self.element)
            .await;
        send_frame(&mut self.session, &result);

        // A card still in the field is picked up again by the next presence
        // poll.
        self.transition(ReaderState::WaitingForCard);
    }

    async fn init_hardware(&mut self) {
        match self.element.probe_firmware().await {
            Ok(firmware) => {
                info!(%firmware, "Secure element ready");
                self.transition(ReaderState::NetworkConnecting);
            }
            Err(e) => {
                error!("Secure element probe failed: {}", e);
                self.enter_error_recovery();
            }
        }
    }

    async fn connect_network(&mut self) {
        let retry = self.config.network_retry_delay;

        if let Err(e) = self.link.bring_up().await {
            warn!(retry_ms = retry.as_millis() as u64, "Link bring-up failed: {}", e);
            tokio::time::sleep(retry).await;
            return;
        }

        // The supervisor must agree before the health rule would let the
        // next state stand.
        if !self.health.wait_until_up(self.config.link_health_poll * 2).await {
            warn!(retry_ms = retry.as_millis() as u64, "Link up but not yet confirmed by supervisor");
            tokio::time::sleep(retry).await;
            return;
        }

        match self.link.current_address() {
            Some(address) => info!(%address, "Network connected"),
            None => info!("Network connected"),
        }

        if self.config.reachability_probe {
            let target = &self.config.target;
            probe_reachability(&target.host, target.port, self.config.reachability_timeout).await;
        }

        self.reconnect_now = true;
        self.transition(ReaderState::SessionConnecting);
    }

    async fn connect_session(&mut self) {
        self.maintain_link().await;

        let now = now();
        let interval = self.config.session_reconnect_interval;
        let due = self.reconnect_now
            || self
                .session
                .state()
                .last_connect_attempt_at
                .is_none_or(|at| now.saturating_duration_since(at) >= interval);
        if !due {
            return;
        }

        self.reconnect_now = false;
        if !self.session.connect(&self.config.target, now) {
            warn!(server = %self.config.target, "Session attempt could not be started");
        }
    }

    async fn track_card(&mut self) {
        self.maintain_link().await;
        let now = now();

        if self.initial_status_pending {
            self.initial_status_pending = false;
            self.status
                .send_status(&mut self.session, self.presence.card(), now);
        }

        let change = match self.presence.poll(&mut self.element, now).await {
            Ok(change) => change,
            Err(e) => {
                error!("Card detection failed: {}", e);
                self.enter_error_recovery();
                return;
            }
        };

        match change {
            PresenceChange::Unchanged => {}
            PresenceChange::Arrived(card) => {
                info!(uid = %card.uid(), "Card detected");
                self.status.send_status(&mut self.session, Some(&card), now);
                self.transition(ReaderState::CardPresent);
            }
            PresenceChange::Departed(card) => {
                info!(uid = %card.uid(), "Card removed");
                self.status.send_status(&mut self.session, None, now);
                self.transition(ReaderState::WaitingForCard);
            }
            PresenceChange::Replaced { previous, current } => {
                info!(previous = %previous.uid(), uid = %current.uid(), "Card replaced");
                self.status
                    .send_status(&mut self.session, Some(&current), now);
                self.transition(ReaderState::CardPresent);
            }
            PresenceChange::Unsupported(uid) => {
                info!(%uid, "Unsupported card type");
                self.send_log(&format!("Unsupported card type {uid}"));
            }
        }

        // Still tracked after a command: resume without a new status.
        if self.state() == ReaderState::WaitingForCard && self.presence.card().is_some() {
            debug!("Resuming tracked card");
            self.transition(ReaderState::CardPresent);
        }

        self.status
            .send_if_due(&mut self.session, self.presence.card(), now);
    }

    /// Diagnose after a settle delay and restart from the first stage that
    /// is not healthy.
    async fn recover(&mut self) {
        let settle = self.config.recovery_settle;
        info!(settle_ms = settle.as_millis() as u64, "Recovering");
        tokio::time::sleep(settle).await;

        let next = if let Err(e) = self.element.probe_firmware().await {
            warn!("Secure element still not responding: {}", e);
            self.session.close();
            self.link.tear_down().await;
            ReaderState::HardwareInit
        } else if !self.link.is_up() {
            self.session.close();
            ReaderState::NetworkConnecting
        } else if !self.session.is_connected() {
            self.reconnect_now = true;
            ReaderState::SessionConnecting
        } else {
            warn!("No fault found, restarting from hardware init");
            ReaderState::HardwareInit
        };
        self.transition(next);
    }

    async fn maintain_link(&mut self) {
        let now = now();
        let interval = self.config.link_maintain_interval;
        if self
            .last_maintain_at
            .is_some_and(|at| now.saturating_duration_since(at) < interval)
        {
            return;
        }
        self.last_maintain_at = Some(now);
        self.link.maintain().await;
    }

    fn send_log(&mut self, line: &str) {
        let frame = Outbound::log(format!("{READER_LOG_PREFIX} {line}"));
        send_frame(&mut self.session, &frame);
    }
}
