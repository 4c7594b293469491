//! Reader state machine.
//!
//! Tracks which phase of the reader lifecycle is active and enforces the
//! legal transitions between them.
//!
//! # States
//!
//! - `Init`: transient start state, always advances to `HardwareInit`
//! - `HardwareInit`: probing the secure element
//! - `NetworkConnecting`: bringing up the network link
//! - `SessionConnecting`: (re)opening the server session
//! - `WaitingForCard`: session open, field empty
//! - `CardPresent`: a supported card is tracked
//! - `ProcessingCommand`: a server command is being executed
//! - `ErrorRecovery`: diagnosing a fault, reachable from any state
//!
//! # Valid Transitions
//!
//! - Init → HardwareInit → NetworkConnecting → SessionConnecting → WaitingForCard
//! - WaitingForCard ⇄ CardPresent, both → ProcessingCommand
//! - ProcessingCommand → WaitingForCard, whether or not a card is still in
//!   the field
//! - any state past NetworkConnecting → NetworkConnecting (link lost)
//! - WaitingForCard / CardPresent / ProcessingCommand → SessionConnecting
//!   (session closed)
//! - ErrorRecovery → HardwareInit / NetworkConnecting / SessionConnecting
//! - any → ErrorRecovery
//!
//! # Examples
//!
//! ```
//! use fabreader_reader::{ReaderState, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! machine.transition_to(ReaderState::HardwareInit).unwrap();
//! assert!(machine.transition_to(ReaderState::CardPresent).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use fabreader_core::{Error, Result};

/// Maximum number of state transitions kept for diagnostics.
const MAX_HISTORY_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderState {
    Init,
    HardwareInit,
    NetworkConnecting,
    SessionConnecting,
    WaitingForCard,
    CardPresent,
    ProcessingCommand,
    ErrorRecovery,
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            ReaderState::Init => "Init",
            ReaderState::HardwareInit => "HardwareInit",
            ReaderState::NetworkConnecting => "NetworkConnecting",
            ReaderState::SessionConnecting => "SessionConnecting",
            ReaderState::WaitingForCard => "WaitingForCard",
            ReaderState::CardPresent => "CardPresent",
            ReaderState::ProcessingCommand => "ProcessingCommand",
            ReaderState::ErrorRecovery => "ErrorRecovery",
        };
        write!(f, "{}", state_str)
    }
}

impl ReaderState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use fabreader_reader::ReaderState;
    ///
    /// assert!(ReaderState::Init.can_transition_to(&ReaderState::HardwareInit));
    /// assert!(ReaderState::CardPresent.can_transition_to(&ReaderState::NetworkConnecting));
    /// assert!(!ReaderState::HardwareInit.can_transition_to(&ReaderState::WaitingForCard));
    /// ```
    pub fn can_transition_to(&self, target: &ReaderState) -> bool {
        use ReaderState::*;

        matches!(
            (self, target),
            // Any state may fail into recovery
            (_, ErrorRecovery)
            | (Init, HardwareInit)
            | (HardwareInit, NetworkConnecting)
            | (NetworkConnecting, SessionConnecting)
            | (SessionConnecting, WaitingForCard)
            | (WaitingForCard, CardPresent | ProcessingCommand)
            | (CardPresent, WaitingForCard | ProcessingCommand)
            | (ProcessingCommand, WaitingForCard)
            // Link lost
            | (SessionConnecting | WaitingForCard | CardPresent | ProcessingCommand, NetworkConnecting)
            // Session closed
            | (WaitingForCard | CardPresent | ProcessingCommand, SessionConnecting)
            // Recovery outcomes
            | (ErrorRecovery, HardwareInit | NetworkConnecting | SessionConnecting)
        )
    }

    /// `true` for states that require an up link.
    pub fn requires_link(&self) -> bool {
        matches!(
            self,
            ReaderState::SessionConnecting
                | ReaderState::WaitingForCard
                | ReaderState::CardPresent
                | ReaderState::ProcessingCommand
        )
    }

}

/// A single recorded state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ReaderState,
    pub to: ReaderState,

    /// Not serialized; set to the deserialization time on the way back.
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: ReaderState, to: ReaderState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }
}

/// State machine with a bounded transition history.
///
/// Not thread-safe; owned by the orchestrator on the main loop.
#[derive(Debug)]
pub struct StateMachine {
    current_state: ReaderState,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a new state machine in the `Init` state.
    pub fn new() -> Self {
        Self {
            current_state: ReaderState::Init,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> ReaderState {
        self.current_state
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Get the last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .cloned()
            .collect()
    }

    /// Transition to a new state, validating the transition.
    ///
    /// A transition to the current state is a no-op and records nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the transition is not
    /// legal from the current state; the state is left unchanged.
    pub fn transition_to(&mut self, new_state: ReaderState) -> Result<Option<StateTransition>> {
        if new_state == self.current_state {
            return Ok(None);
        }

        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        self.perform_state_change(new_state, transition.clone());
        Ok(Some(transition))
    }

    fn perform_state_change(&mut self, new_state: ReaderState, transition: StateTransition) {
        self.current_state = new_state;

        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
