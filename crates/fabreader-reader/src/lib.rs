//! FabReader reader logic.
//!
//! Composes the secure element, the network link and the server session
//! into the reader's main loop:
//!
//! - [`StateMachine`] / [`ReaderState`]: lifecycle states and legal
//!   transitions
//! - [`CardPresenceTracker`]: debounced card presence
//! - [`StatusReporter`]: `status` frames on edges and on an interval
//! - [`CommandProcessor`]: `enroll` and `authenticate` commands
//! - [`ReaderOrchestrator`]: the loop tying it together
//!
//! # Example
//!
//! ```no_run
//! use fabreader_hardware::mock::MockSecureElement;
//! use fabreader_network::{LinkSupervisor, MockLink, WsSession};
//! use fabreader_reader::{ReaderConfig, ReaderOrchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> fabreader_core::Result<()> {
//! let config = ReaderConfig::default();
//! let (element, _card) = MockSecureElement::new();
//! let (link, _link) = MockLink::new();
//! let supervisor = LinkSupervisor::spawn(link.clone(), config.link_health_poll);
//!
//! let mut reader =
//!     ReaderOrchestrator::new(config, element, link, supervisor.health(), WsSession::new())?;
//! reader.run(CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
mod orchestrator;
pub mod presence;
pub mod state_machine;
mod status;

pub use command::{CommandProcessor, HandlerOutcome};
pub use config::ReaderConfig;
pub use orchestrator::ReaderOrchestrator;
pub use presence::{CardPresenceTracker, PresenceChange, Sample};
pub use state_machine::{ReaderState, StateMachine, StateTransition};
pub use status::StatusReporter;
