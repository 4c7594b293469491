//! Server command handling.
//!
//! [`CommandProcessor`] turns inbound frames into `command_result` frames:
//! it decodes the envelope, checks the uid against the tracked card and
//! dispatches to the [`Enroll`] or [`Authenticate`] handler. Every step a
//! handler takes is appended to a bounded [`CommandLog`] that travels back
//! with the result.

mod authenticate;
mod enroll;

pub use authenticate::Authenticate;
pub use enroll::{Enroll, KeyChangeAttempt};

use fabreader_core::{CardHandle, CommandLog};
use fabreader_hardware::SecureElement;
use fabreader_protocol::{CommandEnvelope, CommandKind, DecodeError, Outbound};
use std::time::Duration;
use tracing::{info, warn};

/// Result of running one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutcome {
    pub success: bool,
    pub message: String,
}

impl HandlerOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct CommandProcessor {
    log: CommandLog,
    auth_attempts: u32,
    auth_retry_delay: Duration,
}

impl CommandProcessor {
    pub fn new(auth_attempts: u32, auth_retry_delay: Duration) -> Self {
        Self {
            log: CommandLog::new(),
            auth_attempts,
            auth_retry_delay,
        }
    }

    /// Decode an inbound frame.
    ///
    /// # Errors
    /// See [`fabreader_protocol::decode`].
    pub fn decode(&self, text: &str) -> Result<CommandEnvelope, DecodeError> {
        fabreader_protocol::decode(text)
    }

    /// Error result for a frame that failed to decode, if it can be
    /// addressed to a card. Frames without a usable uid are only logged.
    pub fn reject(&self, error: &DecodeError) -> Option<Outbound> {
        match error.addressable_uid() {
            Some(uid) => {
                warn!(%uid, "Rejecting malformed command: {}", error);
                Some(Outbound::command_result(
                    uid,
                    false,
                    error.to_string(),
                    Vec::new(),
                ))
            }
            None => {
                warn!("Dropping inbound frame: {}", error);
                None
            }
        }
    }

    /// Run a command against the tracked card and build its result.
    ///
    /// The handler is only invoked when `card` is present and its id text
    /// equals the command's uid; otherwise no hardware call is made.
    pub async fn execute<S: SecureElement>(
        &mut self,
        envelope: &CommandEnvelope,
        card: Option<&CardHandle>,
        element: &mut S,
    ) -> Outbound {
        self.log.clear();

        let outcome = match card {
            None => HandlerOutcome::failure("No card present"),
            Some(card) if !card.matches(&envelope.uid) => {
                self.log
                    .push(format!("Tracked card is {}", card.id_text()));
                HandlerOutcome::failure("Card UID mismatch")
            }
            Some(_) => self.dispatch(envelope, element).await,
        };

        info!(
            command = %envelope.command,
            uid = %envelope.uid,
            success = outcome.success,
            "{}",
            outcome.message
        );

        Outbound::command_result(
            envelope.uid.clone(),
            outcome.success,
            outcome.message,
            self.log.drain(),
        )
    }

    async fn dispatch<S: SecureElement>(
        &mut self,
        envelope: &CommandEnvelope,
        element: &mut S,
    ) -> HandlerOutcome {
        match &envelope.command {
            CommandKind::Enroll => match envelope.enroll_keys() {
                Ok(keys) => Enroll::new(keys).execute(element, &mut self.log).await,
                Err(e) => {
                    self.log.push(e.to_string());
                    HandlerOutcome::failure(format!("Invalid enroll payload: {e}"))
                }
            },
            CommandKind::Authenticate => match envelope.authenticate_params() {
                Ok((slot, key)) => {
                    Authenticate::new(slot, key, self.auth_attempts, self.auth_retry_delay)
                        .execute(element, &mut self.log)
                        .await
                }
                Err(e) => {
                    self.log.push(e.to_string());
                    HandlerOutcome::failure(format!("Invalid authenticate payload: {e}"))
                }
            },
            CommandKind::Unknown(name) => {
                self.log.push(format!("Unknown command '{name}'"));
                HandlerOutcome::failure("Unknown command")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabreader_core::CardUid;
    use fabreader_hardware::mock::MockSecureElement;
    use fabreader_protocol::CommandResultPayload;
    use serde_json::json;
    use std::time::Instant;

    const UID: [u8; 4] = [0x04, 0xAB, 0xCD, 0xEF];

    fn processor() -> CommandProcessor {
        CommandProcessor::new(3, Duration::from_millis(100))
    }

    fn card() -> CardHandle {
        CardHandle::new(CardUid::new(&UID).unwrap(), Instant::now())
    }

    fn envelope(payload: serde_json::Value) -> CommandEnvelope {
        fabreader_protocol::decode(&json!({"type": "command", "payload": payload}).to_string())
            .unwrap()
    }

    fn result(frame: Outbound) -> CommandResultPayload {
        match frame {
            Outbound::CommandResult(payload) => payload,
            other => panic!("expected command_result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_card_rejected_without_hardware() {
        let (mut element, handle) = MockSecureElement::new();
        let env = envelope(json!({"command": "authenticate", "uid": "04ABCDEF", "keyNo": 1, "authKey": vec![0; 16]}));

        let payload = result(processor().execute(&env, None, &mut element).await);
        assert!(!payload.success);
        assert_eq!(payload.message, "No card present");
        assert_eq!(payload.uid, "04ABCDEF");
        assert_eq!(handle.stats().await.key_operations(), 0);
    }

    #[tokio::test]
    async fn test_uid_mismatch_rejected_without_hardware() {
        let (mut element, handle) = MockSecureElement::new();
        handle.present(&UID).await;
        let env = envelope(json!({"command": "authenticate", "uid": "04abcdef", "keyNo": 1, "authKey": vec![0; 16]}));

        let payload = result(processor().execute(&env, Some(&card()), &mut element).await);
        assert!(!payload.success);
        assert_eq!(payload.message, "Card UID mismatch");
        assert_eq!(payload.logs, vec!["Tracked card is 04ABCDEF".to_string()]);
        assert_eq!(handle.stats().await.key_operations(), 0);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (mut element, handle) = MockSecureElement::new();
        let env = envelope(json!({"command": "format", "uid": "04ABCDEF"}));

        let payload = result(processor().execute(&env, Some(&card()), &mut element).await);
        assert!(!payload.success);
        assert_eq!(payload.message, "Unknown command");
        assert_eq!(handle.stats().await.key_operations(), 0);
    }

    #[tokio::test]
    async fn test_bad_enroll_keys_skip_hardware() {
        let (mut element, handle) = MockSecureElement::new();
        handle.present(&UID).await;
        let env = envelope(json!({
            "command": "enroll",
            "uid": "04ABCDEF",
            "keys": {"defaultKey": vec![0; 16], "masterKey": vec![1; 15]}
        }));

        let payload = result(processor().execute(&env, Some(&card()), &mut element).await);
        assert!(!payload.success);
        assert!(payload.message.starts_with("Invalid enroll payload"));
        assert_eq!(handle.stats().await.key_operations(), 0);
    }

    #[tokio::test]
    async fn test_master_slot_authenticate_rejected() {
        let (mut element, handle) = MockSecureElement::new();
        handle.present(&UID).await;
        let env = envelope(json!({"command": "authenticate", "uid": "04ABCDEF", "keyNo": 0, "authKey": vec![0; 16]}));

        let payload = result(processor().execute(&env, Some(&card()), &mut element).await);
        assert!(!payload.success);
        assert_eq!(payload.message, "Invalid authenticate payload: Invalid key slot: 0");
        assert_eq!(handle.stats().await.key_operations(), 0);
    }

    #[tokio::test]
    async fn test_log_cleared_between_commands() {
        let (mut element, _handle) = MockSecureElement::new();
        let mut processor = processor();
        let env = envelope(json!({"command": "format", "uid": "04ABCDEF"}));

        processor.execute(&env, Some(&card()), &mut element).await;
        let payload = result(processor.execute(&env, Some(&card()), &mut element).await);
        assert_eq!(payload.logs, vec!["Unknown command 'format'".to_string()]);
    }

    #[test]
    fn test_reject_addressable_only() {
        let processor = processor();

        let err = processor
            .decode(r#"{"type":"command","payload":{"uid":"04ABCDEF"}}"#)
            .unwrap_err();
        let frame = processor.reject(&err).unwrap();
        let payload = result(frame);
        assert_eq!(payload.uid, "04ABCDEF");
        assert!(!payload.success);

        let err = processor.decode("not json").unwrap_err();
        assert!(processor.reject(&err).is_none());

        let err = processor.decode(r#"{"type":"hello"}"#).unwrap_err();
        assert!(processor.reject(&err).is_none());
    }
}
