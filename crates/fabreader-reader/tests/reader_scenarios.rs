//! End-to-end scenarios for the reader loop.
//!
//! Every test runs on paused tokio time against the mock secure element,
//! mock link and mock session. Time only moves when a test advances it or
//! when the reader sleeps.

use fabreader_hardware::mock::{FACTORY_KEY, MockSecureElement, MockSecureElementHandle};
use fabreader_core::Key;
use fabreader_network::{LinkHealth, MockLink, MockLinkHandle, MockSession, MockSessionHandle};
use fabreader_reader::{ReaderConfig, ReaderOrchestrator, ReaderState};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const UID: [u8; 4] = [0x04, 0xAB, 0xCD, 0xEF];
const UID_TEXT: &str = "04ABCDEF";

type Reader = ReaderOrchestrator<MockSecureElement, MockLink, MockSession>;

struct Harness {
    reader: Reader,
    element: MockSecureElementHandle,
    link: MockLinkHandle,
    session: MockSessionHandle,
    health: watch::Sender<bool>,
}

impl Harness {
    fn new() -> Self {
        let config = ReaderConfig {
            reachability_probe: false,
            ..ReaderConfig::default()
        };
        let (element, element_handle) = MockSecureElement::new();
        let (link, link_handle) = MockLink::new();
        let (session, session_handle) = MockSession::new();
        let (health, rx) = watch::channel(false);

        let reader = ReaderOrchestrator::new(
            config,
            element,
            link,
            LinkHealth::from_receiver(rx),
            session,
        )
        .unwrap();

        Self {
            reader,
            element: element_handle,
            link: link_handle,
            session: session_handle,
            health,
        }
    }

    fn set_health(&self, up: bool) {
        self.health.send_replace(up);
    }

    async fn step_until(&mut self, state: ReaderState, max_steps: usize) {
        for _ in 0..max_steps {
            if self.reader.state() == state {
                return;
            }
            self.reader.step().await;
        }
        assert_eq!(self.reader.state(), state, "not reached in {max_steps} steps");
    }

    /// Boot into `WaitingForCard` with an open session.
    async fn online() -> Self {
        let mut harness = Self::new();
        harness.set_health(true);
        harness.step_until(ReaderState::WaitingForCard, 10).await;
        harness
    }

    /// Online with the test card tracked.
    async fn with_card() -> Self {
        let mut harness = Self::online().await;
        harness.element.present(&UID).await;
        harness.reader.step().await;
        assert_eq!(harness.reader.state(), ReaderState::CardPresent);
        harness
    }

    fn statuses(&self) -> Vec<Value> {
        self.session
            .sent_of_type("status")
            .into_iter()
            .map(|frame| frame["payload"]["uid"].clone())
            .collect()
    }

    fn results(&self) -> Vec<Value> {
        self.session
            .sent_of_type("command_result")
            .into_iter()
            .map(|frame| frame["payload"].clone())
            .collect()
    }
}

fn key_bytes(byte: u8) -> Vec<u8> {
    vec![byte; 16]
}

fn enroll_frame(uid: &str) -> String {
    json!({
        "type": "command",
        "payload": {
            "command": "enroll",
            "uid": uid,
            "keys": {
                "defaultKey": key_bytes(0x00),
                "masterKey": key_bytes(0x11),
                "authKey": key_bytes(0xAA),
                "readKey": key_bytes(0xBB),
                "writeKey": key_bytes(0xCC),
                "changeKey": key_bytes(0xDD),
            }
        }
    })
    .to_string()
}

fn authenticate_frame(uid: &str, key_no: i64, key: u8) -> String {
    json!({
        "type": "command",
        "payload": {"command": "authenticate", "uid": uid, "keyNo": key_no, "authKey": key_bytes(key)}
    })
    .to_string()
}

#[tokio::test(start_paused = true)]
async fn test_startup_reaches_waiting_for_card() {
    let harness = Harness::online().await;

    assert_eq!(harness.reader.state(), ReaderState::WaitingForCard);
    assert_eq!(harness.statuses(), vec![Value::Null]);
    assert_eq!(harness.session.connect_attempts(), 1);
    assert_eq!(harness.link.bring_up_calls(), 1);

    let path: Vec<ReaderState> = harness
        .reader
        .state_machine()
        .history()
        .iter()
        .map(|transition| transition.to)
        .collect();
    assert_eq!(
        path,
        vec![
            ReaderState::HardwareInit,
            ReaderState::NetworkConnecting,
            ReaderState::SessionConnecting,
            ReaderState::WaitingForCard,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_link_bring_up_retries_with_backoff() {
    let mut harness = Harness::new();
    harness.link.refuse_bring_up(true);
    harness.step_until(ReaderState::NetworkConnecting, 5).await;

    let started = tokio::time::Instant::now();
    harness.reader.step().await;
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::NetworkConnecting);
    assert_eq!(harness.link.bring_up_calls(), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(10));

    harness.link.refuse_bring_up(false);
    harness.set_health(true);
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::SessionConnecting);
}

#[tokio::test(start_paused = true)]
async fn test_card_arrival_and_debounced_removal() {
    let mut harness = Harness::with_card().await;
    assert_eq!(harness.statuses(), vec![Value::Null, json!(UID_TEXT)]);
    assert_eq!(harness.reader.card().unwrap().id_text(), UID_TEXT);

    harness.element.remove().await;
    tokio::time::advance(Duration::from_millis(20)).await;
    harness.reader.step().await;
    tokio::time::advance(Duration::from_millis(999)).await;
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::CardPresent);

    tokio::time::advance(Duration::from_millis(1)).await;
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::WaitingForCard);
    assert!(harness.reader.card().is_none());
    assert_eq!(
        harness.statuses(),
        vec![Value::Null, json!(UID_TEXT), Value::Null]
    );
}

#[tokio::test(start_paused = true)]
async fn test_single_missed_detection_keeps_card() {
    let mut harness = Harness::with_card().await;
    harness.element.miss_next_detects(1).await;

    tokio::time::advance(Duration::from_millis(20)).await;
    harness.reader.step().await;
    tokio::time::advance(Duration::from_millis(990)).await;
    harness.reader.step().await;

    assert_eq!(harness.reader.state(), ReaderState::CardPresent);
    assert_eq!(harness.statuses().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_status_while_idle() {
    let mut harness = Harness::online().await;
    harness.session.clear_sent();

    tokio::time::advance(Duration::from_millis(4900)).await;
    harness.reader.step().await;
    assert!(harness.statuses().is_empty());

    tokio::time::advance(Duration::from_millis(100)).await;
    harness.reader.step().await;
    assert_eq!(harness.statuses(), vec![Value::Null]);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_status_while_card_present() {
    let mut harness = Harness::with_card().await;
    harness.session.clear_sent();

    tokio::time::advance(Duration::from_millis(4900)).await;
    harness.reader.step().await;
    assert!(harness.statuses().is_empty());

    tokio::time::advance(Duration::from_millis(100)).await;
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::CardPresent);
    assert_eq!(harness.statuses(), vec![json!(UID_TEXT)]);
}

#[tokio::test(start_paused = true)]
async fn test_card_swap_reports_new_uid() {
    const OTHER: [u8; 7] = [0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
    let mut harness = Harness::with_card().await;

    harness.element.present(&OTHER).await;
    harness.reader.step().await;
    assert_eq!(harness.reader.card().unwrap().id_text(), UID_TEXT);

    tokio::time::advance(Duration::from_millis(1000)).await;
    harness.reader.step().await;

    assert_eq!(harness.reader.state(), ReaderState::CardPresent);
    assert_eq!(harness.reader.card().unwrap().id_text(), "04112233445566");
    assert_eq!(
        harness.statuses(),
        vec![Value::Null, json!(UID_TEXT), json!("04112233445566")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_card_is_ignored() {
    let mut harness = Harness::online().await;
    harness.element.add_card(UID.to_vec(), false).await;
    harness.element.present(&UID).await;

    harness.reader.step().await;
    harness.reader.step().await;

    assert_eq!(harness.reader.state(), ReaderState::WaitingForCard);
    assert!(harness.reader.card().is_none());
    assert_eq!(
        harness.session.sent_of_type("log"),
        vec![json!({"type": "log", "payload": "[Reader] Unsupported card type 04ABCDEF"})]
    );
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_while_card_present() {
    let mut harness = Harness::with_card().await;
    let sent_before = harness.session.sent().len();

    harness.set_health(false);
    harness.reader.step().await;

    assert_eq!(harness.reader.state(), ReaderState::NetworkConnecting);
    assert!(harness.reader.card().is_none());
    assert!(!harness.session.is_connected());

    // Bring-up succeeds but the supervisor keeps reporting the link down.
    harness.session.deliver(authenticate_frame(UID_TEXT, 1, 0));
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::NetworkConnecting);
    assert_eq!(harness.session.sent().len(), sent_before);

    harness.set_health(true);
    harness.step_until(ReaderState::CardPresent, 10).await;
    assert_eq!(harness.session.connect_attempts(), 2);
    assert_eq!(harness.statuses().last(), Some(&json!(UID_TEXT)));
}

#[tokio::test(start_paused = true)]
async fn test_session_close_reconnects_immediately() {
    let mut harness = Harness::with_card().await;

    harness.session.drop_connection();
    harness.reader.step().await;

    assert_eq!(harness.reader.state(), ReaderState::SessionConnecting);
    assert!(harness.reader.card().is_none());
    assert_eq!(harness.session.connect_attempts(), 2);

    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::CardPresent);
}

#[tokio::test(start_paused = true)]
async fn test_session_attempts_are_rate_limited() {
    let mut harness = Harness::new();
    harness.session.set_auto_open(false);
    harness.set_health(true);
    harness.step_until(ReaderState::SessionConnecting, 5).await;

    harness.reader.step().await;
    assert_eq!(harness.session.connect_attempts(), 1);

    for _ in 0..4 {
        tokio::time::advance(Duration::from_secs(1)).await;
        harness.reader.step().await;
    }
    assert_eq!(harness.session.connect_attempts(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    harness.reader.step().await;
    assert_eq!(harness.session.connect_attempts(), 2);

    harness.session.open();
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::WaitingForCard);
}

#[tokio::test(start_paused = true)]
async fn test_link_maintained_once_per_interval() {
    let mut harness = Harness::online().await;
    let calls = harness.link.maintain_calls();

    for _ in 0..10 {
        tokio::time::advance(Duration::from_millis(20)).await;
        harness.reader.step().await;
    }
    assert_eq!(harness.link.maintain_calls(), calls);

    tokio::time::advance(Duration::from_millis(1000)).await;
    harness.reader.step().await;
    assert_eq!(harness.link.maintain_calls(), calls + 1);
}

#[tokio::test(start_paused = true)]
async fn test_enroll_blank_card() {
    let mut harness = Harness::with_card().await;

    harness.session.deliver(enroll_frame(UID_TEXT));
    harness.reader.step().await;

    let results = harness.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["uid"], UID_TEXT);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["message"], "Card enrolled");
    assert!(!results[0]["logs"].as_array().unwrap().is_empty());

    assert_eq!(harness.element.key(&UID, 0).await, Some(Key::from_array([0x11; 16])));
    assert_eq!(harness.element.key(&UID, 4).await, Some(Key::from_array([0xDD; 16])));
    assert_eq!(
        harness.session.sent_of_type("log"),
        vec![json!({"type": "log", "payload": "[Reader] Executing enroll for 04ABCDEF"})]
    );

    assert_eq!(harness.reader.state(), ReaderState::WaitingForCard);
    let last = harness.reader.state_machine().last_transitions(2);
    assert_eq!(last[0].to, ReaderState::ProcessingCommand);
    assert_eq!(last[1].to, ReaderState::WaitingForCard);
}

#[tokio::test(start_paused = true)]
async fn test_command_result_returns_to_waiting_for_card() {
    let mut harness = Harness::with_card().await;

    harness.session.deliver(authenticate_frame(UID_TEXT, 1, 0));
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::WaitingForCard);
    assert_eq!(harness.results().len(), 1);
    assert_eq!(harness.reader.card().unwrap().id_text(), UID_TEXT);

    // The card never left, so it is resumed without another status.
    tokio::time::advance(Duration::from_millis(20)).await;
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::CardPresent);
    assert_eq!(harness.statuses(), vec![Value::Null, json!(UID_TEXT)]);
}

#[tokio::test(start_paused = true)]
async fn test_card_removed_during_command_departs_after_timeout() {
    let mut harness = Harness::with_card().await;

    harness.session.deliver(authenticate_frame(UID_TEXT, 1, 0));
    harness.reader.step().await;
    harness.element.remove().await;

    tokio::time::advance(Duration::from_millis(20)).await;
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::CardPresent);

    tokio::time::advance(Duration::from_millis(1000)).await;
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::WaitingForCard);
    assert_eq!(
        harness.statuses(),
        vec![Value::Null, json!(UID_TEXT), Value::Null]
    );
}

#[tokio::test(start_paused = true)]
async fn test_enroll_again_is_partial_path() {
    let mut harness = Harness::with_card().await;
    harness.session.deliver(enroll_frame(UID_TEXT));
    harness.reader.step().await;
    harness.element.reset_stats().await;

    harness.session.deliver(enroll_frame(UID_TEXT));
    harness.reader.step().await;

    let results = harness.results();
    assert_eq!(results[1]["success"], true);
    let logs: Vec<&str> = results[1]["logs"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(logs.contains(&"Slot 0: already enrolled, keeping master key"));
    assert!(logs.contains(&"Slot 3 (writeKey): already set"));
    assert_eq!(harness.element.key(&UID, 0).await, Some(Key::from_array([0x11; 16])));
}

#[tokio::test(start_paused = true)]
async fn test_command_for_other_card_is_rejected() {
    let mut harness = Harness::with_card().await;

    harness.session.deliver(authenticate_frame("04ABCDEE", 1, 0));
    harness.reader.step().await;

    let results = harness.results();
    assert_eq!(results[0]["uid"], "04ABCDEE");
    assert_eq!(results[0]["success"], false);
    assert_eq!(results[0]["message"], "Card UID mismatch");
    assert_eq!(harness.element.stats().await.key_operations(), 0);
    assert_eq!(harness.reader.state(), ReaderState::WaitingForCard);
}

#[tokio::test(start_paused = true)]
async fn test_command_without_card_is_rejected() {
    let mut harness = Harness::online().await;

    harness.session.deliver(enroll_frame(UID_TEXT));
    harness.reader.step().await;

    let results = harness.results();
    assert_eq!(results[0]["message"], "No card present");
    assert_eq!(results[0]["success"], false);
    assert_eq!(harness.element.stats().await.key_operations(), 0);
    assert_eq!(harness.reader.state(), ReaderState::WaitingForCard);
}

#[tokio::test(start_paused = true)]
async fn test_authenticate_retries_then_fails() {
    let mut harness = Harness::with_card().await;
    let started = tokio::time::Instant::now();

    harness.session.deliver(authenticate_frame(UID_TEXT, 2, 0x42));
    harness.reader.step().await;

    let results = harness.results();
    assert_eq!(results[0]["success"], false);
    assert_eq!(
        results[0]["message"],
        "Authentication failed on key slot 2 after 3 attempts"
    );
    assert_eq!(harness.element.stats().await.authentications, 3);
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_authenticate_factory_key() {
    let mut harness = Harness::with_card().await;
    assert_eq!(FACTORY_KEY, Key::from_array([0; 16]));

    harness.session.deliver(authenticate_frame(UID_TEXT, 1, 0));
    harness.reader.step().await;

    let results = harness.results();
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["message"], "Authenticated key slot 1 on attempt 1");
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames() {
    let mut harness = Harness::with_card().await;

    harness.session.deliver("not json");
    harness.session.deliver(r#"{"type":"hello"}"#);
    harness.session.deliver(r#"{"type":"command","payload":{"uid":"04ABCDEF"}}"#);
    harness.reader.step().await;

    let results = harness.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["uid"], UID_TEXT);
    assert_eq!(results[0]["success"], false);
    assert_eq!(harness.reader.state(), ReaderState::CardPresent);
}

#[tokio::test(start_paused = true)]
async fn test_hardware_fault_cycles_through_recovery() {
    let mut harness = Harness::with_card().await;

    harness.element.set_responding(false).await;
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::ErrorRecovery);
    assert!(harness.reader.card().is_none());

    let started = tokio::time::Instant::now();
    harness.reader.step().await;
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(harness.reader.state(), ReaderState::HardwareInit);
    assert_eq!(harness.link.tear_down_calls(), 1);
    assert!(!harness.session.is_connected());

    // Still dead: straight back into recovery.
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::ErrorRecovery);

    harness.element.set_responding(true).await;
    harness.step_until(ReaderState::CardPresent, 10).await;
}

#[tokio::test(start_paused = true)]
async fn test_recovery_reconnects_closed_session() {
    let mut harness = Harness::online().await;

    harness.element.set_responding(false).await;
    harness.reader.step().await;
    assert_eq!(harness.reader.state(), ReaderState::ErrorRecovery);

    harness.element.set_responding(true).await;
    harness.session.drop_connection();
    harness.reader.step().await;

    assert_eq!(harness.reader.state(), ReaderState::SessionConnecting);
    assert_eq!(harness.link.tear_down_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_without_fault_restarts_hardware() {
    let mut harness = Harness::online().await;

    harness.element.set_responding(false).await;
    harness.reader.step().await;
    harness.element.set_responding(true).await;
    harness.reader.step().await;

    assert_eq!(harness.reader.state(), ReaderState::HardwareInit);
    harness.step_until(ReaderState::WaitingForCard, 10).await;
    assert_eq!(harness.session.connect_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown() {
    let mut harness = Harness::new();
    harness.set_health(true);

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    harness.reader.run(shutdown).await;

    assert_eq!(harness.reader.state(), ReaderState::WaitingForCard);
    assert!(!harness.session.is_connected());
    assert_eq!(harness.link.tear_down_calls(), 1);
}
