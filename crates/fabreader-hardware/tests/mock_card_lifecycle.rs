//! Integration tests driving the mock secure element through the
//! `AnySecureElement` wrapper the reader uses.

use fabreader_core::{Key, KeySlot};
use fabreader_hardware::mock::{FACTORY_KEY, MockSecureElement};
use fabreader_hardware::{AnySecureElement, AuthCommand, HardwareError, SecureElement};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(50);

#[tokio::test]
async fn test_provision_master_then_reauthenticate() {
    let (element, handle) = MockSecureElement::new();
    let mut se = AnySecureElement::from(element);
    let uid = vec![0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
    let master = Key::from_array([0x11; 16]);

    handle.present(&uid).await;
    assert_eq!(se.detect_target(TIMEOUT).await.unwrap(), Some(uid.clone()));

    se.authenticate(&FACTORY_KEY, KeySlot::MASTER, AuthCommand::Aes)
        .await
        .unwrap();
    se.change_key(&FACTORY_KEY, &master, KeySlot::MASTER)
        .await
        .unwrap();

    let err = se
        .authenticate(&FACTORY_KEY, KeySlot::MASTER, AuthCommand::Aes)
        .await
        .unwrap_err();
    assert!(matches!(err, HardwareError::AuthenticationFailed { slot: 0 }));
    se.authenticate(&master, KeySlot::MASTER, AuthCommand::Aes)
        .await
        .unwrap();

    assert_eq!(handle.key(&uid, 0).await, Some(master));
}

#[tokio::test]
async fn test_card_swap_selects_new_target() {
    let (element, handle) = MockSecureElement::new();
    let mut se = AnySecureElement::from(element);

    handle.present(&[1, 2, 3, 4]).await;
    assert_eq!(se.detect_target(TIMEOUT).await.unwrap(), Some(vec![1, 2, 3, 4]));

    handle.add_card(vec![5, 6, 7, 8], false).await;
    handle.present(&[5, 6, 7, 8]).await;

    // Still selected on the old card until the next detection.
    assert!(matches!(
        se.is_supported_type().await,
        Err(HardwareError::NoTarget { .. })
    ));

    assert_eq!(se.detect_target(TIMEOUT).await.unwrap(), Some(vec![5, 6, 7, 8]));
    assert!(!se.is_supported_type().await.unwrap());
}

#[tokio::test]
async fn test_handle_clones_share_state() {
    let (mut element, handle) = MockSecureElement::new();
    let console = handle.clone();

    console.present(&[9, 9, 9, 9]).await;
    assert_eq!(handle.card_in_field().await, Some(vec![9, 9, 9, 9]));

    console.set_responding(false).await;
    assert!(element.probe_firmware().await.is_err());
}
