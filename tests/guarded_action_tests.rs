//! Guarded action workflow tests
//!
//! Runs complete sessions against the in-memory backend and the demo fixture:
//! - Deliver, cancel, pause and stop from send through commit
//! - Rejected codes, cooldown ticking and attempt limits
//! - Closing a session mid-flight and reopening it

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

use gold_smith::backend::{BackendCall, BackendError};
use gold_smith::domain::{
    DeliveryConfirmation, DeliveryMode, DomainError, OrderStatus, PaymentMethod, PaymentReceipt,
    SchemeStatus, SchemeStatusChange,
};
use gold_smith::workflow::{ActionFields, RequiredField};
use gold_smith::{ActionKind, GuardedAction, OtpConfig, SessionPhase, WorkflowError};

mod fixtures;
use fixtures::{demo_store, mock_backend, Notified, RecordingListener};

async fn open_order(action: ActionKind, order_id: &str) -> (GuardedAction, Arc<gold_smith::MockBackend>) {
    let store = demo_store().await;
    let order = store.order(order_id).unwrap();
    let backend = mock_backend();
    let session = GuardedAction::for_order(action, &order, backend.clone(), OtpConfig::default()).unwrap();
    (session, backend)
}

#[tokio::test(start_paused = true)]
async fn delivery_hands_collected_fields_to_parent() {
    let store = demo_store().await;
    let order = store.order("ORD-1001").unwrap();
    let action =
        GuardedAction::for_order(ActionKind::DeliverOrder, &order, mock_backend(), OtpConfig::default()).unwrap();
    assert_eq!(action.contact(), Some("******2345"));

    assert_eq!(assert_ok!(action.send().await), "OTP sent successfully");
    assert!(action.otp_sent());
    assert_eq!(action.resend_timer(), 30);

    assert_ok!(action.verify("123456").await);
    assert!(action.otp_verified());
    assert_eq!(action.resend_timer(), 0);
    assert!(!action.can_commit());

    action.set_delivery_mode(DeliveryMode::HomeDelivery).unwrap();
    assert!(action.can_commit());

    let confirmation = assert_ok!(action.commit(&store).await);
    assert_eq!(
        serde_json::to_value(&confirmation).unwrap(),
        json!({ "otp": "123456", "deliveryMode": "home_delivery", "comments": "" })
    );

    let delivered = store.order("ORD-1001").unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.delivery.unwrap().mode, DeliveryMode::HomeDelivery);

    assert!(!action.is_open());
    assert_eq!(action.phase(), SessionPhase::Idle);
    assert_eq!(action.otp(), "");
}

#[tokio::test(start_paused = true)]
async fn rejected_code_can_be_retried() {
    let (action, backend) = open_order(ActionKind::DeliverOrder, "ORD-1001").await;
    assert_ok!(action.send().await);

    let err = assert_err!(action.verify("000000").await);
    assert_eq!(err, WorkflowError::CodeRejected("Invalid OTP. Please try again.".to_string()));
    assert_eq!(action.otp(), "");
    assert!(action.otp_sent());
    assert!(!action.otp_verified());
    assert_eq!(action.failed_attempts(), 1);
    assert_eq!(action.error().as_deref(), Some("Invalid OTP. Please try again."));
    assert!(action.resend_timer() > 0);

    assert_ok!(action.verify("111111").await);
    assert!(action.otp_verified());
    assert_eq!(action.error(), None);
    assert_eq!(action.resend_timer(), 0);

    let verifies = backend
        .calls()
        .into_iter()
        .filter(|call| matches!(call, BackendCall::VerifyOtp { .. }))
        .count();
    assert_eq!(verifies, 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_needs_reason_before_commit() {
    let store = demo_store().await;
    let order = store.order("ORD-1002").unwrap();
    let backend = mock_backend();
    let action =
        GuardedAction::for_order(ActionKind::CancelOrder, &order, backend.clone(), OtpConfig::default()).unwrap();

    assert_eq!(assert_err!(action.send().await), WorkflowError::StaffNameRequired);
    action.set_staff_name("Priya").unwrap();
    assert_ok!(action.send().await);
    assert_ok!(action.verify("482913").await);

    assert!(!action.can_commit());
    assert_eq!(action.missing_fields(), vec![RequiredField::Reason]);
    assert_eq!(
        assert_err!(action.commit(&store).await),
        WorkflowError::MissingFields(vec![RequiredField::Reason])
    );
    assert_eq!(backend.commit_count(), 0);
    assert!(action.otp_verified());

    action.set_reason("Customer changed design").unwrap();
    assert!(action.missing_fields().is_empty());
    assert_ok!(action.commit(&store).await);

    let cancelled = store.order("ORD-1002").unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let details = cancelled.cancellation.unwrap();
    assert_eq!(details.staff_name, "Priya");
    assert_eq!(details.reason, "Customer changed design");
}

#[tokio::test(start_paused = true)]
async fn resend_cooldown_ticks_down_to_zero() {
    let (action, backend) = open_order(ActionKind::DeliverOrder, "ORD-1001").await;
    assert_ok!(action.send().await);
    assert_eq!(action.resend_timer(), 30);

    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(action.resend_timer(), 29);

    sleep(Duration::from_secs(27)).await;
    assert_eq!(action.resend_timer(), 2);
    assert!(!action.can_send());
    assert_eq!(assert_err!(action.send().await), WorkflowError::CooldownActive(2));

    sleep(Duration::from_secs(2)).await;
    assert_eq!(action.resend_timer(), 0);
    assert!(action.can_send());

    assert_ok!(action.send().await);
    assert_eq!(action.resend_timer(), 30);
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn verification_stops_the_countdown() {
    let (action, _backend) = open_order(ActionKind::DeliverOrder, "ORD-1001").await;
    assert_ok!(action.send().await);
    assert_ok!(action.verify("123456").await);

    sleep(Duration::from_secs(5)).await;

    assert_eq!(action.resend_timer(), 0);
    assert!(!action.can_send());
    assert_eq!(assert_err!(action.send().await), WorkflowError::AlreadyVerified);
}

#[tokio::test(start_paused = true)]
async fn closing_resets_every_field() {
    let (action, _backend) = open_order(ActionKind::DeliverOrder, "ORD-1001").await;
    action.set_comments("left at counter").unwrap();
    assert_ok!(action.send().await);
    assert_err!(action.verify("000000").await);

    action.close();

    assert!(!action.is_open());
    assert!(!action.otp_sent());
    assert_eq!(action.resend_timer(), 0);
    assert_eq!(action.failed_attempts(), 0);
    assert_eq!(action.error(), None);
    assert_eq!(action.fields(), ActionFields::default());
    assert_eq!(action.set_comments("late edit"), Err(WorkflowError::Closed));

    action.reopen();
    assert!(action.is_open());
    assert!(action.can_send());
}

#[tokio::test(start_paused = true)]
async fn closing_drops_in_flight_send() {
    let (action, backend) = open_order(ActionKind::DeliverOrder, "ORD-1001").await;
    let action = Arc::new(action);

    let pending = {
        let action = action.clone();
        tokio::spawn(async move { action.send().await })
    };
    sleep(Duration::from_millis(100)).await;
    action.close();

    let result = pending.await.unwrap();
    assert_eq!(result, Err(WorkflowError::Cancelled));
    assert_eq!(backend.calls().len(), 1);

    sleep(Duration::from_secs(5)).await;
    assert!(!action.otp_sent());
    assert_eq!(action.resend_timer(), 0);
    assert_eq!(action.phase(), SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn verification_locks_after_attempt_limit() {
    let store = demo_store().await;
    let order = store.order("ORD-1001").unwrap();
    let backend = mock_backend();
    let config = OtpConfig {
        max_verify_attempts: Some(2),
        ..OtpConfig::default()
    };
    let action = GuardedAction::for_order(ActionKind::DeliverOrder, &order, backend.clone(), config).unwrap();
    assert_ok!(action.send().await);

    assert_err!(action.verify("000000").await);
    assert_err!(action.verify("000000").await);
    assert_eq!(
        assert_err!(action.verify("123456").await),
        WorkflowError::AttemptsExhausted(2)
    );
    assert_eq!(backend.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn send_failure_surfaces_backend_message() {
    let (action, backend) = open_order(ActionKind::DeliverOrder, "ORD-1001").await;
    backend.fail_next_send(BackendError::Http {
        status: 503,
        message: "SMS gateway unavailable".to_string(),
    });

    assert_err!(action.send().await);
    assert_eq!(action.error().as_deref(), Some("SMS gateway unavailable"));
    assert!(!action.otp_sent());

    action.dismiss_error();
    assert_eq!(action.error(), None);
    assert_ok!(action.send().await);
}

#[tokio::test]
async fn orders_without_phone_cannot_receive_codes() {
    let (action, backend) = open_order(ActionKind::DeliverOrder, "ORD-1003").await;

    assert_eq!(action.contact(), None);
    assert!(!action.can_send());
    assert_eq!(
        assert_err!(action.send().await),
        WorkflowError::MissingContact("ORD-1003".to_string())
    );
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn terminal_entities_cannot_be_acted_on() {
    let store = demo_store().await;

    let delivered = store.order("ORD-0998").unwrap();
    let err = GuardedAction::for_order(ActionKind::CancelOrder, &delivered, mock_backend(), OtpConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, WorkflowError::Domain(DomainError::OrderTerminal { .. })));

    let completed = store.scheme("SCH-203").unwrap();
    let err = GuardedAction::for_scheme(ActionKind::StopScheme, &completed, mock_backend(), OtpConfig::default())
        .err()
        .unwrap();
    assert_eq!(
        err,
        WorkflowError::Domain(DomainError::IllegalSchemeTransition {
            id: "SCH-203".to_string(),
            from: SchemeStatus::Completed,
            to: SchemeStatus::Stopped,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn paused_scheme_stops_taking_payments() {
    let store = demo_store().await;
    let scheme = store.scheme("SCH-201").unwrap();
    let backend = mock_backend();
    let action =
        GuardedAction::for_scheme(ActionKind::PauseScheme, &scheme, backend.clone(), OtpConfig::default()).unwrap();

    assert_ok!(action.send().await);
    assert_ok!(action.verify("654321").await);
    assert_eq!(
        assert_err!(action.commit(&store).await),
        WorkflowError::MissingFields(vec![RequiredField::Comments])
    );
    action.set_comments("Customer travelling abroad").unwrap();
    assert_ok!(action.commit(&store).await);
    assert_eq!(backend.commit_count(), 1);

    let paused = store.scheme("SCH-201").unwrap();
    assert_eq!(paused.status, SchemeStatus::Paused);
    assert_eq!(paused.status_note.unwrap().comments, "Customer travelling abroad");

    let receipt = PaymentReceipt {
        method: PaymentMethod::Cash,
        amount: 5_000,
        transaction_id: None,
        received_at: chrono::Utc::now(),
    };
    assert!(matches!(
        store.record_payment("SCH-201", &receipt),
        Err(DomainError::SchemeInactive { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn stop_notifies_parent_with_otp_and_comments() {
    let store = demo_store().await;
    let scheme = store.scheme("SCH-202").unwrap();
    let listener = RecordingListener::default();
    let action =
        GuardedAction::for_scheme(ActionKind::StopScheme, &scheme, mock_backend(), OtpConfig::default()).unwrap();

    assert_ok!(action.send().await);
    assert_ok!(action.verify("246810").await);
    action.set_comments("Closed at customer request").unwrap();
    assert_ok!(action.commit(&listener).await);

    assert_eq!(
        listener.events(),
        vec![Notified::Stopped(
            "SCH-202".to_string(),
            SchemeStatusChange {
                otp: "246810".to_string(),
                comments: "Closed at customer request".to_string(),
            }
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn commit_failure_allows_retry_without_new_code() {
    let (action, backend) = open_order(ActionKind::DeliverOrder, "ORD-1001").await;
    let listener = RecordingListener::default();
    backend.fail_next_commit(BackendError::Http {
        status: 500,
        message: "Could not update order".to_string(),
    });

    assert_ok!(action.send().await);
    assert_ok!(action.verify("123456").await);
    action.set_delivery_mode(DeliveryMode::StorePickup).unwrap();

    assert_err!(action.commit(&listener).await);
    assert!(action.is_open());
    assert!(action.can_commit());
    assert!(listener.events().is_empty());

    assert_ok!(action.commit(&listener).await);
    assert_eq!(
        listener.events(),
        vec![Notified::Delivered(
            "ORD-1001".to_string(),
            DeliveryConfirmation {
                otp: "123456".to_string(),
                delivery_mode: DeliveryMode::StorePickup,
                comments: String::new(),
            }
        )]
    );
    assert_eq!(backend.commit_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn missing_expiry_falls_back_to_configured_cooldown() {
    let store = demo_store().await;
    let order = store.order("ORD-1001").unwrap();
    let backend = Arc::new(gold_smith::MockBackend::new(fixtures::LATENCY).with_expires_in(None));
    let config = OtpConfig {
        fallback_expires_in_secs: 45,
        ..OtpConfig::default()
    };
    let action = GuardedAction::for_order(ActionKind::DeliverOrder, &order, backend, config).unwrap();

    assert_ok!(action.send().await);

    assert_eq!(action.resend_timer(), 45);
}

#[tokio::test(start_paused = true)]
async fn verify_transport_failure_keeps_code_sent() {
    let (action, backend) = open_order(ActionKind::DeliverOrder, "ORD-1001").await;
    assert_ok!(action.send().await);
    backend.fail_next_verify(BackendError::Network("connection reset".to_string()));

    let err = assert_err!(action.verify("123456").await);

    assert_eq!(
        err,
        WorkflowError::Backend(BackendError::Network("connection reset".to_string()))
    );
    assert_eq!(action.otp(), "");
    assert!(action.otp_sent());
    assert!(!action.otp_verified());
    assert_eq!(action.failed_attempts(), 1);

    assert_ok!(action.verify("123456").await);
    assert!(action.otp_verified());
}
