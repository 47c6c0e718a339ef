//! REST backend tests
//!
//! These tests use wiremock to stand in for the admin API, checking the route
//! layout, request bodies and how server errors reach the session.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gold_smith::backend::{ActionBackend, SendOtpRequest, VerifyOtpRequest};
use gold_smith::domain::{Customer, DeliveryMode, Order};
use gold_smith::{ActionKind, ActionTarget, BackendError, GuardedAction, HttpBackend, OtpConfig, WorkflowError};

mod fixtures;
use fixtures::{Notified, RecordingListener};

fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(format!("{}/api/", server.uri()), 50, Duration::from_secs(5)).unwrap()
}

fn order() -> Order {
    Order::new(
        "ORD-77",
        Customer {
            name: "Deepa Raman".to_string(),
            phone: Some("9988776655".to_string()),
        },
    )
}

#[tokio::test]
async fn send_otp_reads_cooldown_from_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/orders/ORD-77/delivery/send-otp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "OTP sent to ******6655",
            "expiresIn": 45
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server)
        .send_otp(
            &ActionTarget::new(ActionKind::DeliverOrder, "ORD-77"),
            &SendOtpRequest::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.message, "OTP sent to ******6655");
    assert_eq!(response.expires_in, Some(45));
}

#[tokio::test]
async fn cancellation_send_carries_staff_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/orders/ORD-77/cancellation/send-otp"))
        .and(body_json(json!({ "staffName": "Ravi" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "sent" })))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server)
        .send_otp(
            &ActionTarget::new(ActionKind::CancelOrder, "ORD-77"),
            &SendOtpRequest {
                staff_name: Some("Ravi".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.expires_in, None);
}

#[tokio::test]
async fn scheme_routes_share_the_layout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/schemes/SCH-9/stop/verify-otp"))
        .and(body_json(json!({ "otp": "123456" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "verified": false,
            "message": "OTP expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server)
        .verify_otp(
            &ActionTarget::new(ActionKind::StopScheme, "SCH-9"),
            &VerifyOtpRequest {
                otp: "123456".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(!response.verified);
    assert_eq!(response.message, "OTP expired");
}

#[tokio::test]
async fn server_error_message_is_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/orders/ORD-77/delivery/send-otp"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({ "error": "Too many OTP requests" })),
        )
        .mount(&server)
        .await;

    let err = backend(&server)
        .send_otp(
            &ActionTarget::new(ActionKind::DeliverOrder, "ORD-77"),
            &SendOtpRequest::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BackendError::Http {
            status: 429,
            message: "Too many OTP requests".to_string(),
        }
    );
}

#[tokio::test]
async fn full_delivery_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/orders/ORD-77/delivery/send-otp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "sent",
            "expiresIn": 30
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/orders/ORD-77/delivery/verify-otp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "verified": true })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/orders/ORD-77/delivery/confirm"))
        .and(body_json(json!({
            "otp": "314159",
            "deliveryMode": "courier",
            "comments": "Blue Dart AWB 5521"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Order delivered" })))
        .expect(1)
        .mount(&server)
        .await;

    let listener = RecordingListener::default();
    let action = GuardedAction::for_order(
        ActionKind::DeliverOrder,
        &order(),
        Arc::new(backend(&server)),
        OtpConfig::default(),
    )
    .unwrap();

    action.send().await.unwrap();
    action.verify("314159").await.unwrap();
    action.set_delivery_mode(DeliveryMode::Courier).unwrap();
    action.set_comments("Blue Dart AWB 5521").unwrap();
    action.commit(&listener).await.unwrap();

    assert!(matches!(
        listener.events().as_slice(),
        [Notified::Delivered(id, c)] if id == "ORD-77" && c.otp == "314159"
    ));
}

#[tokio::test]
async fn verify_failure_shows_server_text_and_clears_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/orders/ORD-77/delivery/send-otp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "sent" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/orders/ORD-77/delivery/verify-otp"))
        .respond_with(ResponseTemplate::new(410).set_body_json(json!({ "message": "OTP expired" })))
        .mount(&server)
        .await;

    let action = GuardedAction::for_order(
        ActionKind::DeliverOrder,
        &order(),
        Arc::new(backend(&server)),
        OtpConfig::default(),
    )
    .unwrap();

    action.send().await.unwrap();
    assert_eq!(action.resend_timer(), 30);

    let err = action.verify("271828").await.unwrap_err();
    assert_eq!(
        err,
        WorkflowError::Backend(BackendError::Http {
            status: 410,
            message: "OTP expired".to_string(),
        })
    );
    assert_eq!(action.error().as_deref(), Some("OTP expired"));
    assert_eq!(action.otp(), "");
    assert!(action.otp_sent());
    assert!(!action.otp_verified());
}
