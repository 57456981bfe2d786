use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use crate::common::{setup_test_app, signed_request, signed_text_event};

#[tokio::test]
async fn unsigned_webhook_returns_401() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/webhook")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"events":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forged_signature_returns_401() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/webhook")
                .header("x-line-signature", "bm90LXRoZS1zaWduYXR1cmU=")
                .body(Body::from(r#"{"events":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.dispatcher.replies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn verification_request_with_no_events_is_ok() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(signed_request(r#"{"destination":"Ubot","events":[]}"#.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_body_returns_400() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(signed_request("{not json".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_command_is_answered_with_reply_token() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(signed_text_event("U1", "reply-1", "飯店清單"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let replies = app.dispatcher.replies.lock().unwrap().clone();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0, "reply-1");
    assert!(replies[0].1.contains("1. 台南晶英酒店"));
    assert!(replies[0].1.contains("總共監控 2 家飯店"));
}

#[tokio::test]
async fn unknown_text_gets_no_reply() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(signed_text_event("U1", "reply-1", "早安"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.dispatcher.replies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn add_command_registers_source() {
    let app = setup_test_app();

    app.router
        .clone()
        .oneshot(signed_text_event(
            "U1",
            "reply-1",
            "加入飯店 福爾摩沙遊艇酒店 https://www.formosayacht.com.tw/",
        ))
        .await
        .unwrap();

    let replies = app.dispatcher.replies.lock().unwrap().clone();
    assert!(replies[0].1.contains("已加入「福爾摩沙遊艇酒店」的監控"));

    app.router
        .clone()
        .oneshot(signed_text_event("U1", "reply-2", "狀態"))
        .await
        .unwrap();
    let replies = app.dispatcher.replies.lock().unwrap().clone();
    assert!(replies[1].1.contains("監控飯店數量：3 家"));
}

#[tokio::test]
async fn subscriber_receives_notification_after_check() {
    let app = setup_test_app();

    app.router
        .clone()
        .oneshot(signed_text_event("U42", "reply-1", "訂閱"))
        .await
        .unwrap();
    app.router
        .clone()
        .oneshot(signed_text_event("U42", "reply-2", "檢查優惠"))
        .await
        .unwrap();

    let replies = app.dispatcher.replies.lock().unwrap().clone();
    assert!(replies[0].1.contains("已訂閱"));
    assert!(replies[1].1.contains("開始檢查"));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!app.scheduler.is_running());

    let delivered = app.dispatcher.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, "U42");
    assert!(delivered[0].1.starts_with("🏨 發現飯店新優惠！"));
    assert!(delivered[0].1.contains("📝 Summer Deal"));
    assert!(delivered[0].1.contains("💰 $100"));
}
