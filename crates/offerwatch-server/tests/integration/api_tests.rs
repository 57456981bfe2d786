use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::common::{TEST_ADMIN_TOKEN, setup_test_app, setup_test_app_no_auth};

fn authed(request: axum::http::request::Builder) -> axum::http::request::Builder {
    request.header("authorization", format!("Bearer {TEST_ADMIN_TOKEN}"))
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_reports_counts() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["sources"], 2);
    assert_eq!(json["observed_offers"], 0);
    assert_eq!(json["sweep_running"], false);
}

#[tokio::test]
async fn banner_is_public() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/v1/sources").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_admin_token_returns_401() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/v1/status")
                .header("authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_admin_token_returns_403() {
    let app = setup_test_app_no_auth();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/v1/sources")
                .header("authorization", "Bearer any-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = json_body(response).await;
    assert_eq!(json["error"], "forbidden");
}

#[tokio::test]
async fn list_sources_in_registration_order() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(authed(Request::get("/v1/sources")).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["total"], 2);
    assert_eq!(json["sources"][0]["name"], "台南晶英酒店");
    assert_eq!(json["sources"][1]["name"], "康橋商旅");
    assert_eq!(
        json["sources"][0]["container"],
        ".promotion, .offer, .news, .package"
    );
}

#[tokio::test]
async fn create_source_then_duplicate_conflicts() {
    let app = setup_test_app();
    let create = |body: serde_json::Value| {
        authed(Request::post("/v1/sources"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let response = app
        .router
        .clone()
        .oneshot(create(serde_json::json!({
            "name": "夏都城旅安平館",
            "location": "https://www.chateau.com.tw/anping/",
            "container": ".news-item"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    assert_eq!(json["container"], ".news-item");

    let response = app
        .router
        .clone()
        .oneshot(create(serde_json::json!({
            "name": "夏都城旅安平館",
            "location": "https://elsewhere.example/"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .router
        .clone()
        .oneshot(authed(Request::get("/v1/sources")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["total"], 3);
    assert_eq!(json["sources"][2]["location"], "https://www.chateau.com.tw/anping/");
}

#[tokio::test]
async fn create_source_rejects_invalid_url() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post("/v1/sources"))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({"name": "Bad", "location": "ftp://files.example/"})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn delete_source_is_exact_match() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::delete("/v1/sources/%E6%99%B6%E8%8B%B1"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert!(json["message"].as_str().unwrap().contains("台南晶英酒店"));

    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::delete(
                "/v1/sources/%E5%BA%B7%E6%A9%8B%E5%95%86%E6%97%85",
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn trigger_sweep_runs_and_updates_status() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(authed(Request::post("/v1/sweeps")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = json_body(response).await;
    assert_eq!(json["outcome"], "accepted");
    assert_eq!(json["coalesced"], false);

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let response = app
        .router
        .clone()
        .oneshot(authed(Request::get("/v1/status")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["sources"], 2);
    assert_eq!(json["observed_offers"], 2);
    assert_eq!(json["last_sweep"]["trigger"], "on_demand");
    assert_eq!(json["last_sweep"]["sources_checked"], 2);
    assert_eq!(json["last_sweep"]["changed_offers"], 2);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["paths"]["/v1/sources"].is_object());
}
