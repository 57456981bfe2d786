use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::dto::ErrorResponse;
use crate::state::AppState;

/// Header LINE puts the webhook body signature in.
pub const LINE_SIGNATURE_HEADER: &str = "x-line-signature";

/// Middleware that validates `Authorization: Bearer <token>` against the admin token.
///
/// Responds 403 when no admin token is configured, 401 on a missing or wrong token.
pub async fn require_admin_token<D: Send + Sync + 'static>(
    State(state): State<Arc<AppState<D>>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        let body = ErrorResponse {
            error: "forbidden".to_string(),
            message: "Admin API is disabled. Set OFFERWATCH_ADMIN_TOKEN to enable it.".to_string(),
        };
        return (StatusCode::FORBIDDEN, axum::Json(body)).into_response();
    };

    let authenticated = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())));

    if !authenticated {
        let body = ErrorResponse {
            error: "unauthorized".to_string(),
            message: "Missing or invalid Authorization header. Expected: Bearer <admin_token>"
                .to_string(),
        };
        return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
    }

    next.run(request).await
}

/// base64(HMAC-SHA256(secret, body)), the value LINE sends for a genuine request.
pub fn line_signature(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Check a webhook signature in constant time.
pub fn verify_line_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    line_signature(secret, body).is_some_and(|expected| {
        bool::from(expected.as_bytes().ct_eq(signature.trim().as_bytes()))
    })
}
