use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use offerwatch_core::error::AppError;
use offerwatch_core::monitor::Caller;
use offerwatch_core::traits::Dispatcher;

use crate::auth::{LINE_SIGNATURE_HEADER, verify_line_signature};
use crate::dto::{EventSource, WebhookEvent, WebhookPayload};
use crate::error::{ApiError, error_response};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/webhook",
    request_body = WebhookPayload,
    params(
        ("x-line-signature" = String, Header, description = "base64 HMAC-SHA256 of the body keyed with the channel secret")
    ),
    responses(
        (status = 200, description = "Events processed"),
        (status = 400, description = "Malformed body", body = crate::dto::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::dto::ErrorResponse),
    ),
    tag = "line"
)]
pub async fn line_webhook<D: Dispatcher + 'static>(
    State(state): State<Arc<AppState<D>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signed = headers
        .get(LINE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|signature| verify_line_signature(&state.channel_secret, &body, signature));

    if !signed {
        tracing::warn!("Rejected webhook with missing or invalid signature");
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Missing or invalid x-line-signature",
        );
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => return ApiError(AppError::from(e)).into_response(),
    };

    tracing::debug!(events = payload.events.len(), "Webhook received");
    for event in payload.events {
        handle_event(&state, event).await;
    }

    StatusCode::OK.into_response()
}

async fn handle_event<D: Dispatcher>(state: &AppState<D>, event: WebhookEvent) {
    if event.kind != "message" {
        return;
    }
    let Some(text) = event
        .message
        .filter(|m| m.kind == "text")
        .and_then(|m| m.text)
    else {
        return;
    };

    let caller = event.source.as_ref().and_then(caller_of);
    let Some(reply) = state.handler.handle_text(&text, caller.as_ref()).await else {
        return;
    };

    let Some(token) = event.reply_token else {
        tracing::debug!("Command without reply token, reply dropped");
        return;
    };
    if let Err(e) = state.dispatcher.reply(&token, &reply).await {
        tracing::warn!(error = %e, "Failed to reply to command");
    }
}

/// Identify the chat; a group or room subscribes as a whole.
fn caller_of(source: &EventSource) -> Option<Caller> {
    source
        .group_id
        .as_ref()
        .or(source.room_id.as_ref())
        .or(source.user_id.as_ref())
        .map(|id| Caller::user(id.as_str()))
}
