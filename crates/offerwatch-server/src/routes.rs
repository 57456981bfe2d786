use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use offerwatch_core::command::validate_source_url;
use offerwatch_core::models::{ExtractionRule, Source};
use offerwatch_core::scheduler::TriggerOutcome;
use offerwatch_core::traits::Dispatcher;

use crate::auth::require_admin_token;
use crate::dto::{
    CreateSourceRequest, HealthResponse, SourceListResponse, SourceResponse, StatusResponse,
    SweepTriggerResponse,
};
use crate::error::{ApiError, error_response};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::webhook::line_webhook;

/// Build the full router with all routes and middleware.
pub fn router<D: Dispatcher + 'static>(state: Arc<AppState<D>>) -> Router {
    let admin = Router::new()
        .route("/v1/sources", get(list_sources::<D>))
        .route("/v1/sources", post(create_source::<D>))
        .route("/v1/sources/{name}", delete(delete_source::<D>))
        .route("/v1/sweeps", post(trigger_sweep::<D>))
        .route("/v1/status", get(status::<D>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token::<D>,
        ));

    let public = Router::new()
        .route("/", get(banner))
        .route("/health", get(health::<D>))
        .route("/webhook", post(line_webhook::<D>))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(admin).with_state(state)
}

async fn banner() -> &'static str {
    "🏨 offerwatch is running"
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/sources",
    responses(
        (status = 200, description = "Monitored sources in registration order", body = SourceListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin API disabled"),
    ),
    security(("bearer" = [])),
    tag = "sources"
)]
pub async fn list_sources<D: Dispatcher>(
    State(state): State<Arc<AppState<D>>>,
) -> impl IntoResponse {
    let sources = state.handler.state().sources().await;
    let total = sources.len();

    axum::Json(SourceListResponse {
        sources: sources.into_iter().map(SourceResponse::from).collect(),
        total,
    })
}

#[utoipa::path(
    post,
    path = "/v1/sources",
    request_body = CreateSourceRequest,
    responses(
        (status = 201, description = "Source added", body = SourceResponse),
        (status = 400, description = "Invalid name or URL", body = crate::dto::ErrorResponse),
        (status = 409, description = "Name already registered", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin API disabled"),
    ),
    security(("bearer" = [])),
    tag = "sources"
)]
pub async fn create_source<D: Dispatcher>(
    State(state): State<Arc<AppState<D>>>,
    axum::Json(body): axum::Json<CreateSourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "Source name must not be empty",
        ));
    }
    validate_source_url(&body.location).map_err(offerwatch_core::AppError::from)?;

    let rule = match body.container {
        Some(container) => ExtractionRule::with_container(container),
        None => ExtractionRule::default(),
    };
    let source = Source::new(name, body.location).with_rule(rule);

    if !state.handler.state().add_source(source.clone()).await {
        return Ok(error_response(
            StatusCode::CONFLICT,
            "conflict",
            format!("Source already registered: {name}"),
        ));
    }

    tracing::info!(source = %source.name, url = %source.location, "Source added via API");
    Ok((StatusCode::CREATED, axum::Json(SourceResponse::from(source))).into_response())
}

#[utoipa::path(
    delete,
    path = "/v1/sources/{name}",
    params(
        ("name" = String, Path, description = "Exact source name")
    ),
    responses(
        (status = 204, description = "Source removed"),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin API disabled"),
    ),
    security(("bearer" = [])),
    tag = "sources"
)]
pub async fn delete_source<D: Dispatcher>(
    State(state): State<Arc<AppState<D>>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let monitor = state.handler.state();
    if monitor.remove_source(&name).await {
        tracing::info!(source = %name, "Source removed via API");
        return StatusCode::NO_CONTENT.into_response();
    }

    let suggestions = monitor.suggest_sources(&name).await;
    let message = if suggestions.is_empty() {
        format!("Source not found: {name}")
    } else {
        format!(
            "Source not found: {name}. Did you mean: {}?",
            suggestions.join(", ")
        )
    };
    error_response(StatusCode::NOT_FOUND, "not_found", message)
}

// ---------------------------------------------------------------------------
// Sweeps & status
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/sweeps",
    responses(
        (status = 202, description = "Sweep scheduled", body = SweepTriggerResponse),
        (status = 503, description = "Scheduler stopped", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin API disabled"),
    ),
    security(("bearer" = [])),
    tag = "sweeps"
)]
pub async fn trigger_sweep<D: Dispatcher>(
    State(state): State<Arc<AppState<D>>>,
) -> impl IntoResponse {
    let outcome = match state.handler.trigger_sweep() {
        TriggerOutcome::Accepted => "accepted",
        TriggerOutcome::Queued => "queued",
        TriggerOutcome::Coalesced => "coalesced",
        TriggerOutcome::Stopped => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "Scheduler is not running",
            );
        }
    };

    let body = SweepTriggerResponse {
        outcome,
        coalesced: outcome == "coalesced",
    };
    (StatusCode::ACCEPTED, axum::Json(body)).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/status",
    responses(
        (status = 200, description = "Monitor status", body = StatusResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin API disabled"),
    ),
    security(("bearer" = [])),
    tag = "system"
)]
pub async fn status<D: Dispatcher>(State(state): State<Arc<AppState<D>>>) -> impl IntoResponse {
    axum::Json(StatusResponse::from(state.handler.status().await))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health<D: Dispatcher>(State(state): State<Arc<AppState<D>>>) -> impl IntoResponse {
    let status = state.handler.status().await;

    axum::Json(HealthResponse {
        status: "healthy",
        sources: status.sources,
        observed_offers: status.observed_offers,
        sweep_running: status.sweep_running,
    })
}
