use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "offerwatch API",
        version = "0.1.0",
        description = "Hotel offer change monitor: LINE webhook and admin API."
    ),
    paths(
        crate::routes::list_sources,
        crate::routes::create_source,
        crate::routes::delete_source,
        crate::routes::trigger_sweep,
        crate::routes::status,
        crate::routes::health,
        crate::webhook::line_webhook,
    ),
    components(schemas(
        crate::dto::CreateSourceRequest,
        crate::dto::SourceResponse,
        crate::dto::SourceListResponse,
        crate::dto::SweepTriggerResponse,
        crate::dto::SweepSummaryResponse,
        crate::dto::StatusResponse,
        crate::dto::HealthResponse,
        crate::dto::WebhookPayload,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "sources", description = "Monitored source registry"),
        (name = "sweeps", description = "On-demand sweeps"),
        (name = "line", description = "LINE Messaging API webhook"),
        (name = "system", description = "Health and monitor status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the admin bearer token scheme to the OpenAPI document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .description(Some(
                            "Admin token. Set via OFFERWATCH_ADMIN_TOKEN environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
