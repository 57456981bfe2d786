use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use offerwatch_core::models::{Source, SweepSummary};
use offerwatch_core::monitor::MonitorStatus;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateSourceRequest {
    /// Unique source name
    pub name: String,
    /// Page URL to monitor (http or https)
    pub location: String,
    /// Container selector override (defaults to the built-in offer selectors)
    pub container: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SourceResponse {
    pub name: String,
    pub location: String,
    pub container: String,
}

impl From<Source> for SourceResponse {
    fn from(source: Source) -> Self {
        Self {
            name: source.name,
            location: source.location,
            container: source.rule.container,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SourceListResponse {
    pub sources: Vec<SourceResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Sweeps
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SweepTriggerResponse {
    /// One of `accepted`, `queued`, `coalesced`
    pub outcome: &'static str,
    /// True when the trigger merged into an already pending sweep
    pub coalesced: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SweepSummaryResponse {
    pub id: Uuid,
    pub trigger: String,
    pub completed_at: DateTime<Utc>,
    pub sources_checked: usize,
    pub changed_offers: usize,
    pub failures: usize,
}

impl From<SweepSummary> for SweepSummaryResponse {
    fn from(s: SweepSummary) -> Self {
        Self {
            id: s.id,
            trigger: s.trigger.to_string(),
            completed_at: s.completed_at,
            sources_checked: s.sources_checked,
            changed_offers: s.changed_offers,
            failures: s.failures,
        }
    }
}

// ---------------------------------------------------------------------------
// Status & health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatusResponse {
    pub sources: usize,
    pub observed_offers: usize,
    pub subscribers: usize,
    pub schedule: String,
    pub sweep_running: bool,
    pub next_sweep_at: Option<DateTime<Utc>>,
    pub last_sweep: Option<SweepSummaryResponse>,
}

impl From<MonitorStatus> for StatusResponse {
    fn from(s: MonitorStatus) -> Self {
        Self {
            sources: s.sources,
            observed_offers: s.observed_offers,
            subscribers: s.subscribers,
            schedule: s.schedule,
            sweep_running: s.sweep_running,
            next_sweep_at: s.next_sweep_at,
            last_sweep: s.last_sweep.map(SweepSummaryResponse::from),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sources: usize,
    pub observed_offers: usize,
    pub sweep_running: bool,
}

// ---------------------------------------------------------------------------
// LINE webhook
// ---------------------------------------------------------------------------

/// Webhook body sent by the LINE platform.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub reply_token: Option<String>,
    pub source: Option<EventSource>,
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
