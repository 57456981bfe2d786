use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use offerwatch_client::{LineDispatcher, ReqwestFetcher, ScraperMarkup};
use offerwatch_core::config::{MonitorConfig, load_sources};
use offerwatch_core::monitor::{CommandHandler, Monitor, MonitorState};
use offerwatch_core::notify::NotificationBatcher;
use offerwatch_core::registry::SourceRegistry;
use offerwatch_core::scheduler::Scheduler;
use offerwatch_core::snapshot::JsonFileStore;
use offerwatch_core::sweep::{SweepService, TracingSweepReporter};
use offerwatch_server::config::ServerConfig;
use offerwatch_server::routes;
use offerwatch_server::state::AppState;

/// LINE webhook bodies are small; anything larger is not from LINE.
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("offerwatch=info".parse()?))
        .with_target(false)
        .init();

    let config = MonitorConfig::from_env()?;
    let server = ServerConfig::from_env()?;

    let sources = load_sources(&config.sources_path)?;
    tracing::info!(
        sources = sources.len(),
        path = %config.sources_path.display(),
        "Sources loaded"
    );

    let state = Arc::new(MonitorState::new(
        SourceRegistry::from_sources(sources),
        config.subscriber_registry(),
    ));
    let dispatcher = LineDispatcher::new(&server.line_access_token)?;

    let sweep = SweepService::new(ReqwestFetcher::new()?, ScraperMarkup::new())
        .with_throttle(config.throttle())
        .with_fetch_timeout(config.fetch_timeout);
    let monitor = Monitor::new(
        state.clone(),
        sweep,
        dispatcher.clone(),
        JsonFileStore::new(&config.state_path),
        NotificationBatcher::new(config.timezone),
    );
    monitor.restore(&TracingSweepReporter).await?;

    let (scheduler, handle) = Scheduler::new(monitor, config.sweep_schedule()?);
    let scheduler = scheduler.with_startup_delay(config.startup_delay);

    let cancel = CancellationToken::new();
    let scheduler_token = cancel.clone();
    let scheduler_task = tokio::spawn(async move {
        scheduler.run(scheduler_token, &TracingSweepReporter).await;
    });

    let app_state = Arc::new(AppState {
        handler: CommandHandler::new(state, handle),
        dispatcher,
        channel_secret: server.line_channel_secret,
        admin_token: server.admin_token,
    });

    if app_state.admin_token.is_none() {
        tracing::warn!("OFFERWATCH_ADMIN_TOKEN not set, admin API disabled");
    }

    let app = routes::router(app_state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", server.port);
    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let an in-flight sweep finish before exiting.
    cancel.cancel();
    scheduler_task.await?;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
