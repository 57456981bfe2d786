use offerwatch_core::CommandHandler;

/// Shared application state, available to all route handlers via `State<Arc<AppState<D>>>`.
pub struct AppState<D> {
    /// Command surface over the running monitor and scheduler.
    pub handler: CommandHandler,
    /// Answers chat commands through the messaging channel.
    pub dispatcher: D,
    /// LINE channel secret used to verify webhook signatures.
    pub channel_secret: String,
    /// Admin API token (None = admin endpoints disabled).
    pub admin_token: Option<String>,
}
