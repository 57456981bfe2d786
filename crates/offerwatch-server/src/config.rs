use offerwatch_core::error::AppError;

/// Server settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub line_access_token: String,
    pub line_channel_secret: String,
    pub admin_token: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                AppError::ConfigError(format!("{key} not set. Required to talk to LINE."))
            })
        };

        let port = match get("PORT") {
            None => 3000,
            Some(raw) => raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!("Invalid PORT '{raw}': must be 0-65535"))
            })?,
        };

        Ok(Self {
            port,
            line_access_token: require("LINE_CHANNEL_ACCESS_TOKEN")?,
            line_channel_secret: require("LINE_CHANNEL_SECRET")?,
            admin_token: get("OFFERWATCH_ADMIN_TOKEN"),
        })
    }
}
