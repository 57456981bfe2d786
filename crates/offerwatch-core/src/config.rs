use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::AppError;
use crate::models::Source;
use crate::registry::SubscriberRegistry;
use crate::scheduler::SweepSchedule;
use crate::throttle::ThrottleConfig;

pub const DEFAULT_SOURCES_PATH: &str = "sources.json";
pub const DEFAULT_STATE_PATH: &str = "data/observed.json";
pub const DEFAULT_SCHEDULE: &str = "0 0 8 * * *,0 0 14 * * *";
pub const DEFAULT_TIMEZONE: &str = "Asia/Taipei";

/// Monitor settings read from `OFFERWATCH_*` environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub sources_path: PathBuf,
    pub state_path: PathBuf,
    pub schedule: Vec<String>,
    pub timezone: Tz,
    pub startup_delay: Duration,
    pub source_delay: Duration,
    pub fetch_timeout: Duration,
    /// Subscriber ids notified from startup; each id is also its delivery target.
    pub subscribers: Vec<String>,
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timezone_raw = get("OFFERWATCH_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.into());
        let timezone = Tz::from_str(timezone_raw.trim()).map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid OFFERWATCH_TIMEZONE '{timezone_raw}': must be an IANA zone name"
            ))
        })?;

        Ok(Self {
            sources_path: get("OFFERWATCH_SOURCES")
                .unwrap_or_else(|| DEFAULT_SOURCES_PATH.into())
                .into(),
            state_path: get("OFFERWATCH_STATE_PATH")
                .unwrap_or_else(|| DEFAULT_STATE_PATH.into())
                .into(),
            schedule: split_list(
                &get("OFFERWATCH_SCHEDULE").unwrap_or_else(|| DEFAULT_SCHEDULE.into()),
            ),
            timezone,
            startup_delay: Duration::from_secs(parse_number(
                "OFFERWATCH_STARTUP_DELAY_SECS",
                get("OFFERWATCH_STARTUP_DELAY_SECS"),
                10,
            )?),
            source_delay: Duration::from_millis(parse_number(
                "OFFERWATCH_SOURCE_DELAY_MS",
                get("OFFERWATCH_SOURCE_DELAY_MS"),
                3000,
            )?),
            fetch_timeout: Duration::from_secs(parse_number(
                "OFFERWATCH_FETCH_TIMEOUT_SECS",
                get("OFFERWATCH_FETCH_TIMEOUT_SECS"),
                15,
            )?),
            subscribers: get("OFFERWATCH_SUBSCRIBERS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
        })
        .and_then(Self::validated)
    }

    fn validated(self) -> Result<Self, AppError> {
        if self.fetch_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "OFFERWATCH_FETCH_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        // Fail fast on bad cron expressions.
        self.sweep_schedule()?;
        Ok(self)
    }

    pub fn sweep_schedule(&self) -> Result<SweepSchedule, AppError> {
        SweepSchedule::parse(&self.schedule, self.timezone)
    }

    pub fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig::new(self.source_delay)
    }

    pub fn subscriber_registry(&self) -> SubscriberRegistry {
        let mut registry = SubscriberRegistry::new();
        for id in &self.subscribers {
            registry.subscribe(id.as_str(), id.as_str());
        }
        registry
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number(key: &str, raw: Option<String>, default: u64) -> Result<u64, AppError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {key} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}

/// Read the JSON array of sources at `path`.
///
/// A missing file yields an empty list with a warning; unreadable or
/// malformed files are errors.
pub fn load_sources(path: &Path) -> Result<Vec<Source>, AppError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Sources file not found, starting with no sources");
            return Ok(vec![]);
        }
        Err(e) => {
            return Err(AppError::ConfigError(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };

    serde_json::from_str(&raw).map_err(|e| {
        AppError::ConfigError(format!("Invalid sources file {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<MonitorConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MonitorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.sources_path, PathBuf::from("sources.json"));
        assert_eq!(config.state_path, PathBuf::from("data/observed.json"));
        assert_eq!(config.schedule, ["0 0 8 * * *", "0 0 14 * * *"]);
        assert_eq!(config.timezone, chrono_tz::Asia::Taipei);
        assert_eq!(config.startup_delay, Duration::from_secs(10));
        assert_eq!(config.source_delay, Duration::from_millis(3000));
        assert_eq!(config.fetch_timeout, Duration::from_secs(15));
        assert!(config.subscribers.is_empty());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config(&[
            ("OFFERWATCH_SCHEDULE", "0 30 9 * * *"),
            ("OFFERWATCH_TIMEZONE", "Europe/Rome"),
            ("OFFERWATCH_SOURCE_DELAY_MS", "500"),
            ("OFFERWATCH_SUBSCRIBERS", "U1, U2,,"),
        ])
        .unwrap();
        assert_eq!(config.schedule, ["0 30 9 * * *"]);
        assert_eq!(config.timezone, chrono_tz::Europe::Rome);
        assert_eq!(config.throttle().delay, Duration::from_millis(500));
        assert_eq!(config.subscribers, ["U1", "U2"]);
        assert_eq!(config.subscriber_registry().len(), 2);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for vars in [
            [("OFFERWATCH_TIMEZONE", "Mars/Olympus")],
            [("OFFERWATCH_SOURCE_DELAY_MS", "soon")],
            [("OFFERWATCH_FETCH_TIMEOUT_SECS", "0")],
            [("OFFERWATCH_SCHEDULE", "twice a day")],
        ] {
            let err = config(&vars).unwrap_err();
            assert!(matches!(err, AppError::ConfigError(_)), "{vars:?}: {err}");
        }
    }

    #[test]
    fn load_sources_reads_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "台南晶英酒店", "location": "https://tainan.silksplace.com/"},
                {"name": "康橋商旅", "location": "https://www.kindness-hotel.com.tw/",
                 "rule": {"container": ".deal", "title": ["h2"], "price": [".price"], "description": ["p"]}}
            ]"#,
        )
        .unwrap();

        let sources = load_sources(&path).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].rule, crate::models::ExtractionRule::default());
        assert_eq!(sources[1].rule.container, ".deal");
    }

    #[test]
    fn missing_sources_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_sources(&dir.path().join("absent.json")).unwrap().is_empty());
    }

    #[test]
    fn malformed_sources_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(&path, "[{\"name\": 1}]").unwrap();
        assert!(matches!(load_sources(&path), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn bundled_sources_file_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../sources.json");
        let sources = load_sources(&path).unwrap();
        assert_eq!(sources.len(), 9);
        assert_eq!(sources[0].name, "台南晶英酒店");
        assert_eq!(sources[0].rule.container, ".promotion, .offer, .news-item, .package");
        assert_eq!(sources[0].rule.title, crate::models::ExtractionRule::default().title);
    }
}
