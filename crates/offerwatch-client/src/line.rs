use std::time::Duration;

use offerwatch_core::error::AppError;
use offerwatch_core::models::truncate_chars;
use offerwatch_core::traits::Dispatcher;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.line.me/v2/bot";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// LINE rejects text messages longer than this many characters.
pub const MAX_TEXT_LEN: usize = 5000;

/// LINE Messaging API client: push notifications and webhook replies.
#[derive(Clone)]
pub struct LineDispatcher {
    client: Client,
    base_url: String,
    access_token: String,
    timeout_secs: u64,
}

impl LineDispatcher {
    pub fn new(access_token: &str) -> Result<Self, AppError> {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(access_token: &str, base_url: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        })
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), AppError> {
        let url = format!("{}/{path}", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let status_code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<LineError>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| format!("HTTP {status_code}: {body}"));

        Err(AppError::DeliveryError {
            message,
            status_code,
        })
    }
}

// ---- LINE API types ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage; 1],
}

#[derive(Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl TextMessage {
    fn new(text: &str) -> Self {
        Self {
            kind: "text",
            text: truncate_chars(text, MAX_TEXT_LEN),
        }
    }
}

#[derive(Deserialize)]
struct LineError {
    message: String,
}

impl Dispatcher for LineDispatcher {
    async fn deliver(&self, target: &str, message: &str) -> Result<(), AppError> {
        let request = PushRequest {
            to: target,
            messages: [TextMessage::new(message)],
        };
        self.post("message/push", &request).await
    }

    async fn reply(&self, reply_token: &str, message: &str) -> Result<(), AppError> {
        let request = ReplyRequest {
            reply_token,
            messages: [TextMessage::new(message)],
        };
        self.post("message/reply", &request).await
    }
}
