//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::{ExtractionRule, FieldMatch, Offer};
use crate::sweep::{SweepEvent, SweepReporter};
use crate::traits::{Dispatcher, Fetcher, MarkupExtractor, ObservedStore};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher returning the same content for every URL unless overridden.
#[derive(Clone)]
pub struct MockFetcher {
    content: String,
    errors: Arc<Mutex<HashMap<String, AppError>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
            errors: Arc::new(Mutex::new(HashMap::new())),
            delays: Arc::new(Mutex::new(HashMap::new())),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every fetch of `url` with `error`.
    pub fn with_error_for(self, url: &str, error: AppError) -> Self {
        self.errors.lock().unwrap().insert(url.to_string(), error);
        self
    }

    /// Delay every fetch of `url` by `delay` before answering.
    pub fn with_delay_for(self, url: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
        self
    }

    /// URLs fetched so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, AppError> {
        self.requested.lock().unwrap().push(url.to_string());

        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.errors.lock().unwrap().get(url) {
            return Err(replicate(error));
        }
        Ok(self.content.clone())
    }
}

// ---------------------------------------------------------------------------
// MockMarkup
// ---------------------------------------------------------------------------

/// Mock markup extractor returning queued or repeating field matches.
#[derive(Clone)]
pub struct MockMarkup {
    /// Queue of responses. Each call pops the first element.
    responses: Arc<Mutex<Vec<Result<Vec<FieldMatch>, AppError>>>>,
    /// Returned once the queue is empty.
    fallback: Vec<FieldMatch>,
}

impl MockMarkup {
    /// Answers `matches` once, then nothing.
    pub fn new(matches: Vec<FieldMatch>) -> Self {
        Self::with_responses(vec![Ok(matches)])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<Vec<FieldMatch>, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback: vec![],
        }
    }

    /// Answers `matches` on every call.
    pub fn repeating(matches: Vec<FieldMatch>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![])),
            fallback: matches,
        }
    }
}

impl MarkupExtractor for MockMarkup {
    fn select(&self, _content: &str, _rule: &ExtractionRule) -> Result<Vec<FieldMatch>, AppError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.fallback.clone())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockDispatcher
// ---------------------------------------------------------------------------

/// Mock dispatcher recording pushes and replies.
#[derive(Clone, Default)]
pub struct MockDispatcher {
    /// (target, message) pairs.
    pub delivered: Arc<Mutex<Vec<(String, String)>>>,
    /// (reply token, message) pairs.
    pub replies: Arc<Mutex<Vec<(String, String)>>>,
    failing_targets: Arc<Mutex<Vec<String>>>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery to `target` fails with a delivery error.
    pub fn failing_for(self, target: &str) -> Self {
        self.failing_targets.lock().unwrap().push(target.to_string());
        self
    }

    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().unwrap().clone()
    }
}

impl Dispatcher for MockDispatcher {
    async fn deliver(&self, target: &str, message: &str) -> Result<(), AppError> {
        if self.failing_targets.lock().unwrap().iter().any(|t| t == target) {
            return Err(AppError::DeliveryError {
                message: "blocked".into(),
                status_code: 400,
            });
        }
        self.delivered
            .lock()
            .unwrap()
            .push((target.to_string(), message.to_string()));
        Ok(())
    }

    async fn reply(&self, reply_token: &str, message: &str) -> Result<(), AppError> {
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.to_string(), message.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Mock observed-state store that records saves.
#[derive(Clone, Default)]
pub struct MockStore {
    pub saved: Arc<Mutex<Vec<Vec<Offer>>>>,
    initial: Arc<Mutex<Vec<Offer>>>,
    save_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store whose `load` returns `offers`.
    pub fn with_offers(offers: Vec<Offer>) -> Self {
        let store = Self::default();
        *store.initial.lock().unwrap() = offers;
        store
    }

    /// Store whose next `save` fails.
    pub fn with_save_error(error: AppError) -> Self {
        let store = Self::default();
        *store.save_error.lock().unwrap() = Some(error);
        store
    }

    pub fn save_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

impl ObservedStore for MockStore {
    async fn load(&self) -> Result<Vec<Offer>, AppError> {
        Ok(self.initial.lock().unwrap().clone())
    }

    async fn save(&self, offers: &[Offer]) -> Result<(), AppError> {
        if let Some(e) = self.save_error.lock().unwrap().take() {
            return Err(e);
        }
        self.saved.lock().unwrap().push(offers.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter recording the variant name of every event.
#[derive(Clone, Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == label)
            .count()
    }
}

impl SweepReporter for MockReporter {
    fn report(&self, event: SweepEvent<'_>) {
        let label = match event {
            SweepEvent::Started { .. } => "Started",
            SweepEvent::SourceChecked { .. } => "SourceChecked",
            SweepEvent::SourceFailed { .. } => "SourceFailed",
            SweepEvent::OfferClassified { .. } => "OfferClassified",
            SweepEvent::Completed { .. } => "Completed",
            SweepEvent::NotificationDelivered { .. } => "NotificationDelivered",
            SweepEvent::NotificationFailed { .. } => "NotificationFailed",
            SweepEvent::NoSubscribers { .. } => "NoSubscribers",
            SweepEvent::SnapshotFailed { .. } => "SnapshotFailed",
            SweepEvent::Restored { subscribers: 0, .. } => "RestoredWithoutSubscribers",
            SweepEvent::Restored { .. } => "Restored",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Rebuild an equivalent error so a mock can return it more than once.
fn replicate(error: &AppError) -> AppError {
    match error {
        AppError::HttpError(m) => AppError::HttpError(m.clone()),
        AppError::Timeout(s) => AppError::Timeout(*s),
        AppError::NetworkError(m) => AppError::NetworkError(m.clone()),
        AppError::ParseError(m) => AppError::ParseError(m.clone()),
        AppError::DeliveryError {
            message,
            status_code,
        } => AppError::DeliveryError {
            message: message.clone(),
            status_code: *status_code,
        },
        AppError::Command(e) => AppError::Command(e.clone()),
        AppError::StorageError(m) => AppError::StorageError(m.clone()),
        AppError::SerializationError(e) => AppError::StorageError(e.to_string()),
        AppError::ConfigError(m) => AppError::ConfigError(m.clone()),
    }
}

/// A field match with a title and price.
pub fn deal(title: &str, price: &str) -> FieldMatch {
    FieldMatch {
        title: Some(title.into()),
        price: Some(price.into()),
        description: None,
    }
}
