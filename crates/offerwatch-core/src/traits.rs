use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{ExtractionRule, FieldMatch, Offer};

/// Fetches raw page content from a source location.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Selector-query primitive over fetched markup.
///
/// Returns one [`FieldMatch`] per element matching `rule.container`, each
/// field holding the text of the first descendant (in document order)
/// matched by any selector in its list. Validation and truncation happen in
/// [`OfferExtractor`](crate::extract::OfferExtractor).
pub trait MarkupExtractor: Send + Sync + Clone {
    fn select(&self, content: &str, rule: &ExtractionRule) -> Result<Vec<FieldMatch>, AppError>;
}

/// Delivers messages to a messaging channel.
pub trait Dispatcher: Send + Sync + Clone {
    /// Push a notification to a subscriber's delivery target.
    fn deliver(
        &self,
        target: &str,
        message: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Answer an inbound command using the channel's reply token.
    fn reply(
        &self,
        reply_token: &str,
        message: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Durable home for the change detector's observed state.
pub trait ObservedStore: Send + Sync + Clone {
    /// Load the last saved snapshot. An absent snapshot is an empty state.
    fn load(&self) -> impl Future<Output = Result<Vec<Offer>, AppError>> + Send;

    /// Replace the saved snapshot.
    fn save(&self, offers: &[Offer]) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// An ObservedStore that keeps nothing; state lives only in memory.
#[derive(Debug, Clone)]
pub struct NullStore;

impl ObservedStore for NullStore {
    async fn load(&self) -> Result<Vec<Offer>, AppError> {
        Ok(vec![])
    }

    async fn save(&self, _offers: &[Offer]) -> Result<(), AppError> {
        Ok(())
    }
}
