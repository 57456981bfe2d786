use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Maximum length (in characters) of an offer title.
pub const MAX_TITLE_LEN: usize = 100;
/// Maximum length (in characters) of an offer price.
pub const MAX_PRICE_LEN: usize = 50;
/// Maximum length (in characters) of an offer description.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// CSS selectors describing where offers live on a source page.
///
/// `container` selects one element per candidate offer. Each field list is
/// matched as one selector group: the first descendant in document order
/// matching any of them supplies the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRule {
    pub container: String,
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub description: Vec<String>,
}

impl Default for ExtractionRule {
    fn default() -> Self {
        Self {
            container: ".promotion, .offer, .news, .package".to_string(),
            title: to_strings(&["h1", "h2", "h3", ".title", ".name"]),
            price: to_strings(&[".price", ".rate", ".cost", ".amount"]),
            description: to_strings(&[".description", ".detail", "p"]),
        }
    }
}

impl ExtractionRule {
    /// Default field selectors with a custom container selector.
    pub fn with_container(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Self::default()
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A monitored web source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Unique key within the registry.
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub rule: ExtractionRule,
}

impl Source {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            rule: ExtractionRule::default(),
        }
    }

    pub fn with_rule(mut self, rule: ExtractionRule) -> Self {
        self.rule = rule;
        self
    }
}

/// Raw field texts pulled from one container match, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMatch {
    pub title: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
}

/// One offer observed on a source during a sweep. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub source_name: String,
    pub title: String,
    pub price: Option<String>,
    pub description: Option<String>,
    pub source_location: String,
    pub observed_at: DateTime<Utc>,
}

impl Offer {
    pub fn fingerprint(&self) -> OfferFingerprint {
        OfferFingerprint::new(&self.source_name, &self.title)
    }
}

/// Identity of an offer across sweeps: source name plus normalized title.
///
/// Price and description are not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OfferFingerprint {
    pub source_name: String,
    pub title: String,
}

impl OfferFingerprint {
    pub fn new(source_name: &str, title: &str) -> Self {
        Self {
            source_name: source_name.trim().to_string(),
            title: truncate_chars(title.trim(), MAX_TITLE_LEN),
        }
    }
}

impl fmt::Display for OfferFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source_name, self.title)
    }
}

/// Truncate to at most `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// What started a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepTrigger {
    Scheduled,
    OnDemand,
    Startup,
}

impl SweepTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepTrigger::Scheduled => "scheduled",
            SweepTrigger::OnDemand => "on_demand",
            SweepTrigger::Startup => "startup",
        }
    }
}

impl fmt::Display for SweepTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A source that could not be checked during a sweep.
#[derive(Debug)]
pub struct SourceFailure {
    pub source_name: String,
    pub error: AppError,
}

/// Outcome of one full pass over the registry.
#[derive(Debug)]
pub struct SweepResult {
    pub id: Uuid,
    pub trigger: SweepTrigger,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Sources whose content was fetched and extracted.
    pub sources_checked: usize,
    /// NEW and CHANGED offers, in registration order.
    pub changed_offers: Vec<Offer>,
    pub failures: Vec<SourceFailure>,
}

impl SweepResult {
    pub fn has_changes(&self) -> bool {
        !self.changed_offers.is_empty()
    }

    pub fn summary(&self) -> SweepSummary {
        SweepSummary {
            id: self.id,
            trigger: self.trigger,
            completed_at: self.completed_at,
            sources_checked: self.sources_checked,
            changed_offers: self.changed_offers.len(),
            failures: self.failures.len(),
        }
    }
}

/// Counts-only view of a finished sweep, kept for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub id: Uuid,
    pub trigger: SweepTrigger,
    pub completed_at: DateTime<Utc>,
    pub sources_checked: usize,
    pub changed_offers: usize,
    pub failures: usize,
}
