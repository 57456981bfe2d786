use std::collections::HashMap;
use std::fmt;

use crate::models::{Offer, OfferFingerprint};

/// Outcome of comparing an offer with the observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Fingerprint never seen before.
    New,
    /// Seen before with a different price.
    Changed,
    /// Seen before with the same price.
    Unchanged,
}

impl Classification {
    /// NEW and CHANGED offers are worth notifying about.
    pub fn is_notable(&self) -> bool {
        !matches!(self, Classification::Unchanged)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::New => write!(f, "new"),
            Classification::Changed => write!(f, "changed"),
            Classification::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Decides NEW / CHANGED / UNCHANGED and owns the last-seen offer per fingerprint.
///
/// Only price participates in the comparison. Entries never expire: an offer
/// that disappears from its source stays in the state indefinitely.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    observed: HashMap<OfferFingerprint, Offer>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `offer` and record it when it is NEW or CHANGED.
    ///
    /// State is updated before returning, so classifying the same offer a
    /// second time reports UNCHANGED. Call at most once per offer per sweep.
    pub fn classify(&mut self, offer: &Offer) -> Classification {
        let fingerprint = offer.fingerprint();
        let classification = match self.observed.get(&fingerprint) {
            None => Classification::New,
            Some(stored) if stored.price != offer.price => Classification::Changed,
            Some(_) => Classification::Unchanged,
        };

        if classification.is_notable() {
            self.observed.insert(fingerprint, offer.clone());
        }
        classification
    }

    /// Last-seen offer for a fingerprint.
    pub fn get(&self, fingerprint: &OfferFingerprint) -> Option<&Offer> {
        self.observed.get(fingerprint)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// All last-seen offers, ordered by fingerprint.
    pub fn snapshot(&self) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self.observed.values().cloned().collect();
        offers.sort_by(|a, b| a.fingerprint().cmp(&b.fingerprint()));
        offers
    }

    /// Replace the observed state with a previously saved snapshot.
    ///
    /// If the snapshot holds several offers with the same fingerprint, the
    /// last one wins.
    pub fn restore(&mut self, offers: Vec<Offer>) {
        self.observed = offers
            .into_iter()
            .map(|offer| (offer.fingerprint(), offer))
            .collect();
    }
}
