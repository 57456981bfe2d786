//! In-memory registries for monitored sources and notification subscribers.
//!
//! Both are plain values; callers share them behind an async lock so that
//! mutations are serialized (single writer at a time).

use serde::{Deserialize, Serialize};

use crate::models::Source;

/// Registered sources, in registration order, unique by name.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list, keeping the first entry for duplicate names.
    pub fn from_sources(sources: impl IntoIterator<Item = Source>) -> Self {
        let mut registry = Self::new();
        for source in sources {
            registry.add(source);
        }
        registry
    }

    /// Insert `source` unless its name is already registered.
    ///
    /// Returns `true` if the source was inserted. Re-adding an existing name
    /// is a no-op and keeps the originally registered location and rule.
    pub fn add(&mut self, source: Source) -> bool {
        if self.contains(&source.name) {
            return false;
        }
        self.sources.push(source);
        true
    }

    /// Remove the source whose name equals `name` (surrounding whitespace ignored).
    pub fn remove(&mut self, name: &str) -> bool {
        let name = name.trim();
        match self.sources.iter().position(|s| s.name == name) {
            Some(index) => {
                self.sources.remove(index);
                true
            }
            None => false,
        }
    }

    /// Names that contain, or are contained in, `fragment`.
    ///
    /// Used to suggest the intended source when an exact removal misses.
    pub fn suggest(&self, fragment: &str) -> Vec<String> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return vec![];
        }
        self.sources
            .iter()
            .filter(|s| s.name.contains(fragment) || fragment.contains(s.name.as_str()))
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn list(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// A recipient of sweep notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Identity of whoever subscribed (e.g. a LINE user id).
    pub id: String,
    /// Where the messaging channel should push notifications.
    pub target: String,
}

/// Explicit subscriber list, replacing any "last caller" ambient recipient.
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    subscribers: Vec<Subscriber>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` with `target`. Re-subscribing updates the target.
    ///
    /// Returns `true` if `id` was not subscribed before.
    pub fn subscribe(&mut self, id: impl Into<String>, target: impl Into<String>) -> bool {
        let id = id.into();
        let target = target.into();
        match self.subscribers.iter_mut().find(|s| s.id == id) {
            Some(existing) => {
                existing.target = target;
                false
            }
            None => {
                self.subscribers.push(Subscriber { id, target });
                true
            }
        }
    }

    pub fn unsubscribe(&mut self, id: &str) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn is_subscribed(&self, id: &str) -> bool {
        self.subscribers.iter().any(|s| s.id == id)
    }

    pub fn list(&self) -> &[Subscriber] {
        &self.subscribers
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
