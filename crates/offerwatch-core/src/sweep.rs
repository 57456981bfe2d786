use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::detector::{ChangeDetector, Classification};
use crate::error::AppError;
use crate::extract::OfferExtractor;
use crate::models::{Offer, Source, SourceFailure, SweepResult, SweepTrigger};
use crate::throttle::ThrottleConfig;
use crate::traits::{Fetcher, MarkupExtractor};

/// Default per-source fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Events emitted during a sweep for monitoring/logging.
#[derive(Debug, Clone)]
pub enum SweepEvent<'a> {
    Started {
        sweep_id: Uuid,
        trigger: SweepTrigger,
        sources: usize,
    },
    SourceChecked {
        sweep_id: Uuid,
        source: &'a str,
        offers: usize,
        notable: usize,
    },
    SourceFailed {
        sweep_id: Uuid,
        source: &'a str,
        error: &'a AppError,
    },
    OfferClassified {
        offer: &'a Offer,
        classification: Classification,
    },
    Completed {
        result: &'a SweepResult,
    },
    NotificationDelivered {
        sweep_id: Uuid,
        subscriber: &'a str,
    },
    NotificationFailed {
        sweep_id: Uuid,
        subscriber: &'a str,
        error: &'a AppError,
    },
    NoSubscribers {
        sweep_id: Uuid,
    },
    SnapshotFailed {
        error: &'a AppError,
    },
    Restored {
        offers: usize,
        subscribers: usize,
    },
}

/// Trait for receiving sweep events (decoupled logging).
pub trait SweepReporter: Send + Sync {
    fn report(&self, event: SweepEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSweepReporter;

impl SweepReporter for TracingSweepReporter {
    fn report(&self, event: SweepEvent<'_>) {
        match event {
            SweepEvent::Started {
                sweep_id,
                trigger,
                sources,
            } => {
                tracing::info!(%sweep_id, %trigger, %sources, "Sweep started");
            }
            SweepEvent::SourceChecked {
                sweep_id,
                source,
                offers,
                notable,
            } => {
                tracing::info!(%sweep_id, %source, %offers, %notable, "Source checked");
            }
            SweepEvent::SourceFailed {
                sweep_id,
                source,
                error,
            } => {
                tracing::warn!(%sweep_id, %source, kind = error.kind(), %error, "Source failed");
            }
            SweepEvent::OfferClassified {
                offer,
                classification,
            } => {
                if classification.is_notable() {
                    tracing::info!(
                        source = %offer.source_name,
                        title = %offer.title,
                        price = ?offer.price,
                        %classification,
                        "Offer classified"
                    );
                } else {
                    tracing::debug!(
                        source = %offer.source_name,
                        title = %offer.title,
                        "Offer unchanged"
                    );
                }
            }
            SweepEvent::Completed { result } => {
                tracing::info!(
                    sweep_id = %result.id,
                    trigger = %result.trigger,
                    checked = result.sources_checked,
                    changed = result.changed_offers.len(),
                    failures = result.failures.len(),
                    "Sweep completed"
                );
            }
            SweepEvent::NotificationDelivered {
                sweep_id,
                subscriber,
            } => {
                tracing::info!(%sweep_id, %subscriber, "Notification delivered");
            }
            SweepEvent::NotificationFailed {
                sweep_id,
                subscriber,
                error,
            } => {
                tracing::error!(%sweep_id, %subscriber, %error, "Notification delivery failed");
            }
            SweepEvent::NoSubscribers { sweep_id } => {
                tracing::warn!(%sweep_id, "No subscribers registered, notification dropped");
            }
            SweepEvent::SnapshotFailed { error } => {
                tracing::error!(%error, "Failed to persist observed state");
            }
            SweepEvent::Restored {
                offers,
                subscribers,
            } => {
                tracing::info!(offers, subscribers, "Observed state restored");
                if subscribers == 0 {
                    tracing::warn!(
                        "No subscribers registered; changes will be recorded without notification"
                    );
                }
            }
        }
    }
}

/// Runs one sweep: fetch → extract → classify for every source, in order.
///
/// Sources are visited strictly one at a time with a pause between them.
/// A failing source is recorded and skipped; it never aborts the sweep.
#[derive(Clone)]
pub struct SweepService<F, M>
where
    F: Fetcher,
    M: MarkupExtractor,
{
    fetcher: F,
    extractor: OfferExtractor<M>,
    throttle: ThrottleConfig,
    fetch_timeout: Duration,
}

impl<F, M> SweepService<F, M>
where
    F: Fetcher,
    M: MarkupExtractor,
{
    pub fn new(fetcher: F, markup: M) -> Self {
        Self {
            fetcher,
            extractor: OfferExtractor::new(markup),
            throttle: ThrottleConfig::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Sweep `sources` against the detector's observed state.
    pub async fn run<R: SweepReporter>(
        &self,
        sources: &[Source],
        detector: &Mutex<ChangeDetector>,
        trigger: SweepTrigger,
        reporter: &R,
    ) -> SweepResult {
        let sweep_id = Uuid::new_v4();
        let started_at = Utc::now();
        reporter.report(SweepEvent::Started {
            sweep_id,
            trigger,
            sources: sources.len(),
        });

        let mut changed_offers = Vec::new();
        let mut failures = Vec::new();
        let mut sources_checked = 0;

        for (index, source) in sources.iter().enumerate() {
            match self.check_source(source).await {
                Ok(offers) => {
                    let total = offers.len();
                    let notable = self
                        .classify_all(offers, detector, reporter, &mut changed_offers)
                        .await;
                    sources_checked += 1;
                    reporter.report(SweepEvent::SourceChecked {
                        sweep_id,
                        source: &source.name,
                        offers: total,
                        notable,
                    });
                }
                Err(error) => {
                    reporter.report(SweepEvent::SourceFailed {
                        sweep_id,
                        source: &source.name,
                        error: &error,
                    });
                    failures.push(SourceFailure {
                        source_name: source.name.clone(),
                        error,
                    });
                }
            }

            if index + 1 < sources.len() {
                self.throttle.pause().await;
            }
        }

        let result = SweepResult {
            id: sweep_id,
            trigger,
            started_at,
            completed_at: Utc::now(),
            sources_checked,
            changed_offers,
            failures,
        };
        reporter.report(SweepEvent::Completed { result: &result });
        result
    }

    /// Fetch and extract one source, bounded by the fetch timeout.
    async fn check_source(&self, source: &Source) -> Result<Vec<Offer>, AppError> {
        tracing::debug!(source = %source.name, url = %source.location, "Fetching source");
        let content = tokio::time::timeout(
            self.fetch_timeout,
            self.fetcher.fetch(&source.location, self.fetch_timeout),
        )
        .await
        .map_err(|_| AppError::Timeout(self.fetch_timeout.as_secs()))??;

        self.extractor.extract(source, &content)
    }

    /// Classify each offer once; returns how many were NEW or CHANGED.
    async fn classify_all<R: SweepReporter>(
        &self,
        offers: Vec<Offer>,
        detector: &Mutex<ChangeDetector>,
        reporter: &R,
        changed: &mut Vec<Offer>,
    ) -> usize {
        let mut notable = 0;
        let mut detector = detector.lock().await;
        for offer in offers {
            let classification = detector.classify(&offer);
            reporter.report(SweepEvent::OfferClassified {
                offer: &offer,
                classification,
            });
            if classification.is_notable() {
                notable += 1;
                changed.push(offer);
            }
        }
        notable
    }
}
