pub mod command;
pub mod config;
pub mod detector;
pub mod error;
pub mod extract;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod registry;
pub mod scheduler;
pub mod snapshot;
pub mod sweep;
pub mod throttle;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use error::AppError;
pub use models::{ExtractionRule, FieldMatch, Offer, OfferFingerprint, Source, SweepTrigger};
pub use monitor::{Caller, CommandHandler, Monitor, MonitorState, MonitorStatus};
pub use traits::{Dispatcher, Fetcher, MarkupExtractor, NullStore, ObservedStore};
