//! The single scheduling authority for sweeps.
//!
//! Scheduled ticks (cron expressions in a configured time-zone), on-demand
//! triggers and the one-off startup sweep all funnel into one task, so at
//! most one sweep is ever in flight.
//!
//! ```text
//! cron tick ─────┐
//! startup timer ─┼──> Scheduler task ──> SweepRunner::run_sweep (one at a time)
//! trigger() ─────┘  (channel of capacity 1: one queued, the rest coalesced)
//! ```

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{SweepResult, SweepSummary, SweepTrigger};
use crate::sweep::SweepReporter;

/// Anything that can run one full sweep.
pub trait SweepRunner: Send + Sync {
    fn run_sweep<R: SweepReporter>(
        &self,
        trigger: SweepTrigger,
        reporter: &R,
    ) -> impl Future<Output = SweepResult> + Send;
}

impl<T: SweepRunner> SweepRunner for Arc<T> {
    fn run_sweep<R: SweepReporter>(
        &self,
        trigger: SweepTrigger,
        reporter: &R,
    ) -> impl Future<Output = SweepResult> + Send {
        T::run_sweep(self, trigger, reporter)
    }
}

/// Parsed cron expressions evaluated in one time-zone.
#[derive(Debug, Clone)]
pub struct SweepSchedule {
    schedules: Vec<cron::Schedule>,
    timezone: Tz,
}

impl SweepSchedule {
    /// Parse cron expressions (with a seconds field, e.g. `0 0 8 * * *`).
    pub fn parse<S: AsRef<str>>(expressions: &[S], timezone: Tz) -> Result<Self, AppError> {
        let schedules = expressions
            .iter()
            .map(|expr| {
                let expr = expr.as_ref().trim();
                cron::Schedule::from_str(expr).map_err(|e| {
                    AppError::ConfigError(format!("Invalid cron expression '{expr}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            schedules,
            timezone,
        })
    }

    /// A schedule that never ticks; only triggers start sweeps.
    pub fn manual_only(timezone: Tz) -> Self {
        Self {
            schedules: vec![],
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Earliest tick strictly after `now`, across all expressions.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = now.with_timezone(&self.timezone);
        self.schedules
            .iter()
            .filter_map(|s| s.after(&local).next())
            .map(|t| t.with_timezone(&Utc))
            .min()
    }

    /// Local `HH:MM` tick times within 24 hours of `now`, sorted.
    pub fn daily_times(&self, now: DateTime<Utc>) -> Vec<String> {
        let local = now.with_timezone(&self.timezone);
        let horizon = local + chrono::Duration::hours(24);
        let mut times: Vec<String> = self
            .schedules
            .iter()
            .flat_map(|s| s.after(&local).take_while(|t| *t <= horizon).take(24))
            .map(|t| t.format("%H:%M").to_string())
            .collect();
        times.sort();
        times.dedup();
        times
    }

    /// Human-readable description for help and status replies.
    pub fn describe(&self, now: DateTime<Utc>) -> String {
        let times = self.daily_times(now);
        if times.is_empty() {
            "僅手動檢查".to_string()
        } else {
            format!("每天 {} ({})", times.join(", "), self.timezone)
        }
    }
}

/// What happened to an on-demand trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// No sweep was running; one starts now.
    Accepted,
    /// A sweep is running; one more will run right after it.
    Queued,
    /// A sweep is already queued; this trigger merged into it.
    Coalesced,
    /// The scheduler is no longer running.
    Stopped,
}

#[derive(Debug)]
struct SchedulerState {
    running: AtomicBool,
    last_sweep: RwLock<Option<SweepSummary>>,
    schedule: SweepSchedule,
}

/// Cloneable handle for triggering sweeps and reading scheduler status.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SweepTrigger>,
    state: Arc<SchedulerState>,
}

impl SchedulerHandle {
    /// Request an immediate sweep.
    pub fn trigger(&self) -> TriggerOutcome {
        let running = self.is_running();
        match self.tx.try_send(SweepTrigger::OnDemand) {
            Ok(()) if running => TriggerOutcome::Queued,
            Ok(()) => TriggerOutcome::Accepted,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::info!("Sweep already pending, trigger coalesced");
                TriggerOutcome::Coalesced
            }
            Err(mpsc::error::TrySendError::Closed(_)) => TriggerOutcome::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub async fn last_sweep(&self) -> Option<SweepSummary> {
        self.state.last_sweep.read().await.clone()
    }

    pub fn schedule(&self) -> &SweepSchedule {
        &self.state.schedule
    }

    pub fn next_tick(&self) -> Option<DateTime<Utc>> {
        self.state.schedule.next_after(Utc::now())
    }
}

/// Owns the sweep loop. Create with [`Scheduler::new`], then `run` it on a task.
pub struct Scheduler<R: SweepRunner> {
    runner: R,
    rx: mpsc::Receiver<SweepTrigger>,
    state: Arc<SchedulerState>,
    startup_delay: Option<Duration>,
}

impl<R: SweepRunner> Scheduler<R> {
    pub fn new(runner: R, schedule: SweepSchedule) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(1);
        let state = Arc::new(SchedulerState {
            running: AtomicBool::new(false),
            last_sweep: RwLock::new(None),
            schedule,
        });
        let scheduler = Self {
            runner,
            rx,
            state: Arc::clone(&state),
            startup_delay: None,
        };
        (scheduler, SchedulerHandle { tx, state })
    }

    /// Run one sweep this long after the scheduler starts.
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = Some(delay);
        self
    }

    /// Run until cancellation. An in-flight sweep always runs to completion.
    pub async fn run<WR: SweepReporter>(mut self, cancel_token: CancellationToken, reporter: &WR) {
        tracing::info!(
            schedule = %self.state.schedule.describe(Utc::now()),
            startup_delay_secs = ?self.startup_delay.map(|d| d.as_secs()),
            "Scheduler started"
        );

        let startup = tokio::time::sleep(self.startup_delay.unwrap_or_default());
        tokio::pin!(startup);
        let mut startup_pending = self.startup_delay.is_some();

        loop {
            let next_tick = self.state.schedule.next_after(Utc::now());

            let trigger = tokio::select! {
                () = cancel_token.cancelled() => break,
                () = &mut startup, if startup_pending => {
                    startup_pending = false;
                    SweepTrigger::Startup
                }
                () = sleep_until(next_tick) => SweepTrigger::Scheduled,
                Some(trigger) = self.rx.recv() => trigger,
            };

            self.execute(trigger, reporter).await;
        }

        self.rx.close();
        tracing::info!("Scheduler stopped");
    }

    async fn execute<WR: SweepReporter>(&self, trigger: SweepTrigger, reporter: &WR) {
        self.state.running.store(true, Ordering::SeqCst);
        let result = self.runner.run_sweep(trigger, reporter).await;
        *self.state.last_sweep.write().await = Some(result.summary());
        self.state.running.store(false, Ordering::SeqCst);
    }
}

async fn sleep_until(at: Option<DateTime<Utc>>) {
    match at {
        Some(at) => {
            let wait = (at - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
        }
        None => std::future::pending().await,
    }
}
