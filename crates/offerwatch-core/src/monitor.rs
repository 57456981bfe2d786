//! The orchestrator: registry, detector and subscribers composed with the
//! injected collaborators, plus the command surface that drives them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::command::{self, Command};
use crate::detector::ChangeDetector;
use crate::error::AppError;
use crate::models::{Source, SweepResult, SweepSummary, SweepTrigger};
use crate::notify::NotificationBatcher;
use crate::registry::{SourceRegistry, Subscriber, SubscriberRegistry};
use crate::scheduler::{SchedulerHandle, SweepRunner, TriggerOutcome};
use crate::sweep::{SweepEvent, SweepReporter, SweepService};
use crate::traits::{Dispatcher, Fetcher, MarkupExtractor, ObservedStore};

/// Mutable state shared between the sweep and the command surface.
#[derive(Debug, Default)]
pub struct MonitorState {
    sources: RwLock<SourceRegistry>,
    detector: Mutex<ChangeDetector>,
    subscribers: RwLock<SubscriberRegistry>,
}

impl MonitorState {
    pub fn new(sources: SourceRegistry, subscribers: SubscriberRegistry) -> Self {
        Self {
            sources: RwLock::new(sources),
            detector: Mutex::new(ChangeDetector::new()),
            subscribers: RwLock::new(subscribers),
        }
    }

    /// Returns `false` when the name is already registered.
    pub async fn add_source(&self, source: Source) -> bool {
        self.sources.write().await.add(source)
    }

    pub async fn remove_source(&self, name: &str) -> bool {
        self.sources.write().await.remove(name)
    }

    pub async fn suggest_sources(&self, fragment: &str) -> Vec<String> {
        self.sources.read().await.suggest(fragment)
    }

    /// Copy of the registry in registration order.
    pub async fn sources(&self) -> Vec<Source> {
        self.sources.read().await.list().to_vec()
    }

    pub async fn source_count(&self) -> usize {
        self.sources.read().await.len()
    }

    pub async fn observed_count(&self) -> usize {
        self.detector.lock().await.observed_count()
    }

    pub async fn subscribe(&self, id: &str, target: &str) -> bool {
        self.subscribers.write().await.subscribe(id, target)
    }

    pub async fn unsubscribe(&self, id: &str) -> bool {
        self.subscribers.write().await.unsubscribe(id)
    }

    pub async fn subscribers(&self) -> Vec<Subscriber> {
        self.subscribers.read().await.list().to_vec()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

/// Point-in-time status of the monitor.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub sources: usize,
    pub observed_offers: usize,
    pub subscribers: usize,
    pub schedule: String,
    pub sweep_running: bool,
    pub next_sweep_at: Option<DateTime<Utc>>,
    pub last_sweep: Option<SweepSummary>,
}

/// Runs sweeps against shared state and delivers the resulting notification.
pub struct Monitor<F, M, D, S>
where
    F: Fetcher,
    M: MarkupExtractor,
    D: Dispatcher,
    S: ObservedStore,
{
    state: Arc<MonitorState>,
    sweep: SweepService<F, M>,
    dispatcher: D,
    store: S,
    batcher: NotificationBatcher,
}

impl<F, M, D, S> Monitor<F, M, D, S>
where
    F: Fetcher,
    M: MarkupExtractor,
    D: Dispatcher,
    S: ObservedStore,
{
    pub fn new(
        state: Arc<MonitorState>,
        sweep: SweepService<F, M>,
        dispatcher: D,
        store: S,
        batcher: NotificationBatcher,
    ) -> Self {
        Self {
            state,
            sweep,
            dispatcher,
            store,
            batcher,
        }
    }

    pub fn state(&self) -> &Arc<MonitorState> {
        &self.state
    }

    /// Load the persisted observed state into the detector.
    ///
    /// Subscribers live only in memory, so the report carries how many are
    /// registered at startup. Returns how many offers were restored.
    pub async fn restore<R: SweepReporter>(&self, reporter: &R) -> Result<usize, AppError> {
        let offers = self.store.load().await?;
        let count = offers.len();
        self.state.detector.lock().await.restore(offers);
        reporter.report(SweepEvent::Restored {
            offers: count,
            subscribers: self.state.subscriber_count().await,
        });
        Ok(count)
    }

    async fn notify<R: SweepReporter>(&self, result: &SweepResult, message: &str, reporter: &R) {
        let subscribers = self.state.subscribers().await;
        if subscribers.is_empty() {
            reporter.report(SweepEvent::NoSubscribers {
                sweep_id: result.id,
            });
            return;
        }

        for subscriber in &subscribers {
            match self.dispatcher.deliver(&subscriber.target, message).await {
                Ok(()) => reporter.report(SweepEvent::NotificationDelivered {
                    sweep_id: result.id,
                    subscriber: &subscriber.id,
                }),
                Err(error) => reporter.report(SweepEvent::NotificationFailed {
                    sweep_id: result.id,
                    subscriber: &subscriber.id,
                    error: &error,
                }),
            }
        }
    }

    async fn persist<R: SweepReporter>(&self, reporter: &R) {
        let snapshot = self.state.detector.lock().await.snapshot();
        if let Err(error) = self.store.save(&snapshot).await {
            reporter.report(SweepEvent::SnapshotFailed { error: &error });
        }
    }
}

impl<F, M, D, S> SweepRunner for Monitor<F, M, D, S>
where
    F: Fetcher,
    M: MarkupExtractor,
    D: Dispatcher,
    S: ObservedStore,
{
    async fn run_sweep<R: SweepReporter>(&self, trigger: SweepTrigger, reporter: &R) -> SweepResult {
        let sources = self.state.sources().await;
        let result = self
            .sweep
            .run(&sources, &self.state.detector, trigger, reporter)
            .await;

        if let Some(message) = self
            .batcher
            .format(&result.changed_offers, result.completed_at)
        {
            self.notify(&result, &message, reporter).await;
        }

        if result.has_changes() {
            self.persist(reporter).await;
        }
        result
    }
}

/// Who sent a command: a stable id and where to deliver notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub target: String,
}

impl Caller {
    /// A caller whose delivery target is its own id (LINE user ids work this way).
    pub fn user(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            target: id.clone(),
            id,
        }
    }
}

/// Executes chat and admin commands against shared state.
#[derive(Clone)]
pub struct CommandHandler {
    state: Arc<MonitorState>,
    scheduler: SchedulerHandle,
}

impl CommandHandler {
    pub fn new(state: Arc<MonitorState>, scheduler: SchedulerHandle) -> Self {
        Self { state, scheduler }
    }

    pub fn state(&self) -> &Arc<MonitorState> {
        &self.state
    }

    /// Parse and run a chat message. `None` means the text is not a command.
    pub async fn handle_text(&self, text: &str, caller: Option<&Caller>) -> Option<String> {
        match command::parse(text) {
            Ok(Some(cmd)) => Some(self.execute(cmd, caller).await),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed command");
                Some(e.user_message())
            }
        }
    }

    /// Run a parsed command and render the reply.
    pub async fn execute(&self, cmd: Command, caller: Option<&Caller>) -> String {
        tracing::info!(command = ?cmd, caller = ?caller.map(|c| &c.id), "Executing command");
        match cmd {
            Command::Add { name, url } => {
                if self.state.add_source(Source::new(&name, &url)).await {
                    format!("✅ 已加入「{name}」的監控\n🔗 {url}")
                } else {
                    format!("⚠️ 「{name}」已在監控清單中")
                }
            }
            Command::Remove { name } => {
                if self.state.remove_source(&name).await {
                    return format!("✅ 已移除「{name}」的監控");
                }
                let suggestions = self.state.suggest_sources(&name).await;
                if suggestions.is_empty() {
                    format!("❌ 找不到「{name}」")
                } else {
                    format!(
                        "❌ 找不到「{name}」\n您是不是要找：\n{}",
                        suggestions
                            .iter()
                            .map(|s| format!("• {s}"))
                            .collect::<Vec<_>>()
                            .join("\n")
                    )
                }
            }
            Command::List => self.render_list().await,
            Command::Check => match self.trigger_sweep() {
                TriggerOutcome::Accepted => "🔍 開始檢查飯店優惠，請稍候...".to_string(),
                TriggerOutcome::Queued | TriggerOutcome::Coalesced => {
                    "⏳ 檢查正在進行中，完成後會再檢查一次".to_string()
                }
                TriggerOutcome::Stopped => "❌ 排程器已停止，無法檢查".to_string(),
            },
            Command::Help => command::help_text(&self.scheduler.schedule().describe(Utc::now())),
            Command::Status => self.render_status().await,
            Command::Subscribe => match caller {
                Some(caller) => {
                    if self.state.subscribe(&caller.id, &caller.target).await {
                        "🔔 已訂閱優惠通知".to_string()
                    } else {
                        "🔔 您已經訂閱優惠通知".to_string()
                    }
                }
                None => "❌ 無法辨識訂閱者".to_string(),
            },
            Command::Unsubscribe => match caller {
                Some(caller) if self.state.unsubscribe(&caller.id).await => {
                    "🔕 已取消訂閱優惠通知".to_string()
                }
                Some(_) => "🔕 您尚未訂閱優惠通知".to_string(),
                None => "❌ 無法辨識訂閱者".to_string(),
            },
        }
    }

    pub fn trigger_sweep(&self) -> TriggerOutcome {
        self.scheduler.trigger()
    }

    pub async fn status(&self) -> MonitorStatus {
        MonitorStatus {
            sources: self.state.source_count().await,
            observed_offers: self.state.observed_count().await,
            subscribers: self.state.subscriber_count().await,
            schedule: self.scheduler.schedule().describe(Utc::now()),
            sweep_running: self.scheduler.is_running(),
            next_sweep_at: self.scheduler.next_tick(),
            last_sweep: self.scheduler.last_sweep().await,
        }
    }

    async fn render_list(&self) -> String {
        let sources = self.state.sources().await;
        let mut list = String::from("🏨 目前監控的飯店清單：\n\n");
        for (index, source) in sources.iter().enumerate() {
            list.push_str(&format!("{}. {}\n", index + 1, source.name));
        }
        list.push_str(&format!("\n📊 總共監控 {} 家飯店", sources.len()));
        list
    }

    async fn render_status(&self) -> String {
        let status = self.status().await;
        let mut reply = format!(
            "📊 系統狀態報告\n\n\
             🏨 監控飯店數量：{} 家\n\
             📝 優惠記錄數量：{} 筆\n\
             🔔 訂閱人數：{} 人\n\
             ⏰ 自動檢查時間：{}\n",
            status.sources, status.observed_offers, status.subscribers, status.schedule
        );
        if status.sweep_running {
            reply.push_str("🔍 正在檢查中\n");
        }
        if let Some(last) = &status.last_sweep {
            reply.push_str(&format!(
                "🕑 上次檢查：{} 家成功、{} 家失敗、{} 個新優惠\n",
                last.sources_checked, last.failures, last.changed_offers
            ));
        }
        reply.push_str("🤖 系統運行正常");
        reply
    }
}
