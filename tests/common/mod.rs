#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use listingpulse::application::usecases::{CycleReport, NotificationDispatcher, PollCycleUseCase};
use listingpulse::application::{
    AppError, AppResult, EngineConfig, Notification, Notifier, WatchRepository,
};
use listingpulse::domain::{Listing, PushSubscription, Watch};
use listingpulse::infrastructure::{
    memory_store::InMemoryWatchRepository, scripted_source::ScriptedListingsSource,
};

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail_for: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, email: &str) {
        self.fail_for.lock().unwrap().push(email.to_string());
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, email: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.recipient == email)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> AppResult<()> {
        if self.fail_for.lock().unwrap().contains(&notification.recipient) {
            return Err(AppError::Notifier("smtp down".into()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Notifier whose deliveries never complete.
pub struct StalledNotifier;

#[async_trait]
impl Notifier for StalledNotifier {
    async fn notify(&self, _notification: &Notification) -> AppResult<()> {
        std::future::pending().await
    }
}

pub fn listing(id: &str, created: i64) -> Listing {
    Listing::new(id, format!("item {id}"), created)
}

pub fn watch(email: &str, keywords: &[&str]) -> Watch {
    Watch::with_keywords(email, keywords.iter().copied())
}

pub struct Harness {
    pub repo: InMemoryWatchRepository,
    pub source: ScriptedListingsSource,
    pub notifier: RecordingNotifier,
    pub cycle: Arc<PollCycleUseCase>,
}

impl Harness {
    /// Runs one cycle and waits for its notifications to land.
    pub async fn run(&self, cycle: u64) -> CycleReport {
        let report = self.cycle.execute(cycle).await.unwrap();
        self.cycle.flush_deliveries().await;
        report
    }
}

pub fn harness(watches: Vec<Watch>, config: EngineConfig) -> Harness {
    let repo = InMemoryWatchRepository::new(watches);
    let source = ScriptedListingsSource::new();
    let notifier = RecordingNotifier::new();
    let dispatcher = NotificationDispatcher::new(
        Arc::new(notifier.clone()),
        config.max_matches_per_notification,
    );
    let cycle = Arc::new(PollCycleUseCase::new(
        Arc::new(repo.clone()),
        Arc::new(source.clone()),
        dispatcher,
        config,
    ));
    Harness {
        repo,
        source,
        notifier,
        cycle,
    }
}

/// Repository whose reads can be switched to fail.
pub struct FlakyWatches {
    inner: InMemoryWatchRepository,
    failing: AtomicBool,
}

impl FlakyWatches {
    pub fn new(watches: Vec<Watch>) -> Self {
        Self {
            inner: InMemoryWatchRepository::new(watches),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl WatchRepository for FlakyWatches {
    async fn list_watches(&self) -> AppResult<Vec<Watch>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Storage("disk unavailable".into()));
        }
        self.inner.list_watches().await
    }
    async fn get_watch(&self, email: &str) -> AppResult<Watch> {
        self.inner.get_watch(email).await
    }
    async fn create_watch(&self, email: &str) -> AppResult<Watch> {
        self.inner.create_watch(email).await
    }
    async fn remove_watch(&self, email: &str) -> AppResult<()> {
        self.inner.remove_watch(email).await
    }
    async fn add_keyword(&self, email: &str, keyword: &str) -> AppResult<Watch> {
        self.inner.add_keyword(email, keyword).await
    }
    async fn remove_keyword(&self, email: &str, keyword: &str) -> AppResult<Watch> {
        self.inner.remove_keyword(email, keyword).await
    }
    async fn set_keywords(&self, email: &str, keywords: Vec<String>) -> AppResult<Watch> {
        self.inner.set_keywords(email, keywords).await
    }
    async fn set_subscription(
        &self,
        email: &str,
        subscription: Option<PushSubscription>,
    ) -> AppResult<Watch> {
        self.inner.set_subscription(email, subscription).await
    }
    async fn reset_watches(&self) -> AppResult<()> {
        self.inner.reset_watches().await
    }
}
