use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;

use crate::application::usecases::NotificationDispatcher;
use crate::application::{AppError, AppResult, EngineConfig, ListingsSource, WatchRepository};
use crate::domain::{ActiveKeywords, Listing, Match, NoveltyTracker, ResetReason, Watch};

/// Summary of one executed cycle.
#[derive(Clone, Debug, Default)]
pub struct CycleReport {
    pub cycle: u64,
    pub keywords: Vec<String>,
    pub matches: usize,
    /// Watchers handed a notification; delivery itself completes in the background.
    pub deliveries: usize,
    pub reset: Option<ResetReason>,
    pub elapsed: Duration,
}

/// One poll-classify-notify iteration. Holds the novelty state across cycles;
/// callers must not run two cycles at once (the scheduler guarantees this).
///
/// Observed ids are committed before any notification goes out, and
/// deliveries run as detached tasks, so a stalled notifier never holds up
/// the cycle.
pub struct PollCycleUseCase {
    watches: Arc<dyn WatchRepository>,
    source: Arc<dyn ListingsSource>,
    dispatcher: Arc<NotificationDispatcher>,
    config: EngineConfig,
    tracker: Mutex<NoveltyTracker>,
    in_flight: TaskTracker,
}

impl PollCycleUseCase {
    pub fn new(
        watches: Arc<dyn WatchRepository>,
        source: Arc<dyn ListingsSource>,
        dispatcher: NotificationDispatcher,
        config: EngineConfig,
    ) -> Self {
        Self {
            watches,
            source,
            dispatcher: Arc::new(dispatcher),
            config,
            tracker: Mutex::new(NoveltyTracker::new()),
            in_flight: TaskTracker::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn seen_len(&self) -> usize {
        self.tracker.lock().map(|t| t.seen_len()).unwrap_or(0)
    }

    /// Number of notifications still being delivered.
    pub fn pending_deliveries(&self) -> usize {
        self.in_flight.len()
    }

    /// Waits until every delivery spawned so far has finished.
    pub async fn flush_deliveries(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }

    fn tracker(&self) -> AppResult<std::sync::MutexGuard<'_, NoveltyTracker>> {
        self.tracker
            .lock()
            .map_err(|_| AppError::Storage("novelty tracker lock poisoned".into()))
    }

    pub async fn execute(&self, cycle: u64) -> AppResult<CycleReport> {
        let started = Instant::now();
        let mut report = CycleReport {
            cycle,
            ..Default::default()
        };

        let watches = self.watches.list_watches().await?;
        if watches.is_empty() {
            tracing::info!(cycle, "no watches found, skipping search");
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        let keywords = ActiveKeywords::from_watches(&watches);
        report.keywords = keywords.to_vec();
        report.reset = self
            .tracker()?
            .begin_cycle(cycle, &keywords, self.config.clear_cycles_limit);
        if let Some(reason) = report.reset {
            tracing::info!(cycle, %reason, "seen listings cleared, searches refreshed");
        }

        if keywords.is_empty() {
            tracing::info!(cycle, "no keywords defined, skipping search");
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        let fetched = join_all(keywords.iter().map(|k| self.fetch_keyword(k))).await;

        let (matches, observed) = {
            let tracker = self.tracker()?;
            let mut matches: Vec<Match> = Vec::new();
            let mut observed: Vec<String> = Vec::new();
            for (keyword, listings) in keywords.iter().zip(&fetched) {
                let c = tracker.classify(keyword, listings);
                matches.extend(c.matches);
                observed.extend(c.observed);
            }
            (matches, observed)
        };
        report.matches = matches.len();

        if !self.tracker()?.commit(cycle, observed) {
            tracing::warn!(cycle, "a later cycle already committed, discarding observed ids");
        }

        for (watch, batch) in group_by_watch(&watches, &matches) {
            let dispatcher = Arc::clone(&self.dispatcher);
            let watch = watch.clone();
            self.in_flight.spawn(async move {
                dispatcher.deliver(&watch, &batch).await;
            });
            report.deliveries += 1;
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }

    async fn fetch_keyword(&self, keyword: &str) -> Vec<Listing> {
        match self.source.fetch(keyword).await {
            Ok(listings) => listings,
            Err(e) => {
                tracing::warn!(keyword, "search failed, treating as no results: {e}");
                Vec::new()
            }
        }
    }
}

/// Each watch gets every match produced by one of its keywords, in match order.
pub fn group_by_watch<'a>(
    watches: &'a [Watch],
    matches: &[Match],
) -> Vec<(&'a Watch, Vec<Match>)> {
    watches
        .iter()
        .filter_map(|w| {
            let batch: Vec<Match> = matches
                .iter()
                .filter(|m| w.tracks(&m.keyword))
                .cloned()
                .collect();
            (!batch.is_empty()).then_some((w, batch))
        })
        .collect()
}
