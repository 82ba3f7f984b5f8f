use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::usecases::{CycleReport, PollCycleUseCase};

/// Delay before the first tick after `start`.
pub const STARTUP_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum TickOutcome {
    Completed(CycleReport),
    Failed { cycle: u64 },
    /// A previous cycle was still running; this tick was dropped.
    Skipped { cycle: u64 },
}

/// Fires the poll cycle on a fixed period with at most one cycle in flight.
///
/// Every tick advances the cycle counter, including skipped ones, so periodic
/// resets stay on schedule no matter how many ticks a slow cycle swallows.
pub struct Scheduler {
    cycle: Arc<PollCycleUseCase>,
    busy: AtomicBool,
    counter: AtomicU64,
    timer: Mutex<Option<Timer>>,
}

struct Timer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    pub fn new(cycle: Arc<PollCycleUseCase>) -> Self {
        Self {
            cycle,
            busy: AtomicBool::new(false),
            counter: AtomicU64::new(0),
            timer: Mutex::new(None),
        }
    }

    pub fn cycles(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .map(|t| t.as_ref().is_some_and(|t| !t.handle.is_finished()))
            .unwrap_or(false)
    }

    /// Starts the repeating timer. Returns false if it is already running;
    /// a stopped scheduler can be started again.
    pub fn start(self: &Arc<Self>, period: Duration) -> bool {
        let mut timer = match self.timer.lock() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        };
        if timer.is_some() {
            tracing::debug!("scheduler already started");
            return false;
        }

        let this = Arc::clone(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let startup = tokio::time::sleep(STARTUP_DELAY);
            tokio::pin!(startup);
            let mut started = false;

            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = &mut startup, if !started => {
                        started = true;
                        this.spawn_tick();
                    }
                    _ = interval.tick() => this.spawn_tick(),
                }
            }
            tracing::info!("scheduler stopped");
        });
        *timer = Some(Timer {
            cancel: token,
            handle,
        });

        tracing::info!(?period, "polling started");
        true
    }

    /// Cancels the timer. A cycle already in flight runs to completion.
    pub async fn stop(&self) {
        let timer = match self.timer.lock() {
            Ok(mut t) => t.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(timer) = timer {
            timer.cancel.cancel();
            let _ = timer.handle.await;
        }
    }

    fn spawn_tick(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.tick().await;
        });
    }

    /// Runs one cycle unless another is in flight.
    pub async fn tick(&self) -> TickOutcome {
        let cycle = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        // check-and-set in one step; no await between reading and flipping busy
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(cycle, "prior search in progress, skipping iteration");
            return TickOutcome::Skipped { cycle };
        }
        let _busy = BusyGuard(&self.busy);

        tracing::info!(cycle, "search iteration");
        let started = Instant::now();

        match self.cycle.execute(cycle).await {
            Ok(report) => {
                tracing::info!(
                    cycle,
                    keywords = report.keywords.len(),
                    matches = report.matches,
                    deliveries = report.deliveries,
                    elapsed = ?started.elapsed(),
                    "search iteration finished"
                );
                TickOutcome::Completed(report)
            }
            Err(e) => {
                tracing::error!(
                    cycle,
                    elapsed = ?started.elapsed(),
                    "search iteration failed: {e}"
                );
                TickOutcome::Failed { cycle }
            }
        }
    }
}
