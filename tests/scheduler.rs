mod common;

use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

use common::{FlakyWatches, RecordingNotifier, StalledNotifier, harness, listing, watch};
use listingpulse::application::EngineConfig;
use listingpulse::application::scheduler::{Scheduler, TickOutcome};
use listingpulse::application::usecases::{NotificationDispatcher, PollCycleUseCase};
use listingpulse::domain::ResetReason;
use listingpulse::infrastructure::memory_store::InMemoryWatchRepository;
use listingpulse::infrastructure::scripted_source::ScriptedListingsSource;

#[tokio::test(start_paused = true)]
async fn overlapping_tick_is_skipped_but_counted() {
    let h = harness(vec![watch("a@example.com", &["kw"])], EngineConfig::default());
    h.source
        .push_delayed("kw", vec![listing("m1", 10)], Duration::from_secs(3));
    let scheduler = Scheduler::new(h.cycle.clone());

    let (first, second) = tokio::join!(scheduler.tick(), scheduler.tick());

    assert!(matches!(first, TickOutcome::Completed(ref r) if r.cycle == 1));
    assert!(matches!(second, TickOutcome::Skipped { cycle: 2 }));
    assert_eq!(scheduler.cycles(), 2);
    assert_eq!(h.source.calls(), 1);
    assert!(!scheduler.is_busy());

    // the guard is released, the next tick runs
    assert!(matches!(scheduler.tick().await, TickOutcome::Completed(_)));
    assert_eq!(h.source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_cycle_releases_busy_flag() {
    let watches = Arc::new(FlakyWatches::new(vec![watch("a@example.com", &["kw"])]));
    watches.set_failing(true);
    let source = ScriptedListingsSource::new();
    let cycle = Arc::new(PollCycleUseCase::new(
        watches.clone(),
        Arc::new(source.clone()),
        NotificationDispatcher::new(Arc::new(RecordingNotifier::new()), 10),
        EngineConfig::default(),
    ));
    let scheduler = Scheduler::new(cycle);

    assert!(matches!(scheduler.tick().await, TickOutcome::Failed { cycle: 1 }));
    assert!(!scheduler.is_busy());

    watches.set_failing(false);
    assert!(matches!(scheduler.tick().await, TickOutcome::Completed(_)));
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn timer_fires_after_startup_delay_and_then_every_period() {
    let h = harness(vec![watch("a@example.com", &["kw"])], EngineConfig::default());
    h.source.push("kw", vec![listing("m1", 10)]);
    let scheduler = Arc::new(Scheduler::new(h.cycle.clone()));

    assert!(scheduler.start(Duration::from_secs(10)));
    assert!(!scheduler.start(Duration::from_secs(10)));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(scheduler.cycles(), 0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.cycles(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(scheduler.cycles(), 2);
    assert_eq!(h.source.calls(), 2);

    scheduler.stop().await;
    assert!(!scheduler.is_running());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(scheduler.cycles(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_cycle_swallows_ticks_without_fetching() {
    let h = harness(vec![watch("a@example.com", &["kw"])], EngineConfig::default());
    // every fetch takes 7s against a 5s period
    h.source
        .push_delayed("kw", vec![listing("m1", 10)], Duration::from_secs(7));
    let scheduler = Arc::new(Scheduler::new(h.cycle.clone()));
    scheduler.start(Duration::from_secs(5));

    // t=1 tick 1 starts (busy until t=8), t=5 tick 2 is skipped
    tokio::time::sleep(Duration::from_millis(9_500)).await;
    assert_eq!(scheduler.cycles(), 2);
    assert_eq!(h.source.calls(), 1);
    assert!(!scheduler.is_busy());

    // t=10 tick 3 runs
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.cycles(), 3);
    assert_eq!(h.source.calls(), 2);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn skipped_ticks_count_toward_periodic_reset() {
    let config = EngineConfig {
        clear_cycles_limit: NonZeroU64::new(3),
        ..EngineConfig::default()
    };
    let h = harness(vec![watch("a@example.com", &["kw"])], config);
    h.source
        .push_delayed("kw", vec![listing("m1", 10)], Duration::from_secs(3))
        .push("kw", vec![listing("m2", 20), listing("m1", 10)])
        .push(
            "kw",
            vec![listing("m3", 30), listing("m2", 20), listing("m1", 10)],
        );
    let scheduler = Scheduler::new(h.cycle.clone());

    let (first, second) = tokio::join!(scheduler.tick(), scheduler.tick());
    assert!(matches!(first, TickOutcome::Completed(ref r) if r.cycle == 1));
    assert!(matches!(second, TickOutcome::Skipped { cycle: 2 }));

    // cycle 3 is a multiple of the limit even though only one cycle ran before it
    match scheduler.tick().await {
        TickOutcome::Completed(r) => {
            assert_eq!(r.cycle, 3);
            assert!(matches!(r.reset, Some(ResetReason::Periodic)));
            assert_eq!(r.matches, 0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    match scheduler.tick().await {
        TickOutcome::Completed(r) => {
            assert!(r.reset.is_none());
            assert_eq!(r.matches, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_notifier_does_not_hold_the_cycle() {
    let source = ScriptedListingsSource::new();
    source
        .push("kw", vec![listing("m1", 10)])
        .push("kw", vec![listing("m2", 20), listing("m1", 10)]);
    let cycle = Arc::new(PollCycleUseCase::new(
        Arc::new(InMemoryWatchRepository::new(vec![watch(
            "a@example.com",
            &["kw"],
        )])),
        Arc::new(source.clone()),
        NotificationDispatcher::new(Arc::new(StalledNotifier), 10),
        EngineConfig::default(),
    ));
    let scheduler = Scheduler::new(cycle.clone());

    assert!(matches!(scheduler.tick().await, TickOutcome::Completed(_)));
    assert!(matches!(
        scheduler.tick().await,
        TickOutcome::Completed(ref r) if r.matches == 1 && r.deliveries == 1
    ));
    // m2 is committed while its notification is still stuck
    assert_eq!(cycle.seen_len(), 2);
    assert!(!scheduler.is_busy());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(cycle.pending_deliveries(), 1);

    assert!(matches!(
        scheduler.tick().await,
        TickOutcome::Completed(ref r) if r.cycle == 3 && r.matches == 0
    ));
    assert_eq!(source.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn stopped_scheduler_can_be_started_again() {
    let h = harness(vec![watch("a@example.com", &["kw"])], EngineConfig::default());
    h.source.push("kw", vec![listing("m1", 10)]);
    let scheduler = Arc::new(Scheduler::new(h.cycle.clone()));

    assert!(scheduler.start(Duration::from_secs(10)));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(scheduler.cycles(), 1);
    scheduler.stop().await;

    assert!(scheduler.start(Duration::from_secs(10)));
    assert!(scheduler.is_running());
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(scheduler.cycles(), 2);

    scheduler.stop().await;
    assert!(!scheduler.is_running());
}
