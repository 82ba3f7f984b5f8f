use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use listingpulse::application::scheduler::Scheduler;
use listingpulse::application::usecases::{NotificationDispatcher, PollCycleUseCase};
use listingpulse::application::{ListingsSource, Notifier, WatchRepository};
use listingpulse::infrastructure::{
    console_notifier::ConsoleNotifier, http_listings_source::HttpListingsSource,
    memory_store::InMemoryWatchRepository, multi_notifier::MultiNotifier,
    sqlite_store::SqliteWatchRepository, webhook_notifier::WebhookNotifier,
};
use listingpulse::interfaces::config::Config;
use listingpulse::interfaces::http_api::{ApiState, build_router};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(20);

#[derive(Parser, Debug)]
#[command(name = "listingpulse")]
struct Args {
    /// Path to config.yaml
    #[arg(long, default_value = "config.yaml")]
    config: String,

    /// Run a single search iteration and exit
    #[arg(long)]
    once: bool,

    /// Do not send external notifications (console only)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("listingpulse=info")),
        )
        .init();
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    // 1) load config
    let cfg = Config::load_from_file(&args.config)
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {e}", args.config))?;
    let engine = cfg.engine_config();

    // 2) build infra
    let watches: Arc<dyn WatchRepository> = match &cfg.database_url {
        Some(url) => Arc::new(SqliteWatchRepository::new(url).await?),
        None => {
            tracing::warn!("database_url not set, watches are kept in memory");
            Arc::new(InMemoryWatchRepository::default())
        }
    };
    seed_watches(&cfg, watches.as_ref()).await?;

    let source: Arc<dyn ListingsSource> =
        Arc::new(HttpListingsSource::new(cfg.source_settings())?);

    // notifiers fanout
    let mut notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(ConsoleNotifier::new())];
    if !args.dry_run {
        if let Some(hook) = cfg.notifications.webhook_url.clone() {
            notifiers.push(Box::new(WebhookNotifier::new(hook)?));
        } else {
            tracing::warn!("notifications.webhook_url not set, email and push delivery disabled");
        }
    } else {
        tracing::warn!("--dry-run enabled: only console output");
    }

    let dispatcher = NotificationDispatcher::new(
        Arc::new(MultiNotifier::new(notifiers)),
        engine.max_matches_per_notification,
    )
    .with_links(cfg.item_links())
    .with_sender(cfg.notifications.email_from.clone());

    // 3) engine
    let poll_interval = engine.poll_interval;
    let cycle = Arc::new(PollCycleUseCase::new(
        Arc::clone(&watches),
        source,
        dispatcher,
        engine,
    ));
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&cycle)));

    if args.once {
        let outcome = scheduler.tick().await;
        cycle.flush_deliveries().await;
        tracing::info!(?outcome, "run once completed");
        return Ok(());
    }

    // 4) control plane
    let listener = tokio::net::TcpListener::bind(&cfg.api.bind).await?;
    tracing::info!(bind = %cfg.api.bind, "http api listening");
    let router = build_router(ApiState {
        watches,
        api_token: cfg.api.token.clone(),
    });
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("http api stopped: {e}");
        }
    });

    // 5) run until ctrl-c
    scheduler.start(poll_interval);
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    scheduler.stop().await;
    let pending = cycle.pending_deliveries();
    if pending > 0 {
        tracing::info!(pending, "waiting for in-flight notifications");
        if tokio::time::timeout(SHUTDOWN_GRACE, cycle.flush_deliveries())
            .await
            .is_err()
        {
            tracing::warn!("notifications still pending at shutdown, abandoning them");
        }
    }
    Ok(())
}

async fn seed_watches(cfg: &Config, watches: &dyn WatchRepository) -> anyhow::Result<()> {
    if cfg.watches.is_empty() || !watches.list_watches().await?.is_empty() {
        return Ok(());
    }
    for w in cfg.seed_watches() {
        watches.create_watch(&w.email).await?;
        watches.set_keywords(&w.email, w.keywords).await?;
    }
    tracing::info!(count = cfg.watches.len(), "seeded watches from config");
    Ok(())
}
