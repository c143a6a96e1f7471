use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crossseed_core::{
    load_config, validate_config, CrossSeedEvent, CycleSummary, DownloadClient, LedgerStore,
    NfoMetadataLibrary, Normalizer, QBittorrentClient, Reconciler, SanitizedConfig, SiteRegistry,
    SqliteLedger, TorznabRegistry,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let once = args.iter().any(|a| a == "--once");
    let clear_ledger = args.iter().any(|a| a == "--clear-ledger");

    // Determine config path
    let config_path = std::env::var("CROSSSEED_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!(version = VERSION, "Starting crossseedd");
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!(config = ?SanitizedConfig::from(&config), "Configuration loaded");

    let ledger: Arc<dyn LedgerStore> = Arc::new(
        SqliteLedger::new(&config.ledger.path).context("Failed to open ledger database")?,
    );
    info!("Ledger initialized at {:?}", config.ledger.path);

    if clear_ledger {
        ledger.clear().context("Failed to clear ledger")?;
        warn!("Ledger cleared, all completed torrents are eligible again");
    }

    let client: Arc<dyn DownloadClient> = Arc::new(
        QBittorrentClient::new(config.downloader.clone())
            .context("Failed to create download client")?,
    );
    info!("Download client initialized at {}", config.downloader.url);

    let registry: Arc<dyn SiteRegistry> = Arc::new(TorznabRegistry::new(config.sites.clone()));
    info!(
        sites = ?config.sites.target_sites,
        "Site registry initialized at {}",
        config.sites.url
    );

    let normalizer = Normalizer::new(Some(Arc::new(NfoMetadataLibrary::new())));

    let reconciler = Arc::new(Reconciler::new(
        client,
        ledger,
        registry,
        normalizer,
        config.reconcile.clone(),
    ));

    // Forward SIGINT/SIGTERM into the reconciler so in-flight torrents
    // settle before the process exits.
    let shutdown = reconciler.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested");
        let _ = shutdown.send(());
    });

    if once {
        info!("Single-shot mode, running one cycle");
        let summary = reconciler.run_cycle().await?;
        report(&summary);
        return Ok(());
    }

    let interval = Duration::from_secs(config.reconcile.run_interval_mins * 60);
    info!(interval_mins = config.reconcile.run_interval_mins, "Entering scheduler loop");

    let mut shutdown_rx = reconciler.shutdown_handle().subscribe();
    loop {
        match reconciler.run_cycle().await {
            Ok(summary) => report(&summary),
            Err(e) => error!("Cycle failed: {:#}", e),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.recv() => {
                info!("Scheduler stopping");
                return Ok(());
            }
        }
    }
}

/// Render one cycle's outcome through the log-based notification channel.
fn report(summary: &CycleSummary) {
    info!(
        cycle_id = %summary.cycle_id,
        scanned = summary.scanned,
        matched = summary.matched,
        injected = summary.injected,
        failed = summary.failed,
        "Reconciliation summary"
    );
    for event in &summary.events {
        notify(event);
    }
}

fn notify(event: &CrossSeedEvent) {
    let payload = serde_json::to_string(event).unwrap_or_default();
    match event.reason.as_deref() {
        None => info!(
            name = %event.name,
            hash = %event.hash,
            targets = ?event.target_sites,
            payload = %payload,
            "Cross-seeded"
        ),
        Some(reason) => warn!(
            name = %event.name,
            hash = %event.hash,
            reason = reason,
            payload = %payload,
            "Cross-seed attempt failed"
        ),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
