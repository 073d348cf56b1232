use std::sync::Arc;

use heavy_worker::config::WorkerConfig;
use heavy_worker::db::SqlEngine;
use heavy_worker::instrumentation::{LogHook, TaskInstrumentation};
use heavy_worker::lifecycle::{
    Dependencies, LifecycleEvent, WaitForPrimary, WorkerDeps, WorkerOrchestrator,
};
use heavy_worker::probes::{HttpProbe, PoolProbe, TcpProbe};
use heavy_worker::process_mode::PlatformStrategy;
use heavy_worker::signals;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    eprintln!("⚙️  Heavy worker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Identity: {}", config.identity);
    eprintln!("   Broker: {}", config.broker);
    eprintln!("   Database: {}", config.database);
    eprintln!("   Search: {}", config.search_health_url);
    eprintln!(
        "   Mode: {}",
        if config.multi_tenant {
            "multi-tenant"
        } else {
            "single-tenant"
        }
    );

    // ── Collaborators ─────────────────────────────────────────────────────
    let engine = Arc::new(SqlEngine::new());

    let dependencies = Dependencies {
        broker: Arc::new(TcpProbe::new("broker", config.broker.clone())),
        database: Arc::new(PoolProbe::new(
            Arc::clone(&engine),
            Arc::new(TcpProbe::new("database", config.database.clone())),
        )),
        search: Arc::new(HttpProbe::search_index(config.search_health_url.clone())),
    };

    let secondary_init = Arc::new(WaitForPrimary::from_config(&config));

    let instrumentation = Arc::new(TaskInstrumentation::new().with_hook(Arc::new(LogHook)));

    let deps = WorkerDeps {
        engine,
        process_strategy: Box::new(PlatformStrategy::detect()),
        dependencies,
        secondary_init,
        drain: None,
        instrumentation,
    };

    // ── Boot ──────────────────────────────────────────────────────────────
    let mut worker = WorkerOrchestrator::new(config, deps);

    if let Err(e) = worker.boot().await {
        tracing::error!(error = %e, "Worker failed to boot");
        worker.dispatch(LifecycleEvent::WorkerShutdown).await.ok();
        std::process::exit(1);
    }

    // ── Run until signalled ───────────────────────────────────────────────
    if let Err(e) = signals::wait_for_shutdown_signal().await {
        tracing::warn!(error = %e, "Signal handling unavailable, shutting down");
    }

    worker.dispatch(LifecycleEvent::WorkerShutdown).await?;
    Ok(())
}
