//! OS termination signals.

/// Completes when the process receives SIGINT, SIGTERM or SIGQUIT.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => tracing::info!(signal = "SIGINT", "Shutdown signal received"),
        _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "Shutdown signal received"),
        _ = sigquit.recv() => tracing::info!(signal = "SIGQUIT", "Shutdown signal received"),
    }
    Ok(())
}

/// Completes on Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl_c", "Shutdown signal received");
    Ok(())
}
