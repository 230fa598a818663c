use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Cancel `token` on the first Ctrl-C (or SIGTERM on unix).
///
/// A second Ctrl-C exits immediately without waiting for in-flight requests.
pub fn cancel_on_shutdown(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = ?e, "Failed to install shutdown signal handler");
            return;
        }
        info!("Shutdown requested, finishing current request");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt, exiting immediately");
            std::process::exit(130);
        }
    });
}

async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = term.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
