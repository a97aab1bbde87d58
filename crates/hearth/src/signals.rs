//! Signal handling for graceful server shutdown.

use hearth_core::Server;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Waits for a termination signal (SIGINT or SIGTERM on Unix, Ctrl+C on Windows).
pub async fn wait_for_shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

/// Closes `server` once when the process is asked to terminate.
///
/// Errors from the triggered close are logged; there is no caller to
/// return them to.
///
/// # Returns
///
/// `true` if the hook was installed. Only the first call per process
/// installs it; later calls return `false`.
pub fn close_on_program_end(server: Arc<Server>) -> bool {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        warn!("shutdown hook already registered");
        return false;
    }

    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!("failed to listen for shutdown signals: {e}");
            return;
        }
        if let Err(e) = server.close().await {
            error!("error shutting down server: {e}");
        }
    });
    true
}
