use std::sync::atomic::{AtomicBool, Ordering};

use console::Term;

/// Global shutdown flag for graceful termination.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if shutdown has been requested.
#[inline]
pub(crate) fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Acquire)
}

#[inline]
fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::Release);
}

/// Resolves once shutdown has been requested.
pub(crate) async fn wait_for_shutdown() {
    while !is_shutdown_requested() {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

/// Set up the Ctrl+C handler for graceful shutdown.
///
/// The first Ctrl+C lets in-flight steps finish; pending steps are left in
/// the queue. A second one exits immediately.
pub(crate) fn setup_shutdown_handler() {
    tokio::spawn(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            return;
        }

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing the current step...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing the current step");
        }

        request_shutdown();

        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }

        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });
}
