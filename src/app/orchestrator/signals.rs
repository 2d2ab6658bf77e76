//! Signal handling for cooperative stop
//!
//! Ctrl-C or SIGTERM during a download run asks the pool to stop claiming new
//! tasks. Transfers already running finish, and the run still produces its
//! report.

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::worker::StopHandle;

/// Resolve when Ctrl-C or (on unix) SIGTERM arrives
///
/// A handler that cannot be installed never resolves; the failure is logged.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C signal received"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("SIGTERM signal received");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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

/// Stop the pool behind `stop` on the first signal
///
/// Abort the returned handle once the run is over.
pub fn stop_on_signal(stop: StopHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                info!("Stopping downloads; in-flight transfers will finish");
                stop.stop();
            }
            _ = stop.stopped() => {}
        }
    })
}
