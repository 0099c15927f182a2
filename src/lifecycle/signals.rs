//! OS signal handling.
//!
//! SIGTERM and SIGINT trigger graceful shutdown. SIGHUP re-reads the config
//! file and, if it loads, swaps the route table in place.

use tokio::signal;
use tokio::task::JoinHandle;

use crate::config::watcher::ConfigWatcher;
use crate::lifecycle::Shutdown;

/// Resolve on the first SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}

/// Spawn the shutdown and reload signal tasks.
pub fn spawn_signal_handlers(shutdown: Shutdown, watcher: ConfigWatcher) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    let trigger = shutdown.clone();
    handles.push(tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger("signal");
    }));

    #[cfg(unix)]
    handles.push(tokio::spawn(reload_on_hangup(watcher, shutdown)));

    #[cfg(not(unix))]
    let _ = watcher;

    handles
}

#[cfg(unix)]
async fn reload_on_hangup(watcher: ConfigWatcher, shutdown: Shutdown) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGHUP handler, reload by signal disabled");
            return;
        }
    };
    let mut stop = shutdown.subscribe();

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                tracing::info!("SIGHUP received, reloading config");
                watcher.reload();
            }
            _ = stop.recv() => break,
        }
    }
}
