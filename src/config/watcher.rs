//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;

/// Monitors the configuration file and publishes every successfully loaded
/// revision on a channel. Invalid revisions are logged and dropped, so the
/// consumer only ever sees validated configs.
#[derive(Debug, Clone)]
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Re-read the file now and publish it if it loads.
    ///
    /// Returns whether a new config was published.
    pub fn reload(&self) -> bool {
        match load_config(&self.path) {
            Ok(config) => {
                tracing::info!(path = ?self.path, routes = config.routes.len(), "Config reloaded from disk");
                self.update_tx.send(config).is_ok()
            }
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Failed to reload config, keeping current configuration");
                false
            }
        }
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn watch(&self) -> Result<RecommendedWatcher, notify::Error> {
        let this = self.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::debug!(kind = ?event.kind, "Config file change detected");
                    this.reload();
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(path: &Path, upstream: &str) {
        let content = format!(
            r#"
            [[routes]]
            name = "r"
            upstream = "{upstream}"
            [routes.downstream]
            path = "/"
            endpoints = [{{ host = "localhost", port = 3000 }}]
            "#
        );
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn reload_publishes_valid_config_and_skips_invalid() {
        let path = std::env::temp_dir().join(format!("gateway-watch-{}.toml", uuid::Uuid::new_v4()));
        write_config(&path, "/first");

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        assert!(watcher.reload());
        assert_eq!(rx.try_recv().unwrap().routes[0].upstream, "/first");

        std::fs::write(&path, "this is = = not toml").unwrap();
        assert!(!watcher.reload());
        assert!(rx.try_recv().is_err());

        let _ = std::fs::remove_file(&path);
    }
}
