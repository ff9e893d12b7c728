//! Configuration file watcher.
//!
//! Announces that the config file changed. It never applies the change:
//! an explicit reload command is required so that routing only changes on
//! operator action.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Editors often emit several events per save.
const NOTICE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Notification that the watched file changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChanged {
    pub path: PathBuf,
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    notice_tx: mpsc::UnboundedSender<ConfigChanged>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for change notices.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ConfigChanged>) {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                notice_tx,
            },
            notice_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// Watching stops when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.notice_tx;
        let path = self.path.clone();
        let mut last_notice: Option<Instant> = None;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    if last_notice.is_some_and(|at| at.elapsed() < NOTICE_DEBOUNCE) {
                        return;
                    }
                    last_notice = Some(Instant::now());

                    tracing::info!(
                        path = %path.display(),
                        "Config file change detected; use the \"reload\" command to apply it (existing connections remain intact)"
                    );
                    let _ = tx.send(ConfigChanged { path: path.clone() });
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
