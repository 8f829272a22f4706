// SPDX-License-Identifier: MIT OR Apache-2.0

//! SIGHUP watcher.
//!
//! Daemons traditionally re-read their configuration on `SIGHUP`. This watcher
//! listens for the signal on a thread that owns a small tokio runtime and calls
//! the change callback with [`SIGNAL_KEY`] each time it arrives.

use crate::domain::{ConfigError, Result};
use crate::ports::{ChangeCallback, ConfigWatcher};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Key passed to the callback when the signal arrives.
pub const SIGNAL_KEY: &str = "SIGHUP";

/// Watcher triggering a reload on `SIGHUP`.
///
/// # Examples
///
/// ```rust,no_run
/// use scopecfg::adapters::SignalWatcher;
/// use scopecfg::ports::ConfigWatcher;
/// use std::sync::Arc;
///
/// # fn main() -> scopecfg::domain::Result<()> {
/// let mut watcher = SignalWatcher::new();
/// watcher.watch(Arc::new(|_: &str| println!("reloading")))?;
/// watcher.stop()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SignalWatcher {
    /// Stop signal sender
    stop_tx: Option<oneshot::Sender<()>>,
    /// Signal thread handle
    watch_thread: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    /// Creates an idle watcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while the signal thread runs.
    pub fn is_running(&self) -> bool {
        self.watch_thread.is_some()
    }
}

impl ConfigWatcher for SignalWatcher {
    fn watch(&mut self, callback: ChangeCallback) -> Result<()> {
        if self.watch_thread.is_some() {
            return Err(ConfigError::WatcherError {
                message: "Watcher is already running".to_string(),
                source: None,
            });
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ConfigError::WatcherError {
                message: format!("Failed to create runtime for signal watcher: {}", e),
                source: Some(Arc::new(e)),
            })?;

        // register before returning so no signal sent after watch() is lost
        let mut hangup = {
            let _guard = runtime.enter();
            signal(SignalKind::hangup()).map_err(|e| ConfigError::WatcherError {
                message: format!("Failed to register SIGHUP handler: {}", e),
                source: Some(Arc::new(e)),
            })?
        };

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let watch_thread = thread::spawn(move || {
            runtime.block_on(async move {
                loop {
                    tokio::select! {
                        _ = &mut stop_rx => break,
                        received = hangup.recv() => match received {
                            Some(()) => {
                                info!("Received SIGHUP, reloading configuration");
                                callback(SIGNAL_KEY);
                            }
                            None => break,
                        },
                    }
                }
            });
            debug!("Signal watcher stopped");
        });

        self.stop_tx = Some(stop_tx);
        self.watch_thread = Some(watch_thread);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(handle) = self.watch_thread.take() {
            handle.join().map_err(|_| ConfigError::WatcherError {
                message: "Failed to join signal watcher thread".to_string(),
                source: None,
            })?;
        }

        Ok(())
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[test]
    fn test_signal_watcher_watch_and_stop() {
        let mut watcher = SignalWatcher::new();
        watcher.watch(Arc::new(|_: &str| {})).unwrap();
        assert!(watcher.is_running());
        assert!(watcher.watch(Arc::new(|_: &str| {})).is_err());
        watcher.stop().unwrap();
        assert!(!watcher.is_running());
    }

    #[test]
    fn test_signal_watcher_receives_sighup() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let mut watcher = SignalWatcher::new();
        watcher
            .watch(Arc::new(move |key: &str| {
                assert_eq!(key, SIGNAL_KEY);
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        let status = std::process::Command::new("kill")
            .args(["-HUP", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let deadline = Instant::now() + Duration::from_secs(2);
        while hits.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        watcher.stop().unwrap();
        assert!(hits.load(Ordering::SeqCst) >= 1);
    }
}
