// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reload trigger for configuration files.
//!
//! The watcher observes the parent directory of a configuration file and calls
//! the change callback with the file's path whenever the file is modified.
//! Bursts of events are debounced.

use crate::domain::{ConfigError, Result};
use crate::ports::{ChangeCallback, ConfigWatcher};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// Debounce delay used when none is given.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Polling interval of the event thread.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn watcher_error(message: impl Into<String>, err: notify::Error) -> ConfigError {
    ConfigError::WatcherError {
        message: message.into(),
        source: Some(Arc::new(err)),
    }
}

/// Fires the change callback when a configuration file is written.
///
/// # Examples
///
/// ```rust,no_run
/// use scopecfg::adapters::FileWatcher;
/// use scopecfg::ports::ConfigWatcher;
/// use std::sync::Arc;
///
/// # fn main() -> scopecfg::domain::Result<()> {
/// let mut watcher = FileWatcher::new("/etc/shop/config.yaml", None)?;
///
/// watcher.watch(Arc::new(|file: &str| {
///     println!("Configuration changed: {}", file);
/// }))?;
///
/// watcher.stop()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileWatcher {
    /// Path to the file being watched
    file_path: PathBuf,
    /// Minimum time between two callbacks
    debounce_delay: Duration,
    /// Internal watcher, present while running
    watcher: Option<RecommendedWatcher>,
    /// Thread handle for the event thread
    watch_thread: Option<JoinHandle<()>>,
    /// Stop signal sender
    stop_tx: Option<Sender<()>>,
}

impl FileWatcher {
    /// Creates a watcher for an existing file.
    ///
    /// `debounce_delay` defaults to [`DEFAULT_DEBOUNCE`].
    pub fn new(path: impl AsRef<Path>, debounce_delay: Option<Duration>) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();

        if !file_path.exists() {
            return Err(ConfigError::WatcherError {
                message: format!("File does not exist: {}", file_path.display()),
                source: None,
            });
        }

        // notify reports canonical paths on most platforms
        let file_path = file_path.canonicalize().unwrap_or(file_path);

        Ok(Self {
            file_path,
            debounce_delay: debounce_delay.unwrap_or(DEFAULT_DEBOUNCE),
            watcher: None,
            watch_thread: None,
            stop_tx: None,
        })
    }

    /// The watched file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Returns true while the event thread runs.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

impl ConfigWatcher for FileWatcher {
    fn watch(&mut self, callback: ChangeCallback) -> Result<()> {
        if self.watcher.is_some() {
            return Err(ConfigError::WatcherError {
                message: "Watcher is already running".to_string(),
                source: None,
            });
        }

        let (event_tx, event_rx) = channel::<notify::Result<Event>>();
        let (stop_tx, stop_rx) = channel::<()>();

        let mut watcher = RecommendedWatcher::new(event_tx, notify::Config::default())
            .map_err(|e| watcher_error(format!("Failed to create file watcher: {}", e), e))?;

        // Watch the parent directory, editors often replace files instead of writing them
        let watch_path = self
            .file_path
            .parent()
            .ok_or_else(|| ConfigError::WatcherError {
                message: "Failed to get parent directory".to_string(),
                source: None,
            })?
            .to_path_buf();

        watcher
            .watch(&watch_path, RecursiveMode::NonRecursive)
            .map_err(|e| watcher_error(format!("Failed to start watching: {}", e), e))?;

        let file_path = self.file_path.clone();
        let debounce_delay = self.debounce_delay;

        let watch_thread = thread::spawn(move || {
            let mut last_event_time: Option<Instant> = None;
            let key = file_path.to_string_lossy().into_owned();

            loop {
                if stop_rx.try_recv().is_ok() {
                    break;
                }

                let event = match event_rx.recv_timeout(POLL_INTERVAL) {
                    Ok(Ok(event)) => event,
                    Ok(Err(e)) => {
                        debug!("File watcher event error for {}: {}", key, e);
                        continue;
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };

                if !event.paths.iter().any(|p| p == &file_path) {
                    continue;
                }

                let now = Instant::now();
                let should_trigger = last_event_time
                    .map(|last| now.duration_since(last) >= debounce_delay)
                    .unwrap_or(true);

                if should_trigger {
                    last_event_time = Some(now);
                    debug!("Configuration file changed: {}", key);
                    callback(&key);
                }
            }
        });

        self.watcher = Some(watcher);
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
                message: "Failed to join watcher thread".to_string(),
                source: None,
            })?;
        }

        self.watcher = None;

        Ok(())
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
