//! # File watcher
//!
//! Recursive watcher over the project root. Change notifications fan out on
//! a broadcast channel; paths matching an ignore pattern never reach it.
//! `watchOptions: null` yields a disabled watcher that accepts every call
//! and never emits.

mod errors;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{Config, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use tokio::sync::broadcast;

use crate::config::WatchOptions;
use crate::observability::{log_event, log_event_with_fields, Event};

pub use errors::{WatcherError, WatcherResult};

/// Always ignored, on top of `watchOptions.ignored`
const DEFAULT_IGNORED: &[&str] = &[r"(^|/)node_modules(/|$)", r"(^|/)\.git(/|$)"];

const EVENT_BUFFER: usize = 256;

/// Kind of file change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Add,
    Change,
    Unlink,
}

/// A change under a watched path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

#[derive(Clone)]
struct IgnoreSet {
    root: PathBuf,
    patterns: Arc<Vec<Regex>>,
}

impl IgnoreSet {
    fn compile(root: &Path, ignored: &[String]) -> WatcherResult<Self> {
        let patterns = DEFAULT_IGNORED
            .iter()
            .map(|p| p.to_string())
            .chain(ignored.iter().cloned())
            .map(|pattern| {
                Regex::new(&pattern).map_err(|source| WatcherError::InvalidPattern { pattern, source })
            })
            .collect::<WatcherResult<Vec<_>>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            patterns: Arc::new(patterns),
        })
    }

    fn matches(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let normalized = relative.to_string_lossy().replace('\\', "/");
        self.patterns.iter().any(|re| re.is_match(&normalized))
    }
}

/// Watches the project root for changes
pub struct FileWatcher {
    inner: Mutex<Option<Box<dyn Watcher + Send>>>,
    ignore: Option<IgnoreSet>,
    watched: Mutex<BTreeSet<PathBuf>>,
    events_tx: broadcast::Sender<WatchEvent>,
}

impl FileWatcher {
    /// Start watching `root` recursively
    pub fn new(root: &Path, options: &WatchOptions) -> WatcherResult<Self> {
        let ignore = IgnoreSet::compile(root, &options.ignored)?;
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);

        let tx = events_tx.clone();
        let filter = ignore.clone();
        let handler = move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let kind = match event.kind {
                    EventKind::Create(_) => WatchEventKind::Add,
                    EventKind::Modify(_) => WatchEventKind::Change,
                    EventKind::Remove(_) => WatchEventKind::Unlink,
                    _ => return,
                };
                for path in event.paths {
                    if !filter.matches(&path) {
                        let _ = tx.send(WatchEvent { kind, path });
                    }
                }
            }
            Err(e) => log_event_with_fields(Event::WatcherError, &[("error", &e.to_string())]),
        };

        let inner: Box<dyn Watcher + Send> = match options.poll_interval_ms {
            Some(ms) => Box::new(
                PollWatcher::new(handler, Config::default().with_poll_interval(Duration::from_millis(ms)))
                    .map_err(WatcherError::Create)?,
            ),
            None => Box::new(RecommendedWatcher::new(handler, Config::default()).map_err(WatcherError::Create)?),
        };

        let watcher = Self {
            inner: Mutex::new(Some(inner)),
            ignore: Some(ignore),
            watched: Mutex::new(BTreeSet::new()),
            events_tx,
        };
        if root.exists() {
            watcher.add(root)?;
        }

        log_event_with_fields(
            Event::WatcherStarted,
            &[("root", &root.display().to_string())],
        );
        Ok(watcher)
    }

    /// A watcher that never emits
    pub fn disabled() -> Self {
        log_event(Event::WatcherDisabled);
        let (events_tx, _) = broadcast::channel(1);
        Self {
            inner: Mutex::new(None),
            ignore: None,
            watched: Mutex::new(BTreeSet::new()),
            events_tx,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().map(|w| w.is_some()).unwrap_or(false)
    }

    /// Whether `path` matches an ignore pattern
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.as_ref().map(|i| i.matches(path)).unwrap_or(false)
    }

    /// Watch another path; ignored paths and a disabled watcher are no-ops
    pub fn add(&self, path: &Path) -> WatcherResult<()> {
        if self.is_ignored(path) {
            return Ok(());
        }
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(watcher) = inner.as_mut() else {
            return Ok(());
        };

        watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|source| WatcherError::Watch {
                path: path.to_path_buf(),
                source,
            })?;
        if let Ok(mut watched) = self.watched.lock() {
            watched.insert(path.to_path_buf());
        }
        Ok(())
    }

    /// Stop watching a path
    pub fn unwatch(&self, path: &Path) -> WatcherResult<()> {
        let removed = self
            .watched
            .lock()
            .map(|mut watched| watched.remove(path))
            .unwrap_or(false);
        if !removed {
            return Ok(());
        }
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(watcher) = inner.as_mut() {
                watcher.unwatch(path).map_err(|source| WatcherError::Watch {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Currently watched paths
    pub fn watched(&self) -> Vec<PathBuf> {
        self.watched
            .lock()
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Receive change events
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events_tx.subscribe()
    }

    /// Stop watching everything
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.take();
        }
        if let Ok(mut watched) = self.watched.lock() {
            watched.clear();
        }
    }
}

impl fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWatcher")
            .field("enabled", &self.is_enabled())
            .field("watched", &self.watched())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_disabled_watcher_is_inert() {
        let watcher = FileWatcher::disabled();
        assert!(!watcher.is_enabled());
        watcher.add(Path::new("/does/not/matter")).unwrap();
        assert!(watcher.watched().is_empty());
        watcher.close();
    }

    #[test]
    fn test_watches_root_and_closes() {
        let dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new(dir.path(), &WatchOptions::default()).unwrap();
        assert!(watcher.is_enabled());
        assert_eq!(watcher.watched(), vec![dir.path().to_path_buf()]);

        watcher.unwatch(dir.path()).unwrap();
        assert!(watcher.watched().is_empty());

        watcher.close();
        assert!(!watcher.is_enabled());
    }

    #[test]
    fn test_ignore_patterns() {
        let dir = TempDir::new().unwrap();
        let options = WatchOptions {
            ignored: vec![r"\.log$".into()],
            poll_interval_ms: Some(50),
        };
        let watcher = FileWatcher::new(dir.path(), &options).unwrap();

        assert!(watcher.is_ignored(&dir.path().join("node_modules/react/index.js")));
        assert!(watcher.is_ignored(&dir.path().join("debug.log")));
        assert!(!watcher.is_ignored(&dir.path().join("src/main.ts")));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let dir = TempDir::new().unwrap();
        let options = WatchOptions {
            ignored: vec!["(".into()],
            poll_interval_ms: None,
        };
        let err = FileWatcher::new(dir.path(), &options).unwrap_err();
        assert_eq!(err.code(), "DEVHOST_WATCHER_PATTERN");
    }
}
