//! Modification-time watcher for the local recipe store.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Polls a file's modification time on a fixed schedule.
///
/// A missed tick is delayed rather than burst, so a slow sync pass between two
/// [`ChangeWatcher::changed`] calls never causes a backlog of checks.
pub struct ChangeWatcher {
    path: PathBuf,
    ticker: Interval,
    settle: Duration,
    last: Option<SystemTime>,
}

impl ChangeWatcher {
    /// Start watching `path`. Its current state is the baseline.
    pub fn new(path: &Path, interval: Duration, settle: Duration) -> Self {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let last = modified(path);
        info!(path = %path.display(), "watching for changes");
        Self {
            path: path.to_path_buf(),
            ticker,
            settle,
            last,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compare against the baseline and move it. A vanished file is no change.
    fn poll(&mut self) -> bool {
        let Some(now) = modified(&self.path) else {
            return false;
        };
        let changed = self.last.is_some_and(|last| last != now);
        self.last = Some(now);
        changed
    }

    /// Wait until the file changes, then until it has been quiet for the settle time.
    pub async fn changed(&mut self) {
        loop {
            self.ticker.tick().await;
            if self.poll() {
                break;
            }
        }
        loop {
            tokio::time::sleep(self.settle).await;
            if !self.poll() {
                break;
            }
            debug!(path = %self.path.display(), "still being written");
        }
        info!(path = %self.path.display(), "detected change");
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file() -> PathBuf {
        let path = std::env::temp_dir().join(format!("brewsync-watch-{}", uuid::Uuid::now_v7()));
        std::fs::write(&path, "one").unwrap();
        path
    }

    fn touch(path: &Path, secs_ahead: u64) {
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs_ahead))
            .unwrap();
    }

    #[tokio::test]
    async fn reports_a_modification() {
        let path = temp_file();
        let mut watcher =
            ChangeWatcher::new(&path, Duration::from_millis(10), Duration::from_millis(10));

        let writer = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            touch(&path, 60);
        };
        let (_, waited) = tokio::join!(
            writer,
            tokio::time::timeout(Duration::from_secs(5), watcher.changed())
        );
        assert!(waited.is_ok());
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn unchanged_file_is_quiet() {
        let path = temp_file();
        let mut watcher =
            ChangeWatcher::new(&path, Duration::from_millis(10), Duration::from_millis(10));
        let waited = tokio::time::timeout(Duration::from_millis(100), watcher.changed()).await;
        assert!(waited.is_err());
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn missing_file_never_changes() {
        let path = std::env::temp_dir().join("brewsync-watch-missing");
        let mut watcher =
            ChangeWatcher::new(&path, Duration::from_millis(10), Duration::from_millis(10));
        assert!(!watcher.poll());
        assert!(!watcher.poll());
        assert_eq!(watcher.path(), path.as_path());
    }
}
