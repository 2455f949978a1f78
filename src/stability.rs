//! Write-stability detection.
//!
//! A file counts as stable once its size and modification time have stayed
//! the same for at least the configured threshold. Each path moves from
//! unstable to stable exactly once; any observed change restarts the clock.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Size and mtime of a file at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileSnapshot {
    pub fn of(metadata: &fs::Metadata) -> Self {
        FileSnapshot {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }

    /// Stat `path`. Errors are expected when the file is mid-rename or gone.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        fs::metadata(path).map(|m| FileSnapshot::of(&m))
    }
}

#[derive(Debug, Clone)]
pub struct StabilityRecord {
    pub last: FileSnapshot,
    pub stable_since: Instant,
}

/// Per-path stability history. Not synchronised; the owning session wraps
/// it in the same lock as the accepted set.
#[derive(Debug)]
pub struct StabilityTracker {
    records: HashMap<PathBuf, StabilityRecord>,
    threshold: Duration,
}

impl StabilityTracker {
    pub fn new(threshold: Duration) -> Self {
        StabilityTracker {
            records: HashMap::new(),
            threshold,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Record `snapshot` for `path` as seen at `now` and report whether the
    /// file has been quiet for the whole threshold.
    pub fn observe(&mut self, path: &Path, snapshot: FileSnapshot, now: Instant) -> bool {
        let record = match self.records.get_mut(path) {
            Some(record) => record,
            None => {
                self.records.insert(
                    path.to_path_buf(),
                    StabilityRecord {
                        last: snapshot,
                        stable_since: now,
                    },
                );
                return false;
            }
        };

        if record.last != snapshot {
            record.last = snapshot;
            record.stable_since = now;
            return false;
        }

        now.saturating_duration_since(record.stable_since) >= self.threshold
    }

    pub fn record(&self, path: &Path) -> Option<&StabilityRecord> {
        self.records.get(path)
    }

    pub fn forget(&mut self, path: &Path) -> Option<StabilityRecord> {
        self.records.remove(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(size: u64) -> FileSnapshot {
        FileSnapshot {
            size,
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(size)),
        }
    }

    fn at(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn first_observation_is_never_stable() {
        let mut tracker = StabilityTracker::new(Duration::from_secs(2));
        let path = Path::new("/inbox/abc__data.csv");

        assert!(!tracker.observe(path, snap(10), Instant::now()));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.record(path).unwrap().last.size, 10);
    }

    #[test]
    fn becomes_stable_after_threshold_of_quiet_polls() {
        let mut tracker = StabilityTracker::new(Duration::from_secs(2));
        let path = Path::new("/inbox/abc__data.csv");
        let t0 = Instant::now();

        assert!(!tracker.observe(path, snap(10), t0));
        for millis in [500, 1000, 1500] {
            assert!(!tracker.observe(path, snap(10), at(t0, millis)), "stable at {}ms", millis);
        }
        assert!(tracker.observe(path, snap(10), at(t0, 2000)));
        assert!(tracker.observe(path, snap(10), at(t0, 2500)));
    }

    #[test]
    fn size_change_restarts_the_clock() {
        let mut tracker = StabilityTracker::new(Duration::from_secs(2));
        let path = Path::new("/inbox/abc__data.csv");
        let t0 = Instant::now();

        tracker.observe(path, snap(10), t0);
        assert!(!tracker.observe(path, snap(20), at(t0, 1000)));
        assert!(!tracker.observe(path, snap(20), at(t0, 2500)));
        assert!(tracker.observe(path, snap(20), at(t0, 3000)));
    }

    #[test]
    fn mtime_change_alone_restarts_the_clock() {
        let mut tracker = StabilityTracker::new(Duration::from_secs(2));
        let path = Path::new("/inbox/abc__data.csv");
        let t0 = Instant::now();
        let touched = FileSnapshot {
            size: 10,
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(99)),
        };

        tracker.observe(path, snap(10), t0);
        assert!(!tracker.observe(path, touched, at(t0, 2000)));
        assert!(!tracker.observe(path, touched, at(t0, 3500)));
        assert!(tracker.observe(path, touched, at(t0, 4000)));
    }

    #[test]
    fn paths_are_tracked_independently() {
        let mut tracker = StabilityTracker::new(Duration::from_secs(2));
        let a = Path::new("/inbox/abc__a.csv");
        let b = Path::new("/inbox/abc__b.csv");
        let t0 = Instant::now();

        tracker.observe(a, snap(1), t0);
        tracker.observe(b, snap(1), at(t0, 1500));
        assert!(tracker.observe(a, snap(1), at(t0, 2000)));
        assert!(!tracker.observe(b, snap(1), at(t0, 2000)));

        assert!(tracker.forget(a).is_some());
        assert!(tracker.forget(a).is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn snapshot_of_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileSnapshot::read(&dir.path().join("gone.csv")).is_err());

        let file = dir.path().join("abc__here.csv");
        fs::write(&file, b"12345").unwrap();
        assert_eq!(FileSnapshot::read(&file).unwrap().size, 5);
    }
}
