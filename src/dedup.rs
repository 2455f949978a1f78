use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Paths admitted for upload during the current session, both in flight and
/// completed. Like [`crate::stability::StabilityTracker`] it relies on the
/// session lock for atomicity.
#[derive(Debug, Default)]
pub struct Deduplicator {
    accepted: HashSet<PathBuf>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path` for upload. Returns false if it is already claimed.
    pub fn try_admit(&mut self, path: &Path) -> bool {
        self.accepted.insert(path.to_path_buf())
    }

    /// Give up a claim after a failed upload so a later event can retry it.
    pub fn release(&mut self, path: &Path) -> bool {
        self.accepted.remove(path)
    }

    pub fn already_seen(&self, path: &Path) -> bool {
        self.accepted.contains(path)
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn clear(&mut self) {
        self.accepted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_once_until_released() {
        let mut dedup = Deduplicator::new();
        let path = Path::new("/inbox/abc__data.csv");

        assert!(dedup.try_admit(path));
        assert!(dedup.already_seen(path));
        assert!(!dedup.try_admit(path));

        assert!(dedup.release(path));
        assert!(!dedup.already_seen(path));
        assert!(dedup.try_admit(path));
    }

    #[test]
    fn release_of_unknown_path_is_harmless() {
        let mut dedup = Deduplicator::new();
        assert!(!dedup.release(Path::new("/inbox/never.csv")));
        assert!(dedup.is_empty());
    }
}
