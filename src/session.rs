//! One watch-and-process lifetime.
//!
//! A `RunSession` is built fresh by every `start` and shared (via `Arc`) only
//! with the work spawned for it. The stability table and the accepted set
//! live behind a single mutex; it is held for bookkeeping only, never across
//! a stat, a file read or a network call.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::dedup::Deduplicator;
use crate::stability::{FileSnapshot, StabilityTracker};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Result of one stability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityCheck {
    Unstable,
    Stable,
    /// The path was already admitted by another event; no record is kept.
    Claimed,
}

#[derive(Debug)]
struct Ledger {
    stability: StabilityTracker,
    accepted: Deduplicator,
}

#[derive(Debug)]
pub struct RunSession {
    id: u64,
    watch_dir: PathBuf,
    active: AtomicBool,
    stop_signal: CancellationToken,
    ledger: Mutex<Ledger>,
}

impl RunSession {
    pub fn new(watch_dir: impl Into<PathBuf>, stability_threshold: Duration) -> Self {
        RunSession {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            watch_dir: watch_dir.into(),
            active: AtomicBool::new(true),
            stop_signal: CancellationToken::new(),
            ledger: Mutex::new(Ledger {
                stability: StabilityTracker::new(stability_threshold),
                accepted: Deduplicator::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// End the session. Returns true only for the call that actually stopped it.
    pub fn stop(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::SeqCst);
        self.stop_signal.cancel();
        if was_active {
            let mut ledger = self.ledger();
            ledger.stability.clear();
            ledger.accepted.clear();
            debug!("session {} stopped", self.id);
        }
        was_active
    }

    /// Resolves once `stop` has been called.
    pub async fn stopped(&self) {
        self.stop_signal.cancelled().await
    }

    pub fn stop_signal(&self) -> &CancellationToken {
        &self.stop_signal
    }

    /// Stat `path` and feed the result to the stability tracker. A failed
    /// stat counts as not yet stable. An already admitted path is reported
    /// as `Claimed` and never gets a new record.
    pub fn check_stability(&self, path: &Path) -> StabilityCheck {
        let snapshot = FileSnapshot::read(path);
        let mut ledger = self.ledger();
        if ledger.accepted.already_seen(path) {
            return StabilityCheck::Claimed;
        }
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("stat {} failed, treating as unstable: {}", path.display(), e);
                return StabilityCheck::Unstable;
            }
        };
        if ledger.stability.observe(path, snapshot, Instant::now()) {
            StabilityCheck::Stable
        } else {
            StabilityCheck::Unstable
        }
    }

    /// Atomically claim `path` for upload and drop its stability record.
    /// Exactly one caller wins for a given path.
    pub fn try_admit(&self, path: &Path) -> bool {
        if !self.is_active() {
            return false;
        }
        let mut ledger = self.ledger();
        let admitted = ledger.accepted.try_admit(path);
        // An accepted path never keeps a stability record, win or lose.
        ledger.stability.forget(path);
        admitted
    }

    pub fn release(&self, path: &Path) {
        self.ledger().accepted.release(path);
    }

    pub fn already_seen(&self, path: &Path) -> bool {
        self.ledger().accepted.already_seen(path)
    }

    pub fn tracked_paths(&self) -> usize {
        self.ledger().stability.len()
    }

    pub fn accepted_paths(&self) -> usize {
        self.ledger().accepted.len()
    }

    // The tables stay consistent even if a holder panicked.
    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
