//! Per-file ingestion: filter, wait for stability, admit, upload, report.
//!
//! Each detected path is handled by its own task. The stability wait is a
//! [`StabilityWait`] driven by a `tokio` interval and raced against the
//! session's stop signal, so stopping a session ends every pending wait at
//! its next tick. Uploads already in flight run to completion and are still
//! reported.
//!
//! Retry semantics: a failed upload releases the path, but nothing is
//! rescheduled. The file is tried again only if the filesystem reports it
//! again (for example when the producer saves it once more).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::name_matcher;
use crate::notification::{NotificationKind, Notifier};
use crate::session::{RunSession, StabilityCheck};
use crate::upload::Uploader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Inactive,
    AlreadySeen,
    Unreadable,
    Directory,
    NameMismatch,
}

/// How handling of one detection event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    /// The session stopped before the file was admitted.
    Cancelled,
    /// Another event for the same path won the admission race.
    Duplicate,
    Uploaded,
    Failed,
}

pub struct Coordinator {
    session: Arc<RunSession>,
    uploader: Arc<Uploader>,
    notifier: Notifier,
    check_interval: Duration,
}

impl Coordinator {
    pub fn new(
        session: Arc<RunSession>,
        uploader: Arc<Uploader>,
        notifier: Notifier,
        check_interval: Duration,
    ) -> Self {
        Coordinator {
            session,
            uploader,
            notifier,
            check_interval,
        }
    }

    pub fn session(&self) -> &Arc<RunSession> {
        &self.session
    }

    /// Handle `path` on its own task after `settle_delay`.
    pub fn dispatch(self: &Arc<Self>, path: PathBuf, settle_delay: Duration) -> JoinHandle<Outcome> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            if !settle_delay.is_zero() {
                time::sleep(settle_delay).await;
            }
            coordinator.process(&path).await
        })
    }

    pub async fn process(&self, path: &Path) -> Outcome {
        if !self.session.is_active() {
            return Outcome::Ignored(IgnoreReason::Inactive);
        }
        if self.session.already_seen(path) {
            return Outcome::Ignored(IgnoreReason::AlreadySeen);
        }

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => return Outcome::Ignored(IgnoreReason::Directory),
            Ok(_) => {}
            Err(_) => return Outcome::Ignored(IgnoreReason::Unreadable),
        }

        let file_name = display_name(path);
        if !name_matcher::matches(&file_name) {
            debug!("ignoring {}: name does not match", file_name);
            return Outcome::Ignored(IgnoreReason::NameMismatch);
        }

        let mut wait = StabilityWait::new(&self.session, path, self.check_interval);
        match wait.until_stable().await {
            WaitEnd::Stable => debug!("{} stable after {} checks", file_name, wait.checks()),
            WaitEnd::Stopped => {
                debug!("stopped waiting for {} after {} checks", file_name, wait.checks());
                return Outcome::Cancelled;
            }
            WaitEnd::Claimed => return Outcome::Duplicate,
        }

        if !self.session.is_active() {
            return Outcome::Cancelled;
        }
        if !self.session.try_admit(path) {
            return Outcome::Duplicate;
        }

        self.notifier.file(
            NotificationKind::Processing,
            &file_name,
            format!("Processing file: {}", file_name),
        );

        match self.uploader.upload(path).await {
            Ok(()) => {
                self.notifier.file(
                    NotificationKind::Success,
                    &file_name,
                    format!("File uploaded successfully: {}", file_name),
                );
                Outcome::Uploaded
            }
            Err(e) => {
                self.notifier.file(
                    NotificationKind::Error,
                    &file_name,
                    format!("Failed to upload {}: {}", file_name, e),
                );
                self.session.release(path);
                Outcome::Failed
            }
        }
    }
}

/// Why a [`StabilityWait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitEnd {
    Stable,
    Stopped,
    /// Another event admitted the path while this one was waiting.
    Claimed,
}

/// Repeated stability checks for one path, bound to the session's stop signal.
pub struct StabilityWait<'a> {
    session: &'a RunSession,
    path: &'a Path,
    ticker: Interval,
    checks: u32,
}

impl<'a> StabilityWait<'a> {
    pub fn new(session: &'a RunSession, path: &'a Path, interval: Duration) -> Self {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        StabilityWait {
            session,
            path,
            ticker,
            checks: 0,
        }
    }

    /// Check now, then once per interval, until the file is stable, the
    /// session stops or another event claims the path.
    pub async fn until_stable(&mut self) -> WaitEnd {
        loop {
            tokio::select! {
                biased;
                _ = self.session.stopped() => return WaitEnd::Stopped,
                _ = self.ticker.tick() => {}
            }
            if !self.session.is_active() {
                return WaitEnd::Stopped;
            }
            self.checks += 1;
            match self.session.check_stability(self.path) {
                StabilityCheck::Unstable => {}
                StabilityCheck::Stable => return WaitEnd::Stable,
                StabilityCheck::Claimed => return WaitEnd::Claimed,
            }
        }
    }

    pub fn checks(&self) -> u32 {
        self.checks
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
