use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use log::{debug, info};
use tokio::sync::mpsc;

use crate::coordinator::Coordinator;
use crate::error::{MonitorError, Result};
use crate::notification::Notifier;

/// Create-event subscription for one directory (non-recursive). A file
/// renamed into the directory counts as created.
///
/// The notify callback runs on notify's own thread and only forwards into
/// channels; all handling happens in [`DirectoryWatcher::run`].
pub struct DirectoryWatcher {
    dir: PathBuf,
    settle_delay: Duration,
    // Dropping the watcher unsubscribes and closes both channels.
    _watcher: Option<RecommendedWatcher>,
    events: mpsc::UnboundedReceiver<Event>,
    errors: mpsc::UnboundedReceiver<notify::Error>,
}

impl DirectoryWatcher {
    pub fn attach(dir: &Path, settle_delay: Duration) -> Result<Self> {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        let _ = event_tx.send(event);
                    }
                    Err(e) => {
                        let _ = error_tx.send(e);
                    }
                }
            },
            Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("Watching path: {}", dir.display());

        let mut attached = Self::from_channels(dir, settle_delay, events, errors);
        attached._watcher = Some(watcher);
        Ok(attached)
    }

    pub(crate) fn from_channels(
        dir: &Path,
        settle_delay: Duration,
        events: mpsc::UnboundedReceiver<Event>,
        errors: mpsc::UnboundedReceiver<notify::Error>,
    ) -> Self {
        DirectoryWatcher {
            dir: dir.to_path_buf(),
            settle_delay,
            _watcher: None,
            events,
            errors,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Feed created paths to `coordinator` until the session's stop signal
    /// fires (`Ok`) or one of the watcher channels closes (`Err`). A closed
    /// channel also stops the session and is reported once.
    pub async fn run(mut self, coordinator: Arc<Coordinator>, notifier: Notifier) -> Result<()> {
        let session = Arc::clone(coordinator.session());
        let result = self.pump(&coordinator, &notifier).await;
        if let Err(e) = &result {
            if session.stop() {
                notifier.error(format!("Processing stopped: {}", e));
            }
        }
        result
    }

    async fn pump(&mut self, coordinator: &Arc<Coordinator>, notifier: &Notifier) -> Result<()> {
        let session = Arc::clone(coordinator.session());

        loop {
            tokio::select! {
                biased;
                _ = session.stopped() => {
                    notifier.info("File processing stopped");
                    return Ok(());
                }
                event = self.events.recv() => {
                    let event = event.ok_or(MonitorError::WatchChannelClosed("event"))?;
                    if !session.is_active() {
                        continue;
                    }
                    for path in arrived_paths(event) {
                        debug!("created: {}", path.display());
                        coordinator.dispatch(path, self.settle_delay);
                    }
                }
                err = self.errors.recv() => {
                    let err = err.ok_or(MonitorError::WatchChannelClosed("error"))?;
                    notifier.warning(format!("Watcher error: {}", err));
                }
            }
        }
    }
}

/// Paths that appeared in the directory: creations and rename targets.
fn arrived_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) => event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => event.paths,
        // [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.into_iter().last().into_iter().collect()
        }
        _ => Vec::new(),
    }
}
