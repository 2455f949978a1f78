//! Session control: the `start(dir)` / `stop()` pair a front end drives.

use crossbeam::channel::Receiver;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use log::{debug, info};
use tokio::runtime::Handle;

use crate::config::MonitorConfig;
use crate::coordinator::Coordinator;
use crate::error::{MonitorError, Result};
use crate::notification::{Notification, Notifier};
use crate::session::RunSession;
use crate::upload::Uploader;
use crate::watcher::DirectoryWatcher;

/// Owns at most one running [`RunSession`] at a time.
pub struct Monitor {
    config: MonitorConfig,
    uploader: Arc<Uploader>,
    notifier: Notifier,
    runtime: Handle,
    current: Mutex<Option<Arc<RunSession>>>,
}

impl Monitor {
    /// Build a monitor that spawns its work on `runtime`. The returned
    /// receiver is the notification stream for the display.
    pub fn new(config: MonitorConfig, runtime: Handle) -> Result<(Self, Receiver<Notification>)> {
        let uploader = Uploader::new(config.endpoint.clone(), config.request_timeout())?;
        let (notifier, rx) = Notifier::channel();

        let monitor = Monitor {
            config,
            uploader: Arc::new(uploader),
            notifier,
            runtime,
            current: Mutex::new(None),
        };
        Ok((monitor, rx))
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Begin watching `dir`. A session that is already running is stopped
    /// first. Refusals are returned and also reported as one notification.
    pub fn start(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let result = self.start_session(dir);
        if let Err(e) = &result {
            self.notifier.error(format!("Error: {}", e));
        }
        result
    }

    fn start_session(&self, dir: &Path) -> Result<()> {
        if dir.as_os_str().is_empty() {
            return Err(MonitorError::config("no folder selected for watching"));
        }
        if !dir.is_dir() {
            return Err(MonitorError::config(format!("folder not found: {}", dir.display())));
        }

        let mut current = self.current();
        if let Some(previous) = current.take() {
            debug!("replacing session {}", previous.id());
            previous.stop();
        }

        let session = Arc::new(RunSession::new(dir, self.config.stability_threshold()));
        let watcher = match DirectoryWatcher::attach(dir, self.config.settle_delay()) {
            Ok(watcher) => watcher,
            Err(e) => {
                session.stop();
                return Err(e);
            }
        };

        let coordinator = Arc::new(Coordinator::new(
            Arc::clone(&session),
            Arc::clone(&self.uploader),
            self.notifier.clone(),
            self.config.check_interval(),
        ));

        info!("session {} started on {}", session.id(), dir.display());
        self.notifier.info(format!("Watching folder: {}", dir.display()));

        let notifier = self.notifier.clone();
        let id = session.id();
        self.runtime.spawn(async move {
            // a closed watcher channel has already stopped the session
            if let Err(e) = watcher.run(coordinator, notifier).await {
                debug!("session {} watch loop ended: {}", id, e);
            }
        });

        *current = Some(session);
        Ok(())
    }

    /// End the running session, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        if let Some(session) = self.current().take() {
            if session.stop() {
                info!("session {} stopped", session.id());
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.current().as_ref().is_some_and(|s| s.is_active())
    }

    pub fn watch_dir(&self) -> Option<PathBuf> {
        self.current()
            .as_ref()
            .filter(|s| s.is_active())
            .map(|s| s.watch_dir().to_path_buf())
    }

    fn current(&self) -> MutexGuard<'_, Option<Arc<RunSession>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}
