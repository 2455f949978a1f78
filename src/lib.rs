//!
//! Upload Monitor - stable-file ingestion with a C FFI interface
//!
//! Files dropped into a watched folder are picked up when their name follows
//! the `abc__name.ext` convention, uploaded once their size and modification
//! time stop changing, and reported as a stream of timestamped notifications.
//!
//! The Rust API is [`Monitor`]. The `upload_monitor_*` functions below expose
//! the same start/stop control to a native desktop shell; they own a private
//! tokio runtime and relay notifications to a C callback from a background
//! thread.
//!
//! A failed upload is not retried automatically. The path becomes eligible
//! again and is retried when the folder reports it once more.
//!

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod monitor;
pub mod name_matcher;
pub mod notification;
pub mod session;
pub mod stability;
pub mod upload;
pub mod watcher;

pub use config::MonitorConfig;
pub use coordinator::{Coordinator, IgnoreReason, Outcome, WaitEnd};
pub use error::{MonitorError, UploadError};
pub use monitor::Monitor;
pub use notification::{Notification, NotificationKind, Notifier, Scrollback};
pub use session::{RunSession, StabilityCheck};
pub use upload::Uploader;

// C function pointer type for notification callbacks into the shell
pub type NotificationCallback = Option<extern "C" fn(
    *const c_char,          // kind ("info", "processing", "success", "warning", "error")
    *const c_char,          // rendered line, "[HH:MM:SS] message"
    *const c_char,          // filename (nullable)
    i64                     // timestamp, unix millis
)>;

struct FfiEngine {
    runtime: tokio::runtime::Runtime,
    monitor: Arc<Monitor>,
    relay: thread::JoinHandle<()>,
}

lazy_static::lazy_static! {
    static ref ENGINE: Mutex<Option<FfiEngine>> = Mutex::new(None);
}

fn engine() -> std::sync::MutexGuard<'static, Option<FfiEngine>> {
    ENGINE.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

unsafe fn optional_str(ptr: *const c_char) -> Result<Option<String>, ()> {
    if ptr.is_null() {
        return Ok(None);
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) if s.is_empty() => Ok(None),
        Ok(s) => Ok(Some(s.to_string())),
        Err(_) => Err(()),
    }
}

fn relay_notifications(
    rx: crossbeam::channel::Receiver<Notification>,
    callback: NotificationCallback,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for notification in rx.iter() {
            let Some(callback_fn) = callback else { continue };

            let kind = CString::new(notification.kind.as_str()).unwrap_or_default();
            let line = CString::new(notification.line()).unwrap_or_default();
            let filename = notification.filename.as_deref().and_then(|f| CString::new(f).ok());

            callback_fn(
                kind.as_ptr(),
                line.as_ptr(),
                filename.as_ref().map(|s| s.as_ptr()).unwrap_or(std::ptr::null()),
                notification.timestamp.timestamp_millis(),
            );
        }
    })
}

/// Initialize the library
///
/// Parameters:
///   - config_path: Path to JSON config file (nullable, defaults are used)
///   - notification_callback: Optional callback receiving every notification
///
/// Returns 0 on success, -1 if already initialized, -2 on an invalid string,
/// -3 on a config error, -4 if the runtime or HTTP client cannot be created
#[no_mangle]
pub extern "C" fn upload_monitor_init(
    config_path: *const c_char,
    notification_callback: NotificationCallback,
) -> i32 {
    let _ = env_logger::try_init();

    let mut engine = engine();
    if engine.is_some() {
        return -1;
    }

    let config_path = match unsafe { optional_str(config_path) } {
        Ok(path) => path,
        Err(()) => return -2,
    };
    let config = match config_path {
        Some(path) => MonitorConfig::load(path),
        None => MonitorConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            log::error!("Config error: {}", e);
            return -3;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("upload-monitor")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to create runtime: {}", e);
            return -4;
        }
    };

    let (monitor, rx) = match Monitor::new(config, runtime.handle().clone()) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("Failed to create monitor: {}", e);
            return -4;
        }
    };

    *engine = Some(FfiEngine {
        runtime,
        monitor: Arc::new(monitor),
        relay: relay_notifications(rx, notification_callback),
    });
    0
}

/// Start watching a folder
///
/// Parameters:
///   - watch_dir: Folder to watch (nullable, the configured or Downloads folder is used)
///
/// Returns 0 on success, -1 if not initialized, -2 on an invalid string,
/// -3 if no folder could be resolved, -4 if the folder cannot be watched
#[no_mangle]
pub extern "C" fn upload_monitor_start(watch_dir: *const c_char) -> i32 {
    let engine = engine();
    let Some(engine) = engine.as_ref() else {
        return -1;
    };

    let dir = match unsafe { optional_str(watch_dir) } {
        Ok(Some(dir)) => PathBuf::from(dir),
        Ok(None) => match engine.monitor.config().resolve_watch_dir() {
            Ok(dir) => dir,
            Err(e) => {
                engine.monitor.notifier().error(format!("Error: {}", e));
                return -3;
            }
        },
        Err(()) => return -2,
    };

    match engine.monitor.start(&dir) {
        Ok(()) => 0,
        Err(MonitorError::Configuration(_)) => -3,
        Err(_) => -4,
    }
}

/// Stop the running session. Stopping twice, or with nothing running, is fine.
/// Returns 0 on success, -1 if not initialized
#[no_mangle]
pub extern "C" fn upload_monitor_stop() -> i32 {
    match engine().as_ref() {
        Some(engine) => {
            engine.monitor.stop();
            0
        }
        None => -1,
    }
}

/// Returns 1 while a session is active, 0 otherwise
#[no_mangle]
pub extern "C" fn upload_monitor_is_running() -> i32 {
    match engine().as_ref() {
        Some(engine) if engine.monitor.is_running() => 1,
        _ => 0,
    }
}

/// Default watch folder (`~/Downloads`)
/// Returns a string that must be freed with upload_monitor_free_string,
/// or null if it cannot be resolved
#[no_mangle]
pub extern "C" fn upload_monitor_default_dir() -> *mut c_char {
    match config::default_watch_dir() {
        Ok(dir) => match CString::new(dir.to_string_lossy().into_owned()) {
            Ok(c_str) => c_str.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a string allocated by Rust
#[no_mangle]
pub extern "C" fn upload_monitor_free_string(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            let _ = CString::from_raw(s);
        }
    }
}

/// Shutdown the library
/// Should be called once at app shutdown
#[no_mangle]
pub extern "C" fn upload_monitor_shutdown() -> i32 {
    let Some(engine) = engine().take() else {
        return 0;
    };
    engine.monitor.stop();

    // In-flight uploads are abandoned. Once the runtime and monitor are gone
    // every notification sender is dropped, so the relay drains and exits.
    let FfiEngine { runtime, monitor, relay } = engine;
    drop(monitor);
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    // No callback may run after shutdown returns, unless shutdown is called
    // from inside the callback itself.
    if relay.thread().id() != thread::current().id() {
        if relay.join().is_err() {
            log::error!("notification relay panicked");
        }
    }
    0
}
