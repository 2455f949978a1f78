use std::path::PathBuf;

/// Errors that stop a session from starting or end a running one.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("{0}")]
    Configuration(String),

    #[error("failed to set up folder watcher: {0}")]
    WatchSetup(#[from] notify::Error),

    #[error("watcher {0} channel closed")]
    WatchChannelClosed(&'static str),

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl MonitorError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        MonitorError::Configuration(message.into())
    }
}

/// Failure of a single upload attempt. Never fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to open file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error sending request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server returned error: {status} - {body}")]
    Server { status: u16, body: String },
}

impl UploadError {
    /// HTTP status of a rejected upload, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
