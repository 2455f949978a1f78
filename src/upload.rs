use std::path::Path;
use std::time::Duration;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use tokio_util::io::ReaderStream;

use crate::error::{MonitorError, UploadError};

const FORM_FIELD: &str = "file";

/// Sends files to the collection endpoint as `multipart/form-data`.
///
/// There is no retry in here: a failed upload is reported once and the
/// coordinator decides what happens next.
#[derive(Debug, Clone)]
pub struct Uploader {
    client: Client,
    endpoint: String,
}

impl Uploader {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, MonitorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MonitorError::HttpClient)?;

        Ok(Uploader {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Stream `path` as the single `file` part of a POST. 200 and 201 count
    /// as success; any other status is returned with its response body.
    pub async fn upload(&self, path: &Path) -> Result<(), UploadError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let open_error = |source| UploadError::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(open_error)?;
        let length = file.metadata().await.map_err(open_error)?.len();

        debug!("uploading {} ({} bytes) to {}", file_name, length, self.endpoint);

        let body = Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, length)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(UploadError::Transport)?;
        let form = Form::new().part(FORM_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(UploadError::Transport)?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            debug!("upload of {} accepted with {}", path.display(), status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(UploadError::Server {
            status: status.as_u16(),
            body,
        })
    }
}
