//! Single-file GIF upload: selection, validation and the one-shot request.

use std::path::{Path, PathBuf};

use shared::domain::{GifName, GIF_MIME_TYPE};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{BalloonClient, ClientError};

pub const INVALID_FILE_MESSAGE: &str = "Please select a valid GIF file.";
pub const NO_FILE_SELECTED_MESSAGE: &str = "No file selected!";
pub const UPLOAD_FAILED_MESSAGE: &str = "Error uploading the GIF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedGif {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: String,
}

impl SelectedGif {
    /// Accepts `path` only when its declared media type is `image/gif`.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let path = path.into();
        let mime = declared_mime(&path);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        match (file_name, mime) {
            (Some(file_name), Some(mime)) if mime == GIF_MIME_TYPE => Ok(Self {
                path,
                file_name,
                mime: mime.to_string(),
            }),
            (_, mime) => Err(UploadError::NotAGif {
                path: path.display().to_string(),
                mime: mime.unwrap_or("unknown").to_string(),
            }),
        }
    }
}

fn declared_mime(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Uploading,
    Done(String),
}

impl UploadStatus {
    pub fn is_uploading(&self) -> bool {
        matches!(self, Self::Uploading)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Done(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub filename: GifName,
    pub server_message: Option<String>,
}

impl UploadReceipt {
    pub fn user_message(&self) -> String {
        format!("GIF uploaded successfully: {}", self.filename)
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{path} is not a GIF (declared type {mime})")]
    NotAGif { path: String, mime: String },
    #[error("no file selected")]
    NoFileSelected,
    #[error("server rejected upload: {0}")]
    Rejected(String),
    #[error("upload failed: {0}")]
    Failed(#[source] ClientError),
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NotAGif { .. } => INVALID_FILE_MESSAGE.to_string(),
            Self::NoFileSelected => NO_FILE_SELECTED_MESSAGE.to_string(),
            Self::Rejected(message) => format!("Error: {message}"),
            Self::Failed(_) => UPLOAD_FAILED_MESSAGE.to_string(),
        }
    }
}

pub struct UploadCoordinator {
    client: BalloonClient,
    selected: Option<SelectedGif>,
    status: watch::Sender<UploadStatus>,
}

impl UploadCoordinator {
    pub fn new(client: BalloonClient) -> Self {
        let (status, _) = watch::channel(UploadStatus::Idle);
        Self {
            client,
            selected: None,
            status,
        }
    }

    pub fn selected(&self) -> Option<&SelectedGif> {
        self.selected.as_ref()
    }

    pub fn status(&self) -> UploadStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.status.subscribe()
    }

    /// Replaces the pending selection. A rejected file leaves the previous selection in
    /// place and only updates the status message.
    pub fn select(&mut self, path: impl Into<PathBuf>) -> Result<&SelectedGif, UploadError> {
        match SelectedGif::from_path(path) {
            Ok(selected) => {
                self.status.send_replace(UploadStatus::Idle);
                Ok(&*self.selected.insert(selected))
            }
            Err(err) => {
                warn!(error = %err, "upload: selection rejected");
                self.status
                    .send_replace(UploadStatus::Done(err.user_message()));
                Err(err)
            }
        }
    }

    pub async fn upload(&mut self) -> Result<UploadReceipt, UploadError> {
        let Some(selected) = self.selected.clone() else {
            self.status
                .send_replace(UploadStatus::Done(NO_FILE_SELECTED_MESSAGE.to_string()));
            return Err(UploadError::NoFileSelected);
        };

        let mut guard = UploadingGuard::begin(&self.status);
        let result = self.send(&selected).await;
        guard.finish(match &result {
            Ok(receipt) => receipt.user_message(),
            Err(err) => err.user_message(),
        });
        result
    }

    async fn send(&self, selected: &SelectedGif) -> Result<UploadReceipt, UploadError> {
        let bytes = tokio::fs::read(&selected.path)
            .await
            .map_err(|err| UploadError::Failed(err.into()))?;

        match self.client.upload_gif(&selected.file_name, bytes).await {
            Ok(body) => {
                info!(file = %selected.path.display(), stored_as = %body.filename, "upload: done");
                Ok(UploadReceipt {
                    filename: body.filename,
                    server_message: body.message,
                })
            }
            Err(ClientError::Status {
                status,
                message: Some(message),
            }) => {
                warn!(status, error = %message, "upload: rejected by server");
                Err(UploadError::Rejected(message))
            }
            Err(err) => {
                warn!(error = %err, "upload: request failed");
                Err(UploadError::Failed(err))
            }
        }
    }
}

/// Holds the status at `Uploading` and always leaves it at `Done`, including when the
/// upload future is dropped before completing.
struct UploadingGuard<'a> {
    status: &'a watch::Sender<UploadStatus>,
    message: Option<String>,
}

impl<'a> UploadingGuard<'a> {
    fn begin(status: &'a watch::Sender<UploadStatus>) -> Self {
        status.send_replace(UploadStatus::Uploading);
        Self {
            status,
            message: None,
        }
    }

    fn finish(&mut self, message: String) {
        self.message = Some(message);
    }
}

impl Drop for UploadingGuard<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| UPLOAD_FAILED_MESSAGE.to_string());
        self.status.send_replace(UploadStatus::Done(message));
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
