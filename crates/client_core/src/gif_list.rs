use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::GifName;
use tracing::{debug, info, warn};

use crate::{polling::Observable, BalloonClient, ClientError};

/// User interaction needed by destructive list operations.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    async fn confirm_delete(&self, name: &GifName) -> bool;
    /// Blocking notice; returns once the user has seen it.
    async fn alert(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Declined,
    Deleted,
    Failed(String),
}

/// Deletable view over the polled GIF list.
pub struct GifListController {
    client: BalloonClient,
    gifs: Observable<Vec<GifName>>,
    prompt: Arc<dyn UserPrompt>,
}

impl GifListController {
    pub fn new(
        client: BalloonClient,
        gifs: Observable<Vec<GifName>>,
        prompt: Arc<dyn UserPrompt>,
    ) -> Self {
        Self {
            client,
            gifs,
            prompt,
        }
    }

    pub fn state(&self) -> &Observable<Vec<GifName>> {
        &self.gifs
    }

    /// Current entries in server order; empty while the list is still loading.
    pub fn items(&self) -> Vec<GifName> {
        self.gifs.get().unwrap_or_default()
    }

    pub async fn delete(&self, name: &GifName) -> DeleteOutcome {
        if !self.prompt.confirm_delete(name).await {
            debug!(gif = %name, "delete: declined by user");
            return DeleteOutcome::Declined;
        }

        match self.client.delete_gif(name).await {
            Ok(()) => {
                let removed = self.gifs.modify(|gifs| {
                    let before = gifs.len();
                    gifs.retain(|gif| gif != name);
                    gifs.len() != before
                });
                info!(gif = %name, removed_locally = removed, "delete: gif deleted");
                DeleteOutcome::Deleted
            }
            Err(err) => {
                let message = delete_failure_message(name, &err);
                warn!(gif = %name, error = %err, "delete: request failed");
                self.prompt.alert(&message).await;
                DeleteOutcome::Failed(message)
            }
        }
    }
}

fn delete_failure_message(name: &GifName, err: &ClientError) -> String {
    match err {
        ClientError::Status {
            message: Some(message),
            ..
        } => format!("Failed to delete {name}: {message}"),
        ClientError::Status { status, .. } => {
            format!("Failed to delete {name}: server responded with status {status}")
        }
        _ => format!("Failed to delete {name}: could not reach the server"),
    }
}

#[cfg(test)]
#[path = "tests/gif_list_tests.rs"]
mod tests;
