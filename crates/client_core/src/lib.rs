use std::time::Duration;

use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{GifName, GIF_MIME_TYPE},
    protocol::{
        CurrentGifResponse, ErrorResponse, GifListResponse, UploadResponse, UPLOAD_FORM_FIELD,
    },
};
use tracing::{debug, info};
use url::Url;

pub mod error;
pub mod gif_list;
pub mod polling;
pub mod upload;

pub use error::{ClientError, ClientResult};
pub use gif_list::{DeleteOutcome, GifListController, UserPrompt};
pub use polling::{
    JsonEndpoint, Observable, PollSource, PollingStateSync, CURRENT_GIF_POLL_INTERVAL,
    GIF_LIST_POLL_INTERVAL,
};
pub use upload::{SelectedGif, UploadCoordinator, UploadError, UploadReceipt, UploadStatus};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP access to the balloon server. The base URL is fixed at construction and every
/// endpoint is resolved relative to it.
#[derive(Debug, Clone)]
pub struct BalloonClient {
    http: Client,
    base_url: Url,
}

impl BalloonClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let base_url = parse_base_url(base_url)?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `segments` to the base path. Each segment is percent-encoded on its own, so a
    /// GIF name containing `/` stays a single segment.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn gif_url(&self, name: &GifName) -> Url {
        self.endpoint(&["gif", name.as_str()])
    }

    /// The server answers 404 with a JSON body when nothing is playing, which reads as
    /// `None` here. Only transport errors and non-JSON bodies fail.
    pub async fn current_gif(&self) -> ClientResult<Option<GifName>> {
        let body: CurrentGifResponse = self
            .get_json_any_status(self.endpoint(&["current"]))
            .await?;
        Ok(body.current_gif)
    }

    pub async fn list_gifs(&self) -> ClientResult<Vec<GifName>> {
        let body: GifListResponse = self.get_json(self.endpoint(&["list"])).await?;
        Ok(body.gifs)
    }

    pub async fn upload_gif(&self, file_name: &str, bytes: Vec<u8>) -> ClientResult<UploadResponse> {
        let size_bytes = bytes.len();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(GIF_MIME_TYPE)?;
        let form = multipart::Form::new().part(UPLOAD_FORM_FIELD, part);

        let res = self
            .http
            .post(self.endpoint(&["upload"]))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = read_json(ensure_success(res).await?).await?;
        info!(
            file_name,
            size_bytes,
            stored_as = %body.filename,
            "upload: server accepted gif"
        );
        Ok(body)
    }

    pub async fn delete_gif(&self, name: &GifName) -> ClientResult<()> {
        let res = self
            .http
            .delete(self.endpoint(&["delete", name.as_str()]))
            .send()
            .await?;
        ensure_success(res).await?;
        Ok(())
    }

    /// Raw bytes of a stored GIF, as served for display.
    pub async fn fetch_gif(&self, name: &GifName) -> ClientResult<Vec<u8>> {
        let res = self.http.get(self.gif_url(name)).send().await?;
        let bytes = ensure_success(res).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ClientResult<T> {
        let res = self.http.get(url).send().await?;
        read_json(ensure_success(res).await?).await
    }

    /// Like [`Self::get_json`], but a non-2xx response is accepted when its body still
    /// decodes as `T`.
    pub(crate) async fn get_json_any_status<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> ClientResult<T> {
        let res = self.http.get(url).send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        match serde_json::from_slice(&bytes) {
            Ok(body) => {
                if !status.is_success() {
                    debug!(status = status.as_u16(), "http: using json body of rejected request");
                }
                Ok(body)
            }
            Err(err) if status.is_success() => Err(err.into()),
            Err(_) => Err(status_error(status, &bytes)),
        }
    }
}

fn parse_base_url(raw: &str) -> ClientResult<Url> {
    let invalid = |reason: String| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!(
            "unsupported scheme '{}', expected http or https",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Turns a non-2xx response into [`ClientError::Status`], keeping the server's `error`
/// string when the body carries one.
async fn ensure_success(res: Response) -> ClientResult<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body = res.bytes().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn status_error(status: StatusCode, body: &[u8]) -> ClientError {
    let message = serde_json::from_slice::<ErrorResponse>(body)
        .ok()
        .map(|body| body.error);
    debug!(status = status.as_u16(), ?message, "http: request rejected");
    ClientError::Status {
        status: status.as_u16(),
        message,
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> ClientResult<T> {
    let bytes = res.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
