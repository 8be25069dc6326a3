use serde::{Deserialize, Serialize};

use crate::domain::GifName;

/// Body of `GET /current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentGifResponse {
    #[serde(default)]
    pub current_gif: Option<GifName>,
}

/// Body of `GET /list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GifListResponse {
    pub gifs: Vec<GifName>,
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: GifName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error body returned by the server on a rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub const UPLOAD_FORM_FIELD: &str = "file";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_gif_accepts_null_and_missing_field() {
        let null: CurrentGifResponse =
            serde_json::from_str(r#"{"current_gif":null}"#).expect("null");
        assert_eq!(null.current_gif, None);

        let missing: CurrentGifResponse = serde_json::from_str("{}").expect("missing");
        assert_eq!(missing.current_gif, None);

        let named: CurrentGifResponse =
            serde_json::from_str(r#"{"current_gif":"party.gif"}"#).expect("named");
        assert_eq!(named.current_gif, Some(GifName::from("party.gif")));
    }

    #[test]
    fn list_keeps_server_order() {
        let body: GifListResponse =
            serde_json::from_str(r#"{"gifs":["b.gif","a.gif","c.gif"]}"#).expect("list");
        let names: Vec<&str> = body.gifs.iter().map(GifName::as_str).collect();
        assert_eq!(names, ["b.gif", "a.gif", "c.gif"]);
    }

    #[test]
    fn upload_response_tolerates_server_message() {
        let body: UploadResponse = serde_json::from_str(
            r#"{"message":"File uploaded and playing","filename":"cat.gif"}"#,
        )
        .expect("upload");
        assert_eq!(body.filename, "cat.gif");
        assert_eq!(body.message.as_deref(), Some("File uploaded and playing"));
    }
}
