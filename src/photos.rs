//! Google Photos library client.
//!
//! Album creation and two-step media upload on behalf of a user holding a
//! Google OAuth access token. Nothing is persisted locally: uploaded bytes are
//! forwarded from memory.

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::error::PhotosError;

/// Default Photos Library API endpoint.
pub const DEFAULT_PHOTOS_BASE_URL: &str = "https://photoslibrary.googleapis.com";

/// Description attached to every uploaded media item.
pub const UPLOAD_DESCRIPTION: &str = "Uploaded from Gallery App";

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Photos Library API client.
#[derive(Clone)]
pub struct PhotosClient {
    http: reqwest::Client,
    base_url: String,
}

impl PhotosClient {
    /// Create a client against the given API base URL.
    pub fn new(http: reqwest::Client, base_url: &Url) -> Self {
        Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    /// Create an album and return its id.
    pub async fn create_album(&self, access_token: &str, title: &str) -> Result<String, PhotosError> {
        let response = self
            .http
            .post(format!("{}/v1/albums", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .json(&json!({ "album": { "title": title } }))
            .send()
            .await
            .map_err(|e| PhotosError::Connection(e.to_string()))?;

        let response = check_response(response).await?;
        let album: AlbumResponse = response
            .json()
            .await
            .map_err(|e| PhotosError::Connection(e.to_string()))?;

        let id = album
            .id
            .filter(|id| !id.is_empty())
            .ok_or(PhotosError::MissingAlbumId)?;
        info!(album_id = %id, "Album created");
        Ok(id)
    }

    /// Upload raw image bytes and register them as a media item, optionally
    /// inside an album. Returns the `batchCreate` response as-is.
    pub async fn upload_to_album(
        &self,
        access_token: &str,
        album_id: Option<&str>,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<serde_json::Value, PhotosError> {
        let size = bytes.len();
        let response = self
            .http
            .post(format!("{}/v1/uploads", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(CONTENT_TYPE, "application/octet-stream")
            .header("X-Goog-Upload-File-Name", file_name)
            .header("X-Goog-Upload-Protocol", "raw")
            .body(bytes)
            .send()
            .await
            .map_err(|e| PhotosError::Connection(e.to_string()))?;

        let upload_token = check_response(response)
            .await?
            .text()
            .await
            .map_err(|e| PhotosError::Connection(e.to_string()))?;
        debug!(size, file_name, "Raw bytes uploaded");

        let mut body = json!({
            "newMediaItems": [{
                "description": UPLOAD_DESCRIPTION,
                "simpleMediaItem": { "uploadToken": upload_token }
            }]
        });
        if let Some(album_id) = album_id.filter(|id| !id.is_empty()) {
            body["albumId"] = json!(album_id);
        }

        let response = self
            .http
            .post(format!("{}/v1/mediaItems:batchCreate", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| PhotosError::Connection(e.to_string()))?;

        check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| PhotosError::Connection(e.to_string()))
    }
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, PhotosError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(PhotosError::Api {
        status: status.as_u16(),
        message,
    })
}
