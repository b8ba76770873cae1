//! Google Photos and OAuth relay handlers.
//!
//! # Endpoints
//!
//! - `POST /create-album` - Create a Photos album for the bearer of `accessToken`
//! - `POST /upload` - Multipart image upload into the user's library
//! - `GET /auth/google` - Redirect to Google's consent screen
//! - `GET /auth/google/callback` - Exchange the code and redirect to the frontend

use axum::{
    extract::{rejection::JsonRejection, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::OAuthError;
use crate::photos::PhotosClient;
use crate::storage::StorageFactory;

use super::handlers::{error_response, AppState, ErrorResponse};

/// File name used when the multipart part does not carry one.
const FALLBACK_FILE_NAME: &str = "upload.jpg";

// =============================================================================
// Request / Response Types
// =============================================================================

/// `POST /create-album` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlbumBody {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub album_title: Option<String>,
}

/// Created album.
#[derive(Debug, Serialize)]
pub struct AlbumResponse {
    pub id: String,
}

/// `GET /auth/google/callback` query.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
}

/// Fields collected from the upload form.
#[derive(Default)]
struct UploadForm {
    image: Option<(String, Bytes)>,
    access_token: Option<String>,
    album_id: Option<String>,
}

// =============================================================================
// Error Mapping
// =============================================================================

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let (status, error_type, body) = match &self {
            OAuthError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "oauth_not_configured",
                ErrorResponse::new(self.to_string()),
            ),
            OAuthError::MissingCode => (
                StatusCode::BAD_REQUEST,
                "invalid_request",
                ErrorResponse::new(self.to_string()),
            ),
            OAuthError::Exchange(cause) => (
                StatusCode::BAD_GATEWAY,
                "token_exchange_failed",
                ErrorResponse::with_details("Token exchange failed", cause.clone()),
            ),
        };

        error_response(status, error_type, body)
    }
}

fn photos_disabled() -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "photos_disabled",
        ErrorResponse::new("Google Photos integration is not enabled"),
    )
}

fn photos_client<S: StorageFactory>(state: &AppState<S>) -> Result<&PhotosClient, Response> {
    state.photos.as_ref().ok_or_else(photos_disabled)
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle `POST /create-album`.
pub async fn create_album_handler<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<CreateAlbumBody>, JsonRejection>,
) -> Response
where
    S: StorageFactory + 'static,
{
    let photos = match photos_client(&state) {
        Ok(photos) => photos,
        Err(response) => return response,
    };

    let body = body.map(|Json(body)| body).unwrap_or_default();
    let (access_token, title) = match (
        body.access_token.filter(|s| !s.is_empty()),
        body.album_title.filter(|s| !s.trim().is_empty()),
    ) {
        (Some(token), Some(title)) => (token, title),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                ErrorResponse::new("Missing accessToken or albumTitle"),
            )
        }
    };

    match photos.create_album(&access_token, &title).await {
        Ok(id) => Json(AlbumResponse { id }).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "album_creation_failed",
            ErrorResponse::with_details("Album creation failed", e.to_string()),
        ),
    }
}

/// Handle `POST /upload`.
///
/// Expects a multipart form with an `image` file part, an `accessToken` field
/// and an optional `albumId` field. The file stays in memory.
pub async fn upload_handler<S>(State(state): State<AppState<S>>, multipart: Multipart) -> Response
where
    S: StorageFactory + 'static,
{
    let photos = match photos_client(&state) {
        Ok(photos) => photos,
        Err(response) => return response,
    };

    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(message) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                ErrorResponse::with_details("Invalid upload form", message),
            )
        }
    };

    let (access_token, (file_name, bytes)) = match (form.access_token, form.image) {
        (Some(token), Some(image)) => (token, image),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                ErrorResponse::new("Missing image or accessToken"),
            )
        }
    };

    debug!(file_name = %file_name, size = bytes.len(), "Forwarding upload to Photos");
    match photos
        .upload_to_album(&access_token, form.album_id.as_deref(), &file_name, bytes)
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "upload_failed",
            ErrorResponse::with_details("Upload failed", e.to_string()),
        ),
    }
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, String> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => {
                let file_name = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .unwrap_or(FALLBACK_FILE_NAME)
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| e.body_text())?;
                form.image = Some((file_name, bytes));
            }
            Some("accessToken") => {
                let token = field.text().await.map_err(|e| e.body_text())?;
                form.access_token = Some(token).filter(|s| !s.is_empty());
            }
            Some("albumId") => {
                let album_id = field.text().await.map_err(|e| e.body_text())?;
                form.album_id = Some(album_id).filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Handle `GET /auth/google`.
pub async fn google_auth_handler<S>(State(state): State<AppState<S>>) -> Response
where
    S: StorageFactory + 'static,
{
    match &state.oauth {
        Some(oauth) => found(oauth.authorization_url().as_str()),
        None => OAuthError::NotConfigured.into_response(),
    }
}

/// Handle `GET /auth/google/callback`.
pub async fn google_callback_handler<S>(
    State(state): State<AppState<S>>,
    Query(params): Query<CallbackParams>,
) -> Response
where
    S: StorageFactory + 'static,
{
    let Some(oauth) = &state.oauth else {
        return OAuthError::NotConfigured.into_response();
    };
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return OAuthError::MissingCode.into_response();
    };

    match oauth.exchange_code(&code).await {
        Ok(token) => {
            info!("Redirecting to frontend with access token");
            found(oauth.frontend_redirect(&token).as_str())
        }
        Err(e) => e.into_response(),
    }
}

/// 302 Found.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
