//! HTTP request handlers for the image relay API.
//!
//! # Endpoints
//!
//! - `POST /api/transform` - Transform an image and publish it to the caller's storage
//! - `POST /api/generate-image` - Generate an image from a prompt and return its bytes
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info_span, warn};

use crate::error::{GenerationError, PipelineError};
use crate::oauth::GoogleOAuth;
use crate::photos::PhotosClient;
use crate::pipeline::{with_deadline, TransformBody, TransformPipeline};
use crate::publish::PublicReference;
use crate::storage::StorageFactory;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// Everything in here is built once at startup and read-only afterwards.
pub struct AppState<S: StorageFactory> {
    /// The transform pipeline (also owns the generation adapter)
    pub pipeline: Arc<TransformPipeline<S>>,

    /// Google Photos client, if the Photos routes are enabled
    pub photos: Option<PhotosClient>,

    /// Google OAuth relay, if configured
    pub oauth: Option<GoogleOAuth>,
}

impl<S: StorageFactory> AppState<S> {
    /// Create application state around a pipeline.
    pub fn new(pipeline: TransformPipeline<S>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            photos: None,
            oauth: None,
        }
    }

    /// Enable the Photos routes.
    pub fn with_photos(mut self, photos: PhotosClient) -> Self {
        self.photos = Some(photos);
        self
    }

    /// Enable the Google OAuth relay.
    pub fn with_oauth(mut self, oauth: GoogleOAuth) -> Self {
        self.oauth = Some(oauth);
        self
    }
}

impl<S: StorageFactory> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            photos: self.photos.clone(),
            oauth: self.oauth.clone(),
        }
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// `POST /api/generate-image` body.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateImageBody {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Successful transform response.
#[derive(Debug, Serialize)]
pub struct TransformResponse {
    /// Public URL of the stored result
    #[serde(rename = "transformedImage")]
    pub transformed_image: PublicReference,
}

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Short description of what failed
    pub error: String,

    /// Underlying cause, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Text the model produced instead of an image
    #[serde(rename = "textResponse", skip_serializing_if = "Option::is_none")]
    pub text_response: Option<String>,
}

impl ErrorResponse {
    /// Create an error response without details.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            text_response: None,
        }
    }

    /// Create an error response with details.
    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
            text_response: None,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Log an error response by severity and build it.
///
/// 5xx at ERROR, 400 at WARN, everything else at DEBUG.
pub(crate) fn error_response(
    status: StatusCode,
    error_type: &str,
    body: ErrorResponse,
) -> Response {
    let message = match &body.details {
        Some(details) => format!("{}: {}", body.error, details),
        None => body.error.clone(),
    };

    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::BAD_REQUEST {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    } else {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    (status, Json(body)).into_response()
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let _span = info_span!("pipeline", stage = ?self.stage()).entered();
        let (status, error_type, body) = match self {
            PipelineError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                ErrorResponse::new("Missing or invalid access token"),
            ),
            PipelineError::InvalidCredential(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_token",
                ErrorResponse::with_details("Invalid token", reason),
            ),
            PipelineError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                "invalid_request",
                ErrorResponse::new(message),
            ),
            PipelineError::StorageUnavailable(cause) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_unavailable",
                ErrorResponse::with_details("Storage is not accessible. Cannot continue.", cause),
            ),
            PipelineError::GenerationFailed(cause) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "generation_failed",
                ErrorResponse::with_details("Image transformation failed", cause),
            ),
            PipelineError::PublishFailed(cause) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "publish_failed",
                ErrorResponse::with_details("Failed to upload to storage", cause),
            ),
        };

        error_response(status, error_type, body)
    }
}

/// Wrapper mapping generation errors for the generate-image endpoint.
pub struct GenerateImageError(pub GenerationError);

impl IntoResponse for GenerateImageError {
    fn into_response(self) -> Response {
        let (status, error_type, body) = match self.0 {
            GenerationError::EmptyPrompt => (
                StatusCode::BAD_REQUEST,
                "invalid_request",
                ErrorResponse::new("Prompt is required"),
            ),
            GenerationError::NoImage { text_response } => {
                let text = if text_response.is_empty() {
                    "No response received".to_string()
                } else {
                    text_response
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "no_image",
                    ErrorResponse {
                        error: "Failed to generate image".to_string(),
                        details: None,
                        text_response: Some(text),
                    },
                )
            }
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "generation_failed",
                ErrorResponse::with_details(
                    "Internal server error during image generation",
                    other.to_string(),
                ),
            ),
        };

        error_response(status, error_type, body)
    }
}

impl From<GenerationError> for GenerateImageError {
    fn from(err: GenerationError) -> Self {
        GenerateImageError(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle `POST /api/transform`.
///
/// The body is extracted fallibly so that an unauthenticated request is
/// answered with 401 before its body is judged.
pub async fn transform_handler<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    body: Result<Json<TransformBody>, JsonRejection>,
) -> Result<Json<TransformResponse>, PipelineError>
where
    S: StorageFactory + 'static,
{
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let body = body
        .map(|Json(body)| body)
        .map_err(|rejection| rejection.body_text());

    let reference = state.pipeline.run(authorization, body).await?;
    Ok(Json(TransformResponse {
        transformed_image: reference,
    }))
}

/// Handle `POST /api/generate-image`.
///
/// Returns the raw image bytes with the provider's content type.
pub async fn generate_image_handler<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<GenerateImageBody>, JsonRejection>,
) -> Result<Response, GenerateImageError>
where
    S: StorageFactory + 'static,
{
    // A missing or malformed body is treated as an empty prompt.
    let prompt = body
        .ok()
        .and_then(|Json(body)| body.prompt)
        .unwrap_or_default();

    let deadline = state.pipeline.timeouts().generation;
    let artifact = with_deadline(
        "generation",
        deadline,
        state.pipeline.generator().generate(&prompt),
    )
    .await
    .map_err(GenerationError::Timeout)??;

    debug!(
        size = artifact.len(),
        content_type = %artifact.content_type,
        "Returning generated image"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.content_type),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        artifact.bytes,
    )
        .into_response())
}

/// Health check endpoint.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
