use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Errors raised while resolving the caller from a bearer credential
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// No `Authorization` header, or it does not carry a `Bearer` token
    #[error("Missing or invalid access token")]
    MissingBearer,

    /// The token payload could not be decoded or has no subject
    #[error("Invalid token: {0}")]
    InvalidCredential(String),
}

/// Errors from the object storage service
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The storage API rejected the call
    #[error("Storage API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// An object already exists at the target path and upsert is disabled
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
}

/// Errors from the image generation providers
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Prompt was empty or whitespace-only
    #[error("Prompt is required")]
    EmptyPrompt,

    /// The provider call failed at the transport level
    #[error("Provider connection error: {0}")]
    Connection(String),

    /// The provider answered with an error
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider response could not be decoded
    #[error("Failed to decode provider output: {0}")]
    Decode(String),

    /// The provider finished without producing any image bytes
    #[error("Provider returned an empty image")]
    EmptyOutput,

    /// The provider did not finish within its deadline
    #[error("{0}")]
    Timeout(String),

    /// The chunk stream ended without an image; carries any text produced instead
    #[error("No image data received from the model")]
    NoImage { text_response: String },
}

/// Errors while publishing a generated artifact
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The write call failed; no reference was produced
    #[error("Failed to upload to storage: {0}")]
    Write(#[from] StorageError),
}

/// Terminal failure of the transform pipeline.
///
/// Each variant corresponds to exactly one stage boundary.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// No credential, or not a bearer credential
    #[error("Missing or invalid access token")]
    Unauthorized,

    /// Credential could not be decoded into a caller identity
    #[error("Invalid token: {0}")]
    InvalidCredential(String),

    /// Request body is missing the image or the prompt
    #[error("{0}")]
    Validation(String),

    /// The connectivity probe against the caller's storage scope failed
    #[error("Storage is not accessible: {0}")]
    StorageUnavailable(String),

    /// The generation provider failed or produced no usable image
    #[error("Image transformation failed: {0}")]
    GenerationFailed(String),

    /// Writing the artifact to storage failed
    #[error("Failed to upload to storage: {0}")]
    PublishFailed(String),
}

impl PipelineError {
    /// The stage the pipeline was in when this error was raised.
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Unauthorized | PipelineError::InvalidCredential(_) => {
                PipelineStage::AwaitingAuth
            }
            PipelineError::Validation(_) | PipelineError::StorageUnavailable(_) => {
                PipelineStage::Authorized
            }
            PipelineError::GenerationFailed(_) => PipelineStage::ConnectivityChecked,
            PipelineError::PublishFailed(_) => PipelineStage::Generated,
        }
    }
}

impl From<IdentityError> for PipelineError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingBearer => PipelineError::Unauthorized,
            IdentityError::InvalidCredential(reason) => PipelineError::InvalidCredential(reason),
        }
    }
}

/// Errors from the Google Photos library API
#[derive(Debug, Clone, Error)]
pub enum PhotosError {
    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The API answered with a non-success status
    #[error("Photos API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The album creation response carried no album id
    #[error("Failed to create album")]
    MissingAlbumId,
}

/// Errors from the Google OAuth relay
#[derive(Debug, Clone, Error)]
pub enum OAuthError {
    /// Client id, secret or URLs are not configured
    #[error("Google OAuth is not configured")]
    NotConfigured,

    /// The callback did not carry an authorization code
    #[error("Missing authorization code")]
    MissingCode,

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    Exchange(String),
}
