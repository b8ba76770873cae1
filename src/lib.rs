//! # Image Relay
//!
//! An authenticated image-transformation backend. A client sends a source
//! image and an edit prompt; the service relays them to an external
//! generation provider and publishes the result into the caller's own
//! object-storage scope, returning a public URL.
//!
//! ## Features
//!
//! - **Caller-scoped storage**: every storage call carries the caller's own bearer token
//! - **Fail-fast pipeline**: storage is probed before any provider cost is paid
//! - **Two generation modes**: image-to-image (streamed bytes) and text-to-image (chunk stream)
//! - **Google Photos relay**: album creation, upload and OAuth code exchange
//!
//! ## Architecture
//!
//! - [`identity`] - Bearer credential parsing and caller identity resolution
//! - [`storage`] - Caller-scoped object storage clients
//! - [`generation`] - Provider adapters normalizing output into an artifact
//! - [`publish`] - Artifact naming and storage writes
//! - [`pipeline`] - Stage sequencing, deadlines and error mapping
//! - [`photos`] / [`oauth`] - Google Photos and OAuth clients
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use url::Url;
//! use image_relay::{
//!     create_router, AppState, GeminiProvider, GenerationAdapter, ReplicateProvider,
//!     RestStorage, RouterConfig, TransformPipeline,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http = reqwest::Client::new();
//!     let storage = RestStorage::new(
//!         http.clone(),
//!         &Url::parse("https://project.supabase.co")?,
//!         "anon-key",
//!         "user-images",
//!     );
//!     let generator = GenerationAdapter::new(
//!         Arc::new(ReplicateProvider::new(
//!             http.clone(),
//!             &Url::parse("https://api.replicate.com")?,
//!             "black-forest-labs/flux-kontext-pro",
//!             "r8_token",
//!         )),
//!         Arc::new(GeminiProvider::new(
//!             http.clone(),
//!             &Url::parse("https://generativelanguage.googleapis.com")?,
//!             "gemini-2.0-flash-preview-image-generation",
//!             "gemini-key",
//!         )),
//!     );
//!
//!     let pipeline = TransformPipeline::new(storage, Arc::new(generator));
//!     let router = create_router(AppState::new(pipeline), RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod generation;
pub mod identity;
pub mod oauth;
pub mod photos;
pub mod pipeline;
pub mod publish;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, ServeConfig};
pub use error::{
    GenerationError, IdentityError, OAuthError, PhotosError, PipelineError, PublishError,
    StorageError,
};
pub use generation::{
    drain_byte_stream, ByteStream, ChunkAccumulator, ChunkSource, ChunkStream, GeminiProvider,
    GeneratedArtifact, GenerationAdapter, ReplicateProvider, StreamChunk, TransformInput,
    TransformProvider,
};
pub use identity::{resolve, CallerIdentity, Credential};
pub use oauth::GoogleOAuth;
pub use photos::PhotosClient;
pub use pipeline::{
    with_deadline, PipelineStage, StageTimeouts, TransformBody, TransformPipeline,
    TransformRequest,
};
pub use publish::{object_path, ArtifactPublisher, PublicReference};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig};
pub use storage::{ObjectStore, RestStorage, ScopedStorageClient, StorageFactory, StorageObject};
