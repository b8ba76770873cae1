//! Generation adapter layer.
//!
//! This module normalizes the output of the external image providers into a
//! single in-memory [`GeneratedArtifact`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      GenerationAdapter                        │
//! │                                                               │
//! │   transform(image, prompt)        generate(prompt)            │
//! │          │                               │                    │
//! │          ▼                               ▼                    │
//! │  ┌──────────────────┐          ┌────────────────────┐         │
//! │  │TransformProvider │          │    ChunkSource     │         │
//! │  │ (lazy byte       │          │ (Image | Text      │         │
//! │  │  stream)         │          │  chunk stream)     │         │
//! │  └────────┬─────────┘          └─────────┬──────────┘         │
//! │           ▼                              ▼                    │
//! │   drain_byte_stream()            ChunkAccumulator             │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Providers are built once at startup and shared read-only across requests.

mod chunk;
mod gemini;
mod replicate;
mod stream;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::GenerationError;

pub use chunk::{ChunkAccumulator, ChunkStream, StreamChunk};
pub use gemini::{GeminiProvider, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
pub use replicate::{ReplicateProvider, DEFAULT_REPLICATE_BASE_URL, DEFAULT_REPLICATE_MODEL};
pub use stream::{drain_byte_stream, ByteStream};

/// Content type assumed when the artifact's magic bytes are not recognised.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Output format requested from the transformation provider.
pub const TRANSFORM_OUTPUT_FORMAT: &str = "jpg";

// =============================================================================
// Generated Artifact
// =============================================================================

/// Image bytes produced by a provider plus their declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    /// Image bytes
    pub bytes: Bytes,

    /// MIME type, e.g. `image/jpeg`
    pub content_type: String,
}

impl GeneratedArtifact {
    /// Create an artifact with an explicit content type.
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    /// Create an artifact whose content type is sniffed from its magic bytes,
    /// falling back to [`DEFAULT_CONTENT_TYPE`].
    pub fn sniffed(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let content_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| DEFAULT_CONTENT_TYPE.to_string());
        Self {
            bytes,
            content_type,
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the artifact holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// =============================================================================
// Provider Traits
// =============================================================================

/// Input sent to the image transformation provider.
#[derive(Debug, Clone, Serialize)]
pub struct TransformInput {
    /// Instruction describing the edit
    pub prompt: String,

    /// Source image, as a URL or a data URI
    pub input_image: String,

    /// Requested output encoding
    pub output_format: String,
}

impl TransformInput {
    /// Build a transform input requesting JPEG output.
    pub fn new(image: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            input_image: image.into(),
            output_format: TRANSFORM_OUTPUT_FORMAT.to_string(),
        }
    }
}

/// An image-to-image provider whose output arrives as a lazy byte stream.
#[async_trait]
pub trait TransformProvider: Send + Sync {
    /// Run the transformation and return the output stream.
    async fn run(&self, input: &TransformInput) -> Result<ByteStream, GenerationError>;
}

/// A text-to-image provider emitting interleaved image and text chunks.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Start generation for a prompt and return the chunk stream.
    async fn stream_chunks(&self, prompt: &str) -> Result<ChunkStream, GenerationError>;
}

// =============================================================================
// Generation Adapter
// =============================================================================

/// Entry point for both generation modes.
#[derive(Clone)]
pub struct GenerationAdapter {
    transformer: Arc<dyn TransformProvider>,
    generator: Arc<dyn ChunkSource>,
}

impl GenerationAdapter {
    /// Create an adapter over the given providers.
    pub fn new(
        transformer: Arc<dyn TransformProvider>,
        generator: Arc<dyn ChunkSource>,
    ) -> Self {
        Self {
            transformer,
            generator,
        }
    }

    /// Transform an image according to a prompt.
    ///
    /// The provider's byte stream is drained completely before returning.
    pub async fn transform(
        &self,
        image: &str,
        prompt: &str,
    ) -> Result<GeneratedArtifact, GenerationError> {
        let prompt = non_empty_prompt(prompt)?;

        let stream = self
            .transformer
            .run(&TransformInput::new(image, prompt))
            .await?;
        let bytes = drain_byte_stream(stream).await?;
        if bytes.is_empty() {
            return Err(GenerationError::EmptyOutput);
        }

        let artifact = GeneratedArtifact::sniffed(bytes);
        info!(
            size = artifact.len(),
            content_type = %artifact.content_type,
            "Image generated by transformation provider"
        );
        Ok(artifact)
    }

    /// Generate an image from a text prompt.
    ///
    /// Returns the first image chunk of the stream. When the stream ends
    /// without one, fails with [`GenerationError::NoImage`] carrying the
    /// concatenated text chunks.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedArtifact, GenerationError> {
        let prompt = non_empty_prompt(prompt)?;

        let mut stream = self.generator.stream_chunks(prompt).await?;
        let mut accumulator = ChunkAccumulator::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let StreamChunk::Text { text } = &chunk {
                debug!(text = %text, "Text chunk from model");
            }
            accumulator.push(chunk);
        }

        accumulator.finish()
    }
}

fn non_empty_prompt(prompt: &str) -> Result<&str, GenerationError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        Err(GenerationError::EmptyPrompt)
    } else {
        Ok(trimmed)
    }
}
