use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::GenerationError;

use super::GeneratedArtifact;

/// A finite, non-restartable stream of model output chunks.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, GenerationError>>;

/// One piece of streamed model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Decoded inline image data
    Image { mime_type: String, bytes: Bytes },

    /// A text fragment
    Text { text: String },
}

/// Left-to-right accumulator over a chunk stream.
///
/// Keeps the first image it sees and concatenates every text fragment.
#[derive(Debug, Default)]
pub struct ChunkAccumulator {
    image: Option<GeneratedArtifact>,
    text: String,
}

impl ChunkAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk.
    pub fn push(&mut self, chunk: StreamChunk) {
        match chunk {
            StreamChunk::Image { mime_type, bytes } => {
                if self.image.is_none() {
                    self.image = Some(GeneratedArtifact::new(bytes, mime_type));
                }
            }
            StreamChunk::Text { text } => self.text.push_str(&text),
        }
    }

    /// Finish accumulation.
    ///
    /// Yields the captured image, or [`GenerationError::NoImage`] with the
    /// accumulated text when no image chunk was seen.
    pub fn finish(self) -> Result<GeneratedArtifact, GenerationError> {
        self.image.ok_or(GenerationError::NoImage {
            text_response: self.text,
        })
    }
}
