//! Text-to-image generation through a Gemini-compatible streaming API.
//!
//! The model is asked for both image and text modalities and answers with
//! server-sent events, one `GenerateContentResponse` JSON document per event.
//! Each content part is turned into a [`StreamChunk`].

use std::collections::VecDeque;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::GenerationError;

use super::{ByteStream, ChunkSource, ChunkStream, StreamChunk};

/// Default API endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default image-capable model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Gemini-backed [`ChunkSource`].
pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 2],
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

// =============================================================================
// Provider
// =============================================================================

impl GeminiProvider {
    /// Create a provider for the given model.
    pub fn new(
        http: reqwest::Client,
        base_url: &Url,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl ChunkSource for GeminiProvider {
    async fn stream_chunks(&self, prompt: &str) -> Result<ChunkStream, GenerationError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["IMAGE", "TEXT"],
            },
        };

        let response = self
            .http
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GenerateContentResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(GenerationError::Provider(format!("{}: {}", status, message)));
        }

        debug!(model = %self.model, "Generation stream opened");
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| GenerationError::Connection(e.to_string())))
            .boxed();
        Ok(decode_sse_chunks(body))
    }
}

// =============================================================================
// Server-Sent Events
// =============================================================================

/// Incremental server-sent events decoder.
///
/// Returns the `data` payload of each complete event.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
    data: String,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start + self.scanned..]
            .iter()
            .position(|b| *b == b'\n')
        {
            let end = start + self.scanned + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            self.process_line(line.trim_end_matches('\r'), &mut events);
            start = end + 1;
            self.scanned = 0;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        events
    }

    fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        self.scanned = 0;
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            self.process_line(line.trim_end_matches('\r'), &mut events);
        }
        self.process_line("", &mut events);
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            if !self.data.is_empty() {
                events.push(std::mem::take(&mut self.data));
            }
            return;
        }

        // Other fields (event, id, retry) and comments are ignored
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            if !self.data.is_empty() {
                self.data.push('\n');
            }
            self.data.push_str(value);
        }
    }
}

/// Convert one event payload into chunks, in part order.
fn parse_event(data: &str) -> Result<Vec<StreamChunk>, GenerationError> {
    let response: GenerateContentResponse =
        serde_json::from_str(data).map_err(|e| GenerationError::Decode(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(GenerationError::Provider(error.message));
    }

    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default();

    let mut chunks = Vec::with_capacity(parts.len());
    for part in parts {
        if let Some(inline) = part.inline_data {
            let bytes = STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|e| GenerationError::Decode(format!("inline image data: {e}")))?;
            chunks.push(StreamChunk::Image {
                mime_type: inline.mime_type,
                bytes: bytes.into(),
            });
        } else if let Some(text) = part.text {
            chunks.push(StreamChunk::Text { text });
        }
    }
    Ok(chunks)
}

struct DecodeState {
    body: ByteStream,
    sse: SseDecoder,
    pending: VecDeque<Result<StreamChunk, GenerationError>>,
    finished: bool,
}

impl DecodeState {
    fn enqueue(&mut self, events: Vec<String>) {
        for event in events {
            match parse_event(&event) {
                Ok(chunks) => self.pending.extend(chunks.into_iter().map(Ok)),
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Turn a raw SSE body into a chunk stream.
///
/// The stream ends after the first error.
fn decode_sse_chunks(body: ByteStream) -> ChunkStream {
    let state = DecodeState {
        body,
        sse: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.sse.push(&bytes);
                    state.enqueue(events);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state.pending.push_back(Err(e));
                }
                None => {
                    state.finished = true;
                    let events = state.sse.finish();
                    state.enqueue(events);
                }
            }
        }
    })
    .boxed()
}
