//! Transform pipeline orchestration.
//!
//! One pipeline run per request, no state shared between runs:
//!
//! ```text
//! AwaitingAuth ──► Authorized ──► ConnectivityChecked ──► Generated ──► Published ──► Done
//!      │               │                   │                  │
//!      ▼               ▼                   ▼                  ▼
//!  Unauthorized   Validation          GenerationFailed   PublishFailed
//!  InvalidCred.   StorageUnavailable
//! ```
//!
//! The storage probe runs before generation so that provider cost is never
//! paid when the result could not be stored. Stages never retry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::generation::GenerationAdapter;
use crate::identity::{resolve, Credential};
use crate::publish::{ArtifactPublisher, PublicReference};
use crate::storage::{ObjectStore, StorageFactory};

/// Default deadline for the storage connectivity probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default deadline for generation (provider call, polling and download).
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Default deadline for the storage write.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

/// Pipeline progress for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    AwaitingAuth,
    Authorized,
    ConnectivityChecked,
    Generated,
    Published,
    Done,
}

/// Per-stage deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub probe: Duration,
    pub generation: Duration,
    pub publish: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            probe: DEFAULT_PROBE_TIMEOUT,
            generation: DEFAULT_GENERATION_TIMEOUT,
            publish: DEFAULT_PUBLISH_TIMEOUT,
        }
    }
}

/// Raw `POST /api/transform` body.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TransformBody {
    /// Image URL or data URI
    #[serde(default)]
    pub image: Option<String>,

    /// Edit instruction
    #[serde(default)]
    pub prompt: Option<String>,
}

/// A validated transform request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    image: String,
    prompt: String,
}

impl TransformRequest {
    /// Validate a raw body. Both fields must be present and non-blank.
    pub fn parse(body: TransformBody) -> Result<Self, PipelineError> {
        let image = body.image.filter(|s| !s.trim().is_empty());
        let prompt = body.prompt.filter(|s| !s.trim().is_empty());
        match (image, prompt) {
            (Some(image), Some(prompt)) => Ok(Self { image, prompt }),
            _ => Err(PipelineError::Validation(
                "Missing image or prompt".to_string(),
            )),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Sequences identity resolution, storage probe, generation and publishing.
pub struct TransformPipeline<S: StorageFactory> {
    storage: S,
    generator: Arc<GenerationAdapter>,
    publisher: ArtifactPublisher,
    timeouts: StageTimeouts,
}

impl<S: StorageFactory> TransformPipeline<S> {
    /// Create a pipeline with default timeouts and publisher settings.
    pub fn new(storage: S, generator: Arc<GenerationAdapter>) -> Self {
        Self {
            storage,
            generator,
            publisher: ArtifactPublisher::default(),
            timeouts: StageTimeouts::default(),
        }
    }

    /// Use a specific publisher.
    pub fn with_publisher(mut self, publisher: ArtifactPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    /// Use specific stage deadlines.
    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The shared generation adapter.
    pub fn generator(&self) -> &Arc<GenerationAdapter> {
        &self.generator
    }

    /// Stage deadlines in effect.
    pub fn timeouts(&self) -> StageTimeouts {
        self.timeouts
    }

    /// Run the pipeline for one request.
    ///
    /// # Arguments
    ///
    /// * `authorization` - Raw `Authorization` header value, if any
    /// * `body` - The decoded request body, or the reason it could not be decoded
    pub async fn run(
        &self,
        authorization: Option<&str>,
        body: Result<TransformBody, String>,
    ) -> Result<PublicReference, PipelineError> {
        let mut stage = PipelineStage::AwaitingAuth;

        // AwaitingAuth -> Authorized
        let credential = Credential::from_authorization(authorization)?;
        let caller = resolve(&credential)?;
        advance(&mut stage, PipelineStage::Authorized);

        let request = body
            .map_err(PipelineError::Validation)
            .and_then(TransformRequest::parse)?;

        // Authorized -> ConnectivityChecked
        let client = self.storage.for_caller(&credential);
        with_deadline("storage probe", self.timeouts.probe, client.probe())
            .await
            .map_err(PipelineError::StorageUnavailable)?
            .map_err(|e| PipelineError::StorageUnavailable(e.to_string()))?;
        advance(&mut stage, PipelineStage::ConnectivityChecked);

        // ConnectivityChecked -> Generated
        let artifact = with_deadline(
            "generation",
            self.timeouts.generation,
            self.generator.transform(request.image(), request.prompt()),
        )
        .await
        .map_err(PipelineError::GenerationFailed)?
        .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?;
        advance(&mut stage, PipelineStage::Generated);

        // Generated -> Published
        let reference = with_deadline(
            "publish",
            self.timeouts.publish,
            self.publisher.publish(&client, artifact, &caller),
        )
        .await
        .map_err(PipelineError::PublishFailed)?
        .map_err(|e| PipelineError::PublishFailed(e.to_string()))?;
        advance(&mut stage, PipelineStage::Published);

        info!(user_id = %caller.user_id(), reference = %reference, "Transform complete");
        advance(&mut stage, PipelineStage::Done);
        Ok(reference)
    }
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    debug!(from = ?*stage, to = ?next, "Pipeline stage transition");
    *stage = next;
}

/// Run a stage future under a deadline.
///
/// On expiry the future is dropped, cancelling any in-flight call, and the
/// outer error describes the timeout.
pub async fn with_deadline<F: Future>(
    stage: &str,
    deadline: Duration,
    future: F,
) -> Result<F::Output, String> {
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| format!("{} timed out after {:?}", stage, deadline))
}
