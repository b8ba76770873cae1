//! Image transformation through a Replicate-compatible predictions API.
//!
//! A prediction is created with `Prefer: wait`, so fast models answer in the
//! creation call. Slower ones are polled through `urls.get` until they reach
//! a terminal status. The finished prediction's output is a URL whose body is
//! streamed back lazily.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::GenerationError;

use super::{ByteStream, TransformInput, TransformProvider};

/// Default API endpoint.
pub const DEFAULT_REPLICATE_BASE_URL: &str = "https://api.replicate.com";

/// Default image editing model.
pub const DEFAULT_REPLICATE_MODEL: &str = "black-forest-labs/flux-kontext-pro";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Replicate-backed [`TransformProvider`].
pub struct ReplicateProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_token: String,
    poll_interval: Duration,
}

#[derive(Serialize)]
struct CreatePrediction<'a> {
    input: &'a TransformInput,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

impl ReplicateProvider {
    /// Create a provider for a model (`owner/name`).
    pub fn new(
        http: reqwest::Client,
        base_url: &Url,
        model: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            model: model.into(),
            api_token: api_token.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the interval between status polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn predictions_url(&self) -> String {
        format!("{}/v1/models/{}/predictions", self.base_url, self.model)
    }

    async fn create_prediction(&self, input: &TransformInput) -> Result<Prediction, GenerationError> {
        let response = self
            .http
            .post(self.predictions_url())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_token))
            .header("Prefer", "wait")
            .json(&CreatePrediction { input })
            .send()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        read_prediction(response).await
    }

    async fn poll(&self, url: &str) -> Result<Prediction, GenerationError> {
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_token))
            .send()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        read_prediction(response).await
    }

    /// Poll until the prediction reaches a terminal status.
    ///
    /// Unbounded on its own; callers apply a deadline.
    async fn wait_for_completion(
        &self,
        mut prediction: Prediction,
    ) -> Result<Prediction, GenerationError> {
        loop {
            match prediction.status {
                PredictionStatus::Succeeded => return Ok(prediction),
                PredictionStatus::Failed | PredictionStatus::Canceled => {
                    let reason = match prediction.error {
                        Some(serde_json::Value::String(message)) => message,
                        Some(other) => other.to_string(),
                        None => format!("prediction {:?}", prediction.status).to_lowercase(),
                    };
                    return Err(GenerationError::Provider(reason));
                }
                PredictionStatus::Starting
                | PredictionStatus::Processing
                | PredictionStatus::Unknown => {}
            }

            let poll_url = prediction
                .urls
                .as_ref()
                .and_then(|urls| urls.get.clone())
                .ok_or_else(|| {
                    GenerationError::Provider(format!(
                        "prediction {} is still running and has no status URL",
                        prediction.id
                    ))
                })?;

            debug!(prediction = %prediction.id, status = ?prediction.status, "Waiting for prediction");
            tokio::time::sleep(self.poll_interval).await;
            prediction = self.poll(&poll_url).await?;
        }
    }

    async fn open_output(&self, url: &str) -> Result<ByteStream, GenerationError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Provider(format!(
                "output download failed with {}",
                status
            )));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| GenerationError::Connection(e.to_string())))
            .boxed())
    }
}

#[async_trait]
impl TransformProvider for ReplicateProvider {
    async fn run(&self, input: &TransformInput) -> Result<ByteStream, GenerationError> {
        let created = self.create_prediction(input).await?;
        debug!(prediction = %created.id, model = %self.model, "Prediction created");

        let finished = self.wait_for_completion(created).await?;
        let output_url = match finished.output {
            Some(PredictionOutput::Single(url)) => url,
            Some(PredictionOutput::Many(urls)) => urls.into_iter().next().ok_or_else(|| {
                GenerationError::Decode("prediction output list is empty".to_string())
            })?,
            None => {
                return Err(GenerationError::Decode(
                    "prediction succeeded without output".to_string(),
                ))
            }
        };

        self.open_output(&output_url).await
    }
}

async fn read_prediction(response: reqwest::Response) -> Result<Prediction, GenerationError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GenerationError::Provider(format!("{}: {}", status, body)));
    }

    response
        .json::<Prediction>()
        .await
        .map_err(|e| GenerationError::Decode(e.to_string()))
}
