//! REST object storage client.
//!
//! Talks to a Supabase-Storage-compatible API:
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/storage/v1/object/list/{bucket}` | List objects under a prefix |
//! | POST   | `/storage/v1/object/{bucket}/{path}` | Upload an object |
//! | GET    | `/storage/v1/object/public/{bucket}/{path}` | Public object URL |

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::StorageError;
use crate::identity::Credential;

use super::{ObjectStore, StorageFactory, StorageObject};

const API_PREFIX: &str = "storage/v1/object";

struct RestStorageConfig {
    base_url: String,
    api_key: String,
    bucket: String,
}

/// Shared storage configuration and HTTP connection pool.
///
/// Cheap to clone; all clones share the same configuration.
#[derive(Clone)]
pub struct RestStorage {
    http: reqwest::Client,
    config: Arc<RestStorageConfig>,
}

impl RestStorage {
    /// Create a storage factory.
    ///
    /// # Arguments
    /// * `http` - Shared HTTP client
    /// * `base_url` - Storage project URL (e.g. `https://xyz.supabase.co`)
    /// * `api_key` - Project API key sent as `apikey` on every call
    /// * `bucket` - Bucket holding per-user objects
    pub fn new(
        http: reqwest::Client,
        base_url: &Url,
        api_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            http,
            config: Arc::new(RestStorageConfig {
                base_url: base_url.as_str().trim_end_matches('/').to_string(),
                api_key: api_key.into(),
                bucket: bucket.into(),
            }),
        }
    }

    /// The bucket name.
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// A client authorized with the project API key rather than a caller's
    /// token. Only used by the `check` command.
    pub fn service_client(&self) -> ScopedStorageClient {
        ScopedStorageClient {
            storage: self.clone(),
            bearer: self.config.api_key.clone(),
        }
    }

    fn list_url(&self) -> String {
        format!(
            "{}/{}/list/{}",
            self.config.base_url,
            API_PREFIX,
            urlencoding::encode(&self.config.bucket)
        )
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.base_url,
            API_PREFIX,
            urlencoding::encode(&self.config.bucket),
            encode_path(path)
        )
    }

    fn public_object_url(&self, path: &str) -> String {
        format!(
            "{}/{}/public/{}/{}",
            self.config.base_url,
            API_PREFIX,
            urlencoding::encode(&self.config.bucket),
            encode_path(path)
        )
    }
}

impl StorageFactory for RestStorage {
    type Client = ScopedStorageClient;

    fn for_caller(&self, credential: &Credential) -> Self::Client {
        ScopedStorageClient {
            storage: self.clone(),
            bearer: credential.token().to_string(),
        }
    }
}

/// Storage client bound to one caller's bearer token.
pub struct ScopedStorageClient {
    storage: RestStorage,
    bearer: String,
}

impl ScopedStorageClient {
    fn post(&self, url: String) -> reqwest::RequestBuilder {
        self.storage
            .http
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer))
            .header("apikey", &self.storage.config.api_key)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: u32,
    offset: u32,
}

/// Error body returned by the storage API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    status_code: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl ObjectStore for ScopedStorageClient {
    async fn probe(&self) -> Result<(), StorageError> {
        let response = self
            .post(self.storage.list_url())
            .json(&ListRequest {
                prefix: "",
                limit: 1,
                offset: 0,
            })
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        check_response(response, None).await?;
        debug!(bucket = %self.storage.bucket(), "Storage probe succeeded");
        Ok(())
    }

    async fn put_object(&self, object: StorageObject) -> Result<(), StorageError> {
        let size = object.bytes.len();
        let response = self
            .post(self.storage.object_url(&object.path))
            .header(CONTENT_TYPE, &object.content_type)
            .header(CACHE_CONTROL, format!("max-age={}", object.cache_max_age))
            .header("x-upsert", "false")
            .body(object.bytes)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        check_response(response, Some(&object.path)).await?;
        debug!(path = %object.path, size, "Object written");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.storage.public_object_url(path)
    }
}

/// Map a non-success storage response to an error.
///
/// The API reports duplicates either as HTTP 409 or as HTTP 400 with a body
/// `statusCode` of `"409"`.
async fn check_response(
    response: reqwest::Response,
    path: Option<&str>,
) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();

    let body_status = body.status_code.as_ref().map(|code| match code {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    let duplicate = status.as_u16() == 409
        || body_status.as_deref() == Some("409")
        || body.error.as_deref() == Some("Duplicate");

    if duplicate {
        if let Some(path) = path {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
    }

    let message = body
        .message
        .or(body.error)
        .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });

    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Percent-encode each segment of an object path, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
